//! Schema-driven planning.
//!
//! The planner is the same for every resource. It fills defaults, keeps
//! computed values that the proposal cannot know, flags replacement when an
//! attribute marked `force_new` changes and lists every differing attribute
//! by its dotted path.

use serde_json::{Map, Value};

use crate::schema::{AttributeType, Block, BlockNestingMode, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan the transition from `prior` to `proposed`.
///
/// A null `proposed` plans a deletion; a missing `prior` plans a creation.
pub fn plan(schema: &Schema, prior: Option<&Value>, proposed: Value) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());

    if proposed.is_null() {
        let changes = prior
            .map(|p| diff_block(&schema.block, p, &Value::Null, ""))
            .unwrap_or_default();
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let mut planned = proposed;
    apply_defaults(&schema.block, &mut planned);

    let requires_replace = prior.is_some_and(|p| force_new_changed(&schema.block, p, &planned));
    if let Some(prior) = prior {
        if !requires_replace {
            keep_computed(&schema.block, prior, &mut planned);
        }
    }

    let changes = diff_block(&schema.block, prior.unwrap_or(&Value::Null), &planned, "");
    PlanResult::with_changes(planned, changes, requires_replace)
}

fn apply_defaults(block: &Block, value: &mut Value) {
    let Some(obj) = value.as_object_mut() else {
        return;
    };

    for (name, attr) in &block.attributes {
        if let Some(default) = &attr.default {
            if obj.get(name).map_or(true, Value::is_null) {
                obj.insert(name.clone(), default.clone());
            }
        }
    }

    for (name, nested) in &block.blocks {
        match (nested.nesting_mode, obj.get_mut(name)) {
            (BlockNestingMode::Single, Some(inner)) => apply_defaults(&nested.block, inner),
            (BlockNestingMode::List | BlockNestingMode::Set, Some(Value::Array(items))) => {
                for item in items {
                    apply_defaults(&nested.block, item);
                }
            },
            _ => {},
        }
    }
}

fn keep_computed(block: &Block, prior: &Value, planned: &mut Value) {
    let (Some(prior), Some(planned)) = (prior.as_object(), planned.as_object_mut()) else {
        return;
    };

    for (name, attr) in &block.attributes {
        let computed_only = attr.flags.computed && attr.default.is_none();
        if !computed_only || !planned.get(name).map_or(true, Value::is_null) {
            continue;
        }
        if let Some(value) = prior.get(name).filter(|v| !v.is_null()) {
            planned.insert(name.clone(), value.clone());
        }
    }

    for (name, nested) in &block.blocks {
        if nested.nesting_mode != BlockNestingMode::Single {
            continue;
        }
        if let (Some(prior_inner), Some(planned_inner)) = (prior.get(name), planned.get_mut(name)) {
            keep_computed(&nested.block, prior_inner, planned_inner);
        }
    }
}

fn force_new_changed(block: &Block, prior: &Value, planned: &Value) -> bool {
    let attributes = block.attributes.iter().any(|(name, attr)| {
        attr.force_new
            && !value_of(planned, name).is_null()
            && !same_value(&attr.attr_type, value_of(prior, name), value_of(planned, name))
    });
    if attributes {
        return true;
    }

    block.blocks.iter().any(|(name, nested)| {
        nested.nesting_mode == BlockNestingMode::Single
            && force_new_changed(&nested.block, value_of(prior, name), value_of(planned, name))
    })
}

fn diff_block(block: &Block, before: &Value, after: &Value, path: &str) -> Vec<AttributeChange> {
    let mut changes = Vec::new();

    let mut names: Vec<_> = block.attributes.keys().collect();
    names.sort();
    for name in names {
        let attr = &block.attributes[name];
        let (b, a) = (value_of(before, name), value_of(after, name));
        if !same_value(&attr.attr_type, b, a) {
            changes.push(change(join(path, name), b, a));
        }
    }

    let mut names: Vec<_> = block.blocks.keys().collect();
    names.sort();
    for name in names {
        let nested = &block.blocks[name];
        let (b, a) = (value_of(before, name), value_of(after, name));
        match nested.nesting_mode {
            BlockNestingMode::Single if b.is_object() || a.is_object() => {
                changes.extend(diff_block(&nested.block, b, a, &join(path, name)));
            },
            BlockNestingMode::Set => {
                if !same_set(b, a) {
                    changes.push(change(join(path, name), b, a));
                }
            },
            _ => {
                if b != a {
                    changes.push(change(join(path, name), b, a));
                }
            },
        }
    }

    changes
}

fn change(path: String, before: &Value, after: &Value) -> AttributeChange {
    let some = |v: &Value| (!v.is_null()).then(|| v.clone());
    AttributeChange::new(path, some(before), some(after))
}

fn same_value(attr_type: &AttributeType, before: &Value, after: &Value) -> bool {
    match attr_type {
        AttributeType::Set(_) => same_set(before, after),
        _ => before == after,
    }
}

fn same_set(before: &Value, after: &Value) -> bool {
    match (before, after) {
        (Value::Array(b), Value::Array(a)) => sorted(b) == sorted(a),
        (Value::Null, Value::Array(a)) | (Value::Array(a), Value::Null) => a.is_empty(),
        _ => before == after,
    }
}

fn sorted(items: &[Value]) -> Vec<String> {
    let mut rendered: Vec<String> = items.iter().map(Value::to_string).collect();
    rendered.sort();
    rendered.dedup();
    rendered
}

fn value_of<'a>(value: &'a Value, name: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    value
        .as_object()
        .and_then(|obj: &Map<String, Value>| obj.get(name))
        .unwrap_or(&NULL)
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}
