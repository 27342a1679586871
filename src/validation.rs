//! Schema validation helpers.
//!
//! Validates a `serde_json::Value` against a [`Schema`]: presence of required
//! attributes, value types, nested block cardinality, attribute validators
//! and top-level conflicts.
//!
//! # Example
//!
//! ```
//! use montecarlo_provider::schema::{Attribute, Schema, Validator};
//! use montecarlo_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0().with_attribute(
//!     "db_type",
//!     Attribute::required_string().with_validator(Validator::one_of(["POSTGRES", "MYSQL"])),
//! );
//!
//! assert!(validate(&schema, &json!({"db_type": "POSTGRES"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"db_type": "ORACLE"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("db_type".to_string()));
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, NestedBlock,
    Schema, Validator,
};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed attributes are skipped (provider sets these)
/// - Attribute types must match the schema
/// - Validators run only against present values
/// - Nested blocks are validated recursively with min/max item constraints
/// - Conflicting top-level names may not both be set
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    validate_conflicts(schema, value, &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
///
/// This is a convenience wrapper around [`validate`] that returns a Result.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value)))
                    .with_attribute_if_not_empty(path),
            );
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested_block, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Computed-only attributes are owned by the provider
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            if diagnostics.len() == before {
                for validator in &attr.validators {
                    validate_with(validator, v, path, diagnostics);
                }
            }
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Float64 => {
            if !value.is_number() {
                diagnostics.push(type_error(path, "float64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                let expected = if matches!(attr_type, AttributeType::Set(_)) {
                    "set"
                } else {
                    "list"
                };
                diagnostics.push(type_error(path, expected, value));
            }
        },
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        },
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        },
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name) {
            validate_attribute_type(attr_type, value, &join_path(path, name), diagnostics);
        }
    }
}

fn validate_with(validator: &Validator, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let Some(text) = value.as_str() else {
        return;
    };

    match validator {
        Validator::OneOf { values } => {
            if !values.iter().any(|v| v == text) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                        .with_detail(format!(
                            "Value must be one of: {}, got: \"{}\"",
                            values.join(", "),
                            text
                        ))
                        .with_attribute(path),
                );
            }
        },
        Validator::LengthAtLeast { min } => {
            let len = text.chars().count();
            if len < *min {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid length for attribute '{}'", path))
                        .with_detail(format!(
                            "Length must be at least {}, got: {}",
                            min, len
                        ))
                        .with_attribute(path),
                );
            }
        },
        Validator::Matches { pattern, message } => match Regex::new(pattern) {
            Ok(re) if re.is_match(text) => {},
            Ok(_) => {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                        .with_detail(format!("{}, got: \"{}\"", message, text))
                        .with_attribute(path),
                );
            },
            Err(err) => {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid pattern for attribute '{}'", path))
                        .with_detail(err.to_string())
                        .with_attribute(path),
                );
            },
        },
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match nested.nesting_mode {
        BlockNestingMode::Single => validate_single_block(nested, value, path, diagnostics),
        // Sets are validated the same as lists
        BlockNestingMode::List | BlockNestingMode::Set => {
            validate_list_block(nested, value, path, diagnostics)
        },
    }
}

fn validate_single_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required block '{}'", path))
                        .with_detail("At least one block is required")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => validate_block(&nested.block, v, path, diagnostics),
    }
}

fn validate_list_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        Some(Value::Array(arr)) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // 0 means unlimited
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn validate_conflicts(schema: &Schema, value: &Value, diagnostics: &mut Vec<Diagnostic>) {
    let Some(obj) = value.as_object() else {
        return;
    };
    let is_set = |name: &str| obj.get(name).is_some_and(|v| !v.is_null());

    for (first, second) in &schema.conflicts {
        if is_set(first) && is_set(second) {
            diagnostics.push(
                Diagnostic::error("Invalid Attribute Combination")
                    .with_detail(format!(
                        "Attribute '{}' cannot be specified when '{}' is specified",
                        second, first
                    ))
                    .with_attribute(second.as_str()),
            );
        }
    }
}

// Helper functions

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.as_i64().is_some() {
                true
            } else if let Some(f) = n.as_f64() {
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}

trait DiagnosticExt {
    fn with_attribute_if_not_empty(self, path: &str) -> Self;
}

impl DiagnosticExt for Diagnostic {
    fn with_attribute_if_not_empty(self, path: &str) -> Self {
        if path.is_empty() {
            self
        } else {
            self.with_attribute(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedBlock, Schema};
    use serde_json::json;

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "test"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        let diagnostics = validate(&schema, &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("uuid", Attribute::computed_string());
        assert!(validate(&schema, &json!({"uuid": 42})).is_empty());
    }

    #[test]
    fn test_validate_one_of() {
        let schema = Schema::v0().with_attribute(
            "role",
            Attribute::required_string()
                .with_validator(Validator::one_of(["mcd/owner", "mcd/viewer"])),
        );

        assert!(validate(&schema, &json!({"role": "mcd/viewer"})).is_empty());

        let diagnostics = validate(&schema, &json!({"role": "mcd/nobody"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .is_some_and(|d| d.contains("mcd/owner, mcd/viewer")));
    }

    #[test]
    fn test_validate_length_at_least() {
        let schema = Schema::v0().with_attribute(
            "name",
            Attribute::required_string().with_validator(Validator::length_at_least(1)),
        );

        assert!(validate(&schema, &json!({"name": "a"})).is_empty());
        let diagnostics = validate(&schema, &json!({"name": ""}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid length"));
    }

    #[test]
    fn test_validate_matches() {
        let schema = Schema::v0().with_attribute(
            "member",
            Attribute::required_string()
                .with_validator(Validator::matches("^user:.+$", "Expected format user:<email>")),
        );

        assert!(validate(&schema, &json!({"member": "user:a@b.c"})).is_empty());
        let diagnostics = validate(&schema, &json!({"member": "a@b.c"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .is_some_and(|d| d.starts_with("Expected format user:<email>")));
    }

    #[test]
    fn test_validators_skip_wrong_types() {
        let schema = Schema::v0().with_attribute(
            "name",
            Attribute::required_string().with_validator(Validator::length_at_least(3)),
        );

        // Only the type error is reported
        let diagnostics = validate(&schema, &json!({"name": 5}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_required_single_block() {
        let schema = Schema::v0().with_block(
            "credentials",
            NestedBlock::required(
                Block::new()
                    .with_attribute("service_account_key", Attribute::required_string().sensitive()),
            ),
        );

        assert!(validate(
            &schema,
            &json!({"credentials": {"service_account_key": "{}"}})
        )
        .is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Missing required block"));

        let diagnostics = validate(&schema, &json!({"credentials": {}}));
        assert_eq!(
            diagnostics[0].attribute,
            Some("credentials.service_account_key".to_string())
        );
    }

    #[test]
    fn test_validate_set_block() {
        let schema = Schema::v0().with_block(
            "tags",
            NestedBlock::set(Block::new().with_attribute("name", Attribute::required_string())),
        );

        assert!(validate(&schema, &json!({"tags": [{"name": "a"}, {"name": "b"}]})).is_empty());

        let diagnostics = validate(&schema, &json!({"tags": [{"name": "a"}, {}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("tags.1.name".to_string()));

        let diagnostics = validate(&schema, &json!({"tags": "a"}));
        assert!(diagnostics[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_validate_set_attribute() {
        let schema = Schema::v0().with_attribute(
            "assignments",
            Attribute::new(
                AttributeType::set(AttributeType::String),
                crate::schema::AttributeFlags::optional(),
            ),
        );

        assert!(validate(&schema, &json!({"assignments": ["MCON++a"]})).is_empty());
        let diagnostics = validate(&schema, &json!({"assignments": [1]}));
        assert_eq!(diagnostics[0].attribute, Some("assignments.0".to_string()));
    }

    #[test]
    fn test_validate_conflicts() {
        let schema = Schema::v0()
            .with_attribute(
                "assignments",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    crate::schema::AttributeFlags::optional(),
                ),
            )
            .with_block(
                "tags",
                NestedBlock::set(Block::new().with_attribute("name", Attribute::required_string())),
            )
            .with_conflict("tags", "assignments");

        assert!(validate(&schema, &json!({"assignments": ["a"]})).is_empty());
        assert!(validate(&schema, &json!({"tags": [{"name": "a"}], "assignments": null})).is_empty());

        let diagnostics = validate(&schema, &json!({"tags": [{"name": "a"}], "assignments": ["a"]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid Attribute Combination");
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("port", Attribute::required_int64());
        assert!(validate(&schema, &json!({"port": 5432})).is_empty());
        assert!(validate(&schema, &json!({"port": 5432.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"port": 5432.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"port": "5432"})).len(), 1);
    }

    #[test]
    fn test_helpers() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        assert!(is_valid(&schema, &json!({"name": "x"})));
        assert!(!is_valid(&schema, &json!({})));
        assert!(validate_result(&schema, &json!({"name": "x"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        let diagnostics = validate(&schema, &json!("string"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].attribute.is_none());
    }
}
