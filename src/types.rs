//! Result types shared by the provider and its resources.

use serde::{Deserialize, Serialize};

use crate::schema::Diagnostic;

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Dotted path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<serde_json::Value>,
    /// The value after the change (None if deleting).
    pub after: Option<serde_json::Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(
        path: impl Into<String>,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(
        path: impl Into<String>,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: serde_json::Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: serde_json::Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: serde_json::Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }
}

/// State written by a create or update, with the findings collected on the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applied {
    /// The new state.
    pub state: serde_json::Value,
    /// Non-fatal diagnostics.
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl Applied {
    /// A result without diagnostics.
    pub fn new(state: serde_json::Value) -> Self {
        Self {
            state,
            diagnostics: Vec::new(),
        }
    }

    /// Attach diagnostics.
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics.extend(diagnostics);
        self
    }
}

/// Outcome of a read.
///
/// A `None` state means the remote object is gone and the resource should
/// be dropped from state without deletion. The reason is reported as a
/// warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResult {
    /// Refreshed state, or `None` to drop the resource.
    pub state: Option<serde_json::Value>,
    /// Non-fatal diagnostics.
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl ReadResult {
    /// The resource still exists.
    pub fn found(state: serde_json::Value) -> Self {
        Self {
            state: Some(state),
            diagnostics: Vec::new(),
        }
    }

    /// The resource is gone; `reason` becomes a warning.
    pub fn gone(reason: impl Into<String>) -> Self {
        Self {
            state: None,
            diagnostics: vec![Diagnostic::warning(reason)],
        }
    }

    /// Whether the resource should be dropped from state.
    pub fn is_gone(&self) -> bool {
        self.state.is_none()
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: serde_json::Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of data source type names.
    pub data_sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", json!("name1"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("name1")));

        let removed = AttributeChange::removed("name", json!("old"));
        assert_eq!(removed.before, Some(json!("old")));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("credentials.port", json!(5432), json!(5433));
        assert_eq!(modified.before, Some(json!(5432)));
        assert_eq!(modified.after, Some(json!(5433)));
    }

    #[test]
    fn test_plan_result() {
        let no_change = PlanResult::no_change(json!({"uuid": "8bfc4"}));
        assert!(no_change.changes.is_empty());
        assert!(!no_change.requires_replace);

        let with_changes = PlanResult::with_changes(
            json!({"uuid": "8bfc4", "name": "new"}),
            vec![AttributeChange::modified("name", json!("old"), json!("new"))],
            false,
        );
        assert_eq!(with_changes.changes.len(), 1);
    }

    #[test]
    fn test_read_result_gone_carries_warning() {
        let result = ReadResult::gone("Warehouse not found");
        assert!(result.is_gone());
        assert_eq!(result.diagnostics.len(), 1);
        assert!(!result.diagnostics[0].is_error());

        assert!(!ReadResult::found(json!({})).is_gone());
    }

    #[test]
    fn test_applied_collects_diagnostics() {
        let applied = Applied::new(json!({"uuid": "8bfc4"}))
            .with_diagnostics(vec![Diagnostic::warning("slow network")]);
        assert_eq!(applied.diagnostics.len(), 1);
        assert_eq!(applied.state["uuid"], "8bfc4");
    }
}
