//! Testing utilities for the provider.
//!
//! [`MockClient`] is a scripted in-memory [`MonteCarloClient`]: handlers are
//! registered per operation name and every call is recorded, so tests can
//! assert exactly which requests were sent and how often.
//! [`ProviderTester`] drives a [`ProviderService`] the way a plugin host
//! would.
//!
//! # Example
//!
//! ```ignore
//! use montecarlo_provider::testing::{MockClient, ProviderTester};
//! use montecarlo_provider::MonteCarloProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_domain() {
//!     let client = MockClient::new().on("createOrUpdateDomain", |_| {
//!         Ok(GraphqlResponse::data(json!({
//!             "createOrUpdateDomain": {"domain": {"uuid": "8bfc4", "name": "domain1"}}
//!         })))
//!     });
//!     let tester = ProviderTester::new(MonteCarloProvider::with_client(client.clone()));
//!
//!     let applied = tester.create("montecarlo_domain", json!({"name": "domain1"})).await.unwrap();
//!     assert_eq!(applied.state["uuid"], "8bfc4");
//!     assert_eq!(client.call_count("createOrUpdateDomain"), 1);
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{operation_name, GraphqlRequest, GraphqlResponse, MonteCarloClient};
use crate::error::ProviderError;
use crate::provider::ProviderService;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{Applied, ImportedResource, PlanResult, ReadResult};

type Handler = dyn Fn(&Value) -> Result<GraphqlResponse, ProviderError> + Send + Sync;

/// A scripted [`MonteCarloClient`].
///
/// Clones share the recorded calls, so a clone can be handed to the code
/// under test while this one is kept for assertions.
#[derive(Clone, Default)]
pub struct MockClient {
    handlers: HashMap<String, Arc<Handler>>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockClient {
    /// A client without handlers. Every request fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `operation` with `handler`, which receives the request variables.
    pub fn on<F>(mut self, operation: &str, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<GraphqlResponse, ProviderError> + Send + Sync + 'static,
    {
        self.handlers.insert(operation.to_string(), Arc::new(handler));
        self
    }

    /// Every call received so far, as `(operation, variables)`.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of calls received for `operation`.
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(name, _)| name == operation)
            .count()
    }
}

impl std::fmt::Debug for MockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut operations: Vec<_> = self.handlers.keys().collect();
        operations.sort();
        f.debug_struct("MockClient")
            .field("operations", &operations)
            .finish()
    }
}

#[async_trait]
impl MonteCarloClient for MockClient {
    async fn execute(&self, request: GraphqlRequest) -> Result<GraphqlResponse, ProviderError> {
        let operation = operation_name(&request.query).unwrap_or("anonymous").to_string();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((operation.clone(), request.variables.clone()));

        match self.handlers.get(&operation) {
            Some(handler) => handler(&request.variables),
            None => Err(ProviderError::Api(format!(
                "no handler registered for operation '{}'",
                operation
            ))),
        }
    }
}

/// A test harness for [`ProviderService`] implementations.
///
/// # Example
///
/// ```ignore
/// let tester = ProviderTester::new(MonteCarloProvider::with_client(client));
/// let state = tester.lifecycle_create("montecarlo_domain", json!({"name": "domain1"})).await.unwrap();
/// ```
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    ///
    /// Returns `Err` with the error diagnostics if there are any.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    ///
    /// Returns `Err` with the error diagnostics if there are any.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Applied, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<ReadResult, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Applied, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Upgrade resource state from an older schema version.
    pub async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .upgrade_resource_state(resource_type, version, state)
            .await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Read data from a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run a full create lifecycle: plan → create → read.
    ///
    /// Returns the final state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self.plan_create(resource_type, config).await?;
        let applied = self
            .create(resource_type, plan_result.planned_state)
            .await?;
        self.refresh(resource_type, applied.state).await
    }

    /// Run a full update lifecycle: plan → update → read.
    ///
    /// Returns the final state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let applied = self
            .update(resource_type, prior_state, plan_result.planned_state)
            .await?;
        self.refresh(resource_type, applied.state).await
    }

    /// Run a full delete lifecycle: plan → delete.
    ///
    /// Returns the warnings of the delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = self
            .plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// Run a full CRUD lifecycle: create → read → update → read → delete.
    ///
    /// Returns the state after the update (before delete).
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created_state = self.lifecycle_create(resource_type, initial_config).await?;
        let updated_state = self
            .lifecycle_update(resource_type, created_state, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated_state.clone())
            .await?;
        Ok(updated_state)
    }

    async fn refresh(&self, resource_type: &str, state: Value) -> Result<Value, ProviderError> {
        let read = self.read(resource_type, state).await?;
        read.state.ok_or_else(|| {
            ProviderError::NotFound(format!("{} disappeared right after apply", resource_type))
        })
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan result indicates the resource will be created.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(
        !plan.requires_replace,
        "Expected plan to create, not replace"
    );
}

/// Assert that a plan result indicates no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan result indicates changes are needed.
///
/// # Panics
///
/// Panics if the plan has no changes.
pub fn assert_plan_has_changes(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes, but got no changes"
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan does not require resource replacement.
///
/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan has a change for a specific attribute path.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let has_change = plan.changes.iter().any(|c| c.path == path);
    assert!(
        has_change,
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan does not have a change for a specific attribute path.
///
/// # Panics
///
/// Panics if the plan has a change for the given path.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    let has_change = plan.changes.iter().any(|c| c.path == path);
    assert!(
        !has_change,
        "Expected plan to not change attribute '{}', but it was changed",
        path
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    let has_errors = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error));

    assert!(has_errors, "Expected at least one error, but got none");
}

/// Assert that diagnostics hold at least one warning and no errors.
///
/// # Panics
///
/// Panics if there is no warning or if any diagnostic is an error.
pub fn assert_has_warnings(diagnostics: &[Diagnostic]) {
    assert_no_errors(diagnostics);
    let has_warnings = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Warning));

    assert!(has_warnings, "Expected at least one warning, but got none");
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error) && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MonteCarloProvider;
    use serde_json::json;

    fn domain(name: &str) -> Value {
        json!({
            "uuid": "8bfc4",
            "name": name,
            "description": "",
            "tags": [],
            "assignments": []
        })
    }

    fn domain_client() -> MockClient {
        MockClient::new()
            .on("createOrUpdateDomain", |vars| {
                Ok(GraphqlResponse::data(json!({
                    "createOrUpdateDomain": {"domain": domain(vars["name"].as_str().unwrap_or_default())}
                })))
            })
            .on("getDomain", |_| {
                Ok(GraphqlResponse::data(json!({"getDomain": domain("domain1")})))
            })
            .on("deleteDomain", |_| {
                Ok(GraphqlResponse::data(json!({"deleteDomain": {"deleted": 1}})))
            })
    }

    #[tokio::test]
    async fn test_mock_client_records_calls() {
        let client = domain_client();
        let response = client
            .execute(GraphqlRequest::new(
                "query getDomain($uuid: UUID!) { getDomain(uuid: $uuid) { uuid } }",
                json!({"uuid": "8bfc4"}),
            ))
            .await
            .unwrap();
        assert!(response.data.is_some());

        let calls = client.clone().calls();
        assert_eq!(calls, vec![("getDomain".to_string(), json!({"uuid": "8bfc4"}))]);
        assert_eq!(client.call_count("deleteDomain"), 0);
    }

    #[tokio::test]
    async fn test_mock_client_rejects_unknown_operation() {
        let client = MockClient::new();
        let err = client
            .execute(GraphqlRequest::new("mutation deleteDomain { x }", json!({})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("deleteDomain"));
        assert_eq!(client.call_count("deleteDomain"), 1);
    }

    #[tokio::test]
    async fn test_tester_resource_types() {
        let tester = ProviderTester::new(MonteCarloProvider::new());
        assert!(tester.resource_types().contains(&"montecarlo_domain".to_string()));
        assert_eq!(tester.data_source_types(), vec!["montecarlo_warehouse"]);
        assert!(tester.schema().resources.contains_key("montecarlo_iam_member"));
    }

    #[tokio::test]
    async fn test_tester_plan_create() {
        let tester = ProviderTester::new(MonteCarloProvider::new());
        let plan = tester
            .plan_create("montecarlo_domain", json!({"name": "domain1"}))
            .await
            .unwrap();

        assert_plan_creates(&plan);
        assert_eq!(plan.planned_state["description"], "");
    }

    #[tokio::test]
    async fn test_tester_plan_update() {
        let tester = ProviderTester::new(MonteCarloProvider::new());
        let plan = tester
            .plan_update("montecarlo_domain", domain("domain1"), domain("domain2"))
            .await
            .unwrap();

        assert_plan_has_changes(&plan);
        assert_plan_changes_attribute(&plan, "name");
        assert_plan_does_not_change_attribute(&plan, "uuid");
        assert_plan_updates_in_place(&plan);
    }

    #[tokio::test]
    async fn test_tester_lifecycle_crud() {
        let client = domain_client();
        let tester = ProviderTester::new(MonteCarloProvider::with_client(client.clone()));

        let final_state = tester
            .lifecycle_crud(
                "montecarlo_domain",
                json!({"name": "domain1"}),
                json!({"uuid": "8bfc4", "name": "domain2"}),
            )
            .await
            .unwrap();

        assert_eq!(final_state["uuid"], "8bfc4");
        assert_eq!(client.call_count("createOrUpdateDomain"), 2);
        assert_eq!(client.call_count("getDomain"), 2);
        assert_eq!(client.call_count("deleteDomain"), 1);
    }

    #[tokio::test]
    async fn test_tester_passes_through_provider() {
        let client = MockClient::new().on("getTables", |_| {
            Ok(GraphqlResponse::data(json!({
                "getTables": {"edges": [], "pageInfo": {"hasNextPage": false}}
            })))
        });
        let tester = ProviderTester::new(MonteCarloProvider::with_client(client));
        assert!(tester.provider().is_configured().await);

        tester.validate_provider_config(json!({})).await.unwrap();
        let err = tester
            .validate_resource_config("montecarlo_domain", json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("name"));

        let state = tester
            .read_data_source("montecarlo_warehouse", json!({"uuid": "dw1"}))
            .await
            .unwrap();
        assert_eq!(state["projects"], json!({}));

        let state = tester
            .upgrade_resource_state("montecarlo_domain", 0, domain("domain1"))
            .await
            .unwrap();
        assert_eq!(state, domain("domain1"));

        assert!(tester
            .import_resource("montecarlo_service_account", "token1")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_tester_configure_reports_diagnostics() {
        let tester = ProviderTester::new(MonteCarloProvider::new());
        let err = tester.configure(json!({"api_url": 42})).await.unwrap_err();
        assert!(matches!(err, TestError::Diagnostics(_)));
    }

    #[test]
    fn test_assert_no_errors() {
        let diagnostics = vec![Diagnostic::warning("Just a warning")];
        assert_no_errors(&diagnostics);
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        let diagnostics = vec![Diagnostic::error("An error")];
        assert_no_errors(&diagnostics);
    }

    #[test]
    fn test_assert_has_errors() {
        let diagnostics = vec![Diagnostic::error("An error")];
        assert_has_errors(&diagnostics);
    }

    #[test]
    #[should_panic(expected = "Expected at least one warning")]
    fn test_assert_has_warnings_fails_on_empty() {
        assert_has_warnings(&[]);
    }

    #[test]
    fn test_assert_error_contains() {
        let diagnostics = vec![Diagnostic::error("Invalid configuration value")];
        assert_error_contains(&diagnostics, "Invalid");
        assert_error_contains(&diagnostics, "configuration");
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("First error").with_attribute("field1"),
            Diagnostic::error("Second error").with_detail("More info"),
        ]);

        let display = format!("{}", err);
        assert!(display.contains("First error"));
        assert!(display.contains("Second error"));
        assert!(display.contains("field1"));
        assert!(display.contains("More info"));
    }
}
