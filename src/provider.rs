//! The provider service.
//!
//! [`ProviderService`] is the surface a plugin host drives, one resource
//! operation at a time. [`MonteCarloProvider`] implements it over the
//! resource and data source registries and a configured
//! [`MonteCarloClient`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::client::{ApiKey, HttpMonteCarloClient, MonteCarloClient, DEFAULT_API_URL};
use crate::data_sources::{self, DataSource};
use crate::error::ProviderError;
use crate::plan::plan;
use crate::resources::{self, Resource};
use crate::schema::{has_errors, Attribute, Block, Diagnostic, NestedBlock, ProviderSchema, Schema};
use crate::types::{Applied, ImportedResource, PlanResult, ProviderMetadata, ReadResult};
use crate::validation::validate;

/// Environment fallback for `account_service_key.id`.
pub const ENV_API_KEY_ID: &str = "MC_API_KEY_ID";
/// Environment fallback for `account_service_key.token`.
pub const ENV_API_KEY_TOKEN: &str = "MC_API_KEY_TOKEN";
/// Environment fallback for `api_url`.
pub const ENV_API_URL: &str = "MC_API_URL";

/// Operations a plugin host invokes on a provider.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Resource and data source type names, derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        let mut data_sources: Vec<String> = schema.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Upgrade resource state written by an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError>;

    /// Plan changes for a resource.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Applied, ProviderError>;

    /// Refresh the state of a resource.
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<ReadResult, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Applied, ProviderError>;

    /// Delete a resource.
    async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Bring an existing remote object under management.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let _ = config;
        Err(ProviderError::UnknownResource(format!(
            "Unknown data source type: {}",
            data_source_type
        )))
    }
}

/// Resolved provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Account service key sent with every request.
    pub api_key: ApiKey,
    /// GraphQL endpoint.
    pub api_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    account_service_key: Option<RawServiceKey>,
    #[serde(default)]
    api_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawServiceKey {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

impl ProviderConfig {
    /// Resolve a configuration document, falling back to `env` for unset values.
    pub fn resolve(
        config: Value,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ProviderError> {
        let raw: RawConfig = if config.is_null() {
            RawConfig::default()
        } else {
            serde_json::from_value(config)?
        };
        let key = raw.account_service_key.unwrap_or_default();

        let pick = |value: Option<String>, var: &str| {
            value.filter(|v| !v.is_empty()).or_else(|| env(var).filter(|v| !v.is_empty()))
        };

        let id = pick(key.id, ENV_API_KEY_ID)
            .ok_or_else(|| missing("account_service_key.id", ENV_API_KEY_ID))?;
        let token = pick(key.token, ENV_API_KEY_TOKEN)
            .ok_or_else(|| missing("account_service_key.token", ENV_API_KEY_TOKEN))?;
        let api_url = pick(raw.api_url, ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            api_key: ApiKey { id, token },
            api_url,
        })
    }
}

fn missing(attribute: &str, var: &str) -> ProviderError {
    ProviderError::Configuration(format!(
        "'{}' is not configured and {} is not set",
        attribute, var
    ))
}

fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "api_url",
            Attribute::optional_string().with_description("GraphQL endpoint of the Monte Carlo API."),
        )
        .with_block(
            "account_service_key",
            NestedBlock::single(
                Block::new()
                    .with_attribute("id", Attribute::optional_string().sensitive())
                    .with_attribute("token", Attribute::optional_string().sensitive())
                    .with_description("Account service key used to authenticate."),
            ),
        )
}

/// The Monte Carlo provider.
pub struct MonteCarloProvider {
    resources: HashMap<&'static str, Arc<dyn Resource>>,
    data_sources: HashMap<&'static str, Arc<dyn DataSource>>,
    client: RwLock<Option<Arc<dyn MonteCarloClient>>>,
}

impl MonteCarloProvider {
    /// An unconfigured provider serving every resource and data source.
    pub fn new() -> Self {
        Self {
            resources: resources::all().into_iter().map(|r| (r.type_name(), r)).collect(),
            data_sources: data_sources::all()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
            client: RwLock::new(None),
        }
    }

    /// A provider already configured with `client`.
    pub fn with_client(client: impl MonteCarloClient + 'static) -> Self {
        let client: Arc<dyn MonteCarloClient> = Arc::new(client);
        Self {
            client: RwLock::new(Some(client)),
            ..Self::new()
        }
    }

    /// Whether a client has been configured.
    pub async fn is_configured(&self) -> bool {
        self.client.read().await.is_some()
    }

    async fn client(&self) -> Result<Arc<dyn MonteCarloClient>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("Provider has not been configured".to_string())
        })
    }

    fn resource(&self, resource_type: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&Arc<dyn DataSource>, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

impl Default for MonteCarloProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProviderService for MonteCarloProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(provider_config_schema());
        let schema = self
            .resources
            .values()
            .fold(schema, |s, r| s.with_resource(r.type_name(), r.schema()));
        self.data_sources
            .values()
            .fold(schema, |s, d| s.with_data_source(d.type_name(), d.schema()))
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&provider_config_schema(), &config))
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validate(&provider_config_schema(), &config);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let resolved = match ProviderConfig::resolve(config, |var| std::env::var(var).ok()) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(error = %err, "Provider configuration incomplete");
                return Ok(err.into_diagnostics());
            },
        };
        let client: Arc<dyn MonteCarloClient> =
            Arc::new(HttpMonteCarloClient::new(&resolved.api_url, &resolved.api_key)?);

        *self.client.write().await = Some(client);
        info!(endpoint = %resolved.api_url, "Provider configured");
        Ok(diagnostics)
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&self.resource(resource_type)?.schema(), &config))
    }

    #[instrument(skip(self, state), name = "provider.upgrade_resource_state")]
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let upgraded = self.resource(resource_type)?.upgrade_state(version, state)?;
        debug!(resource_type, version, "State upgraded");
        Ok(upgraded)
    }

    #[instrument(skip(self, prior_state, proposed_state, _config), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = self.resource(resource_type)?.schema();
        let result = plan(&schema, prior_state.as_ref(), proposed_state);
        debug!(
            resource_type,
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "Plan completed"
        );
        Ok(result)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Applied, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let applied = resource.create(client.as_ref(), planned_state).await?;
        info!(resource_type, "Create completed successfully");
        Ok(applied)
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<ReadResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let result = resource.read(client.as_ref(), current_state).await?;
        if result.is_gone() {
            warn!(resource_type, "Remote object is gone, dropping it from state");
        }
        Ok(result)
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Applied, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let applied = resource.update(client.as_ref(), prior_state, planned_state).await?;
        info!(resource_type, "Update completed successfully");
        Ok(applied)
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let diagnostics = resource.delete(client.as_ref(), current_state).await?;
        info!(resource_type, warnings = diagnostics.len(), "Delete completed");
        Ok(diagnostics)
    }

    #[instrument(skip(self), name = "provider.import_resource")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let partial = resource.import(id)?;
        let client = self.client().await?;

        let read = resource.read(client.as_ref(), partial).await?;
        let Some(state) = read.state else {
            let reason = read
                .diagnostics
                .into_iter()
                .next()
                .map(|d| d.summary)
                .unwrap_or_default();
            return Err(ProviderError::NotFound(format!(
                "Cannot import non-existent remote object {}: {}",
                id, reason
            )));
        };

        info!(resource_type, "Import completed successfully");
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&self.data_source(data_source_type)?.schema(), &config))
    }

    #[instrument(skip(self, config), name = "provider.read_data_source")]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let client = self.client().await?;
        data_source.read(client.as_ref(), config).await
    }
}
