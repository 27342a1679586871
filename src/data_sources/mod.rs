//! Monte Carlo data sources.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::MonteCarloClient;
use crate::error::ProviderError;
use crate::schema::Schema;

pub mod warehouse;

pub use warehouse::Warehouse;

/// A read-only view of Monte Carlo objects.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Data source type name, e.g. `montecarlo_warehouse`.
    fn type_name(&self) -> &'static str;

    /// Schema of the data source.
    fn schema(&self) -> Schema;

    /// Read the data source for a configuration.
    async fn read(&self, client: &dyn MonteCarloClient, config: Value) -> Result<Value, ProviderError>;
}

/// Every data source the provider serves.
pub fn all() -> Vec<Arc<dyn DataSource>> {
    vec![Arc::new(Warehouse)]
}
