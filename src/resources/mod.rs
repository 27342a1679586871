//! Monte Carlo resources.
//!
//! Every resource maps its state document onto a serde model, drives the
//! API through a [`MonteCarloClient`] and maps the result back. Outcomes
//! that leave the resource usable (already deleted, gone on read) are
//! returned as warnings next to the result; everything else is an error.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::{MonteCarloClient, Uuid};
use crate::error::ProviderError;
use crate::schema::{Diagnostic, Schema};
use crate::types::{Applied, ReadResult};

pub mod bigquery_warehouse;
pub mod comparison_monitor;
mod connection;
pub mod domain;
pub mod iam_group;
pub mod iam_member;
pub mod service_account;
pub mod transactional_warehouse;

pub use bigquery_warehouse::BigQueryWarehouse;
pub use comparison_monitor::ComparisonMonitor;
pub use domain::Domain;
pub use iam_group::IamGroup;
pub use iam_member::IamMember;
pub use service_account::ServiceAccount;
pub use transactional_warehouse::TransactionalWarehouse;

/// Placeholder for a secret whose remote value changed outside of the provider.
pub const UNKNOWN_EXTERNAL_VALUE: &str = "(unknown external value)";

/// A managed Monte Carlo object.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name, e.g. `montecarlo_domain`.
    fn type_name(&self) -> &'static str;

    /// Schema of the resource.
    fn schema(&self) -> Schema;

    /// Create the remote object from a planned state.
    async fn create(
        &self,
        client: &dyn MonteCarloClient,
        planned: Value,
    ) -> Result<Applied, ProviderError>;

    /// Refresh the state from the remote object.
    async fn read(
        &self,
        client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<ReadResult, ProviderError>;

    /// Update the remote object in place.
    async fn update(
        &self,
        client: &dyn MonteCarloClient,
        prior: Value,
        planned: Value,
    ) -> Result<Applied, ProviderError>;

    /// Delete the remote object.
    async fn delete(
        &self,
        client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Build a partial state from an import identifier.
    ///
    /// The provider reads the resource right after, so only identifying
    /// attributes need to be set.
    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let _ = id;
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            self.type_name()
        )))
    }

    /// Upgrade state written by an older schema version.
    fn upgrade_state(&self, version: u64, state: Value) -> Result<Value, ProviderError> {
        let current = self.schema().version;
        if version == current {
            Ok(state)
        } else {
            Err(ProviderError::FailedPrecondition(format!(
                "{} has no upgrade from schema version {} to {}",
                self.type_name(),
                version,
                current
            )))
        }
    }
}

/// Every resource the provider serves.
pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(BigQueryWarehouse),
        Arc::new(TransactionalWarehouse),
        Arc::new(Domain),
        Arc::new(IamGroup),
        Arc::new(IamMember),
        Arc::new(ServiceAccount),
        Arc::new(ComparisonMonitor),
    ]
}

pub(crate) fn from_state<T: DeserializeOwned>(state: Value) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(state)?)
}

pub(crate) fn to_state<T: Serialize>(model: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(model)?)
}

/// Parse an identifier stored in state.
pub(crate) fn required_uuid(value: Option<&str>, attribute: &str) -> Result<Uuid, ProviderError> {
    let value = value.ok_or_else(|| {
        ProviderError::InvalidRequest(format!("'{}' is not set in state", attribute))
    })?;
    Uuid::new(value).map_err(|err| {
        ProviderError::InvalidRequest(format!("'{}' is invalid: {}", attribute, err.message()))
    })
}

/// Split a comma separated import identifier into exactly `count` non-empty parts.
pub(crate) fn split_import_id<'a>(
    id: &'a str,
    count: usize,
    format: &str,
) -> Result<Vec<&'a str>, ProviderError> {
    let parts: Vec<&str> = id.split(',').collect();
    if parts.len() == count && parts.iter().all(|p| !p.is_empty()) {
        Ok(parts)
    } else {
        Err(ProviderError::InvalidRequest(format!(
            "Unexpected Import Identifier: Expected import identifier with format: {}. Got: {:?}",
            format, id
        )))
    }
}
