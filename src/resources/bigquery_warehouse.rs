//! `montecarlo_bigquery_warehouse`
//!
//! A BigQuery warehouse and the single connection this resource attaches
//! to it. The service account key is never returned by the API; drift is
//! detected by comparing the connection's update timestamp with the one
//! recorded at the last write.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::connection::{
    lookup_warehouse, remove_connection, rename_warehouse, WarehouseLookup, DELETION_PROTECTED,
};
use super::{from_state, required_uuid, split_import_id, to_state, Resource, UNKNOWN_EXTERNAL_VALUE};
use crate::client::warehouse::BQ_CONNECTION_TYPE_RESPONSE;
use crate::client::{MonteCarloClient, Uuid};
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema, Validator};
use crate::types::{Applied, ReadResult};
use crate::warehouse::{add_connection, rotate_credentials, ConnectionCredentials, Destination};

const TYPE_NAME: &str = "montecarlo_bigquery_warehouse";
const SCHEMA_VERSION: u64 = 2;
const IMPORT_FORMAT: &str = "<warehouse_uuid>,<connection_uuid>,<data_collector_uuid>";

/// The BigQuery warehouse resource.
pub struct BigQueryWarehouse;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Model {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    collector_uuid: Option<String>,
    #[serde(default)]
    deletion_protection: Option<bool>,
    #[serde(default)]
    credentials: Credentials,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Credentials {
    #[serde(default)]
    connection_uuid: Option<String>,
    #[serde(default)]
    service_account_key: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl Model {
    fn connection_credentials(&self) -> Result<ConnectionCredentials, ProviderError> {
        let key = self.credentials.service_account_key.clone().ok_or_else(|| {
            ProviderError::Validation("credentials.service_account_key must be set".to_string())
        })?;
        Ok(ConnectionCredentials::BigQuery {
            service_account_key: key,
        })
    }

    fn collector(&self) -> Result<Uuid, ProviderError> {
        required_uuid(self.collector_uuid.as_deref(), "collector_uuid")
    }
}

#[async_trait]
impl Resource for BigQueryWarehouse {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new(SCHEMA_VERSION)
            .with_attribute(
                "uuid",
                Attribute::computed_string()
                    .with_description("Unique identifier of warehouse managed by this resource."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("The name of the BigQuery warehouse as it will be presented in Monte Carlo.")
                    .with_validator(Validator::length_at_least(1)),
            )
            .with_attribute(
                "collector_uuid",
                Attribute::required_string()
                    .with_description(
                        "Unique identifier of data collector this warehouse will be attached to. \
                         Changing it replaces the warehouse.",
                    )
                    .with_force_new(),
            )
            .with_attribute(
                "deletion_protection",
                Attribute::optional_bool()
                    .with_description("Refuse to delete the warehouse while set.")
                    .with_default(json!(true)),
            )
            .with_block(
                "credentials",
                NestedBlock::required(
                    Block::new()
                        .with_attribute("connection_uuid", Attribute::computed_string())
                        .with_attribute(
                            "service_account_key",
                            Attribute::required_string()
                                .sensitive()
                                .with_description("Service account key used by the warehouse connection."),
                        )
                        .with_attribute("updated_at", Attribute::computed_string()),
                ),
            )
    }

    async fn create(
        &self,
        client: &dyn MonteCarloClient,
        planned: Value,
    ) -> Result<Applied, ProviderError> {
        let mut model: Model = from_state(planned)?;
        let credentials = model.connection_credentials()?;
        let destination = Destination::New {
            name: model.name.clone().unwrap_or_default(),
        };

        let (connection, diagnostics) =
            add_connection(client, &credentials, destination, &model.collector()?).await?;

        model.uuid = Some(connection.warehouse_uuid);
        model.credentials.connection_uuid = Some(connection.connection_uuid);
        model.credentials.updated_at = Some(connection.created_on);
        model.deletion_protection.get_or_insert(true);
        info!(resource_type = TYPE_NAME, uuid = ?model.uuid, "Warehouse created");

        Ok(Applied::new(to_state(&model)?).with_diagnostics(diagnostics))
    }

    async fn read(
        &self,
        client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<ReadResult, ProviderError> {
        let mut model: Model = from_state(state)?;
        let warehouse = required_uuid(model.uuid.as_deref(), "uuid")?;
        let collector = model.collector_uuid.clone().unwrap_or_default();

        let lookup = lookup_warehouse(
            client,
            &warehouse,
            &collector,
            model.credentials.connection_uuid.as_deref(),
            BQ_CONNECTION_TYPE_RESPONSE,
        )
        .await?;

        let (name, connection) = match lookup {
            WarehouseLookup::Gone(reason) => return Ok(ReadResult::gone(reason)),
            WarehouseLookup::Found { name, connection } => (name, connection),
        };

        let recorded = model.credentials.clone();
        model.credentials = match connection {
            Some(found) => {
                let mut key = recorded.service_account_key;
                if key.is_some() && recorded.updated_at.as_deref() != Some(found.updated_at.as_str()) {
                    key = Some(UNKNOWN_EXTERNAL_VALUE.to_string());
                }
                Credentials {
                    connection_uuid: Some(found.uuid),
                    service_account_key: key,
                    updated_at: Some(found.updated_at),
                }
            },
            None => Credentials::default(),
        };
        model.name = Some(name);

        Ok(ReadResult::found(to_state(&model)?))
    }

    async fn update(
        &self,
        client: &dyn MonteCarloClient,
        prior: Value,
        planned: Value,
    ) -> Result<Applied, ProviderError> {
        let prior: Model = from_state(prior)?;
        let mut model: Model = from_state(planned)?;
        let warehouse = required_uuid(model.uuid.as_deref(), "uuid")?;
        let credentials = model.connection_credentials()?;
        let mut diagnostics: Vec<Diagnostic> = Vec::new();

        let name = model.name.clone().unwrap_or_default();
        model.name = Some(rename_warehouse(client, &warehouse, &name).await?);

        match model.credentials.connection_uuid.clone() {
            None => {
                let (connection, found) = add_connection(
                    client,
                    &credentials,
                    Destination::Existing(warehouse),
                    &model.collector()?,
                )
                .await?;
                model.credentials.connection_uuid = Some(connection.connection_uuid);
                model.credentials.updated_at = Some(connection.created_on);
                diagnostics.extend(found);
            },
            Some(connection) if prior.credentials.service_account_key != model.credentials.service_account_key => {
                let rotated = rotate_credentials(
                    client,
                    &credentials,
                    &Uuid::new(connection)?,
                    credentials.default_rotation(),
                )
                .await?;
                model.credentials.updated_at = rotated.updated_at.or(model.credentials.updated_at);
                diagnostics.extend(rotated.diagnostics);
            },
            Some(_) => {},
        }

        info!(resource_type = TYPE_NAME, uuid = %warehouse_uuid(&model), "Warehouse updated");
        Ok(Applied::new(to_state(&model)?).with_diagnostics(diagnostics))
    }

    async fn delete(
        &self,
        client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let model: Model = from_state(state)?;
        if model.deletion_protection.unwrap_or(true) {
            return Err(ProviderError::DeletionProtected(DELETION_PROTECTED.to_string()));
        }

        let diagnostics =
            remove_connection(client, model.credentials.connection_uuid.as_deref()).await?;
        info!(resource_type = TYPE_NAME, uuid = %warehouse_uuid(&model), "Warehouse deleted");
        Ok(diagnostics)
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let parts = split_import_id(id, 3, IMPORT_FORMAT)?;
        to_state(&Model {
            uuid: Some(parts[0].to_string()),
            collector_uuid: Some(parts[2].to_string()),
            deletion_protection: Some(true),
            credentials: Credentials {
                connection_uuid: Some(parts[1].to_string()),
                ..Credentials::default()
            },
            ..Model::default()
        })
    }

    fn upgrade_state(&self, version: u64, state: Value) -> Result<Value, ProviderError> {
        match version {
            0 => self.upgrade_state(1, upgrade_v0(state)?),
            1 => self.upgrade_state(2, upgrade_v1(state)?),
            SCHEMA_VERSION => Ok(state),
            other => Err(ProviderError::FailedPrecondition(format!(
                "{} has no upgrade from schema version {}",
                TYPE_NAME, other
            ))),
        }
    }
}

fn warehouse_uuid(model: &Model) -> &str {
    model.uuid.as_deref().unwrap_or_default()
}

/// v0 named the collector `data_collector_uuid`.
fn upgrade_v0(state: Value) -> Result<Value, ProviderError> {
    let mut obj = into_object(state)?;
    if let Some(collector) = obj.remove("data_collector_uuid") {
        obj.insert("collector_uuid".to_string(), collector);
    }
    Ok(Value::Object(obj))
}

/// v1 kept connection and key at the top level and had no update timestamp.
fn upgrade_v1(state: Value) -> Result<Value, ProviderError> {
    let mut obj = into_object(state)?;
    let connection_uuid = obj.remove("connection_uuid").unwrap_or(Value::Null);
    let service_account_key = obj.remove("service_account_key").unwrap_or(Value::Null);
    obj.insert(
        "credentials".to_string(),
        json!({
            "connection_uuid": connection_uuid,
            "service_account_key": service_account_key,
            "updated_at": null,
        }),
    );
    Ok(Value::Object(obj))
}

fn into_object(state: Value) -> Result<serde_json::Map<String, Value>, ProviderError> {
    match state {
        Value::Object(obj) => Ok(obj),
        other => Err(ProviderError::InvalidRequest(format!(
            "{} state must be an object, got {}",
            TYPE_NAME, other
        ))),
    }
}
