//! `montecarlo_transactional_warehouse`
//!
//! A PostgreSQL, MySQL or SQL Server warehouse. Connection details are
//! tested before the connection is attached, and any finding of that test
//! aborts provisioning.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::connection::{
    lookup_warehouse, remove_connection, rename_warehouse, WarehouseLookup, DELETION_PROTECTED,
};
use super::{from_state, required_uuid, split_import_id, to_state, Resource, UNKNOWN_EXTERNAL_VALUE};
use crate::client::warehouse::TRX_CONNECTION_TYPE_RESPONSE;
use crate::client::{MonteCarloClient, Uuid};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema, Validator};
use crate::types::{Applied, ReadResult};
use crate::warehouse::{
    add_connection, rotate_credentials, ConnectionCredentials, DatabaseCredentials, Destination,
};

const TYPE_NAME: &str = "montecarlo_transactional_warehouse";
const IMPORT_FORMAT: &str = "<warehouse_uuid>,<connection_uuid>,<data_collector_uuid>";
const DB_TYPES: [&str; 3] = ["POSTGRES", "MYSQL", "SQL_SERVER"];

/// The transactional database warehouse resource.
pub struct TransactionalWarehouse;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Model {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    db_type: Option<String>,
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
    host: Option<String>,
    #[serde(default)]
    port: Option<i64>,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl Credentials {
    fn secrets(&self) -> (Option<&str>, Option<&str>) {
        (self.username.as_deref(), self.password.as_deref())
    }

    fn detached(&self) -> Self {
        Self {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            ..Self::default()
        }
    }
}

impl Model {
    fn connection_credentials(&self) -> Result<ConnectionCredentials, ProviderError> {
        let creds = &self.credentials;
        let field = |value: &Option<String>, name: &str| {
            value
                .clone()
                .ok_or_else(|| ProviderError::Validation(format!("credentials.{} must be set", name)))
        };
        let db = DatabaseCredentials {
            host: field(&creds.host, "host")?,
            port: creds.port.ok_or_else(|| {
                ProviderError::Validation("credentials.port must be set".to_string())
            })?,
            database: field(&creds.database, "database")?,
            username: field(&creds.username, "username")?,
            password: field(&creds.password, "password")?,
        };
        let db_type = self
            .db_type
            .as_deref()
            .ok_or_else(|| ProviderError::Validation("db_type must be set".to_string()))?;
        ConnectionCredentials::database(db_type, db)
    }

    fn collector(&self) -> Result<Uuid, ProviderError> {
        required_uuid(self.collector_uuid.as_deref(), "collector_uuid")
    }
}

#[async_trait]
impl Resource for TransactionalWarehouse {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "uuid",
                Attribute::computed_string()
                    .with_description("Unique identifier of warehouse managed by this resource."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("The name of the warehouse as it will be presented in Monte Carlo.")
                    .with_validator(Validator::length_at_least(1)),
            )
            .with_attribute(
                "db_type",
                Attribute::required_string()
                    .with_validator(Validator::one_of(DB_TYPES))
                    .with_force_new(),
            )
            .with_attribute(
                "collector_uuid",
                Attribute::required_string()
                    .with_description("Unique identifier of data collector this warehouse will be attached to.")
                    .with_force_new(),
            )
            .with_attribute(
                "deletion_protection",
                Attribute::optional_bool().with_default(json!(true)),
            )
            .with_block(
                "credentials",
                NestedBlock::required(
                    Block::new()
                        .with_attribute("connection_uuid", Attribute::computed_string())
                        .with_attribute(
                            "host",
                            Attribute::required_string()
                                .with_description("Database host")
                                .with_force_new(),
                        )
                        .with_attribute(
                            "port",
                            Attribute::new(AttributeType::Int64, AttributeFlags::required())
                                .with_description("Database port")
                                .with_force_new(),
                        )
                        .with_attribute(
                            "database",
                            Attribute::required_string()
                                .with_description("Database name")
                                .with_force_new(),
                        )
                        .with_attribute("username", Attribute::required_string().sensitive())
                        .with_attribute("password", Attribute::required_string().sensitive())
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
        info!(resource_type = TYPE_NAME, uuid = ?model.uuid, db_type = ?model.db_type, "Warehouse created");

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
            TRX_CONNECTION_TYPE_RESPONSE,
        )
        .await?;

        let (name, connection) = match lookup {
            WarehouseLookup::Gone(reason) => return Ok(ReadResult::gone(reason)),
            WarehouseLookup::Found { name, connection } => (name, connection),
        };

        model.credentials = match connection {
            Some(found) => {
                let mut credentials = model.credentials.clone();
                let drifted = credentials.updated_at.as_deref() != Some(found.updated_at.as_str());
                if drifted && credentials.password.is_some() {
                    credentials.password = Some(UNKNOWN_EXTERNAL_VALUE.to_string());
                }
                credentials.connection_uuid = Some(found.uuid);
                credentials.updated_at = Some(found.updated_at);
                credentials
            },
            None => model.credentials.detached(),
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
                    Destination::Existing(warehouse.clone()),
                    &model.collector()?,
                )
                .await?;
                model.credentials.connection_uuid = Some(connection.connection_uuid);
                model.credentials.updated_at = Some(connection.created_on);
                diagnostics.extend(found);
            },
            Some(connection) if prior.credentials.secrets() != model.credentials.secrets() => {
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

        info!(resource_type = TYPE_NAME, uuid = %warehouse, "Warehouse updated");
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
        info!(resource_type = TYPE_NAME, uuid = ?model.uuid, "Warehouse deleted");
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GraphqlResponse;
    use crate::plan::plan;
    use crate::testing::{
        assert_has_warnings, assert_plan_replaces, assert_plan_updates_in_place, MockClient,
    };
    use crate::validation::validate;

    fn planned() -> Value {
        json!({
            "name": "name1",
            "db_type": "POSTGRES",
            "collector_uuid": "dataCollector1",
            "deletion_protection": false,
            "credentials": {
                "host": "db.example.com",
                "port": 5432,
                "database": "analytics",
                "username": "monte",
                "password": "carlo"
            }
        })
    }

    fn state() -> Value {
        let mut state = planned();
        state["uuid"] = json!("8bfc4");
        state["credentials"]["connection_uuid"] = json!("8cd5a");
        state["credentials"]["updated_at"] = json!("2024-01-01T00:00:00Z");
        state
    }

    fn test_response(warnings: Value) -> GraphqlResponse {
        GraphqlResponse::data(json!({
            "testDatabaseCredentials": {
                "key": "testKey",
                "success": true,
                "warnings": warnings,
                "validations": []
            }
        }))
    }

    fn warehouse_response(updated_on: &str) -> GraphqlResponse {
        GraphqlResponse::data(json!({
            "getWarehouse": {
                "name": "name1",
                "connections": [{
                    "uuid": "8cd5a",
                    "type": "TRANSACTIONAL_DB",
                    "createdOn": "2024-01-01T00:00:00Z",
                    "updatedOn": updated_on
                }],
                "dataCollector": {"uuid": "dataCollector1"}
            }
        }))
    }

    #[test]
    fn test_schema_rejects_unknown_db_type() {
        let schema = TransactionalWarehouse.schema();
        assert!(validate(&schema, &planned()).is_empty());

        let mut config = planned();
        config["db_type"] = json!("ORACLE");
        let diagnostics = validate(&schema, &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("db_type"));
    }

    #[test]
    fn test_plan_host_change_replaces() {
        let schema = TransactionalWarehouse.schema();

        let mut config = planned();
        config["credentials"]["host"] = json!("other.example.com");
        assert_plan_replaces(&plan(&schema, Some(&state()), config));

        let mut config = planned();
        config["credentials"]["password"] = json!("rotated");
        let result = plan(&schema, Some(&state()), config);
        assert_plan_updates_in_place(&result);
        assert_eq!(result.planned_state["credentials"]["connection_uuid"], "8cd5a");
    }

    #[tokio::test]
    async fn test_create_attaches_connection() {
        let client = MockClient::new()
            .on("testDatabaseCredentials", |vars| {
                assert_eq!(vars["dbType"], "postgres");
                assert_eq!(vars["user"], "monte");
                Ok(test_response(json!([])))
            })
            .on("addConnection", |vars| {
                assert_eq!(vars["connectionType"], "transactional-db");
                assert_eq!(vars["createWarehouseType"], "transactional-db");
                assert_eq!(vars["jobTypes"], json!(["metadata", "sql_query"]));
                Ok(GraphqlResponse::data(json!({
                    "addConnection": {"connection": {
                        "uuid": "8cd5a",
                        "createdOn": "2024-01-01T00:00:00Z",
                        "warehouse": {"name": "name1", "uuid": "8bfc4"}
                    }}
                })))
            });

        let applied = TransactionalWarehouse.create(&client, planned()).await.unwrap();
        assert_eq!(applied.state, state());
        assert!(applied.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_create_aborts_on_warning() {
        let client = MockClient::new().on("testDatabaseCredentials", |_| {
            Ok(test_response(json!([{"message": "no SSL", "type": "ssl"}])))
        });

        let err = TransactionalWarehouse.create(&client, planned()).await.unwrap_err();
        assert!(matches!(err, ProviderError::CredentialValidation(_)));
        assert_eq!(client.call_count("addConnection"), 0);
    }

    #[tokio::test]
    async fn test_read_round_trip_keeps_secrets() {
        let client = MockClient::new()
            .on("getWarehouse", |_| Ok(warehouse_response("2024-01-01T00:00:00Z")));

        let read = TransactionalWarehouse.read(&client, state()).await.unwrap();
        assert_eq!(read.state, Some(state()));
    }

    #[tokio::test]
    async fn test_read_marks_rotated_password_unknown() {
        let client = MockClient::new()
            .on("getWarehouse", |_| Ok(warehouse_response("2024-09-09T00:00:00Z")));

        let state = TransactionalWarehouse.read(&client, state()).await.unwrap().state.unwrap();
        assert_eq!(state["credentials"]["password"], UNKNOWN_EXTERNAL_VALUE);
        assert_eq!(state["credentials"]["username"], "monte");
        assert_eq!(state["credentials"]["updated_at"], "2024-09-09T00:00:00Z");
    }

    #[tokio::test]
    async fn test_read_clears_detached_connection() {
        let client = MockClient::new().on("getWarehouse", |_| {
            Ok(GraphqlResponse::data(json!({
                "getWarehouse": {
                    "name": "name1",
                    "connections": [],
                    "dataCollector": {"uuid": "dataCollector1"}
                }
            })))
        });

        let state = TransactionalWarehouse.read(&client, state()).await.unwrap().state.unwrap();
        assert!(state["credentials"]["connection_uuid"].is_null());
        assert!(state["credentials"]["password"].is_null());
        assert_eq!(state["credentials"]["host"], "db.example.com");
    }

    #[tokio::test]
    async fn test_read_rejects_bigquery_connection() {
        let client = MockClient::new().on("getWarehouse", |_| {
            Ok(GraphqlResponse::data(json!({
                "getWarehouse": {
                    "name": "name1",
                    "connections": [{"uuid": "8cd5a", "type": "BIGQUERY", "createdOn": "2024-01-01"}],
                    "dataCollector": {"uuid": "dataCollector1"}
                }
            })))
        });

        let err = TransactionalWarehouse.read(&client, state()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Inconsistent(_)));
        assert!(err.into_diagnostics()[0].detail.is_some());
    }

    #[tokio::test]
    async fn test_update_rotates_with_temporary_key() {
        let client = MockClient::new()
            .on("setWarehouseName", |_| {
                Ok(GraphqlResponse::data(json!({
                    "setWarehouseName": {"warehouse": {"uuid": "8bfc4", "name": "name1"}}
                })))
            })
            .on("testDatabaseCredentials", |vars| {
                assert_eq!(vars["password"], "rotated");
                Ok(test_response(json!([])))
            })
            .on("updateCredentialsV2", |vars| {
                assert_eq!(vars["connectionId"], "8cd5a");
                assert_eq!(vars["tempCredentialsKey"], "testKey");
                Ok(GraphqlResponse::data(json!({
                    "updateCredentialsV2": {"success": true, "updatedAt": "2024-02-02T00:00:00Z"}
                })))
            });

        let mut planned = state();
        planned["credentials"]["password"] = json!("rotated");
        let applied = TransactionalWarehouse.update(&client, state(), planned).await.unwrap();

        assert_eq!(applied.state["credentials"]["updated_at"], "2024-02-02T00:00:00Z");
        assert_eq!(client.call_count("updateCredentials"), 0);
        assert_eq!(client.call_count("updateCredentialsV2"), 1);
    }

    #[tokio::test]
    async fn test_update_with_unchanged_secrets_only_renames() {
        let client = MockClient::new().on("setWarehouseName", |_| {
            Ok(GraphqlResponse::data(json!({
                "setWarehouseName": {"warehouse": {"uuid": "8bfc4", "name": "name2"}}
            })))
        });

        let mut planned = state();
        planned["name"] = json!("name2");
        let applied = TransactionalWarehouse.update(&client, state(), planned).await.unwrap();
        assert_eq!(applied.state["name"], "name2");
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_connection() {
        let client = MockClient::new().on("removeConnection", |vars| {
            assert_eq!(vars["connectionId"], "8cd5a");
            Ok(GraphqlResponse::data(json!({"removeConnection": {"success": true}})))
        });

        let diagnostics = TransactionalWarehouse.delete(&client, state()).await.unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(client.call_count("removeConnection"), 1);
    }

    #[tokio::test]
    async fn test_delete_protected_makes_no_calls() {
        let client = MockClient::new();
        let mut state = state();
        state["deletion_protection"] = json!(true);

        let err = TransactionalWarehouse.delete(&client, state).await.unwrap_err();
        assert!(matches!(err, ProviderError::DeletionProtected(_)));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_protection_defaults_on() {
        let client = MockClient::new();
        let mut state = state();
        state.as_object_mut().unwrap().remove("deletion_protection");

        let err = TransactionalWarehouse.delete(&client, state).await.unwrap_err();
        assert!(matches!(err, ProviderError::DeletionProtected(_)));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_already_removed_connection_warns() {
        let client = MockClient::new().on("removeConnection", |vars| {
            assert_eq!(vars["connectionId"], "8cd5a");
            Ok(GraphqlResponse::data(json!({"removeConnection": {"success": false}})))
        });

        let diagnostics = TransactionalWarehouse.delete(&client, state()).await.unwrap();
        assert_has_warnings(&diagnostics);
        assert_eq!(client.call_count("removeConnection"), 1);
    }

    #[tokio::test]
    async fn test_delete_without_connection_warns() {
        let client = MockClient::new();
        let mut state = state();
        state["credentials"]["connection_uuid"] = Value::Null;

        let diagnostics = TransactionalWarehouse.delete(&client, state).await.unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_import() {
        let state = TransactionalWarehouse.import("8bfc4,8cd5a,dataCollector1").unwrap();
        assert_eq!(state["credentials"]["connection_uuid"], "8cd5a");
        assert_eq!(state["collector_uuid"], "dataCollector1");

        let err = TransactionalWarehouse.import("8bfc4").unwrap_err();
        assert!(err.to_string().contains(IMPORT_FORMAT));
    }
}
