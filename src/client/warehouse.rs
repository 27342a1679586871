//! Warehouse and connection operations.

use serde::{Deserialize, Serialize};

use super::{JsonString, Operation, Uuid};

/// Connection type submitted for BigQuery connections.
pub const BQ_CONNECTION_TYPE: &str = "bigquery";
/// Connection type reported by the API for BigQuery connections.
pub const BQ_CONNECTION_TYPE_RESPONSE: &str = "BIGQUERY";
/// Connection type submitted for transactional database connections.
pub const TRX_CONNECTION_TYPE: &str = "transactional-db";
/// Connection type reported by the API for transactional database connections.
pub const TRX_CONNECTION_TYPE_RESPONSE: &str = "TRANSACTIONAL_DB";

/// Raw document for `getWarehouse`. The warehouse may be null.
pub const GET_WAREHOUSE_QUERY: &str = "query getWarehouse($uuid: UUID) { getWarehouse(uuid: $uuid) { name,connections{uuid,type,createdOn,updatedOn},dataCollector{uuid} } }";

// =========================================================================
// Credential tests
// =========================================================================

/// `testBqCredentialsV2`
pub struct TestBqCredentialsV2;

/// Variables of [`TestBqCredentialsV2`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestBqCredentialsV2Variables {
    /// Always `save_credentials`.
    pub validation_name: String,
    /// Connection details.
    pub connection_details: BqConnectionDetails,
}

/// BigQuery connection details.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BqConnectionDetails {
    /// Base64 encoded service account key.
    pub service_json: String,
}

/// Data of [`TestBqCredentialsV2`].
#[derive(Debug, Clone, Deserialize)]
pub struct TestBqCredentialsV2Data {
    /// The result.
    #[serde(rename = "testBqCredentialsV2")]
    pub test_bq_credentials_v2: TestBqCredentialsV2Result,
}

/// Result of a BigQuery credential test.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestBqCredentialsV2Result {
    /// One-time key for the next attach call.
    #[serde(default)]
    pub key: Option<String>,
    /// Validation outcome.
    pub validation_result: BqValidationResult,
}

/// Validation outcome of a BigQuery credential test.
#[derive(Debug, Clone, Deserialize)]
pub struct BqValidationResult {
    /// Whether validation passed.
    pub success: bool,
    /// Non-fatal findings.
    #[serde(default)]
    pub warnings: Vec<BqTestDiagnostic>,
    /// Fatal findings.
    #[serde(default)]
    pub errors: Vec<BqTestDiagnostic>,
}

/// One BigQuery validation finding.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BqTestDiagnostic {
    /// Machine readable cause.
    #[serde(default)]
    pub cause: Option<String>,
    /// Message for humans.
    #[serde(default)]
    pub friendly_message: Option<String>,
    /// Suggested fix.
    #[serde(default)]
    pub resolution: Option<String>,
}

impl Operation for TestBqCredentialsV2 {
    const DOCUMENT: &'static str = "mutation testBqCredentialsV2($validationName: String!, $connectionDetails: BqConnectionDetails!) { testBqCredentialsV2(validationName: $validationName, connectionDetails: $connectionDetails) { key, validationResult { success, warnings { cause, friendlyMessage, resolution }, errors { cause, friendlyMessage, resolution } } } }";
    type Variables = TestBqCredentialsV2Variables;
    type Data = TestBqCredentialsV2Data;
}

/// `testDatabaseCredentials`
pub struct TestDatabaseCredentials;

/// Variables of [`TestDatabaseCredentials`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDatabaseCredentialsVariables {
    /// Always `transactional-db`.
    pub connection_type: String,
    /// Database name.
    pub db_name: String,
    /// Lower-cased engine name.
    pub db_type: String,
    /// Host name.
    pub host: String,
    /// Port.
    pub port: i64,
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
}

/// Data of [`TestDatabaseCredentials`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDatabaseCredentialsData {
    /// The result.
    pub test_database_credentials: TestDatabaseCredentialsResult,
}

/// Result of a database credential test.
#[derive(Debug, Clone, Deserialize)]
pub struct TestDatabaseCredentialsResult {
    /// One-time key for the next attach call.
    #[serde(default)]
    pub key: Option<String>,
    /// Whether validation passed.
    pub success: bool,
    /// Non-fatal findings.
    #[serde(default)]
    pub warnings: Vec<DatabaseTestDiagnostic>,
    /// Individual validation findings.
    #[serde(default)]
    pub validations: Vec<DatabaseTestDiagnostic>,
}

/// One database validation finding.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseTestDiagnostic {
    /// Message for humans.
    #[serde(default)]
    pub message: Option<String>,
    /// Finding category.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl Operation for TestDatabaseCredentials {
    const DOCUMENT: &'static str = "mutation testDatabaseCredentials($connectionType: String!, $dbName: String!, $dbType: String!, $host: String!, $port: Int!, $user: String!, $password: String!) { testDatabaseCredentials(connectionType: $connectionType, dbName: $dbName, dbType: $dbType, host: $host, port: $port, user: $user, password: $password) { key, success, warnings { message, type }, validations { message, type } } }";
    type Variables = TestDatabaseCredentialsVariables;
    type Data = TestDatabaseCredentialsData;
}

// =========================================================================
// Connections
// =========================================================================

/// `addConnection`
pub struct AddConnection;

/// Variables of [`AddConnection`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddConnectionVariables {
    /// Data collector the connection runs on.
    pub dc_id: Uuid,
    /// Existing warehouse, or null to create one.
    pub dw_id: Option<Uuid>,
    /// Key returned by the credential test.
    pub key: String,
    /// Jobs enabled on the connection.
    pub job_types: Vec<String>,
    /// Name of the new warehouse.
    pub name: Option<String>,
    /// Connection type.
    pub connection_type: String,
    /// Type of the new warehouse.
    pub create_warehouse_type: Option<String>,
}

/// Data of [`AddConnection`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddConnectionData {
    /// The result.
    pub add_connection: AddConnectionResult,
}

/// Result of [`AddConnection`].
#[derive(Debug, Clone, Deserialize)]
pub struct AddConnectionResult {
    /// The new connection.
    pub connection: AddedConnection,
}

/// A connection returned by [`AddConnection`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedConnection {
    /// Connection identifier.
    pub uuid: String,
    /// Creation timestamp.
    pub created_on: String,
    /// Update timestamp.
    #[serde(default)]
    pub updated_on: Option<String>,
    /// Owning warehouse.
    pub warehouse: WarehouseRef,
}

/// Reference to a warehouse.
#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseRef {
    /// Warehouse name.
    pub name: String,
    /// Warehouse identifier.
    pub uuid: String,
}

impl Operation for AddConnection {
    const DOCUMENT: &'static str = "mutation addConnection($dcId: UUID, $dwId: UUID, $key: String!, $jobTypes: [String!]!, $name: String, $connectionType: String!, $createWarehouseType: String) { addConnection(dcId: $dcId, dwId: $dwId, key: $key, jobTypes: $jobTypes, name: $name, connectionType: $connectionType, createWarehouseType: $createWarehouseType) { connection { uuid, createdOn, updatedOn, warehouse { name, uuid } } } }";
    type Variables = AddConnectionVariables;
    type Data = AddConnectionData;
}

/// `removeConnection`
pub struct RemoveConnection;

/// Variables of [`RemoveConnection`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveConnectionVariables {
    /// Connection to remove.
    pub connection_id: Uuid,
}

/// Data of [`RemoveConnection`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveConnectionData {
    /// The result.
    pub remove_connection: SuccessResult,
}

/// A `{ success }` result.
#[derive(Debug, Clone, Deserialize)]
pub struct SuccessResult {
    /// Whether the operation had an effect.
    pub success: bool,
}

impl Operation for RemoveConnection {
    const DOCUMENT: &'static str = "mutation removeConnection($connectionId: UUID!) { removeConnection(connectionId: $connectionId) { success } }";
    type Variables = RemoveConnectionVariables;
    type Data = RemoveConnectionData;
}

/// `setWarehouseName`
pub struct SetWarehouseName;

/// Variables of [`SetWarehouseName`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetWarehouseNameVariables {
    /// Warehouse to rename.
    pub dw_id: Uuid,
    /// New name.
    pub name: String,
}

/// Data of [`SetWarehouseName`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetWarehouseNameData {
    /// The result.
    pub set_warehouse_name: SetWarehouseNameResult,
}

/// Result of [`SetWarehouseName`].
#[derive(Debug, Clone, Deserialize)]
pub struct SetWarehouseNameResult {
    /// The renamed warehouse.
    pub warehouse: WarehouseRef,
}

impl Operation for SetWarehouseName {
    const DOCUMENT: &'static str = "mutation setWarehouseName($dwId: UUID!, $name: String!) { setWarehouseName(dwId: $dwId, name: $name) { warehouse { uuid, name } } }";
    type Variables = SetWarehouseNameVariables;
    type Data = SetWarehouseNameData;
}

/// `updateCredentials`
pub struct UpdateCredentials;

/// Variables of [`UpdateCredentials`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCredentialsVariables {
    /// New credential material.
    pub changes: JsonString,
    /// Connection to update.
    pub connection_id: Uuid,
    /// Replace the stored credentials instead of merging.
    pub should_replace: bool,
    /// Validate the credentials before storing them.
    pub should_validate: bool,
}

/// Data of [`UpdateCredentials`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCredentialsData {
    /// The result.
    pub update_credentials: UpdateCredentialsResult,
}

/// Result of a credential update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCredentialsResult {
    /// Whether the connection was updated.
    pub success: bool,
    /// New update timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Operation for UpdateCredentials {
    const DOCUMENT: &'static str = "mutation updateCredentials($changes: JSONString!, $connectionId: UUID!, $shouldReplace: Boolean!, $shouldValidate: Boolean!) { updateCredentials(changes: $changes, connectionId: $connectionId, shouldReplace: $shouldReplace, shouldValidate: $shouldValidate) { success, updatedAt } }";
    type Variables = UpdateCredentialsVariables;
    type Data = UpdateCredentialsData;
}

/// `updateCredentialsV2`
pub struct UpdateCredentialsV2;

/// Variables of [`UpdateCredentialsV2`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCredentialsV2Variables {
    /// Connection to update.
    pub connection_id: Uuid,
    /// Key returned by the credential test.
    pub temp_credentials_key: String,
}

/// Data of [`UpdateCredentialsV2`].
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCredentialsV2Data {
    /// The result.
    #[serde(rename = "updateCredentialsV2")]
    pub update_credentials_v2: UpdateCredentialsResult,
}

impl Operation for UpdateCredentialsV2 {
    const DOCUMENT: &'static str = "mutation updateCredentialsV2($connectionId: UUID!, $tempCredentialsKey: String!) { updateCredentialsV2(connectionId: $connectionId, tempCredentialsKey: $tempCredentialsKey) { success, updatedAt } }";
    type Variables = UpdateCredentialsV2Variables;
    type Data = UpdateCredentialsV2Data;
}

// =========================================================================
// Reads
// =========================================================================

/// Variables of [`GET_WAREHOUSE_QUERY`].
#[derive(Debug, Clone, Serialize)]
pub struct GetWarehouseVariables {
    /// Warehouse to fetch.
    pub uuid: Uuid,
}

/// Data of [`GET_WAREHOUSE_QUERY`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetWarehouseData {
    /// The warehouse, null when it does not exist.
    #[serde(default)]
    pub get_warehouse: Option<Warehouse>,
}

/// A warehouse and its connections.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    /// Warehouse name.
    pub name: String,
    /// Attached connections.
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Owning data collector.
    pub data_collector: DataCollectorRef,
}

/// A connection attached to a warehouse.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Connection identifier.
    pub uuid: String,
    /// Connection type as reported by the API.
    #[serde(rename = "type")]
    pub connection_type: String,
    /// Creation timestamp.
    pub created_on: String,
    /// Update timestamp.
    #[serde(default)]
    pub updated_on: Option<String>,
}

/// Reference to a data collector.
#[derive(Debug, Clone, Deserialize)]
pub struct DataCollectorRef {
    /// Collector identifier.
    pub uuid: String,
}

/// `getTables`
pub struct GetTables;

/// Variables of [`GetTables`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTablesVariables {
    /// Warehouse to list.
    pub dw_id: Uuid,
    /// Page size.
    pub first: i64,
    /// Cursor of the previous page.
    pub after: Option<String>,
    /// Include deleted tables.
    pub is_deleted: bool,
    /// Include excluded tables.
    pub is_excluded: bool,
}

/// Data of [`GetTables`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTablesData {
    /// The page.
    pub get_tables: TablesPage,
}

/// A page of tables.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablesPage {
    /// Tables on this page.
    #[serde(default)]
    pub edges: Vec<TableEdge>,
    /// Cursor information.
    pub page_info: PageInfo,
}

/// An edge of [`TablesPage`].
#[derive(Debug, Clone, Deserialize)]
pub struct TableEdge {
    /// The table.
    pub node: Table,
}

/// One table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Table MCON.
    pub mcon: String,
    /// Project (or database) name.
    pub project_name: String,
    /// Dataset (or schema) name.
    pub dataset: String,
    /// Table name.
    pub table_id: String,
    /// Owning warehouse.
    pub warehouse: TableWarehouse,
}

/// Warehouse of a [`Table`].
#[derive(Debug, Clone, Deserialize)]
pub struct TableWarehouse {
    /// Warehouse identifier.
    pub uuid: String,
    /// Owning account.
    pub account: AccountRef,
}

/// Reference to an account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountRef {
    /// Account identifier.
    pub uuid: String,
}

/// Relay style cursor information.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Cursor of the first item.
    #[serde(default)]
    pub start_cursor: Option<String>,
    /// Cursor of the last item.
    #[serde(default)]
    pub end_cursor: Option<String>,
    /// Whether another page follows.
    pub has_next_page: bool,
}

impl Operation for GetTables {
    const DOCUMENT: &'static str = "query getTables($dwId: UUID!, $first: Int!, $after: String, $isDeleted: Boolean!, $isExcluded: Boolean!) { getTables(dwId: $dwId, first: $first, after: $after, isDeleted: $isDeleted, isExcluded: $isExcluded) { edges { node { mcon, projectName, dataset, tableId, warehouse { uuid, account { uuid } } } }, pageInfo { startCursor, endCursor, hasNextPage } } }";
    type Variables = GetTablesVariables;
    type Data = GetTablesData;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::operation_name;
    use serde_json::json;

    #[test]
    fn test_operation_names() {
        assert_eq!(operation_name(TestBqCredentialsV2::DOCUMENT), Some("testBqCredentialsV2"));
        assert_eq!(operation_name(AddConnection::DOCUMENT), Some("addConnection"));
        assert_eq!(operation_name(GET_WAREHOUSE_QUERY), Some("getWarehouse"));
        assert_eq!(operation_name(UpdateCredentialsV2::DOCUMENT), Some("updateCredentialsV2"));
        assert_eq!(operation_name(GetTables::DOCUMENT), Some("getTables"));
    }

    #[test]
    fn test_add_connection_variables_keep_nulls() {
        let variables = AddConnectionVariables {
            dc_id: Uuid::new("dataCollector1").unwrap(),
            dw_id: None,
            key: "testKey".to_string(),
            job_types: vec!["metadata".to_string()],
            name: Some("name1".to_string()),
            connection_type: BQ_CONNECTION_TYPE.to_string(),
            create_warehouse_type: Some(BQ_CONNECTION_TYPE.to_string()),
        };
        let value = serde_json::to_value(variables).unwrap();
        assert_eq!(value["dcId"], "dataCollector1");
        assert!(value["dwId"].is_null());
        assert_eq!(value["createWarehouseType"], "bigquery");
    }

    #[test]
    fn test_get_warehouse_data_nullable() {
        let data: GetWarehouseData = serde_json::from_value(json!({"getWarehouse": null})).unwrap();
        assert!(data.get_warehouse.is_none());

        let data: GetWarehouseData = serde_json::from_value(json!({
            "getWarehouse": {
                "name": "name1",
                "connections": [{"uuid": "8cd5a", "type": "BIGQUERY", "createdOn": "2024-01-01", "updatedOn": null}],
                "dataCollector": {"uuid": "dataCollector1"}
            }
        }))
        .unwrap();
        let warehouse = data.get_warehouse.unwrap();
        assert_eq!(warehouse.connections[0].connection_type, "BIGQUERY");
        assert!(warehouse.connections[0].updated_on.is_none());
    }
}
