//! Lifecycle steps shared by the warehouse resources.

use serde_json::json;
use tracing::warn;

use crate::client::warehouse::{
    GetWarehouseData, RemoveConnection, RemoveConnectionVariables, SetWarehouseName,
    SetWarehouseNameVariables, GET_WAREHOUSE_QUERY,
};
use crate::client::{MonteCarloClient, MonteCarloClientExt, Uuid};
use crate::error::ProviderError;
use crate::schema::Diagnostic;

pub(crate) const DELETION_PROTECTED: &str = "Failed to delete warehouse because deletion_protection is set to true. \
     Set it to false to proceed with warehouse deletion";

/// What a read found for a recorded warehouse and connection.
#[derive(Debug)]
pub(crate) enum WarehouseLookup {
    /// The warehouse must be dropped from state; the reason is a warning.
    Gone(String),
    /// The warehouse exists.
    Found {
        /// Current warehouse name.
        name: String,
        /// The recorded connection, if it is still attached.
        connection: Option<FoundConnection>,
    },
}

/// A recorded connection that is still attached.
#[derive(Debug)]
pub(crate) struct FoundConnection {
    /// Connection identifier.
    pub uuid: String,
    /// `updatedOn`, or `createdOn` when the connection was never updated.
    pub updated_at: String,
}

/// Look up a warehouse and the recorded connection on it.
///
/// A connection with an unexpected type is an error: the remote object no
/// longer matches what this resource manages.
pub(crate) async fn lookup_warehouse(
    client: &dyn MonteCarloClient,
    warehouse: &Uuid,
    collector: &str,
    connection: Option<&str>,
    expected_type: &str,
) -> Result<WarehouseLookup, ProviderError> {
    let raw = client
        .exec_raw(GET_WAREHOUSE_QUERY, json!({ "uuid": warehouse }))
        .await;
    let note = raw.error.as_ref().map(ToString::to_string);
    let data: GetWarehouseData = raw.decode("GetWarehouse")?;

    let Some(remote) = data.get_warehouse else {
        let mut reason = format!(
            "MC client 'GetWarehouse' query failed to find warehouse [uuid: {}]. \
             This resource will be removed from the state without deletion.",
            warehouse
        );
        if let Some(note) = note {
            reason = format!("{} - {}", reason, note);
        }
        return Ok(WarehouseLookup::Gone(reason));
    };

    if remote.data_collector.uuid != collector {
        return Ok(WarehouseLookup::Gone(format!(
            "Obtained warehouse with [uuid: {}] but its Data Collector UUID does not match with \
             configured value [obtained: {}, configured: {}]. Warehouse might have been moved to \
             other Data Collector externally. This resource will be removed from the state \
             without deletion.",
            warehouse, remote.data_collector.uuid, collector
        )));
    }

    let mut found = None;
    if let Some(recorded) = connection {
        if let Some(remote_connection) = remote.connections.iter().find(|c| c.uuid == recorded) {
            if remote_connection.connection_type != expected_type {
                return Err(ProviderError::Inconsistent(format!(
                    "Obtained Warehouse [uuid: {}, connection_uuid: {}] but got unexpected \
                     connection type '{}'.",
                    warehouse, remote_connection.uuid, remote_connection.connection_type
                )));
            }
            let updated_at = remote_connection
                .updated_on
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| remote_connection.created_on.clone());
            found = Some(FoundConnection {
                uuid: remote_connection.uuid.clone(),
                updated_at,
            });
        }
    }

    Ok(WarehouseLookup::Found {
        name: remote.name,
        connection: found,
    })
}

/// Rename a warehouse, returning the name the API stored.
pub(crate) async fn rename_warehouse(
    client: &dyn MonteCarloClient,
    warehouse: &Uuid,
    name: &str,
) -> Result<String, ProviderError> {
    let data = client
        .mutate::<SetWarehouseName>(SetWarehouseNameVariables {
            dw_id: warehouse.clone(),
            name: name.to_string(),
        })
        .await?;
    Ok(data.set_warehouse_name.warehouse.name)
}

/// Remove the connection of a warehouse being deleted.
///
/// A connection that is already gone is reported as a warning.
pub(crate) async fn remove_connection(
    client: &dyn MonteCarloClient,
    connection: Option<&str>,
) -> Result<Vec<Diagnostic>, ProviderError> {
    let Some(connection) = connection.filter(|c| !c.is_empty()) else {
        warn!("Warehouse has no recorded connection, nothing to remove");
        return Ok(vec![Diagnostic::warning(
            "Warehouse has no recorded connection. This resource will continue with its deletion",
        )]);
    };

    let data = client
        .mutate::<RemoveConnection>(RemoveConnectionVariables {
            connection_id: Uuid::new(connection)?,
        })
        .await?;

    if data.remove_connection.success {
        Ok(Vec::new())
    } else {
        warn!(connection_uuid = connection, "Connection was already removed");
        Ok(vec![Diagnostic::warning(
            "MC client 'RemoveConnection' mutation - success = false, connection probably \
             already doesn't exists. This resource will continue with its deletion",
        )])
    }
}
