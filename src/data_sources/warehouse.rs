//! `montecarlo_warehouse`
//!
//! Every table of a warehouse, grouped by project and dataset. Tables are
//! fetched page by page with a cursor; each page costs exactly one call.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::client::warehouse::{GetTables, GetTablesVariables, Table};
use crate::client::{Mcon, MonteCarloClient, MonteCarloClientExt};
use crate::error::ProviderError;
use crate::resources::{from_state, required_uuid, to_state};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

const TYPE_NAME: &str = "montecarlo_warehouse";
const PAGE_SIZE: i64 = 500;

/// The warehouse data source.
pub struct Warehouse;

#[derive(Debug, Default, Deserialize)]
struct Config {
    #[serde(default)]
    uuid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
struct WarehouseView {
    uuid: String,
    projects: BTreeMap<String, Project>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Project {
    mcon: Mcon,
    datasets: BTreeMap<String, Dataset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Dataset {
    mcon: Mcon,
    tables: BTreeMap<String, TableView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct TableView {
    mcon: Mcon,
}

impl WarehouseView {
    fn insert(&mut self, table: Table) {
        let account = &table.warehouse.account.uuid;
        let warehouse = &table.warehouse.uuid;

        let project = self
            .projects
            .entry(table.project_name.clone())
            .or_insert_with(|| Project {
                mcon: Mcon::project(account, warehouse, &table.project_name),
                datasets: BTreeMap::new(),
            });
        let dataset = project
            .datasets
            .entry(table.dataset.clone())
            .or_insert_with(|| Dataset {
                mcon: Mcon::dataset(account, warehouse, &table.project_name, &table.dataset),
                tables: BTreeMap::new(),
            });
        dataset.tables.insert(
            table.table_id,
            TableView {
                mcon: Mcon::from_raw(table.mcon),
            },
        );
    }
}

fn mcon_object() -> AttributeType {
    AttributeType::Object([("mcon".to_string(), AttributeType::String)].into())
}

#[async_trait]
impl DataSource for Warehouse {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        let tables = AttributeType::map(mcon_object());
        let datasets = AttributeType::map(AttributeType::Object(
            [
                ("mcon".to_string(), AttributeType::String),
                ("tables".to_string(), tables),
            ]
            .into(),
        ));
        let projects = AttributeType::map(AttributeType::Object(
            [
                ("mcon".to_string(), AttributeType::String),
                ("datasets".to_string(), datasets),
            ]
            .into(),
        ));

        Schema::v0()
            .with_attribute(
                "uuid",
                Attribute::required_string().with_description("Warehouse to list."),
            )
            .with_attribute(
                "projects",
                Attribute::new(projects, AttributeFlags::computed())
                    .with_description("Projects of the warehouse keyed by name."),
            )
    }

    async fn read(&self, client: &dyn MonteCarloClient, config: Value) -> Result<Value, ProviderError> {
        let config: Config = from_state(config)?;
        let dw_id = required_uuid(config.uuid.as_deref(), "uuid")?;

        let mut view = WarehouseView {
            uuid: dw_id.to_string(),
            ..WarehouseView::default()
        };
        let mut after = None;
        let mut pages = 0usize;

        loop {
            let data = client
                .query::<GetTables>(GetTablesVariables {
                    dw_id: dw_id.clone(),
                    first: PAGE_SIZE,
                    after: after.take(),
                    is_deleted: false,
                    is_excluded: false,
                })
                .await?;
            pages += 1;

            let page = data.get_tables;
            for edge in page.edges {
                view.insert(edge.node);
            }
            if !page.page_info.has_next_page {
                break;
            }
            match page.page_info.end_cursor {
                Some(cursor) => after = Some(cursor),
                None => {
                    return Err(ProviderError::Api(format!(
                        "getTables page {} reported more tables without an end cursor",
                        pages
                    )));
                }
            }
        }

        debug!(warehouse = %dw_id, pages, projects = view.projects.len(), "Warehouse tables listed");
        to_state(&view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GraphqlResponse;
    use crate::testing::MockClient;
    use crate::validation::validate;
    use serde_json::json;

    fn table(project: &str, dataset: &str, table: &str) -> Value {
        json!({"node": {
            "mcon": format!("MCON++acct++dw1++table++{}:{}.{}", project, dataset, table),
            "projectName": project,
            "dataset": dataset,
            "tableId": table,
            "warehouse": {"uuid": "dw1", "account": {"uuid": "acct"}}
        }})
    }

    fn page(edges: Vec<Value>, end_cursor: Option<&str>, has_next_page: bool) -> GraphqlResponse {
        GraphqlResponse::data(json!({
            "getTables": {
                "edges": edges,
                "pageInfo": {"endCursor": end_cursor, "hasNextPage": has_next_page}
            }
        }))
    }

    #[test]
    fn test_schema_requires_uuid() {
        let schema = Warehouse.schema();
        assert!(validate(&schema, &json!({"uuid": "dw1"})).is_empty());
        assert_eq!(validate(&schema, &json!({})).len(), 1);
    }

    #[tokio::test]
    async fn test_read_follows_cursor_once_per_page() {
        let client = MockClient::new().on("getTables", |vars| {
            assert_eq!(vars["dwId"], "dw1");
            assert_eq!(vars["first"], 500);
            assert_eq!(vars["isDeleted"], false);
            assert_eq!(vars["isExcluded"], false);
            match vars["after"].as_str() {
                None => Ok(page(
                    vec![table("p1", "d1", "t1"), table("p1", "d1", "t2")],
                    Some("c1"),
                    true,
                )),
                Some("c1") => Ok(page(vec![table("p1", "d2", "t1")], Some("c2"), true)),
                Some("c2") => Ok(page(vec![table("p2", "d1", "t1")], None, false)),
                Some(other) => panic!("unexpected cursor {other}"),
            }
        });

        let state = Warehouse.read(&client, json!({"uuid": "dw1"})).await.unwrap();

        assert_eq!(client.call_count("getTables"), 3);
        let projects = state["projects"].as_object().unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(state["projects"]["p1"]["mcon"], "MCON++acct++dw1++project++p1");
        assert_eq!(
            state["projects"]["p1"]["datasets"]["d2"]["mcon"],
            "MCON++acct++dw1++dataset++p1:d2"
        );
        let d1 = state["projects"]["p1"]["datasets"]["d1"]["tables"].as_object().unwrap();
        assert_eq!(d1.len(), 2);
        assert_eq!(
            state["projects"]["p2"]["datasets"]["d1"]["tables"]["t1"]["mcon"],
            "MCON++acct++dw1++table++p2:d1.t1"
        );
    }

    #[tokio::test]
    async fn test_read_empty_warehouse() {
        let client = MockClient::new().on("getTables", |_| Ok(page(vec![], None, false)));

        let state = Warehouse.read(&client, json!({"uuid": "dw1"})).await.unwrap();
        assert_eq!(state, json!({"uuid": "dw1", "projects": {}}));
        assert_eq!(client.call_count("getTables"), 1);
    }

    #[tokio::test]
    async fn test_read_stops_on_missing_cursor() {
        let client = MockClient::new()
            .on("getTables", |_| Ok(page(vec![table("p1", "d1", "t1")], None, true)));

        let err = Warehouse.read(&client, json!({"uuid": "dw1"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api(_)));
        assert!(err.to_string().contains("end cursor"));
        assert_eq!(client.call_count("getTables"), 1);
    }

    #[tokio::test]
    async fn test_read_propagates_page_error() {
        let client = MockClient::new().on("getTables", |vars| {
            if vars["after"].is_null() {
                Ok(page(vec![table("p1", "d1", "t1")], Some("c1"), true))
            } else {
                Ok(GraphqlResponse::errors(["cursor expired"]))
            }
        });

        let err = Warehouse.read(&client, json!({"uuid": "dw1"})).await.unwrap_err();
        assert!(err.to_string().contains("cursor expired"));
        assert_eq!(client.call_count("getTables"), 2);
    }
}
