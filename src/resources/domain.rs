//! `montecarlo_domain`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{from_state, required_uuid, to_state, Resource};
use crate::client::domain::{
    CreateOrUpdateDomain, CreateOrUpdateDomainVariables, DeleteDomain, DeleteDomainVariables,
    GetDomainData, TagPair, GET_DOMAIN_QUERY,
};
use crate::client::{MonteCarloClient, MonteCarloClientExt, Uuid};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::types::{Applied, ReadResult};

const TYPE_NAME: &str = "montecarlo_domain";

/// A Monte Carlo domain, a named set of tables selected by MCON or tag.
pub struct Domain;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Model {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Option<Vec<TagPair>>,
    #[serde(default)]
    assignments: Option<Vec<String>>,
}

impl Model {
    fn variables(&self, uuid: Option<Uuid>) -> CreateOrUpdateDomainVariables {
        CreateOrUpdateDomainVariables {
            uuid,
            assignments: Some(self.assignments.clone().unwrap_or_default()),
            tags: Some(self.tags.clone().unwrap_or_default()),
            name: self.name.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Resource for Domain {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "uuid",
                Attribute::computed_string().with_description("Unique identifier of domain managed by this resource."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("The name of the Domain as it will be presented in Monte Carlo."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_default(json!("")),
            )
            .with_attribute(
                "assignments",
                Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::optional())
                    .with_description(
                        "Objects assigned to domain (in MCONs format: \
                         MCON++{account_uuid}++{resource_uuid}++{object_type}++{object_id}).",
                    )
                    .with_default(json!([])),
            )
            .with_block(
                "tags",
                NestedBlock::set(
                    Block::new()
                        .with_attribute("name", Attribute::required_string().with_description("Tag name"))
                        .with_attribute(
                            "value",
                            Attribute::optional_string()
                                .with_description("Tag value")
                                .with_default(json!("")),
                        ),
                )
                .with_description("Filter by tag key/value pairs for tables."),
            )
            .with_conflict("tags", "assignments")
    }

    async fn create(
        &self,
        client: &dyn MonteCarloClient,
        planned: Value,
    ) -> Result<Applied, ProviderError> {
        let mut model: Model = from_state(planned)?;
        let data = client
            .mutate::<CreateOrUpdateDomain>(model.variables(None))
            .await?;

        let domain = data.create_or_update_domain.domain;
        info!(resource_type = TYPE_NAME, uuid = %domain.uuid, "Domain created");
        model.uuid = Some(domain.uuid);
        model.description.get_or_insert_with(String::new);
        model.tags.get_or_insert_with(Vec::new);
        model.assignments.get_or_insert_with(Vec::new);
        Ok(Applied::new(to_state(&model)?))
    }

    async fn read(
        &self,
        client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<ReadResult, ProviderError> {
        let mut model: Model = from_state(state)?;
        let uuid = required_uuid(model.uuid.as_deref(), "uuid")?;

        let raw = client
            .exec_raw(GET_DOMAIN_QUERY, json!({ "uuid": uuid }))
            .await;
        let note = raw.error.as_ref().map(ToString::to_string);
        let data: GetDomainData = raw.decode("GetDomain")?;

        let Some(domain) = data.get_domain else {
            let reason = match note {
                Some(note) => format!("MC client 'GetDomain' query failed to find domain - {}", note),
                None => "MC client 'GetDomain' query failed to find domain".to_string(),
            };
            warn!(resource_type = TYPE_NAME, uuid = %uuid, "{}", reason);
            return Ok(ReadResult::gone(reason));
        };

        model.name = Some(domain.name);
        model.description = Some(domain.description.unwrap_or_default());
        model.tags = Some(domain.tags);
        model.assignments = Some(domain.assignments);
        Ok(ReadResult::found(to_state(&model)?))
    }

    async fn update(
        &self,
        client: &dyn MonteCarloClient,
        _prior: Value,
        planned: Value,
    ) -> Result<Applied, ProviderError> {
        let model: Model = from_state(planned)?;
        let uuid = required_uuid(model.uuid.as_deref(), "uuid")?;
        client
            .mutate::<CreateOrUpdateDomain>(model.variables(Some(uuid)))
            .await?;
        Ok(Applied::new(to_state(&model)?))
    }

    async fn delete(
        &self,
        client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let model: Model = from_state(state)?;
        let uuid = required_uuid(model.uuid.as_deref(), "uuid")?;
        let data = client
            .mutate::<DeleteDomain>(DeleteDomainVariables { uuid })
            .await?;

        let deleted = data.delete_domain.deleted;
        if deleted != 1 {
            return Ok(vec![Diagnostic::warning(format!(
                "MC client 'DeleteDomain' mutation - deleted = {}, expected result is 1 - more \
                 domains might have been deleted. This resource will continue with its deletion",
                deleted
            ))]);
        }
        Ok(Vec::new())
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        to_state(&Model {
            uuid: Some(id.to_string()),
            ..Model::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GraphqlResponse;
    use crate::plan::plan;
    use crate::testing::{assert_has_warnings, assert_plan_no_changes, MockClient};
    use crate::validation::validate;

    fn domain_response() -> GraphqlResponse {
        GraphqlResponse::data(json!({
            "createOrUpdateDomain": {"domain": {
                "uuid": "8bfc4",
                "name": "domain1",
                "description": "",
                "tags": [],
                "assignments": ["MCON++a++b++table++t1"]
            }}
        }))
    }

    #[test]
    fn test_tags_conflict_with_assignments() {
        let schema = Domain.schema();
        let config = json!({
            "name": "domain1",
            "assignments": ["MCON++a++b++table++t1"],
            "tags": [{"name": "owner"}]
        });
        let diagnostics = validate(&schema, &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid Attribute Combination");

        assert!(validate(&schema, &json!({"name": "domain1", "tags": [{"name": "owner"}]})).is_empty());
    }

    #[test]
    fn test_plan_applies_tag_value_default() {
        let result = plan(&Domain.schema(), None, json!({"name": "domain1", "tags": [{"name": "owner"}]}));
        assert_eq!(result.planned_state["tags"][0]["value"], "");
        assert_eq!(result.planned_state["description"], "");
        assert_eq!(result.planned_state["assignments"], json!([]));
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let client = MockClient::new()
            .on("createOrUpdateDomain", |vars| {
                assert!(vars["uuid"].is_null());
                assert_eq!(vars["name"], "domain1");
                assert_eq!(vars["tags"], json!([]));
                Ok(domain_response())
            })
            .on("getDomain", |vars| {
                assert_eq!(vars["uuid"], "8bfc4");
                Ok(GraphqlResponse::data(json!({
                    "getDomain": {
                        "uuid": "8bfc4",
                        "name": "domain1",
                        "description": "",
                        "tags": [],
                        "assignments": ["MCON++a++b++table++t1"],
                        "createdByEmail": "owner@example.com"
                    }
                })))
            });

        let planned = json!({
            "name": "domain1",
            "description": "",
            "tags": [],
            "assignments": ["MCON++a++b++table++t1"]
        });
        let applied = Domain.create(&client, planned).await.unwrap();
        assert_eq!(applied.state["uuid"], "8bfc4");

        let read = Domain.read(&client, applied.state.clone()).await.unwrap();
        let refreshed = read.state.unwrap();
        assert_eq!(refreshed, applied.state);
        assert_plan_no_changes(&plan(&Domain.schema(), Some(&refreshed), refreshed.clone()));
    }

    #[tokio::test]
    async fn test_read_missing_domain_drops_state() {
        let client = MockClient::new().on("getDomain", |_| {
            Ok(GraphqlResponse {
                data: Some(json!({"getDomain": null})),
                errors: GraphqlResponse::errors(["Domain not found"]).errors,
            })
        });

        let read = Domain.read(&client, json!({"uuid": "8bfc4"})).await.unwrap();
        assert!(read.is_gone());
        assert!(read.diagnostics[0].summary.contains("Domain not found"));
    }

    #[tokio::test]
    async fn test_update_sends_uuid() {
        let client = MockClient::new().on("createOrUpdateDomain", |vars| {
            assert_eq!(vars["uuid"], "8bfc4");
            assert_eq!(vars["description"], "changed");
            Ok(domain_response())
        });

        let state = json!({"uuid": "8bfc4", "name": "domain1", "description": "", "tags": [], "assignments": []});
        let mut planned = state.clone();
        planned["description"] = json!("changed");
        let applied = Domain.update(&client, state, planned).await.unwrap();
        assert_eq!(applied.state["description"], "changed");
    }

    #[tokio::test]
    async fn test_delete_unexpected_count_warns() {
        let client = MockClient::new().on("deleteDomain", |_| {
            Ok(GraphqlResponse::data(json!({"deleteDomain": {"deleted": 0}})))
        });

        let diagnostics = Domain.delete(&client, json!({"uuid": "8bfc4"})).await.unwrap();
        assert_has_warnings(&diagnostics);
        assert!(diagnostics[0].summary.contains("deleted = 0"));
    }

    #[test]
    fn test_import_sets_uuid() {
        assert_eq!(Domain.import("8bfc4").unwrap()["uuid"], "8bfc4");
    }
}
