//! `montecarlo_iam_group`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{from_state, to_state, Resource};
use crate::client::authorization::{
    AuthorizationGroup, CreateOrUpdateAuthorizationGroup, CreateOrUpdateAuthorizationGroupVariables,
    DeleteAuthorizationGroup, DeleteAuthorizationGroupVariables, GetAuthorizationGroups, NoVariables,
};
use crate::client::{MonteCarloClient, MonteCarloClientExt, Uuid};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema, Validator};
use crate::types::{Applied, ReadResult};

const TYPE_NAME: &str = "montecarlo_iam_group";

/// Roles a group can be granted.
pub const ROLES: [&str; 7] = [
    "mcd/owner",
    "mcd/domains-manager",
    "mcd/responder",
    "mcd/editor",
    "mcd/viewer",
    "mcd/asset-viewer",
    "mcd/asset-editor",
];

/// An authorization group with one role, optionally restricted to domains.
pub struct IamGroup;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Model {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    domains: Option<Vec<String>>,
    #[serde(default)]
    sso_group: Option<String>,
}

impl Model {
    fn name(&self) -> Result<&str, ProviderError> {
        self.name
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidRequest("'name' is not set".to_string()))
    }

    fn variables(&self) -> Result<CreateOrUpdateAuthorizationGroupVariables, ProviderError> {
        let name = self.name()?.to_string();
        let domain_restriction_ids = self
            .domains
            .iter()
            .flatten()
            .map(Uuid::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CreateOrUpdateAuthorizationGroupVariables {
            label: name.clone(),
            name,
            description: self.description.clone().unwrap_or_default(),
            roles: self.role.iter().cloned().collect(),
            domain_restriction_ids,
            sso_group: self.sso_group.clone(),
        })
    }

    fn refresh(&mut self, group: AuthorizationGroup) {
        self.label = group.label.or_else(|| self.name.clone());
        self.description = Some(group.description.unwrap_or_default());
        if let Some(role) = group.roles.into_iter().next() {
            self.role = Some(role.name);
        }
        self.domains = Some(group.domain_restrictions.into_iter().map(|d| d.uuid).collect());
        self.sso_group = group.sso_group;
    }
}

#[async_trait]
impl Resource for IamGroup {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("label", Attribute::computed_string())
            .with_attribute(
                "description",
                Attribute::optional_string().with_default(json!("")),
            )
            .with_attribute(
                "role",
                Attribute::required_string().with_validator(Validator::one_of(ROLES)),
            )
            .with_attribute(
                "domains",
                Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::optional())
                    .with_description("Domains the group is restricted to.")
                    .with_default(json!([])),
            )
            .with_attribute("sso_group", Attribute::optional_string())
    }

    async fn create(
        &self,
        client: &dyn MonteCarloClient,
        planned: Value,
    ) -> Result<Applied, ProviderError> {
        let mut model: Model = from_state(planned)?;
        client
            .mutate::<CreateOrUpdateAuthorizationGroup>(model.variables()?)
            .await?;

        model.label = model.name.clone();
        model.description.get_or_insert_with(String::new);
        model.domains.get_or_insert_with(Vec::new);
        info!(resource_type = TYPE_NAME, name = ?model.name, "Group created");
        Ok(Applied::new(to_state(&model)?))
    }

    async fn read(
        &self,
        client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<ReadResult, ProviderError> {
        let mut model: Model = from_state(state)?;
        let data = client.query::<GetAuthorizationGroups>(NoVariables {}).await?;

        let name = model.name()?.to_string();
        let found = data
            .get_authorization_groups
            .into_iter()
            .find(|group| !group.is_managed && group.name == name);

        match found {
            Some(group) => {
                model.refresh(group);
                Ok(ReadResult::found(to_state(&model)?))
            },
            None => Ok(ReadResult::gone(format!(
                "MC client 'GetAuthorizationGroups' query failed to find group [name: {}]. \
                 This resource will be removed from the state without deletion.",
                name
            ))),
        }
    }

    async fn update(
        &self,
        client: &dyn MonteCarloClient,
        _prior: Value,
        planned: Value,
    ) -> Result<Applied, ProviderError> {
        let mut model: Model = from_state(planned)?;
        client
            .mutate::<CreateOrUpdateAuthorizationGroup>(model.variables()?)
            .await?;
        model.label = model.name.clone();
        Ok(Applied::new(to_state(&model)?))
    }

    async fn delete(
        &self,
        client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let model: Model = from_state(state)?;
        let data = client
            .mutate::<DeleteAuthorizationGroup>(DeleteAuthorizationGroupVariables {
                name: model.name()?.to_string(),
            })
            .await?;

        let deleted = data.delete_authorization_group.deleted;
        if deleted != 1 {
            return Ok(vec![Diagnostic::warning(format!(
                "MC client 'DeleteAuthorizationGroup' mutation - deleted = {}, expected result \
                 is 1 - more groups might have been deleted. This resource will continue with \
                 its deletion",
                deleted
            ))]);
        }
        Ok(Vec::new())
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        to_state(&Model {
            name: Some(id.to_string()),
            ..Model::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GraphqlResponse;
    use crate::testing::{assert_has_warnings, MockClient};
    use crate::validation::validate;

    fn group(name: &str, is_managed: bool) -> Value {
        json!({
            "name": name,
            "label": name,
            "description": "",
            "isManaged": is_managed,
            "roles": [{"name": "mcd/editor"}],
            "domainRestrictions": [{"uuid": "d1"}],
            "ssoGroup": null,
            "users": []
        })
    }

    fn state() -> Value {
        json!({
            "name": "group1",
            "label": "group1",
            "description": "",
            "role": "mcd/viewer",
            "domains": [],
            "sso_group": null
        })
    }

    #[test]
    fn test_role_is_validated() {
        let schema = IamGroup.schema();
        assert!(validate(&schema, &json!({"name": "group1", "role": "mcd/owner"})).is_empty());
        assert_eq!(
            validate(&schema, &json!({"name": "group1", "role": "admin"}))[0].attribute.as_deref(),
            Some("role")
        );
    }

    #[tokio::test]
    async fn test_create_sends_single_role() {
        let client = MockClient::new().on("createOrUpdateAuthorizationGroup", |vars| {
            assert_eq!(vars["label"], "group1");
            assert_eq!(vars["roles"], json!(["mcd/viewer"]));
            assert_eq!(vars["domainRestrictionIds"], json!(["d1"]));
            assert!(vars["ssoGroup"].is_null());
            Ok(GraphqlResponse::data(json!({
                "createOrUpdateAuthorizationGroup": {"authorizationGroup": group("group1", false)}
            })))
        });

        let planned = json!({"name": "group1", "role": "mcd/viewer", "domains": ["d1"]});
        let applied = IamGroup.create(&client, planned).await.unwrap();
        assert_eq!(applied.state["label"], "group1");
        assert_eq!(applied.state["description"], "");
    }

    #[tokio::test]
    async fn test_read_ignores_managed_groups() {
        let client = MockClient::new().on("getAuthorizationGroups", |_| {
            Ok(GraphqlResponse::data(json!({
                "getAuthorizationGroups": [group("group1", true), group("group2", false)]
            })))
        });

        let read = IamGroup.read(&client, state()).await.unwrap();
        assert!(read.is_gone());
        assert_has_warnings(&read.diagnostics);
        assert!(read.diagnostics[0].summary.contains("group1"));
    }

    #[tokio::test]
    async fn test_read_refreshes_role_and_domains() {
        let client = MockClient::new().on("getAuthorizationGroups", |_| {
            Ok(GraphqlResponse::data(json!({
                "getAuthorizationGroups": [group("group1", false)]
            })))
        });

        let state = IamGroup.read(&client, state()).await.unwrap().state.unwrap();
        assert_eq!(state["role"], "mcd/editor");
        assert_eq!(state["domains"], json!(["d1"]));
    }

    #[tokio::test]
    async fn test_delete_by_name() {
        let client = MockClient::new().on("deleteAuthorizationGroup", |vars| {
            assert_eq!(vars["name"], "group1");
            Ok(GraphqlResponse::data(json!({"deleteAuthorizationGroup": {"deleted": 1}})))
        });

        assert!(IamGroup.delete(&client, state()).await.unwrap().is_empty());
    }

    #[test]
    fn test_import_by_name() {
        assert_eq!(IamGroup.import("group1").unwrap()["name"], "group1");
    }
}
