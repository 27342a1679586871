//! `montecarlo_iam_member`
//!
//! Membership of one user in one group. Monte Carlo only exposes the full
//! group list of a user, so every change rewrites that list.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{from_state, split_import_id, to_state, Resource};
use crate::client::authorization::{
    AuthorizationGroup, GetAuthorizationGroups, GetUsersInAccount, GetUsersInAccountVariables,
    NoVariables, UpdateUserAuthorizationGroupMembership,
    UpdateUserAuthorizationGroupMembershipVariables, User,
};
use crate::client::{MonteCarloClient, MonteCarloClientExt};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema, Validator};
use crate::types::{Applied, ReadResult};

const TYPE_NAME: &str = "montecarlo_iam_member";
const IMPORT_FORMAT: &str = "groups/<group_name>,user:<user_email>";

static GROUP_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^groups/(.+)$").unwrap());
static MEMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^user:(.+)$").unwrap());

/// A user's membership in an authorization group.
pub struct IamMember;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Model {
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    member: Option<String>,
    #[serde(default)]
    member_id: Option<String>,
}

impl Model {
    fn group_name(&self) -> Result<&str, ProviderError> {
        capture(&GROUP_PATTERN, self.group.as_deref(), "group")
    }

    fn email(&self) -> Result<&str, ProviderError> {
        capture(&MEMBER_PATTERN, self.member.as_deref(), "member")
    }

    fn group_label(&self) -> &str {
        self.group.as_deref().unwrap_or_default()
    }
}

fn capture<'a>(
    pattern: &Regex,
    value: Option<&'a str>,
    attribute: &str,
) -> Result<&'a str, ProviderError> {
    value
        .and_then(|v| pattern.captures(v))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            ProviderError::InvalidRequest(format!(
                "'{}' must match {}, got {:?}",
                attribute,
                pattern.as_str(),
                value.unwrap_or_default()
            ))
        })
}

async fn find_user(client: &dyn MonteCarloClient, email: &str) -> Result<Option<User>, ProviderError> {
    let data = client
        .query::<GetUsersInAccount>(GetUsersInAccountVariables {
            email: email.to_string(),
            first: 1,
            after: None,
        })
        .await?;
    Ok(data
        .get_users_in_account
        .edges
        .into_iter()
        .next()
        .map(|edge| edge.node))
}

/// The named group, unless it is missing or mapped onto an SSO group.
async fn find_group(
    client: &dyn MonteCarloClient,
    name: &str,
) -> Result<Option<AuthorizationGroup>, ProviderError> {
    let data = client.query::<GetAuthorizationGroups>(NoVariables {}).await?;
    Ok(data
        .get_authorization_groups
        .into_iter()
        .find(|group| !group.is_sso() && group.name == name))
}

async fn set_membership(
    client: &dyn MonteCarloClient,
    user: &User,
    group_names: Vec<String>,
) -> Result<(), ProviderError> {
    let data = client
        .mutate::<UpdateUserAuthorizationGroupMembership>(
            UpdateUserAuthorizationGroupMembershipVariables {
                member_user_id: user.cognito_user_id.clone(),
                group_names,
            },
        )
        .await?;
    let change = data.update_user_authorization_group_membership;
    info!(
        user = %user.email,
        added = change.added_to_groups.len(),
        removed = change.removed_from_groups.len(),
        "Group membership updated"
    );
    Ok(())
}

#[async_trait]
impl Resource for IamMember {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "group",
                Attribute::required_string()
                    .with_description("Group in the format groups/<group_name>.")
                    .with_validator(Validator::matches(
                        GROUP_PATTERN.as_str(),
                        "Expected value matching the pattern 'groups/<group_name>'",
                    ))
                    .with_force_new(),
            )
            .with_attribute(
                "member",
                Attribute::required_string()
                    .with_description("Member in the format user:<user_email>.")
                    .with_validator(Validator::matches(
                        MEMBER_PATTERN.as_str(),
                        "Expected value matching the pattern 'user:<user_email>'",
                    ))
                    .with_force_new(),
            )
            .with_attribute("member_id", Attribute::computed_string())
    }

    async fn create(
        &self,
        client: &dyn MonteCarloClient,
        planned: Value,
    ) -> Result<Applied, ProviderError> {
        let mut model: Model = from_state(planned)?;
        let email = model.email()?;

        let user = find_user(client, email)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("User {} not found", email)))?;
        let group = find_group(client, model.group_name()?).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("Group {} not found or is SSO managed", model.group_label()))
        })?;

        let mut groups = user.auth.groups.clone();
        if !groups.contains(&group.name) {
            groups.push(group.name);
        }
        set_membership(client, &user, groups).await?;

        model.member_id = Some(user.cognito_user_id);
        Ok(Applied::new(to_state(&model)?))
    }

    async fn read(
        &self,
        client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<ReadResult, ProviderError> {
        let mut model: Model = from_state(state)?;
        let email = model.email()?.to_string();

        let Some(user) = find_user(client, &email).await? else {
            return Ok(ReadResult::gone(format!("User {} not found", email)));
        };
        let Some(group) = find_group(client, model.group_name()?).await? else {
            return Ok(ReadResult::gone(format!(
                "Group {} not found or is SSO managed",
                model.group_label()
            )));
        };
        if !user.auth.groups.contains(&group.name) {
            return Ok(ReadResult::gone(format!(
                "User {} is not a member of group {}",
                email,
                model.group_label()
            )));
        }

        model.member_id = Some(user.cognito_user_id);
        Ok(ReadResult::found(to_state(&model)?))
    }

    async fn update(
        &self,
        _client: &dyn MonteCarloClient,
        _prior: Value,
        _planned: Value,
    ) -> Result<Applied, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "Resource '{}' does not support updates",
            TYPE_NAME
        )))
    }

    async fn delete(
        &self,
        client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let model: Model = from_state(state)?;
        let email = model.email()?;
        let group_name = model.group_name()?;

        let Some(user) = find_user(client, email).await? else {
            warn!(user = email, "Member already removed from the account");
            return Ok(vec![Diagnostic::warning(format!("User {} not found", email))]);
        };

        let groups = user
            .auth
            .groups
            .iter()
            .filter(|name| name.as_str() != group_name)
            .cloned()
            .collect();
        set_membership(client, &user, groups).await?;
        Ok(Vec::new())
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let parts = split_import_id(id, 2, IMPORT_FORMAT)?;
        to_state(&Model {
            group: Some(parts[0].to_string()),
            member: Some(parts[1].to_string()),
            member_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GraphqlResponse;
    use crate::testing::{assert_has_warnings, MockClient};
    use crate::validation::validate;
    use serde_json::json;

    fn state() -> Value {
        json!({"group": "groups/editors", "member": "user:jane@example.com", "member_id": "cognito1"})
    }

    fn users_response(groups: &[&str]) -> GraphqlResponse {
        GraphqlResponse::data(json!({
            "getUsersInAccount": {
                "edges": [{"node": {
                    "cognitoUserId": "cognito1",
                    "email": "jane@example.com",
                    "firstName": "Jane",
                    "lastName": "Doe",
                    "isSso": false,
                    "auth": {"groups": groups}
                }}],
                "pageInfo": {"hasNextPage": false}
            }
        }))
    }

    fn no_users() -> GraphqlResponse {
        GraphqlResponse::data(json!({
            "getUsersInAccount": {"edges": [], "pageInfo": {"hasNextPage": false}}
        }))
    }

    fn groups_response(sso_group: Option<&str>) -> GraphqlResponse {
        GraphqlResponse::data(json!({
            "getAuthorizationGroups": [{
                "name": "editors",
                "isManaged": false,
                "roles": [{"name": "mcd/editor"}],
                "domainRestrictions": [],
                "ssoGroup": sso_group,
                "users": []
            }]
        }))
    }

    fn membership_response() -> GraphqlResponse {
        GraphqlResponse::data(json!({
            "updateUserAuthorizationGroupMembership": {"addedToGroups": [], "removedFromGroups": []}
        }))
    }

    #[test]
    fn test_patterns_are_validated() {
        let schema = IamMember.schema();
        assert!(validate(&schema, &state()).is_empty());

        let diagnostics = validate(&schema, &json!({"group": "editors", "member": "jane@example.com"}));
        assert_eq!(diagnostics.len(), 2);
    }

    #[tokio::test]
    async fn test_create_appends_group() {
        let client = MockClient::new()
            .on("getUsersInAccount", |vars| {
                assert_eq!(vars["email"], "jane@example.com");
                assert_eq!(vars["first"], 1);
                Ok(users_response(&["viewers"]))
            })
            .on("getAuthorizationGroups", |_| Ok(groups_response(None)))
            .on("updateUserAuthorizationGroupMembership", |vars| {
                assert_eq!(vars["memberUserId"], "cognito1");
                assert_eq!(vars["groupNames"], json!(["viewers", "editors"]));
                Ok(membership_response())
            });

        let planned = json!({"group": "groups/editors", "member": "user:jane@example.com"});
        let applied = IamMember.create(&client, planned).await.unwrap();
        assert_eq!(applied.state, state());
    }

    #[tokio::test]
    async fn test_create_rejects_sso_group() {
        let client = MockClient::new()
            .on("getUsersInAccount", |_| Ok(users_response(&[])))
            .on("getAuthorizationGroups", |_| Ok(groups_response(Some("okta-editors"))));

        let err = IamMember.create(&client, state()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Resource not found: Group groups/editors not found or is SSO managed"
        );
        assert_eq!(client.call_count("updateUserAuthorizationGroupMembership"), 0);
    }

    #[tokio::test]
    async fn test_create_unknown_user_fails() {
        let client = MockClient::new().on("getUsersInAccount", |_| Ok(no_users()));

        let err = IamMember.create(&client, state()).await.unwrap_err();
        assert!(err.to_string().contains("User jane@example.com not found"));
    }

    #[tokio::test]
    async fn test_read_drops_non_member() {
        let client = MockClient::new()
            .on("getUsersInAccount", |_| Ok(users_response(&["viewers"])))
            .on("getAuthorizationGroups", |_| Ok(groups_response(None)));

        let read = IamMember.read(&client, state()).await.unwrap();
        assert!(read.is_gone());
        assert_eq!(
            read.diagnostics[0].summary,
            "User jane@example.com is not a member of group groups/editors"
        );
    }

    #[tokio::test]
    async fn test_read_member() {
        let client = MockClient::new()
            .on("getUsersInAccount", |_| Ok(users_response(&["editors"])))
            .on("getAuthorizationGroups", |_| Ok(groups_response(Some(""))));

        let read = IamMember.read(&client, state()).await.unwrap();
        assert_eq!(read.state, Some(state()));
    }

    #[tokio::test]
    async fn test_update_is_unsupported() {
        let client = MockClient::new();
        let err = IamMember.update(&client, state(), state()).await.unwrap_err();
        assert!(err.to_string().contains("does not support updates"));
    }

    #[tokio::test]
    async fn test_delete_removes_only_group() {
        let client = MockClient::new()
            .on("getUsersInAccount", |_| Ok(users_response(&["viewers", "editors"])))
            .on("updateUserAuthorizationGroupMembership", |vars| {
                assert_eq!(vars["groupNames"], json!(["viewers"]));
                Ok(membership_response())
            });

        assert!(IamMember.delete(&client, state()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_user_warns() {
        let client = MockClient::new().on("getUsersInAccount", |_| Ok(no_users()));

        let diagnostics = IamMember.delete(&client, state()).await.unwrap();
        assert_has_warnings(&diagnostics);
        assert_eq!(client.call_count("updateUserAuthorizationGroupMembership"), 0);
    }

    #[test]
    fn test_import() {
        let state = IamMember.import("groups/editors,user:jane@example.com").unwrap();
        assert_eq!(state["group"], "groups/editors");
        assert_eq!(state["member"], "user:jane@example.com");
        assert!(IamMember.import("groups/editors").is_err());
    }
}
