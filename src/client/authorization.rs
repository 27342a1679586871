//! Authorization group, user membership and service token operations.

use serde::{Deserialize, Serialize};

use super::domain::DeletedCount;
use super::warehouse::{PageInfo, SuccessResult};
use super::{Operation, Uuid};

/// Variables of operations that take none.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NoVariables {}

// =========================================================================
// Groups
// =========================================================================

/// An authorization group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationGroup {
    /// Group name.
    pub name: String,
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Managed by Monte Carlo rather than the account.
    #[serde(default)]
    pub is_managed: bool,
    /// Granted roles.
    #[serde(default)]
    pub roles: Vec<RoleRef>,
    /// Domains the group is restricted to.
    #[serde(default)]
    pub domain_restrictions: Vec<DomainRef>,
    /// SSO group mapped onto this group.
    #[serde(default)]
    pub sso_group: Option<String>,
    /// Members.
    #[serde(default)]
    pub users: Vec<GroupUser>,
}

impl AuthorizationGroup {
    /// Whether group membership is driven by SSO.
    pub fn is_sso(&self) -> bool {
        self.sso_group.as_deref().is_some_and(|group| !group.is_empty())
    }
}

/// Reference to a role.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleRef {
    /// Role name.
    pub name: String,
}

/// Reference to a domain.
#[derive(Debug, Clone, Deserialize)]
pub struct DomainRef {
    /// Domain identifier.
    pub uuid: String,
}

/// A member of an authorization group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupUser {
    /// User identifier.
    pub cognito_user_id: String,
    /// Email.
    pub email: String,
    /// First name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Last name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Whether the user signs in through SSO.
    #[serde(default)]
    pub is_sso: bool,
}

/// `getAuthorizationGroups`
pub struct GetAuthorizationGroups;

/// Data of [`GetAuthorizationGroups`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAuthorizationGroupsData {
    /// All groups of the account.
    #[serde(default)]
    pub get_authorization_groups: Vec<AuthorizationGroup>,
}

impl Operation for GetAuthorizationGroups {
    const DOCUMENT: &'static str = "query getAuthorizationGroups { getAuthorizationGroups { name, label, description, isManaged, roles { name }, domainRestrictions { uuid }, ssoGroup, users { cognitoUserId, email, firstName, lastName, isSso } } }";
    type Variables = NoVariables;
    type Data = GetAuthorizationGroupsData;
}

/// `createOrUpdateAuthorizationGroup`
pub struct CreateOrUpdateAuthorizationGroup;

/// Variables of [`CreateOrUpdateAuthorizationGroup`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrUpdateAuthorizationGroupVariables {
    /// Group name.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Description.
    pub description: String,
    /// Granted roles.
    pub roles: Vec<String>,
    /// Domains the group is restricted to.
    pub domain_restriction_ids: Vec<Uuid>,
    /// SSO group mapped onto this group.
    pub sso_group: Option<String>,
}

/// Data of [`CreateOrUpdateAuthorizationGroup`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrUpdateAuthorizationGroupData {
    /// The result.
    pub create_or_update_authorization_group: CreateOrUpdateAuthorizationGroupResult,
}

/// Result of [`CreateOrUpdateAuthorizationGroup`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrUpdateAuthorizationGroupResult {
    /// The stored group.
    pub authorization_group: AuthorizationGroup,
}

impl Operation for CreateOrUpdateAuthorizationGroup {
    const DOCUMENT: &'static str = "mutation createOrUpdateAuthorizationGroup($name: String!, $label: String!, $description: String!, $roles: [String!]!, $domainRestrictionIds: [UUID!], $ssoGroup: String) { createOrUpdateAuthorizationGroup(name: $name, label: $label, description: $description, roles: $roles, domainRestrictionIds: $domainRestrictionIds, ssoGroup: $ssoGroup) { authorizationGroup { name, label, description, isManaged, roles { name }, domainRestrictions { uuid }, ssoGroup, users { cognitoUserId, email, firstName, lastName, isSso } } } }";
    type Variables = CreateOrUpdateAuthorizationGroupVariables;
    type Data = CreateOrUpdateAuthorizationGroupData;
}

/// `deleteAuthorizationGroup`
pub struct DeleteAuthorizationGroup;

/// Variables of [`DeleteAuthorizationGroup`].
#[derive(Debug, Clone, Serialize)]
pub struct DeleteAuthorizationGroupVariables {
    /// Group to delete.
    pub name: String,
}

/// Data of [`DeleteAuthorizationGroup`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAuthorizationGroupData {
    /// The result.
    pub delete_authorization_group: DeletedCount,
}

impl Operation for DeleteAuthorizationGroup {
    const DOCUMENT: &'static str = "mutation deleteAuthorizationGroup($name: String!) { deleteAuthorizationGroup(name: $name) { deleted } }";
    type Variables = DeleteAuthorizationGroupVariables;
    type Data = DeleteAuthorizationGroupData;
}

// =========================================================================
// Users
// =========================================================================

/// A user of the account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User identifier.
    pub cognito_user_id: String,
    /// Email.
    pub email: String,
    /// First name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Last name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Whether the user signs in through SSO.
    #[serde(default)]
    pub is_sso: bool,
    /// Authorization details.
    pub auth: UserAuth,
}

/// Authorization details of a [`User`].
#[derive(Debug, Clone, Deserialize)]
pub struct UserAuth {
    /// Names of the groups the user belongs to.
    #[serde(default)]
    pub groups: Vec<String>,
}

/// `getUsersInAccount`
pub struct GetUsersInAccount;

/// Variables of [`GetUsersInAccount`].
#[derive(Debug, Clone, Serialize)]
pub struct GetUsersInAccountVariables {
    /// Filter by email.
    pub email: String,
    /// Page size.
    pub first: i64,
    /// Cursor of the previous page.
    pub after: Option<String>,
}

/// Data of [`GetUsersInAccount`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUsersInAccountData {
    /// The page.
    pub get_users_in_account: UsersPage,
}

/// A page of users.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersPage {
    /// Users on this page.
    #[serde(default)]
    pub edges: Vec<UserEdge>,
    /// Cursor information.
    pub page_info: PageInfo,
}

/// An edge of [`UsersPage`].
#[derive(Debug, Clone, Deserialize)]
pub struct UserEdge {
    /// The user.
    pub node: User,
}

impl Operation for GetUsersInAccount {
    const DOCUMENT: &'static str = "query getUsersInAccount($email: String, $first: Int, $after: String) { getUsersInAccount(email: $email, first: $first, after: $after) { edges { node { cognitoUserId, email, firstName, lastName, isSso, auth { groups } } }, pageInfo { startCursor, endCursor, hasNextPage } } }";
    type Variables = GetUsersInAccountVariables;
    type Data = GetUsersInAccountData;
}

/// `updateUserAuthorizationGroupMembership`
pub struct UpdateUserAuthorizationGroupMembership;

/// Variables of [`UpdateUserAuthorizationGroupMembership`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserAuthorizationGroupMembershipVariables {
    /// User whose membership is replaced.
    pub member_user_id: String,
    /// Complete list of groups the user should belong to.
    pub group_names: Vec<String>,
}

/// Data of [`UpdateUserAuthorizationGroupMembership`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserAuthorizationGroupMembershipData {
    /// The result.
    pub update_user_authorization_group_membership: MembershipChange,
}

/// Groups a membership update added and removed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChange {
    /// Groups the user joined.
    #[serde(default)]
    pub added_to_groups: Vec<GroupSummary>,
    /// Groups the user left.
    #[serde(default)]
    pub removed_from_groups: Vec<GroupSummary>,
}

/// Name and label of a group.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupSummary {
    /// Group name.
    pub name: String,
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
}

impl Operation for UpdateUserAuthorizationGroupMembership {
    const DOCUMENT: &'static str = "mutation updateUserAuthorizationGroupMembership($memberUserId: String!, $groupNames: [String!]!) { updateUserAuthorizationGroupMembership(memberUserId: $memberUserId, groupNames: $groupNames) { addedToGroups { name, label, description }, removedFromGroups { name, label, description } } }";
    type Variables = UpdateUserAuthorizationGroupMembershipVariables;
    type Data = UpdateUserAuthorizationGroupMembershipData;
}

// =========================================================================
// Service tokens
// =========================================================================

/// `createOrUpdateServiceApiToken`
pub struct CreateOrUpdateServiceApiToken;

/// Variables of [`CreateOrUpdateServiceApiToken`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrUpdateServiceApiTokenVariables {
    /// Token to update, null to create one.
    pub token_id: Option<String>,
    /// Free text description.
    pub comment: String,
    /// Display name.
    pub display_name: Option<String>,
    /// Lifetime in days.
    pub expiration_in_days: Option<i64>,
    /// Groups granted to the token.
    pub groups: Option<Vec<String>>,
}

/// Data of [`CreateOrUpdateServiceApiToken`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrUpdateServiceApiTokenData {
    /// The result.
    pub create_or_update_service_api_token: ServiceApiTokenResult,
}

/// Result of [`CreateOrUpdateServiceApiToken`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceApiTokenResult {
    /// The token.
    pub access_token: AccessToken,
}

/// An access token with its secret.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    /// Token identifier.
    pub id: String,
    /// Token secret, only returned on creation.
    #[serde(default)]
    pub token: Option<String>,
}

impl Operation for CreateOrUpdateServiceApiToken {
    const DOCUMENT: &'static str = "mutation createOrUpdateServiceApiToken($comment: String!, $displayName: String, $expirationInDays: Int, $groups: [String!], $tokenId: String) { createOrUpdateServiceApiToken(comment: $comment, displayName: $displayName, expirationInDays: $expirationInDays, groups: $groups, tokenId: $tokenId) { accessToken { id, token } } }";
    type Variables = CreateOrUpdateServiceApiTokenVariables;
    type Data = CreateOrUpdateServiceApiTokenData;
}

/// `getTokenMetadata`
pub struct GetTokenMetadata;

/// Variables of [`GetTokenMetadata`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTokenMetadataVariables {
    /// Token index, `account` for account wide tokens.
    pub index: String,
    /// Only service tokens.
    pub is_service_api_token: bool,
}

/// Data of [`GetTokenMetadata`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTokenMetadataData {
    /// Metadata of every matching token.
    #[serde(default)]
    pub get_token_metadata: Vec<TokenMetadata>,
}

/// Metadata of an access token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    /// Token identifier.
    pub id: String,
    /// Free text description.
    #[serde(default)]
    pub comment: Option<String>,
    /// Creator.
    #[serde(default)]
    pub created_by: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub creation_time: Option<String>,
    /// Expiration time.
    #[serde(default)]
    pub expiration_time: Option<String>,
    /// Groups granted to the token.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Whether this is a service token.
    #[serde(default)]
    pub is_service_api_token: bool,
}

impl Operation for GetTokenMetadata {
    const DOCUMENT: &'static str = "query getTokenMetadata($index: AccessKeyIndexEnum!, $isServiceApiToken: Boolean!) { getTokenMetadata(index: $index, isServiceApiToken: $isServiceApiToken) { id, comment, createdBy, creationTime, expirationTime, groups, isServiceApiToken } }";
    type Variables = GetTokenMetadataVariables;
    type Data = GetTokenMetadataData;
}

/// `deleteAccessToken`
pub struct DeleteAccessToken;

/// Variables of [`DeleteAccessToken`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccessTokenVariables {
    /// Token to delete.
    pub token_id: String,
}

/// Data of [`DeleteAccessToken`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccessTokenData {
    /// The result.
    pub delete_access_token: SuccessResult,
}

impl Operation for DeleteAccessToken {
    const DOCUMENT: &'static str = "mutation deleteAccessToken($tokenId: String!) { deleteAccessToken(tokenId: $tokenId) { success } }";
    type Variables = DeleteAccessTokenVariables;
    type Data = DeleteAccessTokenData;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::operation_name;
    use serde_json::json;

    const GROUP_FIELDS: &str = "name, label, description, isManaged, roles { name }, domainRestrictions { uuid }, ssoGroup, users { cognitoUserId, email, firstName, lastName, isSso }";

    #[test]
    fn test_group_documents_select_group_fields() {
        assert!(GetAuthorizationGroups::DOCUMENT.contains(GROUP_FIELDS));
        assert!(CreateOrUpdateAuthorizationGroup::DOCUMENT.contains(GROUP_FIELDS));
        assert_eq!(
            operation_name(GetAuthorizationGroups::DOCUMENT),
            Some("getAuthorizationGroups")
        );
    }

    #[test]
    fn test_no_variables_serializes_to_empty_object() {
        assert_eq!(serde_json::to_value(NoVariables {}).unwrap(), json!({}));
    }

    #[test]
    fn test_group_is_sso() {
        let group: AuthorizationGroup = serde_json::from_value(json!({
            "name": "editors", "ssoGroup": ""
        }))
        .unwrap();
        assert!(!group.is_sso());

        let group: AuthorizationGroup = serde_json::from_value(json!({
            "name": "editors", "ssoGroup": "okta-editors"
        }))
        .unwrap();
        assert!(group.is_sso());
    }
}
