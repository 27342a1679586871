//! Domain operations.

use serde::{Deserialize, Serialize};

use super::{Operation, Uuid};

/// Raw document for `getDomain`. The domain may be null.
pub const GET_DOMAIN_QUERY: &str = "query getDomain($uuid: UUID!) { getDomain(uuid: $uuid) { uuid,name,description,tags{name,value},assignments,createdByEmail } }";

/// A tag key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagPair {
    /// Tag name.
    pub name: String,
    /// Tag value, empty when the tag has no value.
    #[serde(default)]
    pub value: String,
}

/// `createOrUpdateDomain`
pub struct CreateOrUpdateDomain;

/// Variables of [`CreateOrUpdateDomain`].
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrUpdateDomainVariables {
    /// Domain to update, null to create one.
    pub uuid: Option<Uuid>,
    /// MCON assignments.
    pub assignments: Option<Vec<String>>,
    /// Tag assignments.
    pub tags: Option<Vec<TagPair>>,
    /// Domain name.
    pub name: String,
    /// Domain description.
    pub description: String,
}

/// Data of [`CreateOrUpdateDomain`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrUpdateDomainData {
    /// The result.
    pub create_or_update_domain: CreateOrUpdateDomainResult,
}

/// Result of [`CreateOrUpdateDomain`].
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrUpdateDomainResult {
    /// The stored domain.
    pub domain: Domain,
}

/// A domain.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    /// Domain identifier.
    pub uuid: String,
    /// Domain name.
    pub name: String,
    /// Domain description.
    #[serde(default)]
    pub description: Option<String>,
    /// Tag assignments.
    #[serde(default)]
    pub tags: Vec<TagPair>,
    /// MCON assignments.
    #[serde(default)]
    pub assignments: Vec<String>,
    /// Creator, only returned by `getDomain`.
    #[serde(default)]
    pub created_by_email: Option<String>,
}

impl Operation for CreateOrUpdateDomain {
    const DOCUMENT: &'static str = "mutation createOrUpdateDomain($assignments: [String!], $tags: [TagKeyValuePairInput!], $name: String!, $description: String!, $uuid: UUID) { createOrUpdateDomain(assignments: $assignments, tags: $tags, name: $name, description: $description, uuid: $uuid) { domain { uuid, name, description, tags { name, value }, assignments } } }";
    type Variables = CreateOrUpdateDomainVariables;
    type Data = CreateOrUpdateDomainData;
}

/// Variables of [`GET_DOMAIN_QUERY`].
#[derive(Debug, Clone, Serialize)]
pub struct GetDomainVariables {
    /// Domain to fetch.
    pub uuid: Uuid,
}

/// Data of [`GET_DOMAIN_QUERY`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDomainData {
    /// The domain, null when it does not exist.
    #[serde(default)]
    pub get_domain: Option<Domain>,
}

/// `deleteDomain`
pub struct DeleteDomain;

/// Variables of [`DeleteDomain`].
#[derive(Debug, Clone, Serialize)]
pub struct DeleteDomainVariables {
    /// Domain to delete.
    pub uuid: Uuid,
}

/// Data of [`DeleteDomain`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDomainData {
    /// The result.
    pub delete_domain: DeletedCount,
}

/// A `{ deleted }` result.
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedCount {
    /// Number of deleted objects.
    pub deleted: i64,
}

impl Operation for DeleteDomain {
    const DOCUMENT: &'static str = "mutation deleteDomain($uuid: UUID!) { deleteDomain(uuid: $uuid) { deleted } }";
    type Variables = DeleteDomainVariables;
    type Data = DeleteDomainData;
}
