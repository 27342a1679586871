//! `montecarlo_service_account`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{from_state, to_state, Resource};
use crate::client::authorization::{
    CreateOrUpdateServiceApiToken, CreateOrUpdateServiceApiTokenVariables, DeleteAccessToken,
    DeleteAccessTokenVariables, GetTokenMetadata, GetTokenMetadataVariables,
};
use crate::client::{MonteCarloClient, MonteCarloClientExt};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::{Applied, ReadResult};

const TYPE_NAME: &str = "montecarlo_service_account";
const ACCOUNT_INDEX: &str = "account";

/// An account wide service API token.
///
/// The secret is only returned when the token is created, so the resource
/// cannot be imported.
pub struct ServiceAccount;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Model {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl Model {
    fn id(&self) -> Result<&str, ProviderError> {
        self.id
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidRequest("'id' is not set in state".to_string()))
    }

    fn variables(&self, token_id: Option<String>) -> CreateOrUpdateServiceApiTokenVariables {
        CreateOrUpdateServiceApiTokenVariables {
            token_id,
            comment: self.description.clone().unwrap_or_default(),
            display_name: None,
            expiration_in_days: None,
            groups: None,
        }
    }
}

#[async_trait]
impl Resource for ServiceAccount {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("token", Attribute::computed_string().sensitive())
            .with_attribute(
                "description",
                Attribute::optional_string().with_default(json!("")),
            )
    }

    async fn create(
        &self,
        client: &dyn MonteCarloClient,
        planned: Value,
    ) -> Result<Applied, ProviderError> {
        let mut model: Model = from_state(planned)?;
        let data = client
            .mutate::<CreateOrUpdateServiceApiToken>(model.variables(None))
            .await?;

        let token = data.create_or_update_service_api_token.access_token;
        info!(resource_type = TYPE_NAME, id = %token.id, "Service token created");
        model.id = Some(token.id);
        model.token = token.token;
        model.description.get_or_insert_with(String::new);
        Ok(Applied::new(to_state(&model)?))
    }

    async fn read(
        &self,
        client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<ReadResult, ProviderError> {
        let mut model: Model = from_state(state)?;
        let data = client
            .query::<GetTokenMetadata>(GetTokenMetadataVariables {
                index: ACCOUNT_INDEX.to_string(),
                is_service_api_token: true,
            })
            .await?;

        let id = model.id()?;
        let Some(found) = data.get_token_metadata.into_iter().find(|t| t.id == id) else {
            return Ok(ReadResult::gone(format!("Token [ID: {}] not found", id)));
        };

        model.description = Some(found.comment.unwrap_or_default());
        Ok(ReadResult::found(to_state(&model)?))
    }

    async fn update(
        &self,
        client: &dyn MonteCarloClient,
        _prior: Value,
        planned: Value,
    ) -> Result<Applied, ProviderError> {
        let model: Model = from_state(planned)?;
        let token_id = model.id()?.to_string();
        client
            .mutate::<CreateOrUpdateServiceApiToken>(model.variables(Some(token_id)))
            .await?;
        Ok(Applied::new(to_state(&model)?))
    }

    async fn delete(
        &self,
        client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let model: Model = from_state(state)?;
        let data = client
            .mutate::<DeleteAccessToken>(DeleteAccessTokenVariables {
                token_id: model.id()?.to_string(),
            })
            .await?;

        if data.delete_access_token.success {
            Ok(Vec::new())
        } else {
            Ok(vec![Diagnostic::warning(
                "MC client 'DeleteAccessToken' mutation - success = false, service account \
                 probably already doesn't exists. This resource will continue with its deletion",
            )])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GraphqlResponse;
    use crate::testing::{assert_has_warnings, MockClient};

    fn state() -> Value {
        json!({"id": "token1", "token": "secret", "description": "ci"})
    }

    #[tokio::test]
    async fn test_create_records_secret() {
        let client = MockClient::new().on("createOrUpdateServiceApiToken", |vars| {
            assert!(vars["tokenId"].is_null());
            assert_eq!(vars["comment"], "ci");
            Ok(GraphqlResponse::data(json!({
                "createOrUpdateServiceApiToken": {"accessToken": {"id": "token1", "token": "secret"}}
            })))
        });

        let applied = ServiceAccount.create(&client, json!({"description": "ci"})).await.unwrap();
        assert_eq!(applied.state, state());
    }

    #[tokio::test]
    async fn test_read_keeps_secret_and_refreshes_description() {
        let client = MockClient::new().on("getTokenMetadata", |vars| {
            assert_eq!(vars["index"], "account");
            assert_eq!(vars["isServiceApiToken"], true);
            Ok(GraphqlResponse::data(json!({
                "getTokenMetadata": [
                    {"id": "other", "comment": "x"},
                    {"id": "token1", "comment": "renamed", "isServiceApiToken": true}
                ]
            })))
        });

        let state = ServiceAccount.read(&client, state()).await.unwrap().state.unwrap();
        assert_eq!(state["description"], "renamed");
        assert_eq!(state["token"], "secret");
    }

    #[tokio::test]
    async fn test_read_missing_token_drops_state() {
        let client = MockClient::new().on("getTokenMetadata", |_| {
            Ok(GraphqlResponse::data(json!({"getTokenMetadata": []})))
        });

        let read = ServiceAccount.read(&client, state()).await.unwrap();
        assert!(read.is_gone());
        assert_eq!(read.diagnostics[0].summary, "Token [ID: token1] not found");
    }

    #[tokio::test]
    async fn test_update_sends_token_id() {
        let client = MockClient::new().on("createOrUpdateServiceApiToken", |vars| {
            assert_eq!(vars["tokenId"], "token1");
            Ok(GraphqlResponse::data(json!({
                "createOrUpdateServiceApiToken": {"accessToken": {"id": "token1"}}
            })))
        });

        let applied = ServiceAccount.update(&client, state(), state()).await.unwrap();
        assert_eq!(applied.state["token"], "secret");
    }

    #[tokio::test]
    async fn test_delete_already_gone_warns() {
        let client = MockClient::new().on("deleteAccessToken", |vars| {
            assert_eq!(vars["tokenId"], "token1");
            Ok(GraphqlResponse::data(json!({"deleteAccessToken": {"success": false}})))
        });

        assert_has_warnings(&ServiceAccount.delete(&client, state()).await.unwrap());
    }

    #[test]
    fn test_import_is_unsupported() {
        assert!(matches!(
            ServiceAccount.import("token1"),
            Err(ProviderError::Unimplemented(_))
        ));
    }
}
