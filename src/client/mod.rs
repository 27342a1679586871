//! Monte Carlo GraphQL API gateway.
//!
//! [`MonteCarloClient`] is the transport seam: it executes one GraphQL request
//! and returns the decoded envelope. Everything the provider sends goes
//! through the typed entry points of [`MonteCarloClientExt`]:
//!
//! - [`mutate`](MonteCarloClientExt::mutate) and [`query`](MonteCarloClientExt::query)
//!   run an [`Operation`] and fail on any GraphQL error or missing data.
//! - [`exec_raw`](MonteCarloClientExt::exec_raw) returns the raw `data` bytes
//!   next to any error, for results whose objects are nullable.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;

pub mod authorization;
pub mod domain;
pub mod http;
pub mod monitor;
pub mod types;
pub mod warehouse;

pub use http::{ApiKey, HttpMonteCarloClient, DEFAULT_API_URL};
pub use types::{JsonString, Mcon, Uuid};

/// A GraphQL request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest {
    /// The GraphQL document.
    pub query: String,
    /// Variables referenced by the document.
    pub variables: serde_json::Value,
    /// Name of the operation inside the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl GraphqlRequest {
    /// Build a request, deriving the operation name from the document.
    pub fn new(query: impl Into<String>, variables: serde_json::Value) -> Self {
        let query = query.into();
        let operation_name = operation_name(&query).map(str::to_string);
        Self {
            query,
            variables,
            operation_name,
        }
    }
}

/// A single entry of the GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    /// Human readable message.
    pub message: String,
    /// Path of the failing field, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<serde_json::Value>>,
}

/// A GraphQL response envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphqlResponse {
    /// The `data` member, absent or null when the operation failed entirely.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// The `errors` member.
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

impl GraphqlResponse {
    /// A response carrying only data.
    pub fn data(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// A response carrying only errors.
    pub fn errors<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: None,
            errors: messages
                .into_iter()
                .map(|message| GraphqlError {
                    message: message.into(),
                    path: None,
                })
                .collect(),
        }
    }

    /// Joined error messages, if any were reported.
    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Outcome of [`MonteCarloClientExt::exec_raw`].
///
/// `data` and `error` are independent: nullable result objects may arrive
/// together with an error. Callers treat "error and no bytes" as fatal.
#[derive(Debug)]
pub struct RawResponse {
    /// JSON bytes of the `data` member. Empty when the API returned no data.
    pub data: Vec<u8>,
    /// Error reported alongside (or instead of) the data.
    pub error: Option<ProviderError>,
}

impl RawResponse {
    /// Decode the data bytes, failing when the call produced nothing usable.
    pub fn decode<T: DeserializeOwned>(self, operation: &str) -> Result<T, ProviderError> {
        if self.data.is_empty() {
            return Err(self.error.unwrap_or_else(|| {
                ProviderError::Api(format!("MC client '{}' query returned no data", operation))
            }));
        }
        serde_json::from_slice(&self.data).map_err(|err| {
            ProviderError::Api(format!(
                "MC client '{}' query failed to unmarshal data - {}",
                operation, err
            ))
        })
    }
}

/// A typed GraphQL operation.
pub trait Operation {
    /// The GraphQL document sent to the API.
    const DOCUMENT: &'static str;
    /// Variables of the operation.
    type Variables: Serialize + Send + 'static;
    /// The decoded `data` member.
    type Data: DeserializeOwned + Send;
}

/// Transport for GraphQL requests against the Monte Carlo API.
#[async_trait]
pub trait MonteCarloClient: Send + Sync {
    /// Execute one request and return its envelope.
    ///
    /// Transport and HTTP level failures are errors; GraphQL level errors are
    /// returned inside the envelope.
    async fn execute(&self, request: GraphqlRequest) -> Result<GraphqlResponse, ProviderError>;
}

/// The three entry points the provider uses against a [`MonteCarloClient`].
#[async_trait]
pub trait MonteCarloClientExt: MonteCarloClient {
    /// Run a mutation.
    async fn mutate<O>(&self, variables: O::Variables) -> Result<O::Data, ProviderError>
    where
        O: Operation + Send + Sync + 'static,
    {
        run::<O, Self>(self, "mutation", variables).await
    }

    /// Run a query.
    async fn query<O>(&self, variables: O::Variables) -> Result<O::Data, ProviderError>
    where
        O: Operation + Send + Sync + 'static,
    {
        run::<O, Self>(self, "query", variables).await
    }

    /// Run a raw document, returning data bytes and any error side by side.
    async fn exec_raw(&self, query: &str, variables: serde_json::Value) -> RawResponse {
        let name = operation_name(query).unwrap_or("anonymous").to_string();
        debug!(operation = %name, "Executing raw GraphQL query");

        match self.execute(GraphqlRequest::new(query, variables)).await {
            Ok(response) => {
                let error = response.error_message().map(|message| {
                    ProviderError::Api(format!("MC client '{}' query result - {}", name, message))
                });
                let data = match response.data {
                    Some(data) if !data.is_null() => serde_json::to_vec(&data).unwrap_or_default(),
                    _ => Vec::new(),
                };
                RawResponse { data, error }
            },
            Err(err) => RawResponse {
                data: Vec::new(),
                error: Some(err),
            },
        }
    }
}

impl<T: MonteCarloClient + ?Sized> MonteCarloClientExt for T {}

async fn run<O, C>(client: &C, kind: &str, variables: O::Variables) -> Result<O::Data, ProviderError>
where
    O: Operation,
    C: MonteCarloClient + ?Sized,
{
    let name = operation_name(O::DOCUMENT).unwrap_or("anonymous");
    debug!(operation = name, kind, "Executing GraphQL operation");

    let variables = serde_json::to_value(variables)?;
    let response = client
        .execute(GraphqlRequest::new(O::DOCUMENT, variables))
        .await
        .map_err(|err| match err {
            ProviderError::Api(msg) => {
                ProviderError::Api(format!("MC client '{}' {} result - {}", name, kind, msg))
            },
            other => other,
        })?;

    if let Some(message) = response.error_message() {
        return Err(ProviderError::Api(format!(
            "MC client '{}' {} result - {}",
            name, kind, message
        )));
    }

    let data = response
        .data
        .filter(|data| !data.is_null())
        .ok_or_else(|| ProviderError::Api(format!("MC client '{}' {} returned no data", name, kind)))?;

    serde_json::from_value(data).map_err(|err| {
        ProviderError::Api(format!(
            "MC client '{}' {} failed to unmarshal data - {}",
            name, kind, err
        ))
    })
}

/// Extract the operation name from a GraphQL document.
///
/// `mutation addConnection($dcId: UUID) { .. }` yields `addConnection`.
pub fn operation_name(document: &str) -> Option<&str> {
    let rest = document.trim_start();
    let rest = rest
        .strip_prefix("mutation")
        .or_else(|| rest.strip_prefix("query"))?;
    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| c == '(' || c == '{' || c.is_whitespace())
        .unwrap_or(rest.len());
    let name = &rest[..end];
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockClient;
    use serde_json::json;

    struct GetThing;

    #[derive(Serialize)]
    struct GetThingVariables {
        uuid: String,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct GetThingData {
        get_thing: Thing,
    }

    #[derive(Debug, Deserialize)]
    struct Thing {
        name: String,
    }

    impl Operation for GetThing {
        const DOCUMENT: &'static str =
            "query getThing($uuid: UUID!) { getThing(uuid: $uuid) { name } }";
        type Variables = GetThingVariables;
        type Data = GetThingData;
    }

    fn variables() -> GetThingVariables {
        GetThingVariables {
            uuid: "8bfc4".to_string(),
        }
    }

    #[test]
    fn test_operation_name() {
        assert_eq!(operation_name(GetThing::DOCUMENT), Some("getThing"));
        assert_eq!(
            operation_name("mutation addConnection($dcId: UUID) { x }"),
            Some("addConnection")
        );
        assert_eq!(
            operation_name("  query getAuthorizationGroups { getAuthorizationGroups { name } }"),
            Some("getAuthorizationGroups")
        );
        assert_eq!(operation_name("{ getThing { name } }"), None);
        assert_eq!(operation_name("query { getThing { name } }"), None);
    }

    #[test]
    fn test_request_serializes_operation_name() {
        let request = GraphqlRequest::new(GetThing::DOCUMENT, json!({"uuid": "8bfc4"}));
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["operationName"], "getThing");
        assert_eq!(body["variables"]["uuid"], "8bfc4");
    }

    #[tokio::test]
    async fn test_query_decodes_data() {
        let client = MockClient::new().on("getThing", |vars| {
            assert_eq!(vars["uuid"], "8bfc4");
            Ok(GraphqlResponse::data(json!({"getThing": {"name": "name1"}})))
        });

        let data = client.query::<GetThing>(variables()).await.unwrap();
        assert_eq!(data.get_thing.name, "name1");
        assert_eq!(client.call_count("getThing"), 1);
    }

    #[tokio::test]
    async fn test_query_fails_on_graphql_errors() {
        let client = MockClient::new().on("getThing", |_| {
            Ok(GraphqlResponse {
                data: Some(json!({"getThing": {"name": "name1"}})),
                errors: GraphqlResponse::errors(["permission denied"]).errors,
            })
        });

        let err = client.query::<GetThing>(variables()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "API error: MC client 'getThing' query result - permission denied"
        );
    }

    #[tokio::test]
    async fn test_mutate_fails_without_data() {
        let client = MockClient::new().on("getThing", |_| Ok(GraphqlResponse::default()));

        let err = client.mutate::<GetThing>(variables()).await.unwrap_err();
        assert!(err.to_string().contains("returned no data"));
    }

    #[tokio::test]
    async fn test_exec_raw_keeps_data_next_to_errors() {
        let client = MockClient::new().on("getThing", |_| {
            Ok(GraphqlResponse {
                data: Some(json!({"getThing": null})),
                errors: GraphqlResponse::errors(["not found"]).errors,
            })
        });

        let raw = client
            .exec_raw(GetThing::DOCUMENT, json!({"uuid": "8bfc4"}))
            .await;
        assert!(raw.error.is_some());
        let decoded: serde_json::Value = raw.decode("getThing").unwrap();
        assert_eq!(decoded, json!({"getThing": null}));
    }

    #[tokio::test]
    async fn test_exec_raw_error_without_data_is_fatal() {
        let client = MockClient::new().on("getThing", |_| Ok(GraphqlResponse::errors(["boom"])));

        let raw = client
            .exec_raw(GetThing::DOCUMENT, json!({"uuid": "8bfc4"}))
            .await;
        assert!(raw.data.is_empty());
        let err = raw.decode::<serde_json::Value>("getThing").unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
