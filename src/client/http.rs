//! HTTP transport for the Monte Carlo GraphQL endpoint.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, trace};

use super::{GraphqlRequest, GraphqlResponse, MonteCarloClient};
use crate::error::ProviderError;

/// Production GraphQL endpoint.
pub const DEFAULT_API_URL: &str = "https://api.getmontecarlo.com/graphql";

const HEADER_KEY_ID: &str = "x-mcd-id";
const HEADER_KEY_TOKEN: &str = "x-mcd-token";

/// An account service key pair.
#[derive(Clone)]
pub struct ApiKey {
    /// Key identifier, sent as `x-mcd-id`.
    pub id: String,
    /// Key secret, sent as `x-mcd-token`.
    pub token: String,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// [`MonteCarloClient`] over HTTPS.
///
/// Both credential headers are attached to every request. There is no
/// timeout and no retry.
#[derive(Debug, Clone)]
pub struct HttpMonteCarloClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpMonteCarloClient {
    /// Create a client for `endpoint` authenticated with `key`.
    pub fn new(endpoint: impl Into<String>, key: &ApiKey) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_KEY_ID, header_value(HEADER_KEY_ID, &key.id)?);
        headers.insert(HEADER_KEY_TOKEN, header_value(HEADER_KEY_TOKEN, &key.token)?);

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    /// The endpoint requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ProviderError> {
    let mut value = HeaderValue::from_str(value).map_err(|_| {
        ProviderError::Configuration(format!("{} contains characters not allowed in a header", name))
    })?;
    value.set_sensitive(true);
    Ok(value)
}

fn variable_names(variables: &serde_json::Value) -> Vec<&str> {
    variables
        .as_object()
        .map(|vars| vars.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

#[async_trait]
impl MonteCarloClient for HttpMonteCarloClient {
    async fn execute(&self, request: GraphqlRequest) -> Result<GraphqlResponse, ProviderError> {
        let operation = request.operation_name.as_deref().unwrap_or("anonymous");
        // Variables and bodies carry secrets, so only their shape is logged.
        trace!(
            operation,
            variables = ?variable_names(&request.variables),
            "Sending GraphQL request"
        );

        let response = self.http.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        trace!(operation, %status, body_len = body.len(), "Received GraphQL response");

        if !status.is_success() {
            return Err(ProviderError::Api(format!(
                "Monte Carlo API returned {}: {}",
                status,
                body.trim()
            )));
        }

        let envelope: GraphqlResponse = serde_json::from_str(&body)?;
        debug!(
            operation,
            errors = envelope.errors.len(),
            "GraphQL request completed"
        );
        Ok(envelope)
    }
}
