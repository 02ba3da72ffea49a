use graphql_client::Response as GraphQLResponse;
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::auth::Token;
use crate::error::{ExporterError, Result};

const USER_AGENT: &str = concat!("buildkite-exporter/", env!("CARGO_PKG_VERSION"));

/// Raw GraphQL request body. Queries are assembled at runtime so the body
/// carries only the query text.
#[derive(Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
}

pub struct BuildkiteClient {
    client: Client,
    graphql_url: Url,
    token: Token,
}

impl BuildkiteClient {
    /// Builds a client for the given GraphQL endpoint.
    ///
    /// `timeout` bounds each outgoing request, from connect until the body
    /// has been read.
    pub fn new(graphql_url: Url, token: Token, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ExporterError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            graphql_url,
            token,
        })
    }

    pub fn graphql_url(&self) -> &Url {
        &self.graphql_url
    }

    /// POST a query and return the `data` member of the GraphQL envelope.
    ///
    /// Non-2xx statuses map to `Api`, a populated `errors` array to `GraphQL`
    /// and a body that does not match `T` to `Decode`. When `errors` is
    /// non-empty any partial `data` in the same response is dropped.
    pub(super) async fn execute_graphql_request<T>(&self, query: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let request = self
            .client
            .post(self.graphql_url.clone())
            .bearer_auth(self.token.as_str())
            .json(&GraphQLRequest { query });

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(ExporterError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body = response.bytes().await?;
        debug!("Received {} bytes from {}", body.len(), self.graphql_url);

        let response_body: GraphQLResponse<T> = serde_json::from_slice(&body)?;

        if let Some(errors) = response_body.errors.filter(|errors| !errors.is_empty()) {
            return Err(ExporterError::GraphQL(
                errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ));
        }

        response_body
            .data
            .ok_or_else(|| ExporterError::GraphQL("response contained no data".to_string()))
    }
}
