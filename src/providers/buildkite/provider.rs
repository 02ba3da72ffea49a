use log::debug;
use std::time::Duration;
use url::Url;

use crate::auth::Token;
use crate::error::Result;

use super::client::BuildkiteClient;
use super::types::PipelineStats;

/// Buildkite build-state source for one organization.
///
/// Every call to [`BuildkiteProvider::fetch_pipeline_stats`] discovers the
/// current set of build states from the schema and then asks for the build
/// count in each of them, per pipeline. Nothing is kept between calls.
pub struct BuildkiteProvider {
    pub client: BuildkiteClient,
    pub organization: String,
}

impl BuildkiteProvider {
    /// Creates a provider for `organization` against the given GraphQL endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        graphql_url: Url,
        organization: String,
        token: Token,
        timeout: Duration,
    ) -> Result<Self> {
        let client = BuildkiteClient::new(graphql_url, token, timeout)?;

        Ok(Self {
            client,
            organization,
        })
    }

    pub async fn fetch_pipeline_stats(&self) -> Result<Vec<PipelineStats>> {
        let states = self.client.fetch_build_states().await?;
        debug!(
            "Discovered {} build states from {}: {}",
            states.len(),
            self.client.graphql_url(),
            states.join(", ")
        );

        self.client
            .fetch_pipeline_stats(&self.organization, &states)
            .await
    }
}
