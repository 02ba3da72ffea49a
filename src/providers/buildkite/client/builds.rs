use indexmap::IndexMap;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use super::core::BuildkiteClient;
use crate::error::{ExporterError, Result};
use crate::providers::buildkite::types::{BuildStat, PipelineStats};

/// Only the first page of pipelines is requested.
pub(super) const PIPELINES_PAGE_SIZE: usize = 100;

/// Node key carrying the pipeline slug; every other node key is a state alias.
const SLUG_KEY: &str = "slug";

#[derive(Debug, Deserialize)]
struct BuildStatsData {
    organization: Option<Organization>,
}

#[derive(Debug, Deserialize)]
struct Organization {
    pipelines: Pipelines,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pipelines {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    page_info: Option<PageInfo>,
    #[serde(default)]
    edges: Vec<PipelineEdge>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct PipelineEdge {
    node: IndexMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct StateCount {
    count: u64,
}

/// Quote `value` as a GraphQL string literal.
fn graphql_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Assemble the aggregate query: per pipeline, one `builds(state: X) { count }`
/// field per state, aliased by the lower-cased state name.
pub fn build_stats_query(organization: &str, states: &[String]) -> String {
    let state_fields: String = states
        .iter()
        .map(|state| {
            format!(
                "            {}: builds(state: {}) {{ count }}\n",
                state.to_lowercase(),
                state
            )
        })
        .collect();

    format!(
        r#"
query BuildStatsQuery {{
  organization(slug: {organization}) {{
    pipelines(first: {PIPELINES_PAGE_SIZE}) {{
      count
      pageInfo {{
        hasNextPage
        hasPreviousPage
      }}
      edges {{
        node {{
          slug
{state_fields}        }}
      }}
    }}
  }}
}}
"#,
        organization = graphql_string(organization),
    )
}

/// Flatten one pipeline node into its slug and per-state counts.
///
/// Keys keep the order they had in the response. Should an alias ever equal
/// `slug`, that entry is read as the slug.
fn pipeline_stats_from_node(node: IndexMap<String, Value>) -> Result<PipelineStats> {
    let mut pipeline = PipelineStats::default();

    for (key, value) in node {
        if key == SLUG_KEY {
            pipeline.slug = serde_json::from_value(value)?;
        } else {
            let state: StateCount = serde_json::from_value(value)?;
            pipeline.stats.push(BuildStat {
                state: key,
                count: state.count,
            });
        }
    }

    Ok(pipeline)
}

impl BuildkiteClient {
    /// Fetch build counts for every discovered state across the first page of
    /// the organization's pipelines.
    ///
    /// # Errors
    /// Returns an error if:
    /// * the request fails or the endpoint answers with a non-success status
    /// * the response, or any per-state entry in it, does not decode
    /// * the organization does not exist
    pub async fn fetch_pipeline_stats(
        &self,
        organization: &str,
        states: &[String],
    ) -> Result<Vec<PipelineStats>> {
        let query = build_stats_query(organization, states);
        let data: BuildStatsData = self.execute_graphql_request(&query).await?;

        let pipelines = data
            .organization
            .ok_or_else(|| ExporterError::OrganizationNotFound(organization.to_string()))?
            .pipelines;

        if pipelines.page_info.is_some_and(|p| p.has_next_page) {
            warn!(
                "Organization '{organization}' has {} pipelines, only the first {PIPELINES_PAGE_SIZE} are exported",
                pipelines
                    .count
                    .map_or_else(|| "more".to_string(), |c| c.to_string())
            );
        }

        debug!(
            "Decoded {} pipeline edges for '{organization}'",
            pipelines.edges.len()
        );

        pipelines
            .edges
            .into_iter()
            .map(|edge| pipeline_stats_from_node(edge.node))
            .collect()
    }
}
