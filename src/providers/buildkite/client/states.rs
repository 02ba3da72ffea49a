use serde::Deserialize;

use super::core::BuildkiteClient;
use crate::error::Result;

pub(super) const BUILD_STATES_QUERY: &str = r#"
{
  __type(name: "BuildStates") {
    enumValues {
      name
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct BuildStatesData {
    #[serde(rename = "__type")]
    enum_type: Option<EnumType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnumType {
    #[serde(default)]
    enum_values: Option<Vec<EnumValue>>,
}

#[derive(Debug, Deserialize)]
struct EnumValue {
    name: String,
}

impl BuildkiteClient {
    /// Lists the members of the `BuildStates` enum via schema introspection.
    ///
    /// Names are returned as the schema spells them (e.g. `PASSED`). A schema
    /// without the type, or a type without members, yields an empty list.
    pub async fn fetch_build_states(&self) -> Result<Vec<String>> {
        let data: BuildStatesData = self.execute_graphql_request(BUILD_STATES_QUERY).await?;

        Ok(data
            .enum_type
            .and_then(|t| t.enum_values)
            .unwrap_or_default()
            .into_iter()
            .map(|v| v.name)
            .collect())
    }
}
