/// Number of builds a pipeline has in one build state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStat {
    /// State alias as returned in the response (lower-cased, e.g. "passed")
    pub state: String,
    pub count: u64,
}

/// Build counts for a single pipeline, in response order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Pipeline slug (e.g. "web")
    pub slug: String,
    pub stats: Vec<BuildStat>,
}
