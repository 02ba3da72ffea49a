pub mod buildkite;

pub use buildkite::{BuildkiteProvider, PipelineStats};
