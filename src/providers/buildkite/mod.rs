mod client;
mod provider;
mod types;


pub use client::BuildkiteClient;
pub use provider::BuildkiteProvider;
pub use types::{BuildStat, PipelineStats};
