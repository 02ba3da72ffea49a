mod builds;
mod core;
mod states;

pub use self::core::BuildkiteClient;
