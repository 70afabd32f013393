pub mod error;
pub mod manifest;
pub mod graph;
pub mod platform_mapping;
pub mod plan;
pub mod resolver;
pub mod cli;

pub use error::ManifestError;
pub use manifest::Manifest;
pub use plan::BuildPlan;
pub use resolver::Resolver;
