use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while loading, validating or resolving a manifest.
///
/// All of these are configuration errors: nothing is retried and no partial
/// plan is ever produced.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse TOML manifest: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{kind} name cannot be empty")]
    EmptyName { kind: &'static str },

    #[error("invalid version '{version}' for {owner}: {reason}")]
    InvalidVersion {
        owner: String,
        version: String,
        reason: String,
    },

    #[error("manifest declares no platforms")]
    NoPlatformsDeclared,

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("'{from}' depends on unknown target '{missing}'")]
    UnresolvedDependency { from: String, missing: String },

    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("platform '{0}' is not declared by the manifest")]
    UnknownPlatform(String),

    #[error("product '{0}' is not declared by the manifest")]
    UnknownProduct(String),

    #[error("cannot merge manifests of different packages: '{left}' and '{right}'")]
    PackageNameMismatch { left: String, right: String },

    #[error("target '{target}' points at missing path {}", .path.display())]
    MissingPath { target: String, path: PathBuf },
}

pub type Result<T, E = ManifestError> = std::result::Result<T, E>;
