//! Error types for xref-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by identifier and gene stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store document exists but is not valid JSON for the expected shape.
    #[error("failed to parse store at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization failure while saving.
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store file was not found. Run `xrefsync init` to create one.
    #[error("store not found at {path}")]
    NotFound { path: PathBuf },

    /// The backing store refused or failed an operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while loading or saving [`crate::config::SyncConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with file path and serde_yaml line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// Semantically invalid configuration (e.g. empty pipeline name).
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
