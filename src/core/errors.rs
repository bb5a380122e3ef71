//! AOPT-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, AoptError>;

/// Top-level error type for the asset optimizer.
///
/// Every variant is fatal to the run: there is no per-candidate continuation.
#[derive(Debug, Error)]
pub enum AoptError {
    #[error("[AOPT-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[AOPT-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[AOPT-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[AOPT-1101] missing required directory: {path}")]
    MissingRoot { path: PathBuf },

    #[error("[AOPT-1201] {first} and {second} would both be written to {output}")]
    OutputCollision {
        output: String,
        first: String,
        second: String,
    },

    #[error("[AOPT-2001] transcode failed for {path}: {details}")]
    Transcode { path: PathBuf, details: String },

    #[error("[AOPT-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[AOPT-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[AOPT-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl AoptError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "AOPT-1001",
            Self::MissingConfig { .. } => "AOPT-1002",
            Self::ConfigParse { .. } => "AOPT-1003",
            Self::MissingRoot { .. } => "AOPT-1101",
            Self::OutputCollision { .. } => "AOPT-1201",
            Self::Transcode { .. } => "AOPT-2001",
            Self::Serialization { .. } => "AOPT-2101",
            Self::Io { .. } => "AOPT-3002",
            Self::Runtime { .. } => "AOPT-3900",
        }
    }

    /// Whether re-running the tool might resolve the failure.
    ///
    /// Re-invocation is the only recovery path; already-written outputs are
    /// skipped on the next run.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Transcode { .. } | Self::Runtime { .. }
        )
    }

    /// Whether the failure stems from user input (flags, config, directory layout).
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::MissingRoot { .. }
                | Self::OutputCollision { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for AoptError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for AoptError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
