//! Error types shared across the pipeline.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures reaching or querying the attendance data source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The store could not be opened at all
    #[error("data source unreachable at {path}: {source}")]
    Connectivity {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("data source query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// A stored row could not be decoded
    #[error("corrupt row {id}: {reason}")]
    CorruptRow { id: String, reason: String },
}

/// Failures persisting or loading trained artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("artifact I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("artifact serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("artifact {} failed checksum verification", path.display())]
    Checksum { path: PathBuf },

    /// Artifact was trained on a different feature schema than the running extractor
    #[error("artifact {} has schema {found}, expected {expected}", path.display())]
    SchemaMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("artifact {} holds a {found} blob, expected {expected}", path.display())]
    WrongKind {
        path: PathBuf,
        expected: &'static str,
        found: String,
    },

    /// Clustering blobs from different training runs
    #[error("clustering artifacts come from different training runs")]
    InconsistentSet,
}

/// Failures fitting or invoking a model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("insufficient training data: {found} samples, at least {required} required")]
    InsufficientData { required: usize, found: usize },

    #[error("malformed feature {field}={value} in {id}")]
    MalformedFeature {
        id: String,
        field: &'static str,
        value: String,
    },

    #[error("expected {expected} features per row, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Top-level error reported by the service entry points.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// No rows to score. Only clustering treats this as an error.
    #[error("no data available for prediction")]
    EmptyResultSet,

    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    /// A blocking task panicked or was cancelled
    #[error("{operation} aborted: {reason}")]
    Aborted {
        operation: &'static str,
        reason: String,
    },
}

impl ServiceError {
    /// Stable snake_case identifier used in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Source(SourceError::Connectivity { .. }) => "connectivity",
            Self::Source(_) => "data_source",
            Self::Artifact(ArtifactError::NotFound { .. }) => "artifact_not_found",
            Self::Artifact(ArtifactError::Io { .. }) => "artifact_io",
            Self::Artifact(_) => "invalid_artifact",
            Self::Model(ModelError::InsufficientData { .. }) => "insufficient_data",
            Self::Model(ModelError::MalformedFeature { .. }) => "malformed_feature",
            Self::Model(_) => "model",
            Self::EmptyResultSet => "empty_result_set",
            Self::MissingArgument(_) => "missing_argument",
            Self::Timeout { .. } => "timeout",
            Self::Aborted { .. } => "aborted",
        }
    }

    /// True for failures of the surrounding infrastructure rather than of the data.
    /// These get a distinct exit status so callers can tell them from an empty result.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Source(_)
                | Self::Artifact(ArtifactError::Io { .. })
                | Self::Timeout { .. }
                | Self::Aborted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_is_logical_not_transport() {
        let e = ServiceError::from(ArtifactError::NotFound {
            path: PathBuf::from("models/v1/x.json"),
        });
        assert_eq!(e.kind(), "artifact_not_found");
        assert!(!e.is_transport());
    }

    #[test]
    fn timeout_is_transport() {
        let e = ServiceError::Timeout {
            operation: "fetch",
            limit: Duration::from_secs(1),
        };
        assert_eq!(e.kind(), "timeout");
        assert!(e.is_transport());
    }
}
