//! Domain-specific errors for ARM operations

use arm_schema::ConstraintError;
use thiserror::Error;

/// Error kinds surfaced to the CLI; each maps to an exit-code band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown registry/sink, duplicates, malformed input.
    Configuration,
    /// No matching version, not found.
    Resolution,
    /// Lockfile integrity mismatch.
    Integrity,
    /// Network or subprocess failure.
    Transport,
    /// Local I/O failure.
    Filesystem,
    /// YAML/JSON or archive content errors.
    Parsing,
    /// Cancelled or deadline exceeded.
    Cancelled,
}

#[derive(Error, Debug)]
pub enum ArmError {
    #[error("{0}")]
    Config(String),

    #[error("no matching version for constraint {0}")]
    NoMatchingVersion(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("integrity verification failed for {package}. Expected: {expected} Got: {got}")]
    IntegrityMismatch {
        package: String,
        expected: String,
        got: String,
    },

    #[error("{0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path}: {message}")]
    Parse { path: String, message: String },

    #[error("archive {path}: {message}")]
    Archive { path: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out")]
    Timeout,

    #[error("{coordinate}: {source}")]
    Package {
        coordinate: String,
        source: Box<ArmError>,
    },
}

/// Result alias used throughout the core crate.
pub type Result<T, E = ArmError> = std::result::Result<T, E>;

impl ArmError {
    /// Configuration error from any message.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Parsing error attributed to `path`.
    pub fn parse(path: impl Into<String>, msg: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: msg.to_string(),
        }
    }

    /// Attach a `<registry>/<pkg>[@<version>]` coordinate.
    ///
    /// Already-attributed errors are returned unchanged so coordinates do
    /// not stack up as the error travels outward.
    pub fn for_package(self, coordinate: impl Into<String>) -> Self {
        match self {
            Self::Package { .. } | Self::Cancelled => self,
            other => Self::Package {
                coordinate: coordinate.into(),
                source: Box::new(other),
            },
        }
    }

    /// Classify for exit-code mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::NoMatchingVersion(_) | Self::NotFound(_) => ErrorKind::Resolution,
            Self::IntegrityMismatch { .. } => ErrorKind::Integrity,
            Self::Transport(_) | Self::Http(_) => ErrorKind::Transport,
            Self::Io(_) => ErrorKind::Filesystem,
            Self::Parse { .. } | Self::Archive { .. } | Self::Json(_) => ErrorKind::Parsing,
            Self::Cancelled | Self::Timeout => ErrorKind::Cancelled,
            Self::Package { source, .. } => source.kind(),
        }
    }

    /// Whether this is a cache/registry miss rather than a failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Package { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<ConstraintError> for ArmError {
    fn from(err: ConstraintError) -> Self {
        match err {
            ConstraintError::NoMatch(c) => Self::NoMatchingVersion(c),
            ConstraintError::NoCandidates => Self::NotFound("no versions available".into()),
            other => Self::Config(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_message_carries_both_hashes() {
        let err = ArmError::IntegrityMismatch {
            package: "reg/pkg@v1.0.0".into(),
            expected: "sha256-aaa".into(),
            got: "sha256-bbb".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("integrity verification failed"));
        assert!(msg.contains("Expected: sha256-aaa"));
        assert!(msg.contains("Got: sha256-bbb"));
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn package_wrapping_keeps_kind_and_does_not_stack() {
        let err = ArmError::NotFound("v9".into())
            .for_package("reg/pkg")
            .for_package("other");
        assert_eq!(err.to_string(), "reg/pkg: not found: v9");
        assert!(err.is_not_found());
        assert_eq!(err.kind(), ErrorKind::Resolution);
    }

    #[test]
    fn constraint_errors_map_to_kinds() {
        let err: ArmError = ConstraintError::NoMatch("^3.0.0".into()).into();
        assert_eq!(err.to_string(), "no matching version for constraint ^3.0.0");
        let err: ArmError = ConstraintError::Empty.into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
