//! Error types for bifrost-monitor operations.
//!
//! Defines the error taxonomy for every stage between the data source and
//! the grid scheduler:
//! - Status vocabulary lookups and aggregation
//! - Data-access collaborator failures
//! - Job spec construction ahead of dispatch
//! - Per-sample scheduler submissions

use std::path::PathBuf;

use thiserror::Error;

/// A raw component status outside the fixed vocabulary.
///
/// Signals schema drift between the data source and this engine, so it is
/// never defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown component status '{0}'")]
pub struct UnknownStatus(pub String);

/// Errors raised by the data-access collaborator.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read snapshot '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data source unavailable: {0}")]
    Unavailable(String),
}

/// Errors that stop a status aggregation call.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Sample '{sample}' component '{component}': {source}")]
    UnknownStatus {
        sample: String,
        component: String,
        #[source]
        source: UnknownStatus,
    },

    #[error("Sample '{0}' missing from data source response")]
    MissingSample(String),

    #[error("Data source error: {0}")]
    Source(#[from] SourceError),
}

/// Errors that abort a dispatch before any job reaches the scheduler.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Malformed job spec for sample '{sample}': {reason}")]
    MalformedJobSpec { sample: String, reason: String },

    #[error("Sample '{0}' missing from data source response")]
    MissingSample(String),

    #[error("Component '{0}' is not in the component catalog")]
    UnknownComponent(String),

    #[error("Invalid {kind} '{value}': only letters, digits, '_', '.' and '-' are allowed")]
    InvalidToken { kind: &'static str, value: String },

    #[error("Invalid walltime '{0}': expected digits separated by ':' and an optional 'days-' prefix")]
    InvalidWalltime(String),

    #[error("Failed to render job script: {0}")]
    Template(#[from] tera::Error),

    #[error("Data source error: {0}")]
    Source(#[from] SourceError),
}

/// A failed submission for one sample.
///
/// Recovered by the dispatcher and recorded in the dispatch summary; the
/// remaining samples are still submitted.
#[derive(Debug, Error)]
pub enum SubmissionFailure {
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("exit code {code}")]
    NonZeroExit {
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("scheduler reported errors")]
    Stderr { stdout: String, stderr: String },

    #[error("failed to write job script '{path}': {source}")]
    ScriptWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SubmissionFailure {
    /// Captured stdout, when the scheduler produced any.
    pub fn stdout(&self) -> &str {
        match self {
            SubmissionFailure::NonZeroExit { stdout, .. }
            | SubmissionFailure::Stderr { stdout, .. } => stdout,
            _ => "",
        }
    }

    /// Captured stderr. Empty when no process output was captured.
    pub fn stderr(&self) -> &str {
        match self {
            SubmissionFailure::NonZeroExit { stderr, .. }
            | SubmissionFailure::Stderr { stderr, .. } => stderr,
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_display() {
        let err = UnknownStatus("Exploded".to_string());
        assert!(err.to_string().contains("Exploded"));
    }

    #[test]
    fn test_aggregation_error_keeps_context() {
        let err = AggregationError::UnknownStatus {
            sample: "S1".to_string(),
            component: "assemblatron".to_string(),
            source: UnknownStatus("weird".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("S1"));
        assert!(msg.contains("assemblatron"));
        assert!(msg.contains("weird"));
    }

    #[test]
    fn test_submission_failure_captured_output() {
        let err = SubmissionFailure::NonZeroExit {
            code: 1,
            stdout: "partial".to_string(),
            stderr: "sbatch: error: invalid partition".to_string(),
        };
        assert_eq!(err.stdout(), "partial");
        assert!(err.stderr().contains("invalid partition"));
        assert_eq!(err.to_string(), "exit code 1");

        let err = SubmissionFailure::Spawn {
            program: "sbatch".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.stdout(), "");
        assert_eq!(err.stderr(), "");
        assert!(err.to_string().contains("sbatch"));
    }
}
