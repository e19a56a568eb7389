//! Dry-run back-end: logs what would be submitted.

use async_trait::async_trait;
use tracing::info;

use super::backend::{GridBackend, GridKind, PreparedSubmission, SubmissionOutput};
use super::job::GridJobSpec;
use crate::error::{DispatchError, SubmissionFailure};

/// Records submissions without contacting a scheduler.
///
/// Resource parameters are optional here; the reported stdout is the
/// composed command text.
#[derive(Debug, Default)]
pub struct DryRunBackend;

impl DryRunBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GridBackend for DryRunBackend {
    fn kind(&self) -> GridKind {
        GridKind::DryRun
    }

    fn prepare(&self, spec: &GridJobSpec) -> Result<PreparedSubmission, DispatchError> {
        Ok(PreparedSubmission {
            sample_name: spec.sample_name().to_string(),
            program: "sbatch".to_string(),
            args: vec![
                "-J".to_string(),
                spec.job_name(),
                "--wrap".to_string(),
                spec.command.text.clone(),
            ],
            working_dir: spec.command.run_directory.clone(),
            script: None,
            command: spec.command.text.clone(),
        })
    }

    async fn submit(&self, job: &PreparedSubmission) -> Result<SubmissionOutput, SubmissionFailure> {
        info!(
            "[dry-run] {} (in {})",
            job.command_line(),
            job.working_dir.display()
        );
        Ok(SubmissionOutput {
            stdout: job.command.clone(),
            stderr: String::new(),
            exit_code: 0,
        })
    }
}
