//! Grid scheduler back-ends.
//!
//! Each back-end knows how to:
//! 1. Turn a job spec into a concrete submission (argv, optional script)
//! 2. Hand that submission to its scheduler
//! 3. Report the scheduler's captured output

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use super::dry_run::DryRunBackend;
use super::job::GridJobSpec;
use super::slurm::SlurmBackend;
use super::torque::TorqueBackend;
use crate::config::MonitorConfig;
use crate::error::{DispatchError, SubmissionFailure};

/// Supported grid schedulers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridKind {
    /// Slurm, via `sbatch --wrap`.
    #[serde(rename = "slurm")]
    Slurm,
    /// Torque/PBS, via a job script and `qsub`.
    #[serde(rename = "torque")]
    Torque,
    /// Log the submission without contacting a scheduler.
    #[default]
    #[serde(rename = "dry-run", alias = "dry_run", alias = "mock", alias = "slurm.mock")]
    DryRun,
}

impl GridKind {
    /// Returns the display name for this grid.
    pub fn display_name(&self) -> &'static str {
        match self {
            GridKind::Slurm => "slurm",
            GridKind::Torque => "torque",
            GridKind::DryRun => "dry-run",
        }
    }
}

impl std::fmt::Display for GridKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for GridKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "slurm" => Ok(GridKind::Slurm),
            "torque" | "pbs" => Ok(GridKind::Torque),
            "dry-run" | "dry_run" | "dryrun" | "mock" | "slurm.mock" => Ok(GridKind::DryRun),
            other => Err(format!("Unknown grid type: {}", other)),
        }
    }
}

/// A job script to write before submitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobScript {
    pub path: PathBuf,
    pub contents: String,
}

/// A fully prepared submission for one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSubmission {
    pub sample_name: String,
    /// Executable to launch, without a shell.
    pub program: String,
    pub args: Vec<String>,
    /// The sample's run directory.
    pub working_dir: PathBuf,
    pub script: Option<JobScript>,
    /// The composed per-sample command text.
    pub command: String,
}

impl PreparedSubmission {
    /// The submission rendered as one line, for logs and dry runs.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&super::job::shell_quote(arg));
        }
        line
    }
}

/// Captured scheduler output for an accepted submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Trait for grid scheduler back-ends.
#[async_trait]
pub trait GridBackend: Send + Sync {
    /// Returns the grid type.
    fn kind(&self) -> GridKind;

    /// Builds the submission for one job spec.
    ///
    /// Runs before anything is submitted, so a failure here aborts the
    /// whole dispatch.
    fn prepare(&self, spec: &GridJobSpec) -> Result<PreparedSubmission, DispatchError>;

    /// Submits a prepared job.
    async fn submit(&self, job: &PreparedSubmission) -> Result<SubmissionOutput, SubmissionFailure>;
}

/// Creates the back-end selected by the configuration.
pub fn create_backend(config: &MonitorConfig) -> Box<dyn GridBackend> {
    match config.grid {
        GridKind::Slurm => Box::new(SlurmBackend::new(&config.sbatch_bin)),
        GridKind::Torque => Box::new(
            TorqueBackend::new(&config.qsub_bin, &config.script_name)
                .with_require_reservation(config.require_reservation),
        ),
        GridKind::DryRun => Box::new(DryRunBackend::new()),
    }
}

/// Launches a prepared submission and captures its output.
///
/// A non-zero exit or any stderr output counts as a failed submission.
pub(crate) async fn run_submission(
    job: &PreparedSubmission,
) -> Result<SubmissionOutput, SubmissionFailure> {
    let mut cmd = Command::new(&job.program);
    cmd.args(&job.args)
        .current_dir(&job.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    info!(
        "Submitting {} for {} in {}",
        job.program,
        job.sample_name,
        job.working_dir.display()
    );

    let output = cmd.output().await.map_err(|source| SubmissionFailure::Spawn {
        program: job.program.clone(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let exit_code = output.status.code().unwrap_or(-1);
    debug!("{} exited with {}", job.program, exit_code);

    if !output.status.success() {
        return Err(SubmissionFailure::NonZeroExit {
            code: exit_code,
            stdout,
            stderr,
        });
    }
    if !stderr.is_empty() {
        return Err(SubmissionFailure::Stderr { stdout, stderr });
    }

    Ok(SubmissionOutput {
        stdout,
        stderr,
        exit_code,
    })
}
