//! Slurm back-end: one `sbatch --wrap` call per sample.

use async_trait::async_trait;

use super::backend::{run_submission, GridBackend, GridKind, PreparedSubmission, SubmissionOutput};
use super::job::GridJobSpec;
use crate::error::{DispatchError, SubmissionFailure};

/// Submits jobs with `sbatch`.
pub struct SlurmBackend {
    program: String,
}

impl SlurmBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `sbatch` arguments for a job spec.
    pub fn build_args(&self, spec: &GridJobSpec) -> Result<Vec<String>, DispatchError> {
        let res = &spec.resources;
        let memory = spec.required("memory", &res.memory_gb)?;
        let priority = spec.required("priority", &res.priority)?;
        let threads = spec.required("threads", &res.threads)?;
        let walltime = spec.required("walltime", &res.walltime)?;

        Ok(vec![
            format!("--mem={}G", memory),
            "-p".to_string(),
            priority.clone(),
            "-c".to_string(),
            threads.to_string(),
            "-t".to_string(),
            walltime.clone(),
            "-J".to_string(),
            spec.job_name(),
            "--wrap".to_string(),
            spec.command.text.clone(),
        ])
    }
}

#[async_trait]
impl GridBackend for SlurmBackend {
    fn kind(&self) -> GridKind {
        GridKind::Slurm
    }

    fn prepare(&self, spec: &GridJobSpec) -> Result<PreparedSubmission, DispatchError> {
        Ok(PreparedSubmission {
            sample_name: spec.sample_name().to_string(),
            program: self.program.clone(),
            args: self.build_args(spec)?,
            working_dir: spec.command.run_directory.clone(),
            script: None,
            command: spec.command.text.clone(),
        })
    }

    async fn submit(&self, job: &PreparedSubmission) -> Result<SubmissionOutput, SubmissionFailure> {
        run_submission(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::job::{ResourceParams, SampleCommand};
    use crate::status::SampleRef;

    fn spec(resources: ResourceParams) -> GridJobSpec {
        GridJobSpec::new(
            SampleCommand {
                sample: SampleRef::new("1", "S1"),
                run_directory: "/runs/r1/S1".into(),
                components: vec!["analyzer".to_string()],
                steps: Vec::new(),
                text: "snakemake -s x; ".to_string(),
            },
            resources,
        )
    }

    fn full_resources() -> ResourceParams {
        ResourceParams {
            memory_gb: Some(16),
            priority: Some("daytime".to_string()),
            threads: Some(4),
            walltime: Some("12:00:00".to_string()),
            reservation: None,
            group: None,
        }
    }

    #[test]
    fn test_build_args() {
        let backend = SlurmBackend::new("sbatch");
        let args = backend.build_args(&spec(full_resources())).unwrap();
        assert_eq!(
            args,
            vec![
                "--mem=16G",
                "-p",
                "daytime",
                "-c",
                "4",
                "-t",
                "12:00:00",
                "-J",
                "bifrost_S1",
                "--wrap",
                "snakemake -s x; ",
            ]
        );
    }

    #[test]
    fn test_prepare_uses_run_directory() {
        let job = SlurmBackend::new("sbatch").prepare(&spec(full_resources())).unwrap();
        assert_eq!(job.program, "sbatch");
        assert_eq!(job.working_dir, std::path::PathBuf::from("/runs/r1/S1"));
        assert!(job.script.is_none());
    }

    #[test]
    fn test_missing_walltime_is_malformed() {
        let resources = ResourceParams {
            walltime: None,
            ..full_resources()
        };
        let err = SlurmBackend::new("sbatch").prepare(&spec(resources)).unwrap_err();
        assert!(matches!(err, DispatchError::MalformedJobSpec { ref reason, .. } if reason.contains("walltime")));
    }
}
