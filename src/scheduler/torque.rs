//! Torque back-end: a job script per sample, submitted with `qsub`.

use async_trait::async_trait;
use tera::{Context, Tera};
use tracing::debug;

use super::backend::{
    run_submission, GridBackend, GridKind, JobScript, PreparedSubmission, SubmissionOutput,
};
use super::job::{check_token, check_walltime, GridJobSpec};
use crate::error::{DispatchError, SubmissionFailure};

const SCRIPT_TEMPLATE: &str = "#!/bin/sh
#PBS -V -d . -w . -l mem={{ memory }}gb,nodes=1:ppn={{ threads }},walltime={{ walltime }}{% if reservation %},advres={{ reservation }}{% endif %} -N {{ job_name }} -W group_list={{ group }} -A {{ group }}
{{ command }}
";

/// Submits jobs with `qsub`.
pub struct TorqueBackend {
    program: String,
    script_name: String,
    require_reservation: bool,
}

impl TorqueBackend {
    pub fn new(program: impl Into<String>, script_name: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            script_name: script_name.into(),
            require_reservation: false,
        }
    }

    /// Refuse job specs without an advance reservation.
    pub fn with_require_reservation(mut self, required: bool) -> Self {
        self.require_reservation = required;
        self
    }

    /// Renders the job script for a job spec.
    pub fn render_script(&self, spec: &GridJobSpec) -> Result<String, DispatchError> {
        let res = &spec.resources;
        let memory = spec.required("memory", &res.memory_gb)?;
        let threads = spec.required("threads", &res.threads)?;
        let walltime = spec.required("walltime", &res.walltime)?;
        check_walltime(walltime)?;
        let group = spec.required("group", &res.group)?;
        check_token("group", group)?;

        let reservation = if self.require_reservation {
            Some(spec.required("reservation", &res.reservation)?)
        } else {
            res.reservation.as_ref()
        };
        if let Some(reservation) = reservation {
            check_token("reservation", reservation)?;
        }

        let mut context = Context::new();
        context.insert("memory", memory);
        context.insert("threads", threads);
        context.insert("walltime", walltime);
        context.insert("reservation", &reservation);
        context.insert("job_name", &spec.job_name());
        context.insert("group", group);
        context.insert("command", &spec.command.text);

        Ok(Tera::one_off(SCRIPT_TEMPLATE, &context, false)?)
    }
}

#[async_trait]
impl GridBackend for TorqueBackend {
    fn kind(&self) -> GridKind {
        GridKind::Torque
    }

    fn prepare(&self, spec: &GridJobSpec) -> Result<PreparedSubmission, DispatchError> {
        let contents = self.render_script(spec)?;
        let path = spec.command.run_directory.join(&self.script_name);

        Ok(PreparedSubmission {
            sample_name: spec.sample_name().to_string(),
            program: self.program.clone(),
            args: vec![path.to_string_lossy().into_owned()],
            working_dir: spec.command.run_directory.clone(),
            script: Some(JobScript { path, contents }),
            command: spec.command.text.clone(),
        })
    }

    async fn submit(&self, job: &PreparedSubmission) -> Result<SubmissionOutput, SubmissionFailure> {
        if let Some(script) = &job.script {
            tokio::fs::write(&script.path, &script.contents)
                .await
                .map_err(|source| SubmissionFailure::ScriptWrite {
                    path: script.path.clone(),
                    source,
                })?;
            debug!("Wrote job script {}", script.path.display());
        }
        run_submission(job).await
    }
}
