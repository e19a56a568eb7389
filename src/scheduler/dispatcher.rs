//! Rerun dispatch.
//!
//! A dispatch reads the staging store once, builds and prepares a job for
//! every sample, and only then submits them one after another. Build and
//! prepare errors abort before anything reaches the scheduler; a failed
//! submission is recorded and the loop moves on.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::backend::{create_backend, GridBackend, PreparedSubmission};
use super::job::{GridJobSpec, JobCommandBuilder, ResourceParams};
use crate::config::MonitorConfig;
use crate::error::DispatchError;
use crate::rerun::RerunRequestStore;
use crate::storage::SampleSource;

/// First line of every dispatch summary.
pub const SUMMARY_HEADER: &str = "Jobs sent to the server:\n";

/// Outcome of one sample's submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub sample_name: String,
    pub stdout: String,
    pub stderr: String,
    /// Failure description, if the submission failed.
    pub failure: Option<String>,
}

impl SubmissionRecord {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// One summary line for this record.
    pub fn summary_line(&self) -> String {
        match &self.failure {
            None => format!(
                "{}: out: {} | err: {}",
                self.sample_name, self.stdout, self.stderr
            ),
            Some(reason) => format!(
                "{}: FAILED ({}): out: {} | err: {}",
                self.sample_name, reason, self.stdout, self.stderr
            ),
        }
    }
}

/// Result of a dispatch, handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub run_id: String,
    pub records: Vec<SubmissionRecord>,
    pub summary: String,
    /// Whether at least one submission was attempted.
    pub show_notification: bool,
}

impl DispatchReport {
    fn from_records(run_id: String, records: Vec<SubmissionRecord>) -> Self {
        let lines: Vec<String> = records.iter().map(SubmissionRecord::summary_line).collect();
        let summary = format!("{}{}", SUMMARY_HEADER, lines.join("\n"));
        let show_notification = !records.is_empty();
        Self {
            run_id,
            records,
            summary,
            show_notification,
        }
    }

    pub fn failed(&self) -> usize {
        self.records.iter().filter(|r| !r.is_success()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.records.len() - self.failed()
    }
}

/// Turns staged rerun requests into scheduler submissions.
pub struct GridDispatcher {
    backend: Box<dyn GridBackend>,
    builder: JobCommandBuilder,
    resources: ResourceParams,
}

impl GridDispatcher {
    /// Creates a dispatcher using the back-end selected by `config`.
    pub fn new(config: &MonitorConfig) -> Self {
        Self::with_backend(config, create_backend(config))
    }

    /// Creates a dispatcher with an explicit back-end.
    pub fn with_backend(config: &MonitorConfig, backend: Box<dyn GridBackend>) -> Self {
        Self {
            backend,
            builder: JobCommandBuilder::from_config(config),
            resources: ResourceParams::from_config(config),
        }
    }

    pub fn backend(&self) -> &dyn GridBackend {
        self.backend.as_ref()
    }

    /// Builds and prepares one submission per staged sample.
    ///
    /// Does not touch the store or the scheduler.
    pub async fn plan(
        &self,
        store: &RerunRequestStore,
        source: &dyn SampleSource,
    ) -> Result<Vec<PreparedSubmission>, DispatchError> {
        let requests = store.by_sample();
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = requests.iter().map(|(s, _)| s.id.clone()).collect();
        let samples = source.get_samples(&ids).await?;
        let commands = self.builder.build(&requests, &samples)?;

        commands
            .into_iter()
            .map(|command| {
                let spec = GridJobSpec::new(command, self.resources.clone());
                self.backend.prepare(&spec)
            })
            .collect()
    }

    /// Dispatches everything in the store.
    ///
    /// The store is cleared once every job has been prepared. On error it
    /// is left untouched and nothing has been submitted.
    pub async fn dispatch(
        &self,
        store: &mut RerunRequestStore,
        source: &dyn SampleSource,
    ) -> Result<DispatchReport, DispatchError> {
        let run_id = Uuid::new_v4().to_string();
        let jobs = self.plan(store, source).await?;
        store.clear();

        info!(
            "Dispatch {}: submitting {} jobs via {}",
            run_id,
            jobs.len(),
            self.backend.kind()
        );

        let mut records = Vec::with_capacity(jobs.len());
        for job in &jobs {
            let record = match self.backend.submit(job).await {
                Ok(output) => {
                    info!("Submitted rerun for {}", job.sample_name);
                    SubmissionRecord {
                        sample_name: job.sample_name.clone(),
                        stdout: output.stdout,
                        stderr: output.stderr,
                        failure: None,
                    }
                }
                Err(failure) => {
                    error!("Submission for {} failed: {}", job.sample_name, failure);
                    SubmissionRecord {
                        sample_name: job.sample_name.clone(),
                        stdout: failure.stdout().to_string(),
                        stderr: failure.stderr().to_string(),
                        failure: Some(failure.to_string()),
                    }
                }
            };
            records.push(record);
        }

        let report = DispatchReport::from_records(run_id, records);
        if report.failed() > 0 {
            warn!(
                "Dispatch {}: {} of {} submissions failed",
                report.run_id,
                report.failed(),
                report.records.len()
            );
        }
        Ok(report)
    }
}
