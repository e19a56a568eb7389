//! Rerun dispatch to grid schedulers.
//!
//! This module turns staged rerun requests into scheduler submissions:
//!
//! - **JobCommandBuilder**: composes one sequential command per sample
//! - **GridBackend**: slurm, torque and dry-run submission
//! - **GridDispatcher**: builds every job, then submits them one by one
//!
//! # Architecture
//!
//! ```text
//!                ┌───────────────────┐
//!                │ RerunRequestStore │
//!                └─────────┬─────────┘
//!                          │ by_sample()
//!                ┌─────────▼─────────┐
//!                │ JobCommandBuilder │
//!                └─────────┬─────────┘
//!                          │ GridJobSpec
//!         ┌────────────────┼────────────────┐
//!         ▼                ▼                ▼
//!    ┌─────────┐      ┌─────────┐      ┌─────────┐
//!    │  slurm  │      │ torque  │      │ dry-run │
//!    └─────────┘      └─────────┘      └─────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use bifrost_monitor::config::MonitorConfig;
//! use bifrost_monitor::rerun::RerunRequestStore;
//! use bifrost_monitor::scheduler::GridDispatcher;
//! use bifrost_monitor::storage::SnapshotSource;
//!
//! let config = MonitorConfig::from_env()?;
//! let source = SnapshotSource::load("snapshot.json").await?;
//! let mut store = RerunRequestStore::new();
//! // ... stage requests ...
//!
//! let report = GridDispatcher::new(&config).dispatch(&mut store, &source).await?;
//! println!("{}", report.summary);
//! ```

pub mod backend;
pub mod dispatcher;
pub mod dry_run;
pub mod job;
pub mod slurm;
pub mod torque;

pub use backend::{
    create_backend, GridBackend, GridKind, JobScript, PreparedSubmission, SubmissionOutput,
};
pub use dispatcher::{DispatchReport, GridDispatcher, SubmissionRecord, SUMMARY_HEADER};
pub use dry_run::DryRunBackend;
pub use job::{
    is_valid_token, is_valid_walltime, shell_quote, CommandStep, GridJobSpec, JobCommandBuilder,
    ResourceParams, SampleCommand,
};
pub use slurm::SlurmBackend;
pub use torque::TorqueBackend;
