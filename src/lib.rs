//! bifrost-monitor: pipeline status aggregation and rerun dispatch.
//!
//! This library turns per-sample component states and QC stamps into a
//! status table, lets an operator stage component reruns, and submits the
//! staged reruns to a grid scheduler.

// Core modules
pub mod cli;
pub mod config;
pub mod error;
pub mod rerun;
pub mod scheduler;
pub mod status;
pub mod storage;

// Re-export commonly used types
pub use config::{ConfigError, MonitorConfig};
pub use error::{AggregationError, DispatchError, SourceError, SubmissionFailure, UnknownStatus};
pub use rerun::{RerunRequestRow, RerunRequestStore, StagingAction};
pub use scheduler::{DispatchReport, GridDispatcher, GridKind};
pub use status::{StatusAggregator, StatusReport};
pub use storage::{SampleSource, SnapshotSource};
