//! Rerun request staging.

pub mod store;

pub use store::{stage, RerunRequestRow, RerunRequestStore, StagingAction};
