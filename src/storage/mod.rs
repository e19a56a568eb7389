//! Data access for sample and component-status documents.
//!
//! The engine never talks to the backing store directly. It asks a
//! [`SampleSource`] for two document kinds:
//! - **ComponentStatusDoc**: raw per-component execution states of a sample
//! - **SampleDoc**: name, priority, QC stamps and run directory of a sample
//!
//! [`SnapshotSource`] serves both from a JSON export or from memory.

pub mod documents;
pub mod snapshot;

use async_trait::async_trait;

use crate::error::SourceError;

pub use documents::{ComponentStatusDoc, ComponentStatuses, SampleDoc};
pub use snapshot::SnapshotSource;

/// Read access to the backing store.
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Component-status documents for the given samples.
    async fn get_component_status(
        &self,
        sample_ids: &[String],
    ) -> Result<Vec<ComponentStatusDoc>, SourceError>;

    /// Sample documents for the given samples.
    async fn get_samples(&self, sample_ids: &[String]) -> Result<Vec<SampleDoc>, SourceError>;
}
