//! File-backed and in-memory sample source.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::documents::{ComponentStatusDoc, SampleDoc};
use super::SampleSource;
use crate::error::SourceError;

/// A frozen export of the backing store.
///
/// Lookups return documents in the order the ids were requested; unknown
/// ids are skipped so that callers can detect them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotSource {
    #[serde(default)]
    pub samples: Vec<SampleDoc>,
    #[serde(default)]
    pub component_status: Vec<ComponentStatusDoc>,
}

impl SnapshotSource {
    pub fn new(samples: Vec<SampleDoc>, component_status: Vec<ComponentStatusDoc>) -> Self {
        Self {
            samples,
            component_status,
        }
    }

    /// Loads a JSON snapshot from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SourceError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let snapshot: Self = serde_json::from_str(&content)?;
        debug!(
            "Loaded snapshot {} ({} samples, {} status documents)",
            path.display(),
            snapshot.samples.len(),
            snapshot.component_status.len()
        );
        Ok(snapshot)
    }

    /// Ids of every sample in the snapshot.
    pub fn sample_ids(&self) -> Vec<String> {
        self.samples.iter().map(|s| s.id.clone()).collect()
    }
}

#[async_trait]
impl SampleSource for SnapshotSource {
    async fn get_component_status(
        &self,
        sample_ids: &[String],
    ) -> Result<Vec<ComponentStatusDoc>, SourceError> {
        Ok(sample_ids
            .iter()
            .filter_map(|id| self.component_status.iter().find(|d| &d.sample_id == id))
            .cloned()
            .collect())
    }

    async fn get_samples(&self, sample_ids: &[String]) -> Result<Vec<SampleDoc>, SourceError> {
        Ok(sample_ids
            .iter()
            .filter_map(|id| self.samples.iter().find(|s| &s.id == id))
            .cloned()
            .collect())
    }
}
