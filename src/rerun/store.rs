//! Staging store for rerun requests.
//!
//! Operators stage (sample, component) pairs through four controls. Each
//! control maps to one [`StagingAction`] variant; [`stage`] folds an action
//! into the current rows. Rows are unique on (sample id, component), so a
//! replayed action never adds anything.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::status::{is_fixed_column, ComponentCatalog, ComponentStatus, SampleRef, SampleStatusRow};

/// One pending rerun request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RerunRequestRow {
    pub sample_id: String,
    pub sample_name: String,
    pub component: String,
}

impl RerunRequestRow {
    pub fn new(sample: &SampleRef, component: impl Into<String>) -> Self {
        Self {
            sample_id: sample.id.clone(),
            sample_name: sample.name.clone(),
            component: component.into(),
        }
    }

    pub fn sample_ref(&self) -> SampleRef {
        SampleRef::new(&self.sample_id, &self.sample_name)
    }

    fn key(&self) -> (String, String) {
        (self.sample_id.clone(), self.component.clone())
    }
}

/// An operator action, tagged by the control that fired it.
#[derive(Debug, Clone)]
pub enum StagingAction<'a> {
    /// A status table cell was clicked.
    CellSelected { sample: SampleRef, component: String },
    /// "Add all components for sample".
    AddAllComponentsForSample {
        sample: SampleRef,
        catalog: &'a ComponentCatalog,
    },
    /// "Add component for all samples".
    AddComponentForAllSamples {
        component: String,
        visible_rows: &'a [SampleStatusRow],
    },
    /// "Add all failed components".
    AddAllFailedForAllSamples {
        visible_rows: &'a [SampleStatusRow],
        catalog: &'a ComponentCatalog,
    },
}

impl StagingAction<'_> {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            StagingAction::CellSelected { .. } => "cell_selected",
            StagingAction::AddAllComponentsForSample { .. } => "add_all_components_for_sample",
            StagingAction::AddComponentForAllSamples { .. } => "add_component_for_all_samples",
            StagingAction::AddAllFailedForAllSamples { .. } => "add_all_failed_for_all_samples",
        }
    }

    /// The pairs this action asks for, in staging order.
    pub fn requested_rows(&self) -> Vec<RerunRequestRow> {
        match self {
            StagingAction::CellSelected { sample, component } => {
                if is_fixed_column(component) {
                    Vec::new()
                } else {
                    vec![RerunRequestRow::new(sample, component.as_str())]
                }
            }
            StagingAction::AddAllComponentsForSample { sample, catalog } => catalog
                .iter()
                .map(|component| RerunRequestRow::new(sample, component))
                .collect(),
            StagingAction::AddComponentForAllSamples {
                component,
                visible_rows,
            } => visible_rows
                .iter()
                .map(|row| RerunRequestRow::new(&row.sample_ref(), component.as_str()))
                .collect(),
            StagingAction::AddAllFailedForAllSamples {
                visible_rows,
                catalog,
            } => {
                let failed = ComponentStatus::Failure.display_code();
                let mut rows = Vec::new();
                for row in visible_rows.iter() {
                    for component in catalog.iter() {
                        if row.code(component) == failed {
                            rows.push(RerunRequestRow::new(&row.sample_ref(), component));
                        }
                    }
                }
                rows
            }
        }
    }
}

/// Folds `action` into `current`, skipping pairs that are already staged.
pub fn stage(mut current: Vec<RerunRequestRow>, action: &StagingAction<'_>) -> Vec<RerunRequestRow> {
    let mut keys: HashSet<(String, String)> = current.iter().map(RerunRequestRow::key).collect();
    for row in action.requested_rows() {
        if keys.insert(row.key()) {
            current.push(row);
        }
    }
    current
}

/// Process-scoped set of pending rerun requests.
#[derive(Debug, Clone, Default)]
pub struct RerunRequestStore {
    rows: Vec<RerunRequestRow>,
}

impl RerunRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a staging action. Returns how many rows were added.
    pub fn apply(&mut self, action: &StagingAction<'_>) -> usize {
        let before = self.rows.len();
        self.rows = stage(std::mem::take(&mut self.rows), action);
        let added = self.rows.len() - before;
        debug!(
            "Staging action {} added {} rows ({} total)",
            action.name(),
            added,
            self.rows.len()
        );
        added
    }

    /// Replaces the store with what the presentation layer still shows.
    ///
    /// Order is kept as given. Repeated pairs keep their first occurrence.
    pub fn reconcile(&mut self, remaining: Vec<RerunRequestRow>) {
        let mut keys = HashSet::new();
        let given = remaining.len();
        self.rows = remaining
            .into_iter()
            .filter(|row| keys.insert(row.key()))
            .collect();
        if self.rows.len() != given {
            warn!(
                "Dropped {} repeated rows while reconciling rerun requests",
                given - self.rows.len()
            );
        }
    }

    pub fn rows(&self) -> &[RerunRequestRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, sample_id: &str, component: &str) -> bool {
        self.rows
            .iter()
            .any(|r| r.sample_id == sample_id && r.component == component)
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Requested components per sample, both in staging order.
    pub fn by_sample(&self) -> Vec<(SampleRef, Vec<String>)> {
        let mut grouped: Vec<(SampleRef, Vec<String>)> = Vec::new();
        for row in &self.rows {
            match grouped.iter().position(|(s, _)| s.id == row.sample_id) {
                Some(i) => grouped[i].1.push(row.component.clone()),
                None => grouped.push((row.sample_ref(), vec![row.component.clone()])),
            }
        }
        grouped
    }
}
