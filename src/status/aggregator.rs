//! Builds the per-sample × per-component status table.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::catalog::ComponentCatalog;
use super::qc::QcResolution;
use super::vocabulary::{ComponentStatus, NOT_RUN_CODE};
use crate::error::AggregationError;
use crate::storage::{ComponentStatusDoc, SampleDoc, SampleSource};

/// Column id of the priority column.
pub const PRIORITY_COLUMN: &str = "priority";
/// Column id of the sample name column.
pub const SAMPLE_COLUMN: &str = "sample";
/// Column id of the QC column.
pub const QC_COLUMN: &str = "qc_val";

/// Demultiplexing leftovers, not a real sample.
pub const UNDETERMINED_SAMPLE: &str = "Undetermined";

const COLOR_FAIL: &str = "#ea6153";
const COLOR_PASS: &str = "#27ae60";
const COLOR_OK: &str = "#3498db";
const COLOR_WARN: &str = "#f1c40f";
const COLOR_MUTED_BG: &str = "#d3d3d3";
const COLOR_MUTED_TEXT: &str = "#525252";

/// Returns true for the leading columns that do not name a component.
pub fn is_fixed_column(column_id: &str) -> bool {
    matches!(column_id, PRIORITY_COLUMN | SAMPLE_COLUMN | QC_COLUMN)
}

/// Sample identity as carried by rows and dropdowns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleRef {
    pub id: String,
    pub name: String,
}

impl SampleRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Dropdown value, `<id>:<name>`.
    pub fn option_value(&self) -> String {
        format!("{}:{}", self.id, self.name)
    }

    /// Parses a dropdown value. Names may contain ':', ids may not.
    pub fn from_option_value(value: &str) -> Option<Self> {
        let (id, name) = value.split_once(':')?;
        if id.is_empty() {
            return None;
        }
        Some(Self::new(id, name))
    }
}

/// One table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStatusRow {
    pub sample_id: String,
    pub name: String,
    pub priority: String,
    pub qc: QcResolution,
    /// QC column text, e.g. `OK` or `SL*`.
    pub qc_code: String,
    /// Component name to display code.
    pub components: BTreeMap<String, String>,
}

impl SampleStatusRow {
    pub fn sample_ref(&self) -> SampleRef {
        SampleRef::new(&self.sample_id, &self.name)
    }

    /// Display code for a component, [`NOT_RUN_CODE`] when absent.
    pub fn code(&self, component: &str) -> &str {
        self.components
            .get(component)
            .map(String::as_str)
            .unwrap_or(NOT_RUN_CODE)
    }

    /// Text shown in the given column.
    pub fn cell(&self, column_id: &str) -> &str {
        match column_id {
            PRIORITY_COLUMN => &self.priority,
            SAMPLE_COLUMN => &self.name,
            QC_COLUMN => &self.qc_code,
            component => self.code(component),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub id: String,
    pub name: String,
}

impl ColumnDescriptor {
    fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Predicate of a styling rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum StyleCondition {
    Equals(String),
    Contains(String),
}

impl StyleCondition {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            StyleCondition::Equals(expected) => value == expected.as_str(),
            StyleCondition::Contains(fragment) => value.contains(fragment.as_str()),
        }
    }
}

/// Conditional cell styling for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRule {
    pub column_id: String,
    pub condition: StyleCondition,
    pub background_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl StyleRule {
    fn new(column_id: &str, condition: StyleCondition, background_color: &str) -> Self {
        Self {
            column_id: column_id.to_string(),
            condition,
            background_color: background_color.to_string(),
            color: None,
        }
    }

    fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    pub fn matches(&self, column_id: &str, value: &str) -> bool {
        self.column_id == column_id && self.condition.matches(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub label: String,
    pub value: String,
}

/// Everything the presentation layer needs to draw the status table and
/// the staging controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub rows: Vec<SampleStatusRow>,
    pub columns: Vec<ColumnDescriptor>,
    pub style_rules: Vec<StyleRule>,
    pub component_options: Vec<DropdownOption>,
    pub sample_options: Vec<DropdownOption>,
    pub catalog: ComponentCatalog,
}

impl StatusReport {
    pub fn row(&self, sample_id: &str) -> Option<&SampleStatusRow> {
        self.rows.iter().find(|r| r.sample_id == sample_id)
    }

    /// The rule that ends up styling a cell. Later rules take precedence.
    pub fn style_for(&self, column_id: &str, value: &str) -> Option<&StyleRule> {
        self.style_rules
            .iter()
            .rev()
            .find(|rule| rule.matches(column_id, value))
    }
}

/// Aggregates raw documents into a [`StatusReport`].
#[derive(Debug, Clone)]
pub struct StatusAggregator {
    canonical: Vec<String>,
}

impl StatusAggregator {
    /// Creates an aggregator with the canonical component order.
    pub fn new<S: Into<String>>(canonical: impl IntoIterator<Item = S>) -> Self {
        Self {
            canonical: canonical.into_iter().map(Into::into).collect(),
        }
    }

    /// Fetches the documents for `sample_ids` and aggregates them.
    pub async fn refresh(
        &self,
        source: &dyn SampleSource,
        sample_ids: &[String],
    ) -> Result<StatusReport, AggregationError> {
        let samples = source.get_samples(sample_ids).await?;
        let statuses = source.get_component_status(sample_ids).await?;
        self.aggregate(sample_ids, &statuses, &samples)
    }

    /// Builds the status table for `sample_ids`.
    ///
    /// Every requested id must have both a sample document and a status
    /// document. Unknown raw statuses abort the call.
    pub fn aggregate(
        &self,
        sample_ids: &[String],
        statuses: &[ComponentStatusDoc],
        samples: &[SampleDoc],
    ) -> Result<StatusReport, AggregationError> {
        let samples_by_id: HashMap<&str, &SampleDoc> =
            samples.iter().map(|s| (s.id.as_str(), s)).collect();
        let statuses_by_id: HashMap<&str, &ComponentStatusDoc> =
            statuses.iter().map(|d| (d.sample_id.as_str(), d)).collect();

        let mut requested: HashSet<&str> = HashSet::new();
        let mut kept: Vec<(&SampleDoc, &ComponentStatusDoc)> = Vec::new();
        for id in sample_ids {
            if !requested.insert(id.as_str()) {
                continue;
            }
            let sample = samples_by_id
                .get(id.as_str())
                .copied()
                .ok_or_else(|| AggregationError::MissingSample(id.clone()))?;
            if sample.name == UNDETERMINED_SAMPLE {
                continue;
            }
            let status = statuses_by_id
                .get(id.as_str())
                .copied()
                .ok_or_else(|| AggregationError::MissingSample(id.clone()))?;
            kept.push((sample, status));
        }

        let catalog = ComponentCatalog::from_observed(
            self.canonical.as_slice(),
            kept.iter()
                .flat_map(|(_, status)| status.components.keys()),
        );

        let mut rows = kept
            .iter()
            .map(|(sample, status)| build_row(sample, status, &catalog))
            .collect::<Result<Vec<_>, _>>()?;
        rows.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.sample_id.cmp(&b.sample_id))
        });

        debug!(
            "Aggregated {} rows over {} components",
            rows.len(),
            catalog.len()
        );

        Ok(StatusReport {
            columns: columns(&catalog),
            style_rules: style_rules(&catalog),
            component_options: catalog
                .iter()
                .map(|c| DropdownOption {
                    label: c.to_string(),
                    value: c.to_string(),
                })
                .collect(),
            sample_options: rows
                .iter()
                .map(|r| DropdownOption {
                    label: r.name.clone(),
                    value: r.sample_ref().option_value(),
                })
                .collect(),
            rows,
            catalog,
        })
    }
}

fn build_row(
    sample: &SampleDoc,
    status: &ComponentStatusDoc,
    catalog: &ComponentCatalog,
) -> Result<SampleStatusRow, AggregationError> {
    let qc = sample.stamps.resolve();

    let mut components = BTreeMap::new();
    for component in catalog.iter() {
        let code = match status.components.get(component) {
            Some(raw) => raw
                .parse::<ComponentStatus>()
                .map_err(|source| AggregationError::UnknownStatus {
                    sample: sample.name.clone(),
                    component: component.to_string(),
                    source,
                })?
                .display_code(),
            None => NOT_RUN_CODE,
        };
        components.insert(component.to_string(), code.to_string());
    }

    Ok(SampleStatusRow {
        sample_id: sample.id.clone(),
        name: sample.name.clone(),
        priority: sample
            .priority
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default(),
        qc_code: qc.display_code(),
        qc,
        components,
    })
}

fn columns(catalog: &ComponentCatalog) -> Vec<ColumnDescriptor> {
    let mut columns = vec![
        ColumnDescriptor::new(PRIORITY_COLUMN, "Priority"),
        ColumnDescriptor::new(SAMPLE_COLUMN, "Sample"),
        ColumnDescriptor::new(QC_COLUMN, "QC status"),
    ];
    columns.extend(catalog.iter().map(|c| ColumnDescriptor::new(c, c)));
    columns
}

fn style_rules(catalog: &ComponentCatalog) -> Vec<StyleRule> {
    let contains = |code: &str| StyleCondition::Contains(code.to_string());
    let equals = |status: ComponentStatus| StyleCondition::Equals(status.display_code().to_string());

    let mut rules = vec![
        StyleRule::new(QC_COLUMN, contains("CF"), COLOR_FAIL),
        StyleRule::new(QC_COLUMN, contains("OK"), COLOR_PASS),
        StyleRule::new(QC_COLUMN, contains("SL"), COLOR_WARN),
    ];
    for component in catalog.iter() {
        rules.push(StyleRule::new(component, equals(ComponentStatus::Failure), COLOR_FAIL));
        rules.push(StyleRule::new(component, equals(ComponentStatus::Success), COLOR_OK));
        rules.push(StyleRule::new(component, equals(ComponentStatus::Running), COLOR_WARN));
        rules.push(
            StyleRule::new(
                component,
                equals(ComponentStatus::RequirementsNotMet),
                COLOR_MUTED_BG,
            )
            .with_color(COLOR_MUTED_TEXT),
        );
    }
    rules
}
