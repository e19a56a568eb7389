//! Pipeline status aggregation.
//!
//! Turns raw per-sample component states and QC stamps into the status
//! table shown to operators:
//!
//! - **vocabulary**: closed set of component states and their display codes
//! - **qc**: resolution of automated and expert QC stamps
//! - **catalog**: column order of the components
//! - **aggregator**: the table itself, with styling rules and dropdown options

pub mod aggregator;
pub mod catalog;
pub mod qc;
pub mod vocabulary;

pub use aggregator::{
    is_fixed_column, ColumnDescriptor, DropdownOption, SampleRef, SampleStatusRow,
    StatusAggregator, StatusReport, StyleCondition, StyleRule, QC_COLUMN, PRIORITY_COLUMN,
    SAMPLE_COLUMN, UNDETERMINED_SAMPLE,
};
pub use catalog::{ComponentCatalog, DEFAULT_COMPONENT_ORDER};
pub use qc::{resolve_qc, QcResolution, QcStamp, QcVerdict, Severity, StampOrigin, StampSet};
pub use vocabulary::{ComponentStatus, NOT_RUN_CODE};
