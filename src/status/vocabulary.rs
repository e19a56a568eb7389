//! Component execution states and their display codes.

use serde::{Deserialize, Serialize};

use crate::error::UnknownStatus;

/// Display code for a component that has no status document for a sample.
pub const NOT_RUN_CODE: &str = "None";

/// Execution state of one pipeline component for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Success,
    Running,
    Initialized,
    Failure,
    RequirementsNotMet,
    Queued,
}

impl ComponentStatus {
    /// Every status, in the order the legend lists them.
    pub const ALL: [ComponentStatus; 6] = [
        ComponentStatus::Success,
        ComponentStatus::Running,
        ComponentStatus::Initialized,
        ComponentStatus::Failure,
        ComponentStatus::RequirementsNotMet,
        ComponentStatus::Queued,
    ];

    /// Short code shown in the status table.
    pub fn display_code(&self) -> &'static str {
        match self {
            ComponentStatus::Success => "OK",
            ComponentStatus::Running => "Running",
            ComponentStatus::Initialized => "Init.",
            ComponentStatus::Failure => "Fail",
            ComponentStatus::RequirementsNotMet => "Req.",
            ComponentStatus::Queued => "Queue",
        }
    }

    /// The value the pipeline writes into the backing store.
    pub fn raw_value(&self) -> &'static str {
        match self {
            ComponentStatus::Success => "Success",
            ComponentStatus::Running => "Running",
            ComponentStatus::Initialized => "initialized",
            ComponentStatus::Failure => "Failure",
            ComponentStatus::RequirementsNotMet => "Requirements not met",
            ComponentStatus::Queued => "queued to run",
        }
    }
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_code())
    }
}

impl std::str::FromStr for ComponentStatus {
    type Err = UnknownStatus;

    /// Parses a raw status exactly as the pipeline stores it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Success" => Ok(ComponentStatus::Success),
            "Running" => Ok(ComponentStatus::Running),
            "initialized" => Ok(ComponentStatus::Initialized),
            "Failure" => Ok(ComponentStatus::Failure),
            "Requirements not met" => Ok(ComponentStatus::RequirementsNotMet),
            "queued to run" => Ok(ComponentStatus::Queued),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
