//! QC verdict resolution.
//!
//! A sample carries at most one automated stamp (written by `ssi_stamper`)
//! and at most one expert stamp (written by the supplying-lab check). When
//! the expert stamp has a value it wins, and the displayed code is marked
//! with [`OVERRIDE_MARKER`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Appended to the QC code when an expert stamp was authoritative.
pub const OVERRIDE_MARKER: &str = "*";

/// Who recorded a QC stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampOrigin {
    Automated,
    Expert,
}

/// A recorded QC verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QcStamp {
    /// Verdict such as `pass:OK` or `fail:supplying lab`. May be null.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, alias = "date")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl QcStamp {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            user: None,
            timestamp: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// The stamps attached to one sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StampSet {
    #[serde(default, rename = "ssi_stamper", skip_serializing_if = "Option::is_none")]
    pub automated: Option<QcStamp>,
    #[serde(
        default,
        rename = "supplying_lab_check",
        skip_serializing_if = "Option::is_none"
    )]
    pub expert: Option<QcStamp>,
}

impl StampSet {
    pub fn automated_value(&self) -> Option<&str> {
        self.automated.as_ref().and_then(|s| s.value.as_deref())
    }

    pub fn expert_value(&self) -> Option<&str> {
        self.expert.as_ref().and_then(|s| s.value.as_deref())
    }

    /// Resolves the displayed QC verdict for these stamps.
    pub fn resolve(&self) -> QcResolution {
        resolve_qc(self.automated_value(), self.expert_value())
    }
}

/// How bad a verdict is, for styling and sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Fail,
    Warn,
    Unknown,
    Pass,
}

/// The verdict categories shown in the QC column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QcVerdict {
    Ok,
    CoreFacility,
    SupplyingLab,
    NotAvailable,
}

impl QcVerdict {
    /// Maps a stamp value onto a verdict. Unrecognized values are `NotAvailable`.
    pub fn from_stamp_value(value: Option<&str>) -> Self {
        match value {
            Some("fail:supplying lab") => QcVerdict::SupplyingLab,
            Some("fail:core facility") | Some("fail:resequence") => QcVerdict::CoreFacility,
            Some("pass:OK") | Some("pass:accepted") => QcVerdict::Ok,
            _ => QcVerdict::NotAvailable,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            QcVerdict::Ok => "OK",
            QcVerdict::CoreFacility => "CF",
            QcVerdict::SupplyingLab => "SL",
            QcVerdict::NotAvailable => "N/A",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            QcVerdict::Ok => Severity::Pass,
            QcVerdict::CoreFacility => Severity::Fail,
            QcVerdict::SupplyingLab => Severity::Warn,
            QcVerdict::NotAvailable => Severity::Unknown,
        }
    }
}

/// Outcome of resolving a sample's stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcResolution {
    pub verdict: QcVerdict,
    pub expert_override: bool,
    /// Stamp the verdict came from. `None` when neither stamp had a value.
    #[serde(default)]
    pub origin: Option<StampOrigin>,
}

impl QcResolution {
    /// Code for the QC column, e.g. `SL*`.
    pub fn display_code(&self) -> String {
        if self.expert_override {
            format!("{}{}", self.verdict.code(), OVERRIDE_MARKER)
        } else {
            self.verdict.code().to_string()
        }
    }

    pub fn severity(&self) -> Severity {
        self.verdict.severity()
    }

}

/// Resolves the displayed QC verdict. Total: every input yields a verdict.
pub fn resolve_qc(automated: Option<&str>, expert: Option<&str>) -> QcResolution {
    match expert {
        Some(value) => QcResolution {
            verdict: QcVerdict::from_stamp_value(Some(value)),
            expert_override: true,
            origin: Some(StampOrigin::Expert),
        },
        None => QcResolution {
            verdict: QcVerdict::from_stamp_value(automated),
            expert_override: false,
            origin: automated.map(|_| StampOrigin::Automated),
        },
    }
}
