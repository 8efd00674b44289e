//! Corrective Action Form (CAF) domain model.
//!
//! A CAF is the remediation record for one violation (or a manually raised
//! issue). Its status moves through a fixed adjacency table; see
//! [`CafStatus::allowed_transitions`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FleetError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CafStatus {
    Assigned,
    InProgress,
    Completed,
    Approved,
    Rejected,
    Cancelled,
}

impl CafStatus {
    pub const ALL: [CafStatus; 6] = [
        Self::Assigned,
        Self::InProgress,
        Self::Completed,
        Self::Approved,
        Self::Rejected,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// States reachable from `self` in one step.
    pub fn allowed_transitions(self) -> &'static [CafStatus] {
        match self {
            Self::Assigned => &[Self::InProgress],
            Self::InProgress => &[Self::Completed, Self::Assigned],
            Self::Completed => &[Self::Approved, Self::Rejected, Self::InProgress],
            Self::Approved => &[],
            Self::Rejected => &[Self::InProgress],
            Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, to: CafStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl fmt::Display for CafStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CafStatus {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| FleetError::validation(format!("unknown CAF status: {s}")))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CafPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl CafPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for CafPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Responsibility category a violation is classified into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CafCategory {
    Equipment,
    DriverQualification,
    DriverPerformance,
    Company,
}

impl CafCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equipment => "EQUIPMENT",
            Self::DriverQualification => "DRIVER_QUALIFICATION",
            Self::DriverPerformance => "DRIVER_PERFORMANCE",
            Self::Company => "COMPANY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EQUIPMENT" => Some(Self::Equipment),
            "DRIVER_QUALIFICATION" => Some(Self::DriverQualification),
            "DRIVER_PERFORMANCE" => Some(Self::DriverPerformance),
            "COMPANY" => Some(Self::Company),
            _ => None,
        }
    }

    /// Display label used in generated titles.
    pub fn label(self) -> &'static str {
        match self {
            Self::Equipment => "Equipment",
            Self::DriverQualification => "Driver Qualification",
            Self::DriverPerformance => "Driver Performance",
            Self::Company => "Company",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caf {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub incident_id: Option<Uuid>,
    pub violation_id: Option<Uuid>,
    /// Human-readable number, `CAF-<year>-<seq>`.
    pub caf_number: String,
    pub number_year: i32,
    pub number_sequence: u32,
    pub title: String,
    pub description: String,
    /// Checklist of corrective steps, one per line.
    pub corrective_action: String,
    pub category: CafCategory,
    pub subcategory: String,
    pub priority: CafPriority,
    pub status: CafStatus,
    /// When false, a completion signature alone approves the CAF.
    pub requires_approval: bool,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub due_date: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completion_notes: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Caf {
    /// Approved CAFs are frozen: no deletion, no attachment changes.
    pub fn is_locked(&self) -> bool {
        self.status == CafStatus::Approved
    }
}

/// Fields required to create a CAF. New CAFs always start `ASSIGNED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaf {
    pub organization_id: Uuid,
    pub incident_id: Option<Uuid>,
    pub violation_id: Option<Uuid>,
    pub caf_number: String,
    pub number_year: i32,
    pub number_sequence: u32,
    pub title: String,
    pub description: String,
    pub corrective_action: String,
    pub category: CafCategory,
    pub subcategory: String,
    pub priority: CafPriority,
    pub requires_approval: bool,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub due_date: DateTime<Utc>,
}

/// Fields that can be updated on an existing CAF.
///
/// For the nested options: `Some(Some(val))` = set, `Some(None)` = clear,
/// `None` = no change.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateCaf {
    pub status: Option<CafStatus>,
    pub assigned_to: Option<Option<Uuid>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub completion_notes: Option<Option<String>>,
    pub approved_at: Option<Option<DateTime<Utc>>>,
    pub approved_by: Option<Option<Uuid>>,
}

/// List filter for CAF queries.
#[derive(Debug, Clone, Default)]
pub struct CafFilter {
    pub status: Option<CafStatus>,
    pub incident_id: Option<Uuid>,
}

/// Metadata for a file stored by the external file-storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CafAttachment {
    pub id: Uuid,
    pub caf_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    /// Opaque key into external file storage.
    pub storage_key: String,
    pub uploaded_by: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCafAttachment {
    pub caf_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub storage_key: String,
    pub uploaded_by: Option<Uuid>,
}
