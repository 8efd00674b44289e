//! Violation domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ViolationSeverity {
    Warning,
    Citation,
    OutOfService,
}

impl ViolationSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "Warning",
            Self::Citation => "Citation",
            Self::OutOfService => "OutOfService",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Warning" => Some(Self::Warning),
            "Citation" => Some(Self::Citation),
            "OutOfService" => Some(Self::OutOfService),
            _ => None,
        }
    }
}

/// Party responsible for correcting a violation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResponsibilityType {
    Driver,
    Equipment,
    Company,
}

impl ResponsibilityType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Driver => "Driver",
            Self::Equipment => "Equipment",
            Self::Company => "Company",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Driver" => Some(Self::Driver),
            "Equipment" => Some(Self::Equipment),
            "Company" => Some(Self::Company),
            _ => None,
        }
    }

    /// Map the type string found in inspection source data
    /// (`vehicle`, `driver`, anything else).
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "vehicle" | "equipment" => Self::Equipment,
            "driver" => Self::Driver,
            _ => Self::Company,
        }
    }

    /// Inverse of [`ResponsibilityType::from_raw`].
    pub fn as_raw(self) -> &'static str {
        match self {
            Self::Equipment => "vehicle",
            Self::Driver => "driver",
            Self::Company => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub incident_id: Uuid,
    /// Regulatory code, e.g. `393.75(a)`.
    pub code: String,
    pub section: String,
    pub description: String,
    pub severity: ViolationSeverity,
    pub responsibility: ResponsibilityType,
    pub unit_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Violation {
    pub fn is_out_of_service(&self) -> bool {
        self.severity == ViolationSeverity::OutOfService
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateViolation {
    pub organization_id: Uuid,
    pub incident_id: Uuid,
    pub code: String,
    pub section: String,
    pub description: String,
    pub severity: ViolationSeverity,
    pub responsibility: ResponsibilityType,
    pub unit_number: Option<String>,
}
