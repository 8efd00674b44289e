//! Incident domain model.
//!
//! An incident unifies accidents and roadside inspections. Type-specific data
//! lives in [`IncidentDetails`], one explicit record per incident kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    /// At least one corrective action is outstanding (or none exist yet).
    Pending,
    /// Every linked CAF is approved and signed.
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Resolved => "RESOLVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "RESOLVED" => Some(Self::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccidentDetails {
    pub location: String,
    pub fatalities: u32,
    pub injuries: u32,
    pub tow_away: bool,
    pub hazmat_released: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionDetails {
    pub report_number: String,
    /// CVSA inspection level (1-8).
    pub level: u8,
    /// State or province that performed the inspection.
    pub jurisdiction: String,
    pub vehicle_out_of_service: bool,
    pub driver_out_of_service: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncidentDetails {
    Accident(AccidentDetails),
    Inspection(InspectionDetails),
}

impl IncidentDetails {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Accident(_) => "accident",
            Self::Inspection(_) => "inspection",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub details: IncidentDetails,
    pub status: IncidentStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIncident {
    pub organization_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub details: IncidentDetails,
}
