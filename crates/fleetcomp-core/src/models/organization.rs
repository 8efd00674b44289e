//! Organization domain model.
//!
//! Organizations are the tenancy boundary: staff, incidents, violations and
//! CAFs all belong to exactly one organization. A single master organization
//! holds the staff with system-wide access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known identifier of the master organization record.
pub const MASTER_ORGANIZATION_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);

/// Slug reserved for the master organization.
pub const MASTER_ORGANIZATION_SLUG: &str = "master";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    /// Human-readable name (e.g., `Acme Freight LLC`).
    pub name: String,
    /// URL-safe unique identifier (e.g., `acme-freight`).
    pub slug: String,
    /// USDOT number, when the carrier has one.
    pub dot_number: Option<String>,
    pub is_master: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
    pub slug: String,
    pub dot_number: Option<String>,
}
