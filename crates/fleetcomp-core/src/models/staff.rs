//! Staff domain model.
//!
//! A staff record binds an external identity (the identity provider's
//! subject) to an organization, an access level and the CAF permission flags.
//! One identity may hold staff records in several organizations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenancy tier of a staff record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessLevel {
    /// System-wide access, regardless of organization.
    Master,
    /// Full access within one organization.
    Organization,
    /// Access limited to one location of an organization.
    Location,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Master => "Master",
            Self::Organization => "Organization",
            Self::Location => "Location",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Master" => Some(Self::Master),
            "Organization" => Some(Self::Organization),
            "Location" => Some(Self::Location),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub location_id: Option<Uuid>,
    /// Subject claim issued by the identity provider.
    pub identity_id: String,
    pub name: String,
    pub email: String,
    pub access_level: AccessLevel,
    pub can_sign_cafs: bool,
    pub can_approve_cafs: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStaff {
    pub organization_id: Uuid,
    pub location_id: Option<Uuid>,
    pub identity_id: String,
    pub name: String,
    pub email: String,
    pub access_level: AccessLevel,
    pub can_sign_cafs: bool,
    pub can_approve_cafs: bool,
}
