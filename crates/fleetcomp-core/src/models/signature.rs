//! CAF signature domain model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureType {
    Completion,
    Approval,
}

impl SignatureType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completion => "COMPLETION",
            Self::Approval => "APPROVAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COMPLETION" => Some(Self::Completion),
            "APPROVAL" => Some(Self::Approval),
            _ => None,
        }
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub id: Uuid,
    pub caf_id: Uuid,
    pub signature_type: SignatureType,
    pub staff_id: Uuid,
    /// Opaque rendered-signature payload (e.g. a data URL).
    pub signature_data: String,
    pub signed_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSignature {
    pub caf_id: Uuid,
    pub signature_type: SignatureType,
    pub staff_id: Uuid,
    pub signature_data: String,
    pub ip_address: Option<String>,
    pub notes: Option<String>,
}
