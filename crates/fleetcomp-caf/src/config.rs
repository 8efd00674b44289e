//! CAF engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the CAF service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CafConfig {
    /// Whether generated CAFs need an Approval signature after
    /// completion (default: true).
    pub approval_required_by_default: bool,
    /// Attempts at allocating a fresh CAF number when a concurrent
    /// writer took the same one (default: 5).
    pub number_retry_attempts: u32,
    /// Display name of the master organization created at startup.
    pub master_organization_name: String,
}

impl Default for CafConfig {
    fn default() -> Self {
        Self {
            approval_required_by_default: true,
            number_retry_attempts: 5,
            master_organization_name: "Fleet Compliance".into(),
        }
    }
}
