//! CAF workflow error types.

use fleetcomp_core::error::FleetError;
use fleetcomp_core::models::caf::CafStatus;
use fleetcomp_core::models::signature::SignatureType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CafError {
    #[error("{signature_type} signature requires CAF status COMPLETED, found {actual}")]
    NotReadyForSignature {
        signature_type: SignatureType,
        actual: CafStatus,
    },

    #[error("approval requires an existing completion signature")]
    MissingCompletionSignature,

    #[error("staff member lacks the {0} permission")]
    MissingPermission(&'static str),

    #[error("a {0} signature from this staff member already exists")]
    DuplicateSignature(SignatureType),

    #[error("CAF {caf_number} is approved and can no longer be modified")]
    Locked { caf_number: String },

    #[error("could not allocate a CAF number after {attempts} attempts")]
    NumberingExhausted { attempts: u32 },

    #[error("invalid CAF number: {0}")]
    InvalidNumber(String),
}

impl From<CafError> for FleetError {
    fn from(err: CafError) -> Self {
        match err {
            CafError::NotReadyForSignature { .. }
            | CafError::MissingCompletionSignature
            | CafError::InvalidNumber(_) => FleetError::Validation {
                message: err.to_string(),
            },
            CafError::MissingPermission(_) => FleetError::AccessDenied {
                reason: err.to_string(),
            },
            CafError::DuplicateSignature(_) => FleetError::Conflict {
                message: err.to_string(),
            },
            CafError::Locked { .. } => FleetError::Locked {
                reason: err.to_string(),
            },
            CafError::NumberingExhausted { .. } => FleetError::AlreadyExists {
                entity: "caf number".into(),
            },
        }
    }
}
