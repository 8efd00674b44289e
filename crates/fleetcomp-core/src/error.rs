//! Error types for the fleetcomp system.
//!
//! Every layer converts its own errors into [`FleetError`]; the HTTP layer
//! maps each variant onto a status code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Locked: {reason}")]
    Locked { reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FleetError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            reason: reason.into(),
        }
    }
}

pub type FleetResult<T> = Result<T, FleetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_both_states() {
        let err = FleetError::InvalidTransition {
            from: "APPROVED".into(),
            to: "IN_PROGRESS".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition: APPROVED -> IN_PROGRESS"
        );
    }

    #[test]
    fn not_found_helper_formats_id() {
        let id = uuid::Uuid::nil();
        let err = FleetError::not_found("caf", id);
        assert!(err.to_string().contains("caf"));
        assert!(err.to_string().contains(&id.to_string()));
    }
}
