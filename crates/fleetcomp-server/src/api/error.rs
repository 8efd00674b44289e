//! HTTP error mapping.
//!
//! Every failure leaves the API as `{"error": "..."}`. Database and
//! internal failures are logged and answered with a generic message.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use fleetcomp_core::error::FleetError;
use serde_json::json;
use tracing::error;

use crate::identity::IdentityError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Fleet(#[from] FleetError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Fleet(FleetError::Internal(message.into()))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Fleet(FleetError::validation(message))
    }

    fn public_message(&self) -> String {
        match self {
            Self::Identity(IdentityError::Key(_)) => "Internal server error".into(),
            Self::Identity(_) | Self::Fleet(FleetError::Unauthorized) => "Unauthorized".into(),
            Self::Fleet(FleetError::Database(_) | FleetError::Internal(_)) => {
                "Internal server error".into()
            }
            Self::Fleet(FleetError::Validation { message }) => message.clone(),
            Self::Fleet(FleetError::Conflict { message }) => message.clone(),
            Self::Fleet(other) => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Identity(IdentityError::Key(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Identity(_) => StatusCode::UNAUTHORIZED,
            Self::Fleet(err) => match err {
                FleetError::Unauthorized => StatusCode::UNAUTHORIZED,
                FleetError::AccessDenied { .. } | FleetError::Locked { .. } => {
                    StatusCode::FORBIDDEN
                }
                FleetError::NotFound { .. } => StatusCode::NOT_FOUND,
                FleetError::Validation { .. }
                | FleetError::InvalidTransition { .. }
                | FleetError::Conflict { .. } => StatusCode::BAD_REQUEST,
                FleetError::AlreadyExists { .. } => StatusCode::CONFLICT,
                FleetError::Database(_) | FleetError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        HttpResponse::build(status).json(json!({ "error": self.public_message() }))
    }
}
