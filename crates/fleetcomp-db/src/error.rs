//! Database-specific error types and conversions.

use fleetcomp_core::error::FleetError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Unique constraint violated on {entity}")]
    Duplicate { entity: String },

    #[error("Stored {entity} record is malformed: {message}")]
    Malformed { entity: String, message: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("CAF status changed concurrently")]
    StatusChanged,
}

/// Text thrown by guarded writes whose status precondition no longer holds.
pub(crate) const STATUS_CHANGED: &str = "status precondition failed";

impl DbError {
    /// Classify an error surfaced by `Response::check`. Unique index
    /// violations become [`DbError::Duplicate`].
    pub(crate) fn from_check(err: surrealdb::Error, entity: &str) -> Self {
        let message = err.to_string();
        if message.contains("already contains") {
            DbError::Duplicate {
                entity: entity.into(),
            }
        } else {
            DbError::Query(message)
        }
    }

    /// Classify the statement errors of a failed transaction. The cause
    /// may be reported on any statement of the cancelled transaction.
    pub(crate) fn from_transaction(
        errors: impl IntoIterator<Item = surrealdb::Error>,
        entity: &str,
    ) -> Self {
        let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
        if messages.iter().any(|m| m.contains("already contains")) {
            DbError::Duplicate {
                entity: entity.into(),
            }
        } else if messages.iter().any(|m| m.contains(STATUS_CHANGED)) {
            DbError::StatusChanged
        } else {
            DbError::Query(messages.join("; "))
        }
    }

    pub(crate) fn malformed(entity: &str, message: impl Into<String>) -> Self {
        DbError::Malformed {
            entity: entity.into(),
            message: message.into(),
        }
    }
}

impl From<DbError> for FleetError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => FleetError::NotFound { entity, id },
            DbError::Duplicate { entity } => FleetError::AlreadyExists { entity },
            DbError::StatusChanged => FleetError::Conflict {
                message: DbError::StatusChanged.to_string(),
            },
            other => FleetError::Database(other.to_string()),
        }
    }
}
