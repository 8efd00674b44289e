//! SurrealDB repository implementations.

mod audit;
mod caf;
mod incident;
mod organization;
mod signature;
mod staff;
mod violation;

pub use audit::SurrealAuditLogRepository;
pub use caf::SurrealCafRepository;
pub use incident::SurrealIncidentRepository;
pub use organization::SurrealOrganizationRepository;
pub use signature::SurrealSignatureRepository;
pub use staff::SurrealStaffRepository;
pub use violation::SurrealViolationRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(entity: &str, field: &str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value)
        .map_err(|e| DbError::malformed(entity, format!("invalid {field} UUID: {e}")))
}

fn parse_opt_uuid(
    entity: &str,
    field: &str,
    value: Option<&str>,
) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(entity, field, v)).transpose()
}

fn parse_enum<T>(
    entity: &str,
    field: &str,
    value: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<T, DbError> {
    parse(value).ok_or_else(|| DbError::malformed(entity, format!("unknown {field}: {value}")))
}
