//! SurrealDB implementation of [`ViolationRepository`].

use chrono::{DateTime, Utc};
use fleetcomp_core::error::FleetResult;
use fleetcomp_core::models::violation::{
    CreateViolation, ResponsibilityType, Violation, ViolationSeverity,
};
use fleetcomp_core::repository::ViolationRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{parse_enum, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ViolationRow {
    record_id: String,
    organization_id: String,
    incident_id: String,
    code: String,
    section: String,
    description: String,
    severity: String,
    responsibility: String,
    unit_number: Option<String>,
    created_at: DateTime<Utc>,
}

impl ViolationRow {
    fn try_into_violation(self) -> Result<Violation, DbError> {
        Ok(Violation {
            id: parse_uuid("violation", "record", &self.record_id)?,
            organization_id: parse_uuid("violation", "organization", &self.organization_id)?,
            incident_id: parse_uuid("violation", "incident", &self.incident_id)?,
            code: self.code,
            section: self.section,
            description: self.description,
            severity: parse_enum(
                "violation",
                "severity",
                &self.severity,
                ViolationSeverity::parse,
            )?,
            responsibility: parse_enum(
                "violation",
                "responsibility",
                &self.responsibility,
                ResponsibilityType::parse,
            )?,
            unit_number: self.unit_number,
            created_at: self.created_at,
        })
    }
}

fn rows_into_violations(rows: Vec<ViolationRow>) -> Result<Vec<Violation>, DbError> {
    rows.into_iter()
        .map(ViolationRow::try_into_violation)
        .collect()
}

/// SurrealDB implementation of the Violation repository.
#[derive(Clone)]
pub struct SurrealViolationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealViolationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn get_by_id(&self, id: Uuid) -> FleetResult<Violation> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('violation', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ViolationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "violation".into(),
            id: id_str,
        })?;

        Ok(row.try_into_violation()?)
    }
}

impl<C: Connection> ViolationRepository for SurrealViolationRepository<C> {
    async fn create(&self, input: CreateViolation) -> FleetResult<Violation> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('violation', $id) SET \
                 organization_id = $organization_id, \
                 incident_id = $incident_id, \
                 code = $code, section = $section, \
                 description = $description, \
                 severity = $severity, \
                 responsibility = $responsibility, \
                 unit_number = $unit_number",
            )
            .bind(("id", id.to_string()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("incident_id", input.incident_id.to_string()))
            .bind(("code", input.code))
            .bind(("section", input.section))
            .bind(("description", input.description))
            .bind(("severity", input.severity.as_str()))
            .bind(("responsibility", input.responsibility.as_str()))
            .bind(("unit_number", input.unit_number))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_check(e, "violation"))?;

        self.get_by_id(id).await
    }

    async fn list_by_incident(&self, incident_id: Uuid) -> FleetResult<Vec<Violation>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM violation \
                 WHERE incident_id = $incident_id \
                 ORDER BY created_at ASC",
            )
            .bind(("incident_id", incident_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ViolationRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_violations(rows)?)
    }

    async fn list_by_organization(&self, organization_id: Uuid) -> FleetResult<Vec<Violation>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM violation \
                 WHERE organization_id = $organization_id \
                 ORDER BY created_at ASC",
            )
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ViolationRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_violations(rows)?)
    }
}
