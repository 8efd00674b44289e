//! SurrealDB implementation of [`IncidentRepository`].
//!
//! Incident details are stored as a flexible object alongside a `kind`
//! discriminator and decoded back into [`IncidentDetails`].

use chrono::{DateTime, Utc};
use fleetcomp_core::error::FleetResult;
use fleetcomp_core::models::incident::{CreateIncident, Incident, IncidentDetails, IncidentStatus};
use fleetcomp_core::repository::IncidentRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{parse_enum, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct IncidentRow {
    record_id: String,
    organization_id: String,
    occurred_at: DateTime<Utc>,
    details: serde_json::Value,
    status: String,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IncidentRow {
    fn try_into_incident(self) -> Result<Incident, DbError> {
        let details: IncidentDetails = serde_json::from_value(self.details)
            .map_err(|e| DbError::malformed("incident", format!("details: {e}")))?;
        Ok(Incident {
            id: parse_uuid("incident", "record", &self.record_id)?,
            organization_id: parse_uuid("incident", "organization", &self.organization_id)?,
            occurred_at: self.occurred_at,
            details,
            status: parse_enum("incident", "status", &self.status, IncidentStatus::parse)?,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Incident repository.
#[derive(Clone)]
pub struct SurrealIncidentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealIncidentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> IncidentRepository for SurrealIncidentRepository<C> {
    async fn create(&self, input: CreateIncident) -> FleetResult<Incident> {
        let id = Uuid::new_v4();
        let kind = input.details.kind();
        let details = serde_json::to_value(&input.details)
            .map_err(|e| DbError::malformed("incident", format!("details: {e}")))?;

        self.db
            .query(
                "CREATE type::record('incident', $id) SET \
                 organization_id = $organization_id, \
                 occurred_at = $occurred_at, \
                 kind = $kind, details = $details, \
                 status = $status",
            )
            .bind(("id", id.to_string()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("occurred_at", input.occurred_at))
            .bind(("kind", kind))
            .bind(("details", details))
            .bind(("status", IncidentStatus::Pending.as_str()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_check(e, "incident"))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> FleetResult<Incident> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('incident', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IncidentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "incident".into(),
            id: id_str,
        })?;

        Ok(row.try_into_incident()?)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: IncidentStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> FleetResult<Incident> {
        // Surface NotFound before writing; UPDATE on a missing record is a no-op.
        self.get_by_id(id).await?;

        let query = if completed_at.is_some() {
            "UPDATE type::record('incident', $id) SET \
             status = $status, completed_at = $completed_at, \
             updated_at = time::now()"
        } else {
            "UPDATE type::record('incident', $id) SET \
             status = $status, completed_at = NONE, \
             updated_at = time::now()"
        };

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("status", status.as_str()));
        if let Some(at) = completed_at {
            builder = builder.bind(("completed_at", at));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_check(e, "incident"))?;

        self.get_by_id(id).await
    }
}
