//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! Entries are append-only; there is no update or delete path.

use chrono::{DateTime, Utc};
use fleetcomp_core::error::FleetResult;
use fleetcomp_core::models::audit::{ActorType, AuditLogEntry, AuditOutcome, CreateAuditLogEntry};
use fleetcomp_core::repository::{
    AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination,
};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_enum, parse_opt_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditRow {
    record_id: String,
    organization_id: String,
    actor_id: String,
    actor_type: String,
    action: String,
    resource_id: Option<String>,
    outcome: String,
    ip_address: Option<String>,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

impl AuditRow {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        Ok(AuditLogEntry {
            id: parse_uuid("audit_log", "record", &self.record_id)?,
            organization_id: parse_uuid("audit_log", "organization", &self.organization_id)?,
            actor_id: parse_uuid("audit_log", "actor", &self.actor_id)?,
            actor_type: parse_enum("audit_log", "actor type", &self.actor_type, ActorType::parse)?,
            action: self.action,
            resource_id: parse_opt_uuid("audit_log", "resource", self.resource_id.as_deref())?,
            outcome: parse_enum("audit_log", "outcome", &self.outcome, AuditOutcome::parse)?,
            ip_address: self.ip_address,
            metadata: self.metadata,
            timestamp: self.timestamp,
        })
    }
}

/// SurrealDB implementation of the audit log repository.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    fn filter_clause(filter: &AuditLogFilter) -> String {
        let mut clause = String::from("organization_id = $organization_id");
        if filter.actor_id.is_some() {
            clause.push_str(" AND actor_id = $actor_id");
        }
        if filter.action.is_some() {
            clause.push_str(" AND action = $action");
        }
        if filter.resource_id.is_some() {
            clause.push_str(" AND resource_id = $resource_id");
        }
        if filter.from.is_some() {
            clause.push_str(" AND timestamp >= $from");
        }
        if filter.to.is_some() {
            clause.push_str(" AND timestamp <= $to");
        }
        clause
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> FleetResult<AuditLogEntry> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let metadata = input
            .metadata
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));

        let mut result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 organization_id = $organization_id, \
                 actor_id = $actor_id, actor_type = $actor_type, \
                 action = $action, resource_id = $resource_id, \
                 outcome = $outcome, ip_address = $ip_address, \
                 metadata = $metadata; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('audit_log', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("actor_id", input.actor_id.to_string()))
            .bind(("actor_type", input.actor_type.as_str()))
            .bind(("action", input.action))
            .bind(("resource_id", input.resource_id.map(|r| r.to_string())))
            .bind(("outcome", input.outcome.as_str()))
            .bind(("ip_address", input.ip_address))
            .bind(("metadata", metadata))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_check(e, "audit_log"))?;

        let rows: Vec<AuditRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;

        Ok(row.try_into_entry()?)
    }

    async fn list(
        &self,
        organization_id: Uuid,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> FleetResult<PaginatedResult<AuditLogEntry>> {
        let clause = Self::filter_clause(&filter);

        let count_query =
            format!("SELECT count() AS total FROM audit_log WHERE {clause} GROUP ALL");
        let list_query = format!(
            "SELECT meta::id(id) AS record_id, * FROM audit_log WHERE {clause} \
             ORDER BY timestamp DESC LIMIT $limit START $offset"
        );

        let mut builder = self
            .db
            .query(&count_query)
            .query(&list_query)
            .bind(("organization_id", organization_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(actor_id) = filter.actor_id {
            builder = builder.bind(("actor_id", actor_id.to_string()));
        }
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action));
        }
        if let Some(resource_id) = filter.resource_id {
            builder = builder.bind(("resource_id", resource_id.to_string()));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<AuditRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(AuditRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
