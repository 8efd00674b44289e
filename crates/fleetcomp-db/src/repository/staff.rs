//! SurrealDB implementation of [`StaffRepository`].

use chrono::{DateTime, Utc};
use fleetcomp_core::error::FleetResult;
use fleetcomp_core::models::staff::{AccessLevel, CreateStaff, Staff};
use fleetcomp_core::repository::{PaginatedResult, Pagination, StaffRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_enum, parse_opt_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct StaffRow {
    record_id: String,
    organization_id: String,
    location_id: Option<String>,
    identity_id: String,
    name: String,
    email: String,
    access_level: String,
    can_sign_cafs: bool,
    can_approve_cafs: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StaffRow {
    fn try_into_staff(self) -> Result<Staff, DbError> {
        Ok(Staff {
            id: parse_uuid("staff", "record", &self.record_id)?,
            organization_id: parse_uuid("staff", "organization", &self.organization_id)?,
            location_id: parse_opt_uuid("staff", "location", self.location_id.as_deref())?,
            identity_id: self.identity_id,
            name: self.name,
            email: self.email,
            access_level: parse_enum(
                "staff",
                "access level",
                &self.access_level,
                AccessLevel::parse,
            )?,
            can_sign_cafs: self.can_sign_cafs,
            can_approve_cafs: self.can_approve_cafs,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn rows_into_staff(rows: Vec<StaffRow>) -> Result<Vec<Staff>, DbError> {
    rows.into_iter().map(StaffRow::try_into_staff).collect()
}

/// SurrealDB implementation of the Staff repository.
#[derive(Clone)]
pub struct SurrealStaffRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealStaffRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> StaffRepository for SurrealStaffRepository<C> {
    async fn create(&self, input: CreateStaff) -> FleetResult<Staff> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('staff', $id) SET \
                 organization_id = $organization_id, \
                 location_id = $location_id, \
                 identity_id = $identity_id, \
                 name = $name, email = $email, \
                 access_level = $access_level, \
                 can_sign_cafs = $can_sign_cafs, \
                 can_approve_cafs = $can_approve_cafs",
            )
            .bind(("id", id.to_string()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("location_id", input.location_id.map(|l| l.to_string())))
            .bind(("identity_id", input.identity_id))
            .bind(("name", input.name))
            .bind(("email", input.email))
            .bind(("access_level", input.access_level.as_str()))
            .bind(("can_sign_cafs", input.can_sign_cafs))
            .bind(("can_approve_cafs", input.can_approve_cafs))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_check(e, "staff"))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> FleetResult<Staff> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('staff', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StaffRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "staff".into(),
            id: id_str,
        })?;

        Ok(row.try_into_staff()?)
    }

    async fn list_by_identity(&self, identity_id: &str) -> FleetResult<Vec<Staff>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM staff \
                 WHERE identity_id = $identity_id \
                 ORDER BY created_at ASC",
            )
            .bind(("identity_id", identity_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StaffRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_staff(rows)?)
    }

    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        pagination: Pagination,
    ) -> FleetResult<PaginatedResult<Staff>> {
        let org_str = organization_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM staff \
                 WHERE organization_id = $organization_id GROUP ALL",
            )
            .bind(("organization_id", org_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM staff \
                 WHERE organization_id = $organization_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("organization_id", org_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StaffRow> = result.take(0).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: rows_into_staff(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn first_approver(&self, organization_id: Uuid) -> FleetResult<Option<Staff>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM staff \
                 WHERE organization_id = $organization_id \
                 AND can_approve_cafs = true \
                 ORDER BY created_at ASC LIMIT 1",
            )
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StaffRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_staff(rows)?.into_iter().next())
    }
}
