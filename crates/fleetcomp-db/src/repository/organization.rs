//! SurrealDB implementation of [`OrganizationRepository`].

use chrono::{DateTime, Utc};
use fleetcomp_core::error::FleetResult;
use fleetcomp_core::models::organization::{
    CreateOrganization, MASTER_ORGANIZATION_ID, MASTER_ORGANIZATION_SLUG, Organization,
};
use fleetcomp_core::repository::OrganizationRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct OrganizationRow {
    record_id: String,
    name: String,
    slug: String,
    dot_number: Option<String>,
    is_master: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrganizationRow {
    fn try_into_organization(self) -> Result<Organization, DbError> {
        Ok(Organization {
            id: parse_uuid("organization", "record", &self.record_id)?,
            name: self.name,
            slug: self.slug,
            dot_number: self.dot_number,
            is_master: self.is_master,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Organization repository.
#[derive(Clone)]
pub struct SurrealOrganizationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealOrganizationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> OrganizationRepository for SurrealOrganizationRepository<C> {
    async fn create(&self, input: CreateOrganization) -> FleetResult<Organization> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('organization', $id) SET \
                 name = $name, slug = $slug, dot_number = $dot_number",
            )
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("slug", input.slug))
            .bind(("dot_number", input.dot_number))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_check(e, "organization"))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> FleetResult<Organization> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('organization', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "organization".into(),
            id: id_str,
        })?;

        Ok(row.try_into_organization()?)
    }

    async fn ensure_master(&self, name: &str) -> FleetResult<Organization> {
        // UPSERT on the well-known id is idempotent; the unique slug index
        // rejects any competing "master" row.
        self.db
            .query(
                "UPSERT type::record('organization', $id) SET \
                 name = $name, slug = $slug, is_master = true, \
                 updated_at = time::now()",
            )
            .bind(("id", MASTER_ORGANIZATION_ID.to_string()))
            .bind(("name", name.to_string()))
            .bind(("slug", MASTER_ORGANIZATION_SLUG))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_check(e, "organization"))?;

        self.get_by_id(MASTER_ORGANIZATION_ID).await
    }
}
