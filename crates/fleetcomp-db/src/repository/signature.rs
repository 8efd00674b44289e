//! SurrealDB implementation of [`SignatureRepository`].

use chrono::{DateTime, Utc};
use fleetcomp_core::error::FleetResult;
use fleetcomp_core::models::signature::{CreateSignature, Signature, SignatureType};
use fleetcomp_core::repository::SignatureRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{parse_enum, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
pub(super) struct SignatureRow {
    record_id: String,
    caf_id: String,
    signature_type: String,
    staff_id: String,
    signature_data: String,
    signed_at: DateTime<Utc>,
    ip_address: Option<String>,
    notes: Option<String>,
}

impl SignatureRow {
    pub(super) fn try_into_signature(self) -> Result<Signature, DbError> {
        Ok(Signature {
            id: parse_uuid("caf_signature", "record", &self.record_id)?,
            caf_id: parse_uuid("caf_signature", "caf", &self.caf_id)?,
            signature_type: parse_enum(
                "caf_signature",
                "signature type",
                &self.signature_type,
                SignatureType::parse,
            )?,
            staff_id: parse_uuid("caf_signature", "staff", &self.staff_id)?,
            signature_data: self.signature_data,
            signed_at: self.signed_at,
            ip_address: self.ip_address,
            notes: self.notes,
        })
    }
}

fn rows_into_signatures(rows: Vec<SignatureRow>) -> Result<Vec<Signature>, DbError> {
    rows.into_iter().map(SignatureRow::try_into_signature).collect()
}

/// SurrealDB implementation of the Signature repository.
#[derive(Clone)]
pub struct SurrealSignatureRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSignatureRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SignatureRepository for SurrealSignatureRepository<C> {
    async fn create(&self, input: CreateSignature) -> FleetResult<Signature> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "CREATE type::record('caf_signature', $id) SET \
                 caf_id = $caf_id, \
                 signature_type = $signature_type, \
                 staff_id = $staff_id, \
                 signature_data = $signature_data, \
                 ip_address = $ip_address, notes = $notes; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('caf_signature', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("caf_id", input.caf_id.to_string()))
            .bind(("signature_type", input.signature_type.as_str()))
            .bind(("staff_id", input.staff_id.to_string()))
            .bind(("signature_data", input.signature_data))
            .bind(("ip_address", input.ip_address))
            .bind(("notes", input.notes))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_check(e, "caf_signature"))?;

        let rows: Vec<SignatureRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "caf_signature".into(),
            id: id_str,
        })?;

        Ok(row.try_into_signature()?)
    }

    async fn list_by_caf(&self, caf_id: Uuid) -> FleetResult<Vec<Signature>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM caf_signature \
                 WHERE caf_id = $caf_id ORDER BY signed_at ASC",
            )
            .bind(("caf_id", caf_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SignatureRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_signatures(rows)?)
    }

    async fn find(
        &self,
        caf_id: Uuid,
        staff_id: Uuid,
        signature_type: SignatureType,
    ) -> FleetResult<Option<Signature>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM caf_signature \
                 WHERE caf_id = $caf_id AND staff_id = $staff_id \
                 AND signature_type = $signature_type LIMIT 1",
            )
            .bind(("caf_id", caf_id.to_string()))
            .bind(("staff_id", staff_id.to_string()))
            .bind(("signature_type", signature_type.as_str()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SignatureRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .map(|row| row.try_into_signature().map_err(Into::into))
            .transpose()
    }
}
