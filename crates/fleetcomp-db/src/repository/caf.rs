//! SurrealDB implementation of [`CafRepository`].

use chrono::{DateTime, Utc};
use fleetcomp_core::error::FleetResult;
use fleetcomp_core::models::caf::{
    Caf, CafAttachment, CafCategory, CafFilter, CafPriority, CafStatus, CreateCaf,
    CreateCafAttachment, UpdateCaf,
};
use fleetcomp_core::models::signature::{CreateSignature, Signature};
use fleetcomp_core::repository::{CafRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::signature::SignatureRow;
use super::{CountRow, parse_enum, parse_opt_uuid, parse_uuid};
use crate::error::{DbError, STATUS_CHANGED};

#[derive(Debug, SurrealValue)]
struct CafRow {
    record_id: String,
    organization_id: String,
    incident_id: Option<String>,
    violation_id: Option<String>,
    caf_number: String,
    number_year: i32,
    number_sequence: u32,
    title: String,
    description: String,
    corrective_action: String,
    category: String,
    subcategory: String,
    priority: String,
    status: String,
    requires_approval: bool,
    assigned_to: Option<String>,
    created_by: Option<String>,
    due_date: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    completion_notes: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    approved_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CafRow {
    fn try_into_caf(self) -> Result<Caf, DbError> {
        let status = self
            .status
            .parse::<CafStatus>()
            .map_err(|e| DbError::malformed("caf", e.to_string()))?;
        Ok(Caf {
            id: parse_uuid("caf", "record", &self.record_id)?,
            organization_id: parse_uuid("caf", "organization", &self.organization_id)?,
            incident_id: parse_opt_uuid("caf", "incident", self.incident_id.as_deref())?,
            violation_id: parse_opt_uuid("caf", "violation", self.violation_id.as_deref())?,
            caf_number: self.caf_number,
            number_year: self.number_year,
            number_sequence: self.number_sequence,
            title: self.title,
            description: self.description,
            corrective_action: self.corrective_action,
            category: parse_enum("caf", "category", &self.category, CafCategory::parse)?,
            subcategory: self.subcategory,
            priority: parse_enum("caf", "priority", &self.priority, CafPriority::parse)?,
            status,
            requires_approval: self.requires_approval,
            assigned_to: parse_opt_uuid("caf", "assignee", self.assigned_to.as_deref())?,
            created_by: parse_opt_uuid("caf", "creator", self.created_by.as_deref())?,
            due_date: self.due_date,
            completed_at: self.completed_at,
            completion_notes: self.completion_notes,
            approved_at: self.approved_at,
            approved_by: parse_opt_uuid("caf", "approver", self.approved_by.as_deref())?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn rows_into_cafs(rows: Vec<CafRow>) -> Result<Vec<Caf>, DbError> {
    rows.into_iter().map(CafRow::try_into_caf).collect()
}

#[derive(Debug, SurrealValue)]
struct AttachmentRow {
    record_id: String,
    caf_id: String,
    file_name: String,
    content_type: String,
    storage_key: String,
    uploaded_by: Option<String>,
    uploaded_at: DateTime<Utc>,
}

impl AttachmentRow {
    fn try_into_attachment(self) -> Result<CafAttachment, DbError> {
        Ok(CafAttachment {
            id: parse_uuid("caf_attachment", "record", &self.record_id)?,
            caf_id: parse_uuid("caf_attachment", "caf", &self.caf_id)?,
            file_name: self.file_name,
            content_type: self.content_type,
            storage_key: self.storage_key,
            uploaded_by: parse_opt_uuid(
                "caf_attachment",
                "uploader",
                self.uploaded_by.as_deref(),
            )?,
            uploaded_at: self.uploaded_at,
        })
    }
}

/// Statements applying `input` to `caf:$id` only while its status is
/// still `$expected`; the enclosing transaction is cancelled otherwise.
fn guarded_update(input: &UpdateCaf) -> String {
    let mut sets = Vec::new();
    if input.status.is_some() {
        sets.push("status = $status");
    }
    match &input.assigned_to {
        Some(Some(_)) => sets.push("assigned_to = $assigned_to"),
        Some(None) => sets.push("assigned_to = NONE"),
        None => {}
    }
    match &input.completed_at {
        Some(Some(_)) => sets.push("completed_at = $completed_at"),
        Some(None) => sets.push("completed_at = NONE"),
        None => {}
    }
    match &input.completion_notes {
        Some(Some(_)) => sets.push("completion_notes = $completion_notes"),
        Some(None) => sets.push("completion_notes = NONE"),
        None => {}
    }
    match &input.approved_at {
        Some(Some(_)) => sets.push("approved_at = $approved_at"),
        Some(None) => sets.push("approved_at = NONE"),
        None => {}
    }
    match &input.approved_by {
        Some(Some(_)) => sets.push("approved_by = $approved_by"),
        Some(None) => sets.push("approved_by = NONE"),
        None => {}
    }
    sets.push("updated_at = time::now()");

    format!(
        "LET $changed = (UPDATE type::record('caf', $id) SET {} WHERE status = $expected); \
         IF array::len($changed) = 0 {{ THROW '{STATUS_CHANGED}' }};",
        sets.join(", ")
    )
}

/// Bind the values referenced by [`guarded_update`].
macro_rules! bind_update {
    ($builder:expr, $input:expr) => {{
        let input: UpdateCaf = $input;
        let mut builder = $builder;
        if let Some(status) = input.status {
            builder = builder.bind(("status", status.as_str()));
        }
        if let Some(Some(assigned_to)) = input.assigned_to {
            builder = builder.bind(("assigned_to", assigned_to.to_string()));
        }
        if let Some(Some(completed_at)) = input.completed_at {
            builder = builder.bind(("completed_at", completed_at));
        }
        if let Some(Some(notes)) = input.completion_notes {
            builder = builder.bind(("completion_notes", notes));
        }
        if let Some(Some(approved_at)) = input.approved_at {
            builder = builder.bind(("approved_at", approved_at));
        }
        if let Some(Some(approved_by)) = input.approved_by {
            builder = builder.bind(("approved_by", approved_by.to_string()));
        }
        builder
    }};
}

#[derive(Debug, SurrealValue)]
struct SequenceRow {
    number_sequence: u32,
}

/// SurrealDB implementation of the CAF repository.
#[derive(Clone)]
pub struct SurrealCafRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCafRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    fn filter_clause(filter: &CafFilter) -> String {
        let mut clause = String::from("organization_id = $organization_id");
        if filter.status.is_some() {
            clause.push_str(" AND status = $status");
        }
        if filter.incident_id.is_some() {
            clause.push_str(" AND incident_id = $incident_id");
        }
        clause
    }
}

impl<C: Connection> CafRepository for SurrealCafRepository<C> {
    async fn create(&self, input: CreateCaf) -> FleetResult<Caf> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('caf', $id) SET \
                 organization_id = $organization_id, \
                 incident_id = $incident_id, \
                 violation_id = $violation_id, \
                 caf_number = $caf_number, \
                 number_year = $number_year, \
                 number_sequence = $number_sequence, \
                 title = $title, description = $description, \
                 corrective_action = $corrective_action, \
                 category = $category, subcategory = $subcategory, \
                 priority = $priority, status = $status, \
                 requires_approval = $requires_approval, \
                 assigned_to = $assigned_to, created_by = $created_by, \
                 due_date = $due_date",
            )
            .bind(("id", id.to_string()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("incident_id", input.incident_id.map(|v| v.to_string())))
            .bind(("violation_id", input.violation_id.map(|v| v.to_string())))
            .bind(("caf_number", input.caf_number))
            .bind(("number_year", input.number_year))
            .bind(("number_sequence", input.number_sequence))
            .bind(("title", input.title))
            .bind(("description", input.description))
            .bind(("corrective_action", input.corrective_action))
            .bind(("category", input.category.as_str()))
            .bind(("subcategory", input.subcategory))
            .bind(("priority", input.priority.as_str()))
            .bind(("status", CafStatus::Assigned.as_str()))
            .bind(("requires_approval", input.requires_approval))
            .bind(("assigned_to", input.assigned_to.map(|v| v.to_string())))
            .bind(("created_by", input.created_by.map(|v| v.to_string())))
            .bind(("due_date", input.due_date))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_check(e, "caf"))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> FleetResult<Caf> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('caf', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CafRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "caf".into(),
            id: id_str,
        })?;

        Ok(row.try_into_caf()?)
    }

    async fn update(&self, id: Uuid, expected: CafStatus, input: UpdateCaf) -> FleetResult<Caf> {
        self.get_by_id(id).await?;

        let query = format!(
            "BEGIN TRANSACTION; \
             {} \
             COMMIT TRANSACTION;",
            guarded_update(&input)
        );
        let builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("expected", expected.as_str()));
        let mut response = bind_update!(builder, input)
            .await
            .map_err(DbError::from)?;

        let errors = response.take_errors();
        if !errors.is_empty() {
            return Err(DbError::from_transaction(errors.into_values(), "caf").into());
        }

        self.get_by_id(id).await
    }

    async fn sign(
        &self,
        signature: CreateSignature,
        expected: CafStatus,
        input: UpdateCaf,
    ) -> FleetResult<(Signature, Caf)> {
        let caf_id = signature.caf_id;
        self.get_by_id(caf_id).await?;

        let signature_id = Uuid::new_v4().to_string();
        let query = format!(
            "BEGIN TRANSACTION; \
             CREATE type::record('caf_signature', $signature_id) SET \
             caf_id = $id, \
             signature_type = $signature_type, \
             staff_id = $staff_id, \
             signature_data = $signature_data, \
             ip_address = $ip_address, notes = $notes; \
             {} \
             COMMIT TRANSACTION;",
            guarded_update(&input)
        );
        let builder = self
            .db
            .query(&query)
            .bind(("id", caf_id.to_string()))
            .bind(("expected", expected.as_str()))
            .bind(("signature_id", signature_id.clone()))
            .bind(("signature_type", signature.signature_type.as_str()))
            .bind(("staff_id", signature.staff_id.to_string()))
            .bind(("signature_data", signature.signature_data))
            .bind(("ip_address", signature.ip_address))
            .bind(("notes", signature.notes));
        let mut response = bind_update!(builder, input)
            .await
            .map_err(DbError::from)?;

        let errors = response.take_errors();
        if !errors.is_empty() {
            return Err(DbError::from_transaction(errors.into_values(), "caf_signature").into());
        }

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('caf_signature', $id)",
            )
            .bind(("id", signature_id.clone()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<SignatureRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "caf_signature".into(),
            id: signature_id,
        })?;

        Ok((row.try_into_signature()?, self.get_by_id(caf_id).await?))
    }

    async fn delete(&self, id: Uuid) -> FleetResult<()> {
        let id_str = id.to_string();

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE caf_attachment WHERE caf_id = $id; \
                 DELETE caf_signature WHERE caf_id = $id; \
                 DELETE type::record('caf', $id); \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_check(e, "caf"))?;

        Ok(())
    }

    async fn list(
        &self,
        organization_id: Uuid,
        filter: CafFilter,
        pagination: Pagination,
    ) -> FleetResult<PaginatedResult<Caf>> {
        let clause = Self::filter_clause(&filter);
        let org_str = organization_id.to_string();
        let status = filter.status.map(|s| s.as_str());
        let incident_id = filter.incident_id.map(|i| i.to_string());

        let count_query = format!("SELECT count() AS total FROM caf WHERE {clause} GROUP ALL");
        let mut count_builder = self
            .db
            .query(&count_query)
            .bind(("organization_id", org_str.clone()));
        if let Some(status) = status {
            count_builder = count_builder.bind(("status", status));
        }
        if let Some(incident_id) = incident_id.clone() {
            count_builder = count_builder.bind(("incident_id", incident_id));
        }
        let mut count_result = count_builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM caf WHERE {clause} \
             ORDER BY number_year DESC, number_sequence DESC \
             LIMIT $limit START $offset"
        );
        let mut builder = self
            .db
            .query(&query)
            .bind(("organization_id", org_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(status) = status {
            builder = builder.bind(("status", status));
        }
        if let Some(incident_id) = incident_id {
            builder = builder.bind(("incident_id", incident_id));
        }
        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<CafRow> = result.take(0).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: rows_into_cafs(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_by_incident(&self, incident_id: Uuid) -> FleetResult<Vec<Caf>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM caf \
                 WHERE incident_id = $incident_id \
                 ORDER BY number_year ASC, number_sequence ASC",
            )
            .bind(("incident_id", incident_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CafRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_cafs(rows)?)
    }

    async fn max_sequence_for_year(&self, year: i32) -> FleetResult<Option<u32>> {
        let mut result = self
            .db
            .query(
                "SELECT number_sequence FROM caf \
                 WHERE number_year = $year \
                 ORDER BY number_sequence DESC LIMIT 1",
            )
            .bind(("year", year))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SequenceRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.number_sequence))
    }

    async fn add_attachment(&self, input: CreateCafAttachment) -> FleetResult<CafAttachment> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "CREATE type::record('caf_attachment', $id) SET \
                 caf_id = $caf_id, file_name = $file_name, \
                 content_type = $content_type, \
                 storage_key = $storage_key, \
                 uploaded_by = $uploaded_by; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('caf_attachment', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("caf_id", input.caf_id.to_string()))
            .bind(("file_name", input.file_name))
            .bind(("content_type", input.content_type))
            .bind(("storage_key", input.storage_key))
            .bind(("uploaded_by", input.uploaded_by.map(|v| v.to_string())))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_check(e, "caf_attachment"))?;

        let rows: Vec<AttachmentRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "caf_attachment".into(),
            id: id_str,
        })?;

        Ok(row.try_into_attachment()?)
    }

    async fn list_attachments(&self, caf_id: Uuid) -> FleetResult<Vec<CafAttachment>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM caf_attachment \
                 WHERE caf_id = $caf_id ORDER BY uploaded_at ASC",
            )
            .bind(("caf_id", caf_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AttachmentRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(AttachmentRow::try_into_attachment)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn remove_attachment(&self, caf_id: Uuid, attachment_id: Uuid) -> FleetResult<()> {
        let attachment_str = attachment_id.to_string();
        let caf_str = caf_id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('caf_attachment', $id) \
                 WHERE caf_id = $caf_id",
            )
            .bind(("id", attachment_str.clone()))
            .bind(("caf_id", caf_str))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AttachmentRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "caf_attachment".into(),
                id: attachment_str,
            }
            .into());
        }

        self.db
            .query("DELETE type::record('caf_attachment', $id)")
            .bind(("id", attachment_str))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_check(e, "caf_attachment"))?;

        Ok(())
    }
}
