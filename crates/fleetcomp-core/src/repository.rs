//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. The CAF engine never talks to the
//! database directly; it is generic over a [`Store`] that hands out one
//! repository per entity.

use uuid::Uuid;

use crate::error::FleetResult;
use crate::models::{
    audit::{AuditLogEntry, CreateAuditLogEntry},
    caf::{Caf, CafAttachment, CafFilter, CafStatus, CreateCaf, CreateCafAttachment, UpdateCaf},
    incident::{CreateIncident, Incident, IncidentStatus},
    organization::{CreateOrganization, Organization},
    signature::{CreateSignature, Signature, SignatureType},
    staff::{CreateStaff, Staff},
    violation::{CreateViolation, Violation},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Organizations and staff
// ---------------------------------------------------------------------------

pub trait OrganizationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateOrganization,
    ) -> impl Future<Output = FleetResult<Organization>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FleetResult<Organization>> + Send;
    /// Idempotently upsert the master organization under its well-known id.
    fn ensure_master(&self, name: &str) -> impl Future<Output = FleetResult<Organization>> + Send;
}

pub trait StaffRepository: Send + Sync {
    fn create(&self, input: CreateStaff) -> impl Future<Output = FleetResult<Staff>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FleetResult<Staff>> + Send;
    /// All staff records bound to one identity-provider subject.
    fn list_by_identity(
        &self,
        identity_id: &str,
    ) -> impl Future<Output = FleetResult<Vec<Staff>>> + Send;
    fn list_by_organization(
        &self,
        organization_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = FleetResult<PaginatedResult<Staff>>> + Send;
    /// Earliest-created staff member of the organization holding the
    /// approval permission.
    fn first_approver(
        &self,
        organization_id: Uuid,
    ) -> impl Future<Output = FleetResult<Option<Staff>>> + Send;
}

// ---------------------------------------------------------------------------
// Incidents and violations
// ---------------------------------------------------------------------------

pub trait IncidentRepository: Send + Sync {
    fn create(&self, input: CreateIncident) -> impl Future<Output = FleetResult<Incident>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FleetResult<Incident>> + Send;
    fn set_status(
        &self,
        id: Uuid,
        status: IncidentStatus,
        completed_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> impl Future<Output = FleetResult<Incident>> + Send;
}

pub trait ViolationRepository: Send + Sync {
    fn create(&self, input: CreateViolation)
    -> impl Future<Output = FleetResult<Violation>> + Send;
    fn list_by_incident(
        &self,
        incident_id: Uuid,
    ) -> impl Future<Output = FleetResult<Vec<Violation>>> + Send;
    fn list_by_organization(
        &self,
        organization_id: Uuid,
    ) -> impl Future<Output = FleetResult<Vec<Violation>>> + Send;
}

// ---------------------------------------------------------------------------
// Corrective action forms
// ---------------------------------------------------------------------------

pub trait CafRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the CAF number is taken.
    fn create(&self, input: CreateCaf) -> impl Future<Output = FleetResult<Caf>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FleetResult<Caf>> + Send;
    /// Applies `input` only while the CAF is still in `expected`; fails
    /// with `Conflict` when another writer moved it first.
    fn update(
        &self,
        id: Uuid,
        expected: CafStatus,
        input: UpdateCaf,
    ) -> impl Future<Output = FleetResult<Caf>> + Send;
    /// Stores `signature` and applies `input` to its CAF in one
    /// transaction, guarded on `expected` like [`update`](Self::update).
    /// A duplicate signature fails with `AlreadyExists`; neither write
    /// persists on failure.
    fn sign(
        &self,
        signature: CreateSignature,
        expected: CafStatus,
        input: UpdateCaf,
    ) -> impl Future<Output = FleetResult<(Signature, Caf)>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = FleetResult<()>> + Send;
    fn list(
        &self,
        organization_id: Uuid,
        filter: CafFilter,
        pagination: Pagination,
    ) -> impl Future<Output = FleetResult<PaginatedResult<Caf>>> + Send;
    fn list_by_incident(
        &self,
        incident_id: Uuid,
    ) -> impl Future<Output = FleetResult<Vec<Caf>>> + Send;
    /// Highest sequence number already used in `year`, if any.
    fn max_sequence_for_year(
        &self,
        year: i32,
    ) -> impl Future<Output = FleetResult<Option<u32>>> + Send;

    fn add_attachment(
        &self,
        input: CreateCafAttachment,
    ) -> impl Future<Output = FleetResult<CafAttachment>> + Send;
    fn list_attachments(
        &self,
        caf_id: Uuid,
    ) -> impl Future<Output = FleetResult<Vec<CafAttachment>>> + Send;
    fn remove_attachment(
        &self,
        caf_id: Uuid,
        attachment_id: Uuid,
    ) -> impl Future<Output = FleetResult<()>> + Send;
}

pub trait SignatureRepository: Send + Sync {
    /// Fails with `AlreadyExists` on a duplicate (caf, staff, type).
    fn create(
        &self,
        input: CreateSignature,
    ) -> impl Future<Output = FleetResult<Signature>> + Send;
    fn list_by_caf(&self, caf_id: Uuid)
    -> impl Future<Output = FleetResult<Vec<Signature>>> + Send;
    fn find(
        &self,
        caf_id: Uuid,
        staff_id: Uuid,
        signature_type: SignatureType,
    ) -> impl Future<Output = FleetResult<Option<Signature>>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only)
// ---------------------------------------------------------------------------

/// Query filters for audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource_id: Option<Uuid>,
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    pub to: Option<chrono::DateTime<chrono::Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new audit log entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = FleetResult<AuditLogEntry>> + Send;
    fn list(
        &self,
        organization_id: Uuid,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = FleetResult<PaginatedResult<AuditLogEntry>>> + Send;
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// One handle onto every repository, so services take a single generic
/// parameter instead of one per entity.
pub trait Store: Send + Sync {
    type Organizations: OrganizationRepository;
    type Staff: StaffRepository;
    type Incidents: IncidentRepository;
    type Violations: ViolationRepository;
    type Cafs: CafRepository;
    type Signatures: SignatureRepository;
    type AuditLog: AuditLogRepository;

    fn organizations(&self) -> &Self::Organizations;
    fn staff(&self) -> &Self::Staff;
    fn incidents(&self) -> &Self::Incidents;
    fn violations(&self) -> &Self::Violations;
    fn cafs(&self) -> &Self::Cafs;
    fn signatures(&self) -> &Self::Signatures;
    fn audit_log(&self) -> &Self::AuditLog;
}
