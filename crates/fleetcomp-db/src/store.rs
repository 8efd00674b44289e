//! SurrealDB-backed [`Store`] bundling every repository over one client.

use fleetcomp_core::repository::Store;
use surrealdb::{Connection, Surreal};

use crate::repository::{
    SurrealAuditLogRepository, SurrealCafRepository, SurrealIncidentRepository,
    SurrealOrganizationRepository, SurrealSignatureRepository, SurrealStaffRepository,
    SurrealViolationRepository,
};

#[derive(Clone)]
pub struct SurrealStore<C: Connection> {
    organizations: SurrealOrganizationRepository<C>,
    staff: SurrealStaffRepository<C>,
    incidents: SurrealIncidentRepository<C>,
    violations: SurrealViolationRepository<C>,
    cafs: SurrealCafRepository<C>,
    signatures: SurrealSignatureRepository<C>,
    audit_log: SurrealAuditLogRepository<C>,
}

impl<C: Connection> SurrealStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            organizations: SurrealOrganizationRepository::new(db.clone()),
            staff: SurrealStaffRepository::new(db.clone()),
            incidents: SurrealIncidentRepository::new(db.clone()),
            violations: SurrealViolationRepository::new(db.clone()),
            cafs: SurrealCafRepository::new(db.clone()),
            signatures: SurrealSignatureRepository::new(db.clone()),
            audit_log: SurrealAuditLogRepository::new(db),
        }
    }
}

impl<C: Connection> Store for SurrealStore<C> {
    type Organizations = SurrealOrganizationRepository<C>;
    type Staff = SurrealStaffRepository<C>;
    type Incidents = SurrealIncidentRepository<C>;
    type Violations = SurrealViolationRepository<C>;
    type Cafs = SurrealCafRepository<C>;
    type Signatures = SurrealSignatureRepository<C>;
    type AuditLog = SurrealAuditLogRepository<C>;

    fn organizations(&self) -> &Self::Organizations {
        &self.organizations
    }

    fn staff(&self) -> &Self::Staff {
        &self.staff
    }

    fn incidents(&self) -> &Self::Incidents {
        &self.incidents
    }

    fn violations(&self) -> &Self::Violations {
        &self.violations
    }

    fn cafs(&self) -> &Self::Cafs {
        &self.cafs
    }

    fn signatures(&self) -> &Self::Signatures {
        &self.signatures
    }

    fn audit_log(&self) -> &Self::AuditLog {
        &self.audit_log
    }
}
