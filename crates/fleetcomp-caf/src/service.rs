//! CAF service: orchestrates organizations, incidents, violations and
//! the CAF record lifecycle over a [`Store`].
//!
//! The generator, state machine, signature workflow, completion cascade
//! and export projection extend [`CafService`] from their own modules.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Utc};
use fleetcomp_core::access::{Action, Caller, Resource, authorize};
use fleetcomp_core::error::{FleetError, FleetResult};
use fleetcomp_core::models::audit::{
    ActorType, AuditLogEntry, AuditOutcome, CreateAuditLogEntry,
};
use fleetcomp_core::models::caf::{
    Caf, CafAttachment, CafCategory, CafFilter, CafPriority, CreateCafAttachment,
};
use fleetcomp_core::models::incident::{CreateIncident, Incident};
use fleetcomp_core::models::organization::{
    CreateOrganization, MASTER_ORGANIZATION_ID, Organization,
};
use fleetcomp_core::models::signature::{Signature, SignatureType};
use fleetcomp_core::models::staff::{AccessLevel, CreateStaff, Staff};
use fleetcomp_core::models::violation::{
    CreateViolation, ResponsibilityType, Violation, ViolationSeverity,
};
use fleetcomp_core::repository::{
    AuditLogFilter, AuditLogRepository, CafRepository, IncidentRepository, OrganizationRepository,
    PaginatedResult, Pagination, SignatureRepository, StaffRepository, Store,
    ViolationRepository,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::classifier::{RiskScore, classify, score_risk};
use crate::config::CafConfig;
use crate::error::CafError;
use crate::generator::{CafDraft, checklist};
use crate::numbering::CafNumber;

/// Staff record to add to an organization.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStaff {
    #[serde(default)]
    pub location_id: Option<Uuid>,
    pub identity_id: String,
    pub name: String,
    pub email: String,
    pub access_level: AccessLevel,
    #[serde(default)]
    pub can_sign_cafs: bool,
    #[serde(default)]
    pub can_approve_cafs: bool,
}

/// A violation recorded against an incident.
#[derive(Debug, Clone, Deserialize)]
pub struct NewViolation {
    pub code: String,
    #[serde(default)]
    pub section: String,
    pub description: String,
    pub severity: ViolationSeverity,
    /// Type string from the inspection source data
    /// (`vehicle`, `driver`, `other`).
    #[serde(default)]
    pub violation_type: String,
    #[serde(default)]
    pub unit_number: Option<String>,
}

/// A manually raised CAF.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCaf {
    pub organization_id: Uuid,
    #[serde(default)]
    pub incident_id: Option<Uuid>,
    #[serde(default)]
    pub violation_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    /// Defaults to the category checklist.
    #[serde(default)]
    pub corrective_action: Option<String>,
    pub category: CafCategory,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub priority: CafPriority,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub requires_approval: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAttachment {
    pub file_name: String,
    pub content_type: String,
    pub storage_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignatureRequest {
    pub staff_id: Uuid,
    pub signature_type: SignatureType,
    pub signature_data: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignatureOutcome {
    pub signature: Signature,
    pub caf: Caf,
}

#[derive(Debug, Clone, Serialize)]
pub struct CafDetail {
    pub caf: Caf,
    pub signatures: Vec<Signature>,
    pub attachments: Vec<CafAttachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentDetail {
    pub incident: Incident,
    pub violations: Vec<Violation>,
    pub cafs: Vec<Caf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationRisk {
    pub organization_id: Uuid,
    pub out_of_service_violations: u64,
    pub risk: RiskScore,
}

fn require_text(field: &str, value: &str) -> FleetResult<()> {
    if value.trim().is_empty() {
        return Err(FleetError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_slug(slug: &str) -> FleetResult<()> {
    require_text("slug", slug)?;
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(FleetError::validation(
            "slug may only contain lowercase letters, digits and '-'",
        ));
    }
    Ok(())
}

/// CAF service.
///
/// Generic over the repository bundle so that the engine has no
/// dependency on the database crate.
pub struct CafService<S: Store> {
    pub(crate) store: S,
    pub(crate) config: CafConfig,
}

impl<S: Store> CafService<S> {
    pub fn new(store: S, config: CafConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &CafConfig {
        &self.config
    }

    // -------------------------------------------------------------------
    // Callers and bootstrap
    // -------------------------------------------------------------------

    /// Resolve an identity-provider subject into a [`Caller`] carrying one
    /// grant per staff record. A subject without staff records resolves to
    /// a caller with no grants.
    pub async fn resolve_caller(&self, identity_id: &str) -> FleetResult<Caller> {
        if identity_id.trim().is_empty() {
            return Err(FleetError::Unauthorized);
        }
        let staff = self.store.staff().list_by_identity(identity_id).await?;
        Ok(Caller::new(identity_id, &staff))
    }

    pub async fn ensure_master_organization(&self) -> FleetResult<Organization> {
        self.store
            .organizations()
            .ensure_master(&self.config.master_organization_name)
            .await
    }

    /// Make sure `identity_id` holds a master staff record. Safe to call on
    /// every startup and from concurrent instances.
    pub async fn ensure_master_staff(
        &self,
        identity_id: &str,
        name: &str,
        email: &str,
    ) -> FleetResult<Staff> {
        require_text("identity", identity_id)?;
        self.ensure_master_organization().await?;

        let existing = self.master_staff_for(identity_id).await?;
        if let Some(staff) = existing {
            return Ok(staff);
        }

        let created = self
            .store
            .staff()
            .create(CreateStaff {
                organization_id: MASTER_ORGANIZATION_ID,
                location_id: None,
                identity_id: identity_id.to_string(),
                name: name.to_string(),
                email: email.to_string(),
                access_level: AccessLevel::Master,
                can_sign_cafs: true,
                can_approve_cafs: true,
            })
            .await;

        match created {
            Ok(staff) => {
                info!(staff_id = %staff.id, "Master staff record created");
                Ok(staff)
            }
            Err(FleetError::AlreadyExists { .. }) => self
                .master_staff_for(identity_id)
                .await?
                .ok_or_else(|| FleetError::not_found("staff", identity_id)),
            Err(e) => Err(e),
        }
    }

    async fn master_staff_for(&self, identity_id: &str) -> FleetResult<Option<Staff>> {
        Ok(self
            .store
            .staff()
            .list_by_identity(identity_id)
            .await?
            .into_iter()
            .find(|s| s.organization_id == MASTER_ORGANIZATION_ID))
    }

    // -------------------------------------------------------------------
    // Organizations and staff
    // -------------------------------------------------------------------

    /// Create a carrier organization. Reserved for staff of the master
    /// organization.
    pub async fn create_organization(
        &self,
        caller: &Caller,
        input: CreateOrganization,
    ) -> FleetResult<Organization> {
        authorize(
            caller,
            Resource::Organization(MASTER_ORGANIZATION_ID),
            Action::Create,
        )?;
        require_text("name", &input.name)?;
        validate_slug(&input.slug)?;

        let org = self.store.organizations().create(input).await?;
        self.audit(
            org.id,
            caller.acting_staff(org.id),
            "organization.created",
            Some(org.id),
            None,
            None,
        )
        .await;
        Ok(org)
    }

    pub async fn add_staff(
        &self,
        caller: &Caller,
        organization_id: Uuid,
        input: NewStaff,
    ) -> FleetResult<Staff> {
        authorize(
            caller,
            Resource::Organization(organization_id),
            Action::ManageStaff,
        )?;
        require_text("identity_id", &input.identity_id)?;
        require_text("name", &input.name)?;
        require_text("email", &input.email)?;

        if input.access_level == AccessLevel::Master
            && (organization_id != MASTER_ORGANIZATION_ID || !caller.is_master())
        {
            return Err(FleetError::access_denied(
                "master access can only be granted in the master organization by master staff",
            ));
        }
        if input.access_level == AccessLevel::Location && input.location_id.is_none() {
            return Err(FleetError::validation(
                "location access requires a location_id",
            ));
        }

        self.store.organizations().get_by_id(organization_id).await?;

        let staff = self
            .store
            .staff()
            .create(CreateStaff {
                organization_id,
                location_id: input.location_id,
                identity_id: input.identity_id,
                name: input.name,
                email: input.email,
                access_level: input.access_level,
                can_sign_cafs: input.can_sign_cafs,
                can_approve_cafs: input.can_approve_cafs,
            })
            .await?;

        self.audit(
            organization_id,
            caller.acting_staff(organization_id),
            "staff.created",
            Some(staff.id),
            None,
            Some(serde_json::json!({ "access_level": staff.access_level.as_str() })),
        )
        .await;
        Ok(staff)
    }

    pub async fn list_staff(
        &self,
        caller: &Caller,
        organization_id: Uuid,
        pagination: Pagination,
    ) -> FleetResult<PaginatedResult<Staff>> {
        authorize(caller, Resource::Organization(organization_id), Action::Read)?;
        self.store
            .staff()
            .list_by_organization(organization_id, pagination)
            .await
    }

    /// Out-of-service rate and risk score over every violation recorded for
    /// the organization.
    pub async fn organization_risk(
        &self,
        caller: &Caller,
        organization_id: Uuid,
    ) -> FleetResult<OrganizationRisk> {
        authorize(caller, Resource::Organization(organization_id), Action::Read)?;

        let violations = self
            .store
            .violations()
            .list_by_organization(organization_id)
            .await?;
        let total = violations.len() as u64;
        let out_of_service = violations.iter().filter(|v| v.is_out_of_service()).count() as u64;
        let oos_percent = if total == 0 {
            0.0
        } else {
            out_of_service as f64 / total as f64 * 100.0
        };

        Ok(OrganizationRisk {
            organization_id,
            out_of_service_violations: out_of_service,
            risk: score_risk(oos_percent, total),
        })
    }

    /// Audit trail of an organization, newest first.
    pub async fn list_audit_log(
        &self,
        caller: &Caller,
        organization_id: Uuid,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> FleetResult<PaginatedResult<AuditLogEntry>> {
        authorize(
            caller,
            Resource::Organization(organization_id),
            Action::ReadAuditLog,
        )?;
        self.store
            .audit_log()
            .list(organization_id, filter, pagination)
            .await
    }

    // -------------------------------------------------------------------
    // Incidents and violations
    // -------------------------------------------------------------------

    pub async fn create_incident(
        &self,
        caller: &Caller,
        input: CreateIncident,
    ) -> FleetResult<Incident> {
        let organization_id = input.organization_id;
        authorize(caller, Resource::Organization(organization_id), Action::Create)?;
        self.store.organizations().get_by_id(organization_id).await?;

        let incident = self.store.incidents().create(input).await?;
        self.audit(
            organization_id,
            caller.acting_staff(organization_id),
            "incident.created",
            Some(incident.id),
            None,
            Some(serde_json::json!({ "kind": incident.details.kind() })),
        )
        .await;
        Ok(incident)
    }

    pub async fn get_incident(
        &self,
        caller: &Caller,
        incident_id: Uuid,
    ) -> FleetResult<IncidentDetail> {
        let incident = self.store.incidents().get_by_id(incident_id).await?;
        authorize(caller, Resource::Incident(&incident), Action::Read)?;

        let violations = self.store.violations().list_by_incident(incident_id).await?;
        let cafs = self.store.cafs().list_by_incident(incident_id).await?;
        Ok(IncidentDetail {
            incident,
            violations,
            cafs,
        })
    }

    pub async fn record_violation(
        &self,
        caller: &Caller,
        incident_id: Uuid,
        input: NewViolation,
    ) -> FleetResult<Violation> {
        let incident = self.store.incidents().get_by_id(incident_id).await?;
        authorize(caller, Resource::Incident(&incident), Action::Create)?;
        require_text("code", &input.code)?;
        require_text("description", &input.description)?;

        let responsibility = if input.violation_type.trim().is_empty() {
            classify(&input.code, "other").responsibility
        } else {
            ResponsibilityType::from_raw(&input.violation_type)
        };

        self.store
            .violations()
            .create(CreateViolation {
                organization_id: incident.organization_id,
                incident_id,
                code: input.code.trim().to_string(),
                section: input.section,
                description: input.description,
                severity: input.severity,
                responsibility,
                unit_number: input.unit_number,
            })
            .await
    }

    // -------------------------------------------------------------------
    // CAF records
    // -------------------------------------------------------------------

    /// Raise a single CAF by hand, numbered like generated ones.
    pub async fn create_caf(&self, caller: &Caller, input: NewCaf) -> FleetResult<Caf> {
        let organization_id = input.organization_id;
        authorize(caller, Resource::Organization(organization_id), Action::Create)?;
        require_text("title", &input.title)?;
        require_text("description", &input.description)?;
        self.store.organizations().get_by_id(organization_id).await?;

        if let Some(incident_id) = input.incident_id {
            let incident = self.store.incidents().get_by_id(incident_id).await?;
            if incident.organization_id != organization_id {
                return Err(FleetError::validation(
                    "incident belongs to another organization",
                ));
            }
        }
        if let Some(violation_id) = input.violation_id {
            let Some(incident_id) = input.incident_id else {
                return Err(FleetError::validation(
                    "violation_id requires the violation's incident_id",
                ));
            };
            let linked = self
                .store
                .violations()
                .list_by_incident(incident_id)
                .await?
                .iter()
                .any(|v| v.id == violation_id);
            if !linked {
                return Err(FleetError::not_found("violation", violation_id));
            }
        }
        if let Some(staff_id) = input.assigned_to {
            let staff = self.store.staff().get_by_id(staff_id).await?;
            if staff.organization_id != organization_id {
                return Err(FleetError::validation(
                    "assignee belongs to another organization",
                ));
            }
        }

        let draft = CafDraft {
            organization_id,
            incident_id: input.incident_id,
            violation_id: input.violation_id,
            title: input.title,
            description: input.description,
            corrective_action: input
                .corrective_action
                .unwrap_or_else(|| checklist(input.category)),
            category: input.category,
            subcategory: input
                .subcategory
                .unwrap_or_else(|| input.category.label().to_string()),
            priority: input.priority,
            requires_approval: input
                .requires_approval
                .unwrap_or(self.config.approval_required_by_default),
            assigned_to: input.assigned_to,
            created_by: caller.acting_staff(organization_id),
            due_date: input.due_date,
        };

        let caf = self.create_numbered(draft).await?;
        self.audit(
            organization_id,
            caf.created_by,
            "caf.created",
            Some(caf.id),
            None,
            Some(serde_json::json!({ "caf_number": caf.caf_number })),
        )
        .await;

        if let Some(incident_id) = caf.incident_id {
            self.cascade_quietly(incident_id).await;
        }
        Ok(caf)
    }

    /// Persist `draft` under the next free number of the current year,
    /// retrying when a concurrent writer claimed the same number.
    pub(crate) async fn create_numbered(&self, draft: CafDraft) -> FleetResult<Caf> {
        let year = Utc::now().year();
        let attempts = self.config.number_retry_attempts.max(1);

        for attempt in 1..=attempts {
            let last = self.store.cafs().max_sequence_for_year(year).await?;
            let number = CafNumber::next_after(year, last);

            match self.store.cafs().create(draft.clone().numbered(number)).await {
                Ok(caf) => return Ok(caf),
                Err(FleetError::AlreadyExists { .. }) => {
                    warn!(attempt, caf_number = %number, "CAF number already taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(CafError::NumberingExhausted { attempts }.into())
    }

    pub async fn get_caf(&self, caller: &Caller, caf_id: Uuid) -> FleetResult<CafDetail> {
        let caf = self.store.cafs().get_by_id(caf_id).await?;
        authorize(caller, Resource::Caf(&caf), Action::Read)?;

        let signatures = self.store.signatures().list_by_caf(caf_id).await?;
        let attachments = self.store.cafs().list_attachments(caf_id).await?;
        Ok(CafDetail {
            caf,
            signatures,
            attachments,
        })
    }

    pub async fn list_cafs(
        &self,
        caller: &Caller,
        organization_id: Uuid,
        filter: CafFilter,
        pagination: Pagination,
    ) -> FleetResult<PaginatedResult<Caf>> {
        authorize(caller, Resource::Organization(organization_id), Action::Read)?;
        self.store
            .cafs()
            .list(organization_id, filter, pagination)
            .await
    }

    pub async fn delete_caf(&self, caller: &Caller, caf_id: Uuid) -> FleetResult<()> {
        let caf = self.store.cafs().get_by_id(caf_id).await?;
        authorize(caller, Resource::Caf(&caf), Action::Delete)?;
        if caf.is_locked() {
            return Err(CafError::Locked {
                caf_number: caf.caf_number,
            }
            .into());
        }

        self.store.cafs().delete(caf_id).await?;
        info!(caf_id = %caf_id, caf_number = %caf.caf_number, "CAF deleted");

        self.audit(
            caf.organization_id,
            caller.acting_staff(caf.organization_id),
            "caf.deleted",
            Some(caf_id),
            None,
            Some(serde_json::json!({ "caf_number": caf.caf_number })),
        )
        .await;
        if let Some(incident_id) = caf.incident_id {
            self.cascade_quietly(incident_id).await;
        }
        Ok(())
    }

    pub async fn add_attachment(
        &self,
        caller: &Caller,
        caf_id: Uuid,
        input: NewAttachment,
    ) -> FleetResult<CafAttachment> {
        let caf = self.unlocked_caf_for_attachments(caller, caf_id).await?;
        require_text("file_name", &input.file_name)?;
        require_text("storage_key", &input.storage_key)?;

        let attachment = self
            .store
            .cafs()
            .add_attachment(CreateCafAttachment {
                caf_id,
                file_name: input.file_name,
                content_type: input.content_type,
                storage_key: input.storage_key,
                uploaded_by: caller.acting_staff(caf.organization_id),
            })
            .await?;

        self.audit(
            caf.organization_id,
            attachment.uploaded_by,
            "caf.attachment_added",
            Some(caf_id),
            None,
            Some(serde_json::json!({ "attachment_id": attachment.id })),
        )
        .await;
        Ok(attachment)
    }

    pub async fn remove_attachment(
        &self,
        caller: &Caller,
        caf_id: Uuid,
        attachment_id: Uuid,
    ) -> FleetResult<()> {
        let caf = self.unlocked_caf_for_attachments(caller, caf_id).await?;
        self.store
            .cafs()
            .remove_attachment(caf_id, attachment_id)
            .await?;

        self.audit(
            caf.organization_id,
            caller.acting_staff(caf.organization_id),
            "caf.attachment_removed",
            Some(caf_id),
            None,
            Some(serde_json::json!({ "attachment_id": attachment_id })),
        )
        .await;
        Ok(())
    }

    async fn unlocked_caf_for_attachments(
        &self,
        caller: &Caller,
        caf_id: Uuid,
    ) -> FleetResult<Caf> {
        let caf = self.store.cafs().get_by_id(caf_id).await?;
        authorize(caller, Resource::Caf(&caf), Action::ModifyAttachments)?;
        if caf.is_locked() {
            return Err(CafError::Locked {
                caf_number: caf.caf_number,
            }
            .into());
        }
        Ok(caf)
    }

    // -------------------------------------------------------------------
    // Shared helpers
    // -------------------------------------------------------------------

    /// Violations of `incident_id` that no CAF references yet.
    pub(crate) async fn unhandled_violations(
        &self,
        incident_id: Uuid,
    ) -> FleetResult<Vec<Violation>> {
        let violations = self.store.violations().list_by_incident(incident_id).await?;
        let handled: HashSet<Uuid> = self
            .store
            .cafs()
            .list_by_incident(incident_id)
            .await?
            .into_iter()
            .filter_map(|caf| caf.violation_id)
            .collect();

        Ok(violations
            .into_iter()
            .filter(|v| !handled.contains(&v.id))
            .collect())
    }

    /// Staff lookup that treats a dangling reference as absent.
    pub(crate) async fn find_staff(&self, staff_id: Option<Uuid>) -> FleetResult<Option<Staff>> {
        let Some(staff_id) = staff_id else {
            return Ok(None);
        };
        match self.store.staff().get_by_id(staff_id).await {
            Ok(staff) => Ok(Some(staff)),
            Err(FleetError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Append an audit entry. Failures are logged and swallowed.
    pub(crate) async fn audit(
        &self,
        organization_id: Uuid,
        actor: Option<Uuid>,
        action: &str,
        resource_id: Option<Uuid>,
        ip_address: Option<String>,
        metadata: Option<serde_json::Value>,
    ) {
        let (actor_id, actor_type) = match actor {
            Some(id) => (id, ActorType::Staff),
            None => (Uuid::nil(), ActorType::System),
        };

        let result = self
            .store
            .audit_log()
            .append(CreateAuditLogEntry {
                organization_id,
                actor_id,
                actor_type,
                action: action.to_string(),
                resource_id,
                outcome: AuditOutcome::Success,
                ip_address,
                metadata,
            })
            .await;

        if let Err(e) = result {
            warn!(error = %e, action, "Failed to append audit log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_lowercase_words() {
        assert!(validate_slug("acme-freight-2").is_ok());
        assert!(validate_slug("Acme").is_err());
        assert!(validate_slug("acme freight").is_err());
        assert!(validate_slug("  ").is_err());
    }

    #[test]
    fn blank_text_is_rejected() {
        let err = require_text("title", " \t").unwrap_err();
        assert_eq!(err.to_string(), "Validation error: title is required");
    }

    #[test]
    fn signature_request_notes_are_optional() {
        let req: SignatureRequest = serde_json::from_value(serde_json::json!({
            "staff_id": Uuid::nil(),
            "signature_type": "COMPLETION",
            "signature_data": "data:image/png;base64,AAAA",
        }))
        .unwrap();
        assert_eq!(req.signature_type, SignatureType::Completion);
        assert!(req.notes.is_none());
    }
}
