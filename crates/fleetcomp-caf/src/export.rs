//! Flat CAF projection handed to the external PDF renderer.

use chrono::{DateTime, Utc};
use fleetcomp_core::access::{Action, Caller, Resource, authorize};
use fleetcomp_core::error::FleetResult;
use fleetcomp_core::models::caf::Caf;
use fleetcomp_core::models::organization::Organization;
use fleetcomp_core::models::signature::Signature;
use fleetcomp_core::models::staff::Staff;
use fleetcomp_core::repository::{CafRepository, OrganizationRepository, SignatureRepository, Store};
use serde::Serialize;
use uuid::Uuid;

use crate::service::CafService;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyExport {
    pub name: String,
    pub email: String,
}

impl From<&Staff> for PartyExport {
    fn from(staff: &Staff) -> Self {
        Self {
            name: staff.name.clone(),
            email: staff.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignatureExport {
    pub signature_type: String,
    /// `None` when the signer's staff record no longer exists.
    pub signer_name: Option<String>,
    pub signed_at: DateTime<Utc>,
    pub signature_data: String,
    pub ip_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CafExport {
    pub caf_number: String,
    pub organization_name: String,
    pub dot_number: Option<String>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub subcategory: String,
    pub priority: String,
    pub status: String,
    pub checklist: Vec<String>,
    pub assignee: Option<PartyExport>,
    pub creator: Option<PartyExport>,
    pub approver: Option<PartyExport>,
    pub created_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completion_notes: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub signatures: Vec<SignatureExport>,
}

/// Parties referenced by a CAF, resolved by the caller.
#[derive(Debug, Default)]
pub struct ExportParties<'a> {
    pub assignee: Option<&'a Staff>,
    pub creator: Option<&'a Staff>,
    pub approver: Option<&'a Staff>,
    /// Staff records of the signers, in any order.
    pub signers: &'a [Staff],
}

impl CafExport {
    pub fn project(
        caf: &Caf,
        organization: &Organization,
        parties: ExportParties<'_>,
        signatures: &[Signature],
    ) -> Self {
        let signatures = signatures
            .iter()
            .map(|s| SignatureExport {
                signature_type: s.signature_type.as_str().to_string(),
                signer_name: parties
                    .signers
                    .iter()
                    .find(|staff| staff.id == s.staff_id)
                    .map(|staff| staff.name.clone()),
                signed_at: s.signed_at,
                signature_data: s.signature_data.clone(),
                ip_address: s.ip_address.clone(),
                notes: s.notes.clone(),
            })
            .collect();

        Self {
            caf_number: caf.caf_number.clone(),
            organization_name: organization.name.clone(),
            dot_number: organization.dot_number.clone(),
            title: caf.title.clone(),
            description: caf.description.clone(),
            category: caf.category.label().to_string(),
            subcategory: caf.subcategory.clone(),
            priority: caf.priority.as_str().to_string(),
            status: caf.status.as_str().to_string(),
            checklist: caf
                .corrective_action
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
            assignee: parties.assignee.map(PartyExport::from),
            creator: parties.creator.map(PartyExport::from),
            approver: parties.approver.map(PartyExport::from),
            created_at: caf.created_at,
            due_date: caf.due_date,
            completed_at: caf.completed_at,
            completion_notes: caf.completion_notes.clone(),
            approved_at: caf.approved_at,
            signatures,
        }
    }
}

impl<S: Store> CafService<S> {
    pub async fn export_caf(&self, caller: &Caller, caf_id: Uuid) -> FleetResult<CafExport> {
        let caf = self.store.cafs().get_by_id(caf_id).await?;
        authorize(caller, Resource::Caf(&caf), Action::Read)?;

        let organization = self
            .store
            .organizations()
            .get_by_id(caf.organization_id)
            .await?;
        let signatures = self.store.signatures().list_by_caf(caf_id).await?;

        let assignee = self.find_staff(caf.assigned_to).await?;
        let creator = self.find_staff(caf.created_by).await?;
        let approver = self.find_staff(caf.approved_by).await?;
        let mut signers = Vec::with_capacity(signatures.len());
        for signature in &signatures {
            if let Some(staff) = self.find_staff(Some(signature.staff_id)).await? {
                signers.push(staff);
            }
        }

        Ok(CafExport::project(
            &caf,
            &organization,
            ExportParties {
                assignee: assignee.as_ref(),
                creator: creator.as_ref(),
                approver: approver.as_ref(),
                signers: &signers,
            },
            &signatures,
        ))
    }
}

#[cfg(test)]
mod tests {
    use fleetcomp_core::models::caf::{CafCategory, CafPriority, CafStatus};
    use fleetcomp_core::models::signature::SignatureType;
    use fleetcomp_core::models::staff::AccessLevel;

    use super::*;

    fn staff(name: &str) -> Staff {
        Staff {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            location_id: None,
            identity_id: name.to_lowercase(),
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            access_level: AccessLevel::Organization,
            can_sign_cafs: true,
            can_approve_cafs: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn projects_parties_checklist_and_signers() {
        let org = Organization {
            id: Uuid::new_v4(),
            name: "Acme Freight".into(),
            slug: "acme".into(),
            dot_number: Some("1234567".into()),
            is_master: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let mechanic = staff("Dana");
        let manager = staff("Robin");
        let caf = Caf {
            id: Uuid::new_v4(),
            organization_id: org.id,
            incident_id: None,
            violation_id: None,
            caf_number: "CAF-2025-0007".into(),
            number_year: 2025,
            number_sequence: 7,
            title: "Equipment Issue - 393.75(a)".into(),
            description: "Tread depth below minimum".into(),
            corrective_action: "1. Replace tire\n\n2. Re-inspect\n".into(),
            category: CafCategory::Equipment,
            subcategory: "Tires".into(),
            priority: CafPriority::Critical,
            status: CafStatus::Approved,
            requires_approval: true,
            assigned_to: Some(mechanic.id),
            created_by: None,
            due_date: Utc::now(),
            completed_at: Some(Utc::now()),
            completion_notes: Some("Replaced".into()),
            approved_at: Some(Utc::now()),
            approved_by: Some(manager.id),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let signature = |kind, signer: &Staff| Signature {
            id: Uuid::new_v4(),
            caf_id: caf.id,
            signature_type: kind,
            staff_id: signer.id,
            signature_data: "data:".into(),
            signed_at: Utc::now(),
            ip_address: None,
            notes: None,
        };
        let ghost = staff("Ghost");
        let signatures = [
            signature(SignatureType::Completion, &mechanic),
            signature(SignatureType::Approval, &manager),
            signature(SignatureType::Approval, &ghost),
        ];
        let signers = [mechanic.clone(), manager.clone()];

        let export = CafExport::project(
            &caf,
            &org,
            ExportParties {
                assignee: Some(&mechanic),
                creator: None,
                approver: Some(&manager),
                signers: &signers,
            },
            &signatures,
        );

        assert_eq!(export.caf_number, "CAF-2025-0007");
        assert_eq!(export.organization_name, "Acme Freight");
        assert_eq!(export.category, "Equipment");
        assert_eq!(export.priority, "CRITICAL");
        assert_eq!(export.checklist, vec!["1. Replace tire", "2. Re-inspect"]);
        assert_eq!(export.assignee.as_ref().map(|p| p.name.as_str()), Some("Dana"));
        assert!(export.creator.is_none());
        assert_eq!(export.approver.map(|p| p.name), Some("Robin".to_string()));
        assert_eq!(export.signatures.len(), 3);
        assert_eq!(export.signatures[0].signer_name.as_deref(), Some("Dana"));
        assert_eq!(export.signatures[1].signature_type, "APPROVAL");
        assert!(export.signatures[2].signer_name.is_none());
    }
}
