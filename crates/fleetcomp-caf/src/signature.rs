//! Signature workflow: ordered completion/approval signing.

use chrono::Utc;
use fleetcomp_core::access::{Action, Caller, Resource, authorize};
use fleetcomp_core::error::{FleetError, FleetResult};
use fleetcomp_core::models::caf::{Caf, CafStatus, UpdateCaf};
use fleetcomp_core::models::signature::{CreateSignature, Signature, SignatureType};
use fleetcomp_core::models::staff::{AccessLevel, Staff};
use fleetcomp_core::repository::{CafRepository, SignatureRepository, StaffRepository, Store};
use tracing::info;
use uuid::Uuid;

use crate::error::CafError;
use crate::service::{CafService, SignatureOutcome, SignatureRequest};

/// Permission and ordering rules that depend only on already-loaded
/// records. `has_completion` is whether any completion signature exists.
pub(crate) fn check_signable(
    caf: &Caf,
    signer: &Staff,
    caller_is_master: bool,
    signature_type: SignatureType,
    has_completion: bool,
) -> Result<(), CafError> {
    match signature_type {
        SignatureType::Completion => {
            if !signer.can_sign_cafs {
                return Err(CafError::MissingPermission("sign CAFs"));
            }
        }
        SignatureType::Approval => {
            let master = caller_is_master || signer.access_level == AccessLevel::Master;
            if !signer.can_approve_cafs && !master {
                return Err(CafError::MissingPermission("approve CAFs"));
            }
        }
    }

    if caf.status != CafStatus::Completed {
        return Err(CafError::NotReadyForSignature {
            signature_type,
            actual: caf.status,
        });
    }

    if signature_type == SignatureType::Approval && !has_completion {
        return Err(CafError::MissingCompletionSignature);
    }
    Ok(())
}

/// CAF changes that follow a successful signature.
pub(crate) fn signature_update(
    caf: &Caf,
    signer: &Staff,
    signature_type: SignatureType,
    notes: Option<String>,
) -> UpdateCaf {
    let now = Utc::now();
    match signature_type {
        SignatureType::Completion if caf.requires_approval => UpdateCaf {
            completed_at: Some(Some(now)),
            completion_notes: Some(notes),
            ..Default::default()
        },
        SignatureType::Completion => UpdateCaf {
            status: Some(CafStatus::Approved),
            completed_at: Some(Some(now)),
            completion_notes: Some(notes),
            approved_at: Some(Some(now)),
            approved_by: Some(Some(signer.id)),
            ..Default::default()
        },
        SignatureType::Approval => UpdateCaf {
            status: Some(CafStatus::Approved),
            approved_at: Some(Some(now)),
            approved_by: Some(Some(signer.id)),
            ..Default::default()
        },
    }
}

impl<S: Store> CafService<S> {
    /// Sign a CAF as `request.staff_id`.
    ///
    /// Preconditions are checked in order: the CAF exists, the signer
    /// exists, the payload is present, the caller may sign as the signer,
    /// the signer holds the permission and the CAF is ready, and no
    /// identical signature exists. The signature and the CAF update are
    /// written together or not at all. Audit and cascade failures after
    /// that are logged only.
    pub async fn submit_signature(
        &self,
        caller: &Caller,
        caf_id: Uuid,
        request: SignatureRequest,
        ip_address: Option<String>,
    ) -> FleetResult<SignatureOutcome> {
        let caf = self.store.cafs().get_by_id(caf_id).await?;
        let signer = self.store.staff().get_by_id(request.staff_id).await?;
        if request.signature_data.trim().is_empty() {
            return Err(FleetError::validation("signature_data is required"));
        }

        authorize(caller, Resource::Staff(&signer), Action::SignAs)?;
        if signer.organization_id != caf.organization_id
            && signer.access_level != AccessLevel::Master
        {
            return Err(FleetError::access_denied(
                "signer does not belong to the CAF's organization",
            ));
        }

        let signatures = self.store.signatures().list_by_caf(caf_id).await?;
        let has_completion = signatures
            .iter()
            .any(|s| s.signature_type == SignatureType::Completion);
        check_signable(
            &caf,
            &signer,
            caller.is_master(),
            request.signature_type,
            has_completion,
        )?;

        let duplicate = signatures
            .iter()
            .any(|s| s.staff_id == signer.id && s.signature_type == request.signature_type);
        if duplicate {
            return Err(CafError::DuplicateSignature(request.signature_type).into());
        }

        let update = signature_update(&caf, &signer, request.signature_type, request.notes.clone());
        let stored = self
            .store
            .cafs()
            .sign(
                CreateSignature {
                    caf_id,
                    signature_type: request.signature_type,
                    staff_id: signer.id,
                    signature_data: request.signature_data,
                    ip_address: ip_address.clone(),
                    notes: request.notes,
                },
                CafStatus::Completed,
                update,
            )
            .await;
        let (signature, updated) = match stored {
            Ok(pair) => pair,
            Err(FleetError::AlreadyExists { .. }) => {
                return Err(CafError::DuplicateSignature(request.signature_type).into());
            }
            Err(FleetError::Conflict { .. }) => {
                let current = self.store.cafs().get_by_id(caf_id).await?;
                return Err(CafError::NotReadyForSignature {
                    signature_type: request.signature_type,
                    actual: current.status,
                }
                .into());
            }
            Err(e) => return Err(e),
        };

        info!(
            caf_id = %caf_id,
            caf_number = %caf.caf_number,
            signature_type = signature.signature_type.as_str(),
            staff_id = %signer.id,
            status = updated.status.as_str(),
            "CAF signed"
        );
        self.audit(
            caf.organization_id,
            Some(signer.id),
            "caf.signed",
            Some(caf_id),
            ip_address,
            Some(serde_json::json!({
                "signature_type": signature.signature_type.as_str(),
                "status": updated.status.as_str(),
            })),
        )
        .await;

        if let Some(incident_id) = updated.incident_id {
            self.cascade_quietly(incident_id).await;
        }

        Ok(SignatureOutcome {
            signature,
            caf: updated,
        })
    }

    pub async fn list_signatures(
        &self,
        caller: &Caller,
        caf_id: Uuid,
    ) -> FleetResult<Vec<Signature>> {
        let caf = self.store.cafs().get_by_id(caf_id).await?;
        authorize(caller, Resource::Caf(&caf), Action::Read)?;
        self.store.signatures().list_by_caf(caf_id).await
    }
}
