//! Completion cascade: recompute an incident's status from its CAFs.
//!
//! An incident is remediated when it has at least one CAF and every CAF is
//! approved, carries a completion signature, and carries either an
//! approval signature or an approval timestamp. The check reads only
//! current state, so running it twice yields the same result.

use chrono::{DateTime, Utc};
use fleetcomp_core::access::{Action, Caller, Resource, authorize};
use fleetcomp_core::error::FleetResult;
use fleetcomp_core::models::caf::{Caf, CafStatus};
use fleetcomp_core::models::incident::{Incident, IncidentStatus};
use fleetcomp_core::models::signature::{Signature, SignatureType};
use fleetcomp_core::repository::{CafRepository, IncidentRepository, SignatureRepository, Store};
use tracing::{info, warn};
use uuid::Uuid;

use crate::service::CafService;

/// What the cascade needs to know about one CAF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CafCompletion {
    pub status: CafStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub has_completion: bool,
    pub has_approval: bool,
}

impl CafCompletion {
    pub fn new(caf: &Caf, signatures: &[Signature]) -> Self {
        let has = |kind: SignatureType| {
            signatures
                .iter()
                .any(|s| s.caf_id == caf.id && s.signature_type == kind)
        };
        Self {
            status: caf.status,
            approved_at: caf.approved_at,
            has_completion: has(SignatureType::Completion),
            has_approval: has(SignatureType::Approval),
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == CafStatus::Approved
            && self.has_completion
            && (self.has_approval || self.approved_at.is_some())
    }
}

pub fn is_remediated(cafs: &[CafCompletion]) -> bool {
    !cafs.is_empty() && cafs.iter().all(CafCompletion::is_done)
}

impl<S: Store> CafService<S> {
    /// Recompute the incident status on request.
    pub async fn recompute_incident(
        &self,
        caller: &Caller,
        incident_id: Uuid,
    ) -> FleetResult<Incident> {
        let incident = self.store.incidents().get_by_id(incident_id).await?;
        authorize(caller, Resource::Incident(&incident), Action::Create)?;
        self.run_cascade(incident).await
    }

    /// Cascade as a side effect: failures are logged, never returned.
    pub(crate) async fn cascade_quietly(&self, incident_id: Uuid) {
        let result = match self.store.incidents().get_by_id(incident_id).await {
            Ok(incident) => self.run_cascade(incident).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(incident_id = %incident_id, error = %e, "Completion cascade failed");
        }
    }

    async fn run_cascade(&self, incident: Incident) -> FleetResult<Incident> {
        let cafs = self.store.cafs().list_by_incident(incident.id).await?;

        let mut completions = Vec::with_capacity(cafs.len());
        for caf in &cafs {
            let signatures = self.store.signatures().list_by_caf(caf.id).await?;
            completions.push(CafCompletion::new(caf, &signatures));
        }

        let target = if is_remediated(&completions) {
            IncidentStatus::Resolved
        } else {
            IncidentStatus::Pending
        };
        if target == incident.status {
            return Ok(incident);
        }

        let completed_at = (target == IncidentStatus::Resolved).then(Utc::now);
        let updated = self
            .store
            .incidents()
            .set_status(incident.id, target, completed_at)
            .await?;

        info!(
            incident_id = %incident.id,
            from = incident.status.as_str(),
            to = target.as_str(),
            cafs = cafs.len(),
            "Incident status recomputed"
        );
        self.audit(
            incident.organization_id,
            None,
            "incident.status_changed",
            Some(incident.id),
            None,
            Some(serde_json::json!({
                "from": incident.status.as_str(),
                "to": target.as_str(),
            })),
        )
        .await;

        Ok(updated)
    }
}
