//! CAF status state machine.

use chrono::Utc;
use fleetcomp_core::access::{Action, Caller, Resource, authorize};
use fleetcomp_core::error::{FleetError, FleetResult};
use fleetcomp_core::models::caf::{Caf, CafStatus, UpdateCaf};
use fleetcomp_core::repository::{CafRepository, Store};
use tracing::info;
use uuid::Uuid;

use crate::service::CafService;

/// Field changes that accompany entering `to` from `from`.
pub(crate) fn transition_update(
    from: CafStatus,
    to: CafStatus,
    actor: Option<Uuid>,
) -> FleetResult<UpdateCaf> {
    if !from.can_transition_to(to) {
        return Err(FleetError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    let now = Utc::now();
    let mut update = UpdateCaf {
        status: Some(to),
        ..Default::default()
    };
    match to {
        CafStatus::InProgress if matches!(from, CafStatus::Completed | CafStatus::Rejected) => {
            update.completed_at = Some(None);
            update.completion_notes = Some(None);
        }
        CafStatus::Completed => update.completed_at = Some(Some(now)),
        CafStatus::Approved => {
            update.approved_at = Some(Some(now));
            update.approved_by = Some(actor);
        }
        _ => {}
    }
    Ok(update)
}

impl<S: Store> CafService<S> {
    /// Move a CAF to `to`. Entering `APPROVED` stamps the approver and
    /// reruns the completion cascade of the linked incident. The write only
    /// lands while the CAF still holds the status the check was made
    /// against.
    pub async fn transition_status(
        &self,
        caller: &Caller,
        caf_id: Uuid,
        to: CafStatus,
        ip_address: Option<String>,
    ) -> FleetResult<Caf> {
        let caf = self.store.cafs().get_by_id(caf_id).await?;
        authorize(caller, Resource::Caf(&caf), Action::Transition(to))?;

        let actor = caller.acting_staff(caf.organization_id);
        let update = transition_update(caf.status, to, actor)?;
        let updated = match self.store.cafs().update(caf_id, caf.status, update).await {
            Err(FleetError::Conflict { .. }) => {
                let current = self.store.cafs().get_by_id(caf_id).await?;
                return Err(FleetError::InvalidTransition {
                    from: current.status.to_string(),
                    to: to.to_string(),
                });
            }
            result => result?,
        };

        info!(
            caf_id = %caf_id,
            caf_number = %caf.caf_number,
            from = caf.status.as_str(),
            to = to.as_str(),
            "CAF status changed"
        );
        self.audit(
            caf.organization_id,
            actor,
            "caf.status_changed",
            Some(caf_id),
            ip_address,
            Some(serde_json::json!({
                "from": caf.status.as_str(),
                "to": to.as_str(),
            })),
        )
        .await;

        if to == CafStatus::Approved {
            if let Some(incident_id) = updated.incident_id {
                self.cascade_quietly(incident_id).await;
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_pairs_outside_the_table() {
        let err = transition_update(CafStatus::Approved, CafStatus::InProgress, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status transition: APPROVED -> IN_PROGRESS"
        );

        for from in CafStatus::ALL {
            for to in CafStatus::ALL {
                assert_eq!(
                    transition_update(from, to, None).is_ok(),
                    from.can_transition_to(to),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn completing_stamps_completion_time() {
        let update = transition_update(CafStatus::InProgress, CafStatus::Completed, None).unwrap();
        assert_eq!(update.status, Some(CafStatus::Completed));
        assert!(matches!(update.completed_at, Some(Some(_))));
    }

    #[test]
    fn approving_stamps_approver() {
        let approver = Uuid::new_v4();
        let update =
            transition_update(CafStatus::Completed, CafStatus::Approved, Some(approver)).unwrap();
        assert_eq!(update.approved_by, Some(Some(approver)));
        assert!(matches!(update.approved_at, Some(Some(_))));
    }

    #[test]
    fn reopening_clears_completion() {
        for from in [CafStatus::Completed, CafStatus::Rejected] {
            let update = transition_update(from, CafStatus::InProgress, None).unwrap();
            assert_eq!(update.completed_at, Some(None));
            assert_eq!(update.completion_notes, Some(None));
        }

        let update = transition_update(CafStatus::Assigned, CafStatus::InProgress, None).unwrap();
        assert!(update.completed_at.is_none());
    }
}
