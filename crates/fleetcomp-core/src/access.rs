//! Capability check.
//!
//! Every route asks one question, "may this caller perform this action on
//! this resource?", through [`authorize`]. Callers are resolved from the
//! identity provider's subject into one [`Grant`] per staff record.

use uuid::Uuid;

use crate::error::{FleetError, FleetResult};
use crate::models::caf::{Caf, CafStatus};
use crate::models::incident::Incident;
use crate::models::staff::{AccessLevel, Staff};

/// What one staff record allows its identity to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub staff_id: Uuid,
    pub organization_id: Uuid,
    pub location_id: Option<Uuid>,
    pub access_level: AccessLevel,
    pub can_sign_cafs: bool,
    pub can_approve_cafs: bool,
}

impl From<&Staff> for Grant {
    fn from(staff: &Staff) -> Self {
        Self {
            staff_id: staff.id,
            organization_id: staff.organization_id,
            location_id: staff.location_id,
            access_level: staff.access_level,
            can_sign_cafs: staff.can_sign_cafs,
            can_approve_cafs: staff.can_approve_cafs,
        }
    }
}

/// An authenticated identity and everything it has been granted.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity_id: String,
    pub grants: Vec<Grant>,
}

impl Caller {
    pub fn new(identity_id: impl Into<String>, staff: &[Staff]) -> Self {
        Self {
            identity_id: identity_id.into(),
            grants: staff.iter().map(Grant::from).collect(),
        }
    }

    pub fn is_master(&self) -> bool {
        self.grants
            .iter()
            .any(|g| g.access_level == AccessLevel::Master)
    }

    /// The strongest grant the caller holds in `organization_id`.
    pub fn grant_for(&self, organization_id: Uuid) -> Option<&Grant> {
        self.grants
            .iter()
            .filter(|g| g.organization_id == organization_id)
            .min_by_key(|g| match g.access_level {
                AccessLevel::Master => 0,
                AccessLevel::Organization => 1,
                AccessLevel::Location => 2,
            })
    }

    /// Staff id to record as the actor for work in `organization_id`:
    /// the caller's own staff record there, else any master record.
    pub fn acting_staff(&self, organization_id: Uuid) -> Option<Uuid> {
        self.grant_for(organization_id)
            .or_else(|| {
                self.grants
                    .iter()
                    .find(|g| g.access_level == AccessLevel::Master)
            })
            .map(|g| g.staff_id)
    }

    pub fn holds_staff(&self, staff_id: Uuid) -> bool {
        self.grants.iter().any(|g| g.staff_id == staff_id)
    }
}

/// The object an action targets.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Organization(Uuid),
    Incident(&'a Incident),
    Caf(&'a Caf),
    Staff(&'a Staff),
}

impl Resource<'_> {
    fn organization_id(&self) -> Uuid {
        match self {
            Self::Organization(id) => *id,
            Self::Incident(incident) => incident.organization_id,
            Self::Caf(caf) => caf.organization_id,
            Self::Staff(staff) => staff.organization_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Delete,
    ManageStaff,
    GenerateCafs,
    ReadAuditLog,
    Transition(CafStatus),
    /// Sign a CAF on behalf of the target staff record.
    SignAs,
    ModifyAttachments,
}

/// Allow or deny `action` on `resource` for `caller`.
pub fn authorize(caller: &Caller, resource: Resource<'_>, action: Action) -> FleetResult<()> {
    if caller.is_master() {
        return Ok(());
    }

    if action == Action::SignAs {
        return match resource {
            Resource::Staff(staff) if staff.identity_id == caller.identity_id => Ok(()),
            Resource::Staff(_) => Err(FleetError::access_denied(
                "cannot sign on behalf of another staff member",
            )),
            _ => Err(FleetError::access_denied("signing requires a staff record")),
        };
    }

    let organization_id = resource.organization_id();
    let grant = caller
        .grant_for(organization_id)
        .ok_or_else(|| FleetError::access_denied("no access to this organization"))?;

    match action {
        Action::Read | Action::Create | Action::ModifyAttachments => Ok(()),
        Action::Delete | Action::ManageStaff | Action::GenerateCafs | Action::ReadAuditLog => {
            if grant.access_level == AccessLevel::Organization {
                Ok(())
            } else {
                Err(FleetError::access_denied(
                    "organization-level access is required",
                ))
            }
        }
        Action::Transition(to) => {
            let Resource::Caf(caf) = resource else {
                return Err(FleetError::access_denied("only CAFs have a status"));
            };
            if caf.assigned_to.is_some_and(|id| caller.holds_staff(id)) {
                return Ok(());
            }
            if to == CafStatus::Approved && grant.can_approve_cafs {
                return Ok(());
            }
            Err(FleetError::access_denied(format!(
                "not permitted to move this CAF to {to}"
            )))
        }
        Action::SignAs => Err(FleetError::access_denied("signing requires a staff record")),
    }
}
