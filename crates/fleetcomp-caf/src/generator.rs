//! CAF generator: one CAF per violation of an incident that has none yet.
//!
//! Generation is not transactional: the first failure aborts the run and
//! CAFs already created for earlier violations stay in place.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use fleetcomp_core::access::{Action, Caller, Resource, authorize};
use fleetcomp_core::error::FleetResult;
use fleetcomp_core::models::caf::{Caf, CafCategory, CafPriority, CreateCaf};
use fleetcomp_core::models::violation::Violation;
use fleetcomp_core::repository::{IncidentRepository, StaffRepository, Store};
use tracing::{info, warn};
use uuid::Uuid;

use crate::classifier::classify;
use crate::numbering::CafNumber;
use crate::service::CafService;

/// A CAF waiting for its number.
#[derive(Debug, Clone)]
pub struct CafDraft {
    pub organization_id: Uuid,
    pub incident_id: Option<Uuid>,
    pub violation_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub corrective_action: String,
    pub category: CafCategory,
    pub subcategory: String,
    pub priority: CafPriority,
    pub requires_approval: bool,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub due_date: DateTime<Utc>,
}

impl CafDraft {
    pub fn numbered(self, number: CafNumber) -> CreateCaf {
        CreateCaf {
            organization_id: self.organization_id,
            incident_id: self.incident_id,
            violation_id: self.violation_id,
            caf_number: number.to_string(),
            number_year: number.year,
            number_sequence: number.sequence,
            title: self.title,
            description: self.description,
            corrective_action: self.corrective_action,
            category: self.category,
            subcategory: self.subcategory,
            priority: self.priority,
            requires_approval: self.requires_approval,
            assigned_to: self.assigned_to,
            created_by: self.created_by,
            due_date: self.due_date,
        }
    }
}

/// Fixed four-step corrective action checklist for a category.
pub fn checklist(category: CafCategory) -> String {
    let steps: [&str; 4] = match category {
        CafCategory::Equipment => [
            "Place the unit out of service until the defect is repaired",
            "Repair or replace the defective component",
            "Attach the work order and parts receipts",
            "Re-inspect the unit and update its maintenance file",
        ],
        CafCategory::DriverQualification => [
            "Review the driver qualification file",
            "Obtain the missing or expired documents",
            "Verify each document against the regulation",
            "Update the file and schedule renewal reminders",
        ],
        CafCategory::DriverPerformance => [
            "Review the violation with the driver",
            "Provide targeted retraining",
            "Document the coaching session with the driver's signature",
            "Monitor the driver's performance for 90 days",
        ],
        CafCategory::Company => [
            "Identify the policy or process gap",
            "Update the company policy or procedure",
            "Communicate the change to affected staff",
            "Verify compliance at the next internal audit",
        ],
    };

    steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {step}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Start of `today` plus `days`, in UTC.
pub fn due_date(today: NaiveDate, days: i64) -> DateTime<Utc> {
    today.and_time(NaiveTime::MIN).and_utc() + Duration::days(days)
}

/// Plan the CAF for one violation.
///
/// Out-of-service violations are always `Critical`, whatever the rule says.
pub fn plan_caf(
    violation: &Violation,
    today: NaiveDate,
    requires_approval: bool,
    assigned_to: Option<Uuid>,
    created_by: Option<Uuid>,
) -> CafDraft {
    let classification = classify(&violation.code, violation.responsibility.as_raw());
    let priority = if violation.is_out_of_service() {
        CafPriority::Critical
    } else {
        classification.priority
    };

    CafDraft {
        organization_id: violation.organization_id,
        incident_id: Some(violation.incident_id),
        violation_id: Some(violation.id),
        title: format!(
            "{} Issue - {}",
            classification.category.label(),
            violation.code
        ),
        description: violation.description.clone(),
        corrective_action: checklist(classification.category),
        category: classification.category,
        subcategory: classification.subcategory.to_string(),
        priority,
        requires_approval,
        assigned_to,
        created_by,
        due_date: due_date(today, classification.due_days),
    }
}

impl<S: Store> CafService<S> {
    /// Generate CAFs for every violation of the incident that has none.
    /// Returns only the CAFs created by this call.
    pub async fn generate_for_incident(
        &self,
        caller: &Caller,
        incident_id: Uuid,
    ) -> FleetResult<Vec<Caf>> {
        let incident = self.store.incidents().get_by_id(incident_id).await?;
        authorize(caller, Resource::Incident(&incident), Action::GenerateCafs)?;

        let pending = self.unhandled_violations(incident_id).await?;
        if pending.is_empty() {
            info!(incident_id = %incident_id, "No unhandled violations; nothing to generate");
            return Ok(Vec::new());
        }

        let organization_id = incident.organization_id;
        let assignee = self
            .store
            .staff()
            .first_approver(organization_id)
            .await?
            .map(|s| s.id);
        if assignee.is_none() {
            warn!(
                organization_id = %organization_id,
                "No staff member can approve CAFs; generated CAFs stay unassigned"
            );
        }
        let created_by = caller.acting_staff(organization_id);
        let today = Utc::now().date_naive();

        let mut created = Vec::with_capacity(pending.len());
        for violation in &pending {
            let draft = plan_caf(
                violation,
                today,
                self.config.approval_required_by_default,
                assignee,
                created_by,
            );
            match self.create_numbered(draft).await {
                Ok(caf) => created.push(caf),
                Err(e) => {
                    warn!(
                        incident_id = %incident_id,
                        violation_id = %violation.id,
                        created = created.len(),
                        error = %e,
                        "CAF generation aborted"
                    );
                    return Err(e);
                }
            }
        }

        info!(
            incident_id = %incident_id,
            count = created.len(),
            "CAFs generated"
        );
        self.audit(
            organization_id,
            created_by,
            "caf.generated",
            Some(incident_id),
            None,
            Some(serde_json::json!({
                "caf_numbers": created.iter().map(|c| c.caf_number.as_str()).collect::<Vec<_>>(),
            })),
        )
        .await;

        if !created.is_empty() {
            self.cascade_quietly(incident_id).await;
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use fleetcomp_core::models::violation::{ResponsibilityType, ViolationSeverity};

    use super::*;

    fn violation(code: &str, severity: ViolationSeverity) -> Violation {
        Violation {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            incident_id: Uuid::new_v4(),
            code: code.into(),
            section: "49 CFR".into(),
            description: format!("Violation of {code}"),
            severity,
            responsibility: ResponsibilityType::Equipment,
            unit_number: Some("T-12".into()),
            created_at: Utc::now(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[test]
    fn out_of_service_overrides_rule_priority() {
        let v = violation("393.75(a)", ViolationSeverity::OutOfService);
        let draft = plan_caf(&v, day(), true, None, None);

        assert_eq!(draft.priority, CafPriority::Critical);
        assert_eq!(draft.category, CafCategory::Equipment);
        assert_eq!(draft.subcategory, "Tires");
        assert_eq!(draft.due_date, due_date(day(), 2));
        assert_eq!(draft.violation_id, Some(v.id));
        assert_eq!(draft.incident_id, Some(v.incident_id));
    }

    #[test]
    fn rule_priority_applies_without_out_of_service() {
        let v = violation("390.11", ViolationSeverity::Warning);
        let draft = plan_caf(&v, day(), true, None, None);

        assert_eq!(draft.priority, CafPriority::Medium);
        assert_eq!(draft.title, "Company Issue - 390.11");
        assert_eq!(draft.description, "Violation of 390.11");
        assert_eq!(draft.due_date, due_date(day(), 14));
    }

    #[test]
    fn unmatched_code_uses_fallback_window() {
        let v = violation("999.1", ViolationSeverity::Citation);
        let draft = plan_caf(&v, day(), false, None, None);

        assert_eq!(draft.category, CafCategory::Company);
        assert_eq!(draft.subcategory, "Other");
        assert_eq!(draft.due_date, due_date(day(), 7));
        assert!(!draft.requires_approval);
    }

    #[test]
    fn due_date_starts_at_midnight() {
        let due = due_date(day(), 2);
        assert_eq!(due.to_rfc3339(), "2025-03-12T00:00:00+00:00");
    }

    #[test]
    fn every_checklist_has_four_numbered_steps() {
        for category in [
            CafCategory::Equipment,
            CafCategory::DriverQualification,
            CafCategory::DriverPerformance,
            CafCategory::Company,
        ] {
            let text = checklist(category);
            let lines: Vec<_> = text.lines().collect();
            assert_eq!(lines.len(), 4, "{category:?}");
            assert!(lines[0].starts_with("1. "));
            assert!(lines[3].starts_with("4. "));
        }
    }

    #[test]
    fn numbered_draft_carries_number_parts() {
        let v = violation("396.3", ViolationSeverity::Warning);
        let create = plan_caf(&v, day(), true, None, None).numbered(CafNumber {
            year: 2025,
            sequence: 3,
        });
        assert_eq!(create.caf_number, "CAF-2025-0003");
        assert_eq!(create.number_year, 2025);
        assert_eq!(create.number_sequence, 3);
    }
}
