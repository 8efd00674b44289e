//! Violation classifier and carrier risk scoring.
//!
//! Codes are matched against a fixed table of CFR prefixes. The longest
//! matching prefix wins; among prefixes of equal length the one declared
//! first wins.

use fleetcomp_core::models::caf::{CafCategory, CafPriority};
use fleetcomp_core::models::violation::ResponsibilityType;
use serde::Serialize;

/// High-risk threshold on the out-of-service percentage.
pub const HIGH_RISK_OOS_PERCENT: f64 = 5.0;
/// Critical threshold on the out-of-service percentage.
pub const CRITICAL_OOS_PERCENT: f64 = 10.0;
/// Cap on the violation-volume multiplier.
const MAX_VOLUME_FACTOR: f64 = 5.0;

struct Rule {
    prefix: &'static str,
    category: CafCategory,
    subcategory: &'static str,
    priority: CafPriority,
    due_days: i64,
}

const fn rule(
    prefix: &'static str,
    category: CafCategory,
    subcategory: &'static str,
    priority: CafPriority,
    due_days: i64,
) -> Rule {
    Rule {
        prefix,
        category,
        subcategory,
        priority,
        due_days,
    }
}

#[rustfmt::skip]
static RULES: &[Rule] = &[
    rule("390.11", CafCategory::Company, "Driver Oversight", CafPriority::Medium, 14),
    rule("390.", CafCategory::Company, "General", CafPriority::Medium, 14),
    rule("391.41", CafCategory::DriverQualification, "Medical Certificate", CafPriority::High, 7),
    rule("391.45", CafCategory::DriverQualification, "Medical Certificate", CafPriority::High, 7),
    rule("391.", CafCategory::DriverQualification, "Qualification File", CafPriority::Medium, 14),
    rule("392.9A", CafCategory::Company, "Operating Authority", CafPriority::High, 7),
    rule("392.", CafCategory::DriverPerformance, "Driving Conduct", CafPriority::Medium, 7),
    rule("393.75", CafCategory::Equipment, "Tires", CafPriority::High, 2),
    rule("393.47", CafCategory::Equipment, "Brakes", CafPriority::High, 2),
    rule("393.48", CafCategory::Equipment, "Brakes", CafPriority::High, 2),
    rule("393.", CafCategory::Equipment, "Parts and Accessories", CafPriority::Medium, 7),
    rule("396.", CafCategory::Equipment, "Inspection and Maintenance", CafPriority::Medium, 7),
];

const FALLBACK_SUBCATEGORY: &str = "Other";
const FALLBACK_PRIORITY: CafPriority = CafPriority::Medium;
const FALLBACK_DUE_DAYS: i64 = 7;

/// Result of classifying one violation code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: CafCategory,
    pub subcategory: &'static str,
    /// CFR part, the leading three digits of the code.
    pub cfr_part: Option<u16>,
    pub priority: CafPriority,
    pub due_days: i64,
    pub responsibility: ResponsibilityType,
    /// `None` when the code fell through to the default rule.
    pub matched_prefix: Option<&'static str>,
}

/// Classify a violation code. `raw_type` is the source data's type string
/// and only matters for unmatched codes.
pub fn classify(code: &str, raw_type: &str) -> Classification {
    let normalized = code.trim().to_ascii_uppercase();
    let cfr_part = cfr_part(&normalized);

    let best = RULES
        .iter()
        .filter(|r| normalized.starts_with(r.prefix))
        .fold(None::<&Rule>, |best, r| match best {
            Some(b) if b.prefix.len() >= r.prefix.len() => Some(b),
            _ => Some(r),
        });

    match best {
        Some(rule) => Classification {
            category: rule.category,
            subcategory: rule.subcategory,
            cfr_part,
            priority: rule.priority,
            due_days: rule.due_days,
            responsibility: responsibility_for(rule.category),
            matched_prefix: Some(rule.prefix),
        },
        None => Classification {
            category: CafCategory::Company,
            subcategory: FALLBACK_SUBCATEGORY,
            cfr_part,
            priority: FALLBACK_PRIORITY,
            due_days: FALLBACK_DUE_DAYS,
            responsibility: ResponsibilityType::from_raw(raw_type),
            matched_prefix: None,
        },
    }
}

fn responsibility_for(category: CafCategory) -> ResponsibilityType {
    match category {
        CafCategory::Equipment => ResponsibilityType::Equipment,
        CafCategory::DriverQualification | CafCategory::DriverPerformance => {
            ResponsibilityType::Driver
        }
        CafCategory::Company => ResponsibilityType::Company,
    }
}

/// Leading three digits before the first `.`, e.g. `393` for `393.75(a)`.
pub fn cfr_part(code: &str) -> Option<u16> {
    let (head, _) = code.trim().split_once('.')?;
    if head.len() == 3 && head.bytes().all(|b| b.is_ascii_digit()) {
        head.parse().ok()
    } else {
        None
    }
}

/// Carrier risk derived from its out-of-service rate and violation volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskScore {
    pub oos_percent: f64,
    pub total_violations: u64,
    pub risk_score: f64,
    pub is_high_risk: bool,
    pub is_critical: bool,
}

pub fn score_risk(oos_percent: f64, total_violations: u64) -> RiskScore {
    let volume = (total_violations as f64 / 1000.0).min(MAX_VOLUME_FACTOR);
    RiskScore {
        oos_percent,
        total_violations,
        risk_score: oos_percent * volume,
        is_high_risk: oos_percent > HIGH_RISK_OOS_PERCENT,
        is_critical: oos_percent > CRITICAL_OOS_PERCENT,
    }
}
