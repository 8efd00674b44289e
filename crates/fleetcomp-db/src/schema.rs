//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Organizations
-- =======================================================================
DEFINE TABLE organization SCHEMAFULL;
DEFINE FIELD name ON TABLE organization TYPE string;
DEFINE FIELD slug ON TABLE organization TYPE string;
DEFINE FIELD dot_number ON TABLE organization TYPE option<string>;
DEFINE FIELD is_master ON TABLE organization TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_organization_slug ON TABLE organization \
    COLUMNS slug UNIQUE;

-- =======================================================================
-- Staff (organization scope)
-- =======================================================================
DEFINE TABLE staff SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE staff TYPE string;
DEFINE FIELD location_id ON TABLE staff TYPE option<string>;
DEFINE FIELD identity_id ON TABLE staff TYPE string;
DEFINE FIELD name ON TABLE staff TYPE string;
DEFINE FIELD email ON TABLE staff TYPE string;
DEFINE FIELD access_level ON TABLE staff TYPE string \
    ASSERT $value IN ['Master', 'Organization', 'Location'];
DEFINE FIELD can_sign_cafs ON TABLE staff TYPE bool DEFAULT false;
DEFINE FIELD can_approve_cafs ON TABLE staff TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE staff TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE staff TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_staff_org_identity ON TABLE staff \
    COLUMNS organization_id, identity_id UNIQUE;
DEFINE INDEX idx_staff_identity ON TABLE staff COLUMNS identity_id;

-- =======================================================================
-- Incidents (organization scope)
-- =======================================================================
DEFINE TABLE incident SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE incident TYPE string;
DEFINE FIELD occurred_at ON TABLE incident TYPE datetime;
DEFINE FIELD kind ON TABLE incident TYPE string \
    ASSERT $value IN ['accident', 'inspection'];
DEFINE FIELD details ON TABLE incident TYPE object FLEXIBLE;
DEFINE FIELD status ON TABLE incident TYPE string \
    ASSERT $value IN ['PENDING', 'RESOLVED'];
DEFINE FIELD completed_at ON TABLE incident TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE incident TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE incident TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_incident_org ON TABLE incident COLUMNS organization_id;

-- =======================================================================
-- Violations (organization scope, per incident)
-- =======================================================================
DEFINE TABLE violation SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE violation TYPE string;
DEFINE FIELD incident_id ON TABLE violation TYPE string;
DEFINE FIELD code ON TABLE violation TYPE string;
DEFINE FIELD section ON TABLE violation TYPE string;
DEFINE FIELD description ON TABLE violation TYPE string;
DEFINE FIELD severity ON TABLE violation TYPE string \
    ASSERT $value IN ['Warning', 'Citation', 'OutOfService'];
DEFINE FIELD responsibility ON TABLE violation TYPE string \
    ASSERT $value IN ['Driver', 'Equipment', 'Company'];
DEFINE FIELD unit_number ON TABLE violation TYPE option<string>;
DEFINE FIELD created_at ON TABLE violation TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_violation_incident ON TABLE violation COLUMNS incident_id;
DEFINE INDEX idx_violation_org ON TABLE violation COLUMNS organization_id;

-- =======================================================================
-- Corrective Action Forms (organization scope)
-- =======================================================================
DEFINE TABLE caf SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE caf TYPE string;
DEFINE FIELD incident_id ON TABLE caf TYPE option<string>;
DEFINE FIELD violation_id ON TABLE caf TYPE option<string>;
DEFINE FIELD caf_number ON TABLE caf TYPE string;
DEFINE FIELD number_year ON TABLE caf TYPE int;
DEFINE FIELD number_sequence ON TABLE caf TYPE int;
DEFINE FIELD title ON TABLE caf TYPE string;
DEFINE FIELD description ON TABLE caf TYPE string;
DEFINE FIELD corrective_action ON TABLE caf TYPE string;
DEFINE FIELD category ON TABLE caf TYPE string \
    ASSERT $value IN ['EQUIPMENT', 'DRIVER_QUALIFICATION', \
    'DRIVER_PERFORMANCE', 'COMPANY'];
DEFINE FIELD subcategory ON TABLE caf TYPE string;
DEFINE FIELD priority ON TABLE caf TYPE string \
    ASSERT $value IN ['LOW', 'MEDIUM', 'HIGH', 'CRITICAL'];
DEFINE FIELD status ON TABLE caf TYPE string \
    ASSERT $value IN ['ASSIGNED', 'IN_PROGRESS', 'COMPLETED', \
    'APPROVED', 'REJECTED', 'CANCELLED'];
DEFINE FIELD requires_approval ON TABLE caf TYPE bool DEFAULT true;
DEFINE FIELD assigned_to ON TABLE caf TYPE option<string>;
DEFINE FIELD created_by ON TABLE caf TYPE option<string>;
DEFINE FIELD due_date ON TABLE caf TYPE datetime;
DEFINE FIELD completed_at ON TABLE caf TYPE option<datetime>;
DEFINE FIELD completion_notes ON TABLE caf TYPE option<string>;
DEFINE FIELD approved_at ON TABLE caf TYPE option<datetime>;
DEFINE FIELD approved_by ON TABLE caf TYPE option<string>;
DEFINE FIELD created_at ON TABLE caf TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE caf TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_caf_number ON TABLE caf COLUMNS caf_number UNIQUE;
DEFINE INDEX idx_caf_year_sequence ON TABLE caf \
    COLUMNS number_year, number_sequence;
DEFINE INDEX idx_caf_org ON TABLE caf COLUMNS organization_id;
DEFINE INDEX idx_caf_incident ON TABLE caf COLUMNS incident_id;

-- =======================================================================
-- CAF attachments (metadata only; files live in external storage)
-- =======================================================================
DEFINE TABLE caf_attachment SCHEMAFULL;
DEFINE FIELD caf_id ON TABLE caf_attachment TYPE string;
DEFINE FIELD file_name ON TABLE caf_attachment TYPE string;
DEFINE FIELD content_type ON TABLE caf_attachment TYPE string;
DEFINE FIELD storage_key ON TABLE caf_attachment TYPE string;
DEFINE FIELD uploaded_by ON TABLE caf_attachment TYPE option<string>;
DEFINE FIELD uploaded_at ON TABLE caf_attachment TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_caf_attachment_caf ON TABLE caf_attachment COLUMNS caf_id;

-- =======================================================================
-- CAF signatures
-- =======================================================================
DEFINE TABLE caf_signature SCHEMAFULL;
DEFINE FIELD caf_id ON TABLE caf_signature TYPE string;
DEFINE FIELD signature_type ON TABLE caf_signature TYPE string \
    ASSERT $value IN ['COMPLETION', 'APPROVAL'];
DEFINE FIELD staff_id ON TABLE caf_signature TYPE string;
DEFINE FIELD signature_data ON TABLE caf_signature TYPE string;
DEFINE FIELD signed_at ON TABLE caf_signature TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD ip_address ON TABLE caf_signature TYPE option<string>;
DEFINE FIELD notes ON TABLE caf_signature TYPE option<string>;
DEFINE INDEX idx_signature_unique ON TABLE caf_signature \
    COLUMNS caf_id, staff_id, signature_type UNIQUE;

-- =======================================================================
-- Audit Log (organization scope, append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD organization_id ON TABLE audit_log TYPE string;
DEFINE FIELD actor_id ON TABLE audit_log TYPE string;
DEFINE FIELD actor_type ON TABLE audit_log TYPE string \
    ASSERT $value IN ['Staff', 'System'];
DEFINE FIELD action ON TABLE audit_log TYPE string;
DEFINE FIELD resource_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD outcome ON TABLE audit_log TYPE string \
    ASSERT $value IN ['Success', 'Failure', 'Denied'];
DEFINE FIELD ip_address ON TABLE audit_log TYPE option<string>;
DEFINE FIELD metadata ON TABLE audit_log TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_org_time ON TABLE audit_log \
    COLUMNS organization_id, timestamp;
DEFINE INDEX idx_audit_org_actor ON TABLE audit_log \
    COLUMNS organization_id, actor_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query(
            "CREATE _migration SET version = $version, \
             name = $name",
        )
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!(
                "Failed to record migration v{}: {}",
                migration.version, e,
            ))
        })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_defines_every_table() {
        for table in [
            "organization",
            "staff",
            "incident",
            "violation",
            "caf",
            "caf_attachment",
            "caf_signature",
            "audit_log",
        ] {
            assert!(
                SCHEMA_V1.contains(&format!("DEFINE TABLE {table} ")),
                "missing table {table}"
            );
        }
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
