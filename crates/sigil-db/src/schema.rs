//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. Ciphertexts are base64 strings.

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
    name: "initial_pki_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Certificate authorities
-- =======================================================================
DEFINE TABLE certificate_authority SCHEMAFULL;
DEFINE FIELD project_id ON TABLE certificate_authority TYPE string;
DEFINE FIELD ca_type ON TABLE certificate_authority TYPE string \
    ASSERT $value IN ['Internal', 'External'];
DEFINE FIELD status ON TABLE certificate_authority TYPE string \
    ASSERT $value IN ['Active', 'Disabled', 'PendingCertificate'];
DEFINE FIELD key_algorithm ON TABLE certificate_authority TYPE string \
    ASSERT $value IN ['RSA_2048', 'RSA_4096', 'EC_prime256v1', \
    'EC_secp384r1'];
DEFINE FIELD active_ca_cert_id ON TABLE certificate_authority \
    TYPE option<string>;
DEFINE FIELD disable_direct_issuance ON TABLE certificate_authority \
    TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE certificate_authority TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_ca_project ON TABLE certificate_authority \
    COLUMNS project_id;

DEFINE TABLE ca_certificate SCHEMAFULL;
DEFINE FIELD ca_id ON TABLE ca_certificate TYPE string;
DEFINE FIELD encrypted_certificate ON TABLE ca_certificate TYPE string;
DEFINE FIELD encrypted_certificate_chain ON TABLE ca_certificate \
    TYPE string;
DEFINE FIELD not_before ON TABLE ca_certificate TYPE datetime;
DEFINE FIELD not_after ON TABLE ca_certificate TYPE datetime;
DEFINE FIELD created_at ON TABLE ca_certificate TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_ca_certificate_ca ON TABLE ca_certificate \
    COLUMNS ca_id;

DEFINE TABLE ca_secret SCHEMAFULL;
DEFINE FIELD ca_id ON TABLE ca_secret TYPE string;
DEFINE FIELD encrypted_private_key ON TABLE ca_secret TYPE string \
    ASSERT string::len($value) > 0;
DEFINE FIELD created_at ON TABLE ca_secret TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_ca_secret_ca ON TABLE ca_secret COLUMNS ca_id UNIQUE;

DEFINE TABLE ca_crl SCHEMAFULL;
DEFINE FIELD ca_id ON TABLE ca_crl TYPE string;
DEFINE FIELD ca_secret_id ON TABLE ca_crl TYPE string;
DEFINE FIELD created_at ON TABLE ca_crl TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_ca_crl_secret ON TABLE ca_crl COLUMNS ca_secret_id;

-- =======================================================================
-- Subscribers
-- =======================================================================
DEFINE TABLE pki_subscriber SCHEMAFULL;
DEFINE FIELD project_id ON TABLE pki_subscriber TYPE string;
DEFINE FIELD ca_id ON TABLE pki_subscriber TYPE option<string>;
DEFINE FIELD name ON TABLE pki_subscriber TYPE string;
DEFINE FIELD common_name ON TABLE pki_subscriber TYPE string;
DEFINE FIELD status ON TABLE pki_subscriber TYPE string \
    ASSERT $value IN ['Active', 'Disabled'];
DEFINE FIELD ttl ON TABLE pki_subscriber TYPE string;
DEFINE FIELD subject_alternative_names ON TABLE pki_subscriber \
    TYPE array<string> DEFAULT [];
DEFINE FIELD key_usages ON TABLE pki_subscriber TYPE array<string> \
    DEFAULT [];
DEFINE FIELD extended_key_usages ON TABLE pki_subscriber \
    TYPE array<string> DEFAULT [];
DEFINE FIELD created_at ON TABLE pki_subscriber TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE pki_subscriber TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_pki_subscriber_project_name ON TABLE pki_subscriber \
    COLUMNS project_id, name UNIQUE;

-- =======================================================================
-- Issued certificates
-- =======================================================================
DEFINE TABLE certificate SCHEMAFULL;
DEFINE FIELD project_id ON TABLE certificate TYPE string;
DEFINE FIELD ca_id ON TABLE certificate TYPE string;
DEFINE FIELD ca_cert_id ON TABLE certificate TYPE string;
DEFINE FIELD subscriber_id ON TABLE certificate TYPE option<string>;
DEFINE FIELD serial_number ON TABLE certificate TYPE string;
DEFINE FIELD common_name ON TABLE certificate TYPE string;
DEFINE FIELD alt_names ON TABLE certificate TYPE string DEFAULT '';
DEFINE FIELD not_before ON TABLE certificate TYPE datetime;
DEFINE FIELD not_after ON TABLE certificate TYPE datetime;
DEFINE FIELD key_usages ON TABLE certificate TYPE array<string> \
    DEFAULT [];
DEFINE FIELD extended_key_usages ON TABLE certificate \
    TYPE array<string> DEFAULT [];
DEFINE FIELD status ON TABLE certificate TYPE string \
    ASSERT $value IN ['Active', 'Revoked'];
DEFINE FIELD created_at ON TABLE certificate TYPE datetime;
DEFINE INDEX idx_certificate_ca_serial ON TABLE certificate \
    COLUMNS ca_id, serial_number UNIQUE;
DEFINE INDEX idx_certificate_subscriber ON TABLE certificate \
    COLUMNS subscriber_id;

DEFINE TABLE certificate_body SCHEMAFULL;
DEFINE FIELD cert_id ON TABLE certificate_body TYPE string;
DEFINE FIELD encrypted_certificate ON TABLE certificate_body \
    TYPE string ASSERT string::len($value) > 0;
DEFINE FIELD encrypted_certificate_chain ON TABLE certificate_body \
    TYPE string;
DEFINE INDEX idx_certificate_body_cert ON TABLE certificate_body \
    COLUMNS cert_id UNIQUE;
DEFINE EVENT cascade_certificate_body ON TABLE certificate \
    WHEN $event = 'DELETE' THEN { \
        DELETE certificate_body WHERE cert_id = meta::id($before.id) \
    };

-- =======================================================================
-- EST enrollment
-- =======================================================================
DEFINE TABLE est_config SCHEMAFULL;
DEFINE FIELD project_id ON TABLE est_config TYPE string;
DEFINE FIELD subscriber_id ON TABLE est_config TYPE string;
DEFINE FIELD is_enabled ON TABLE est_config TYPE bool DEFAULT true;
DEFINE FIELD ca_chain ON TABLE est_config TYPE string;
DEFINE FIELD created_at ON TABLE est_config TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_est_config_subscriber ON TABLE est_config \
    COLUMNS subscriber_id UNIQUE;
";

/// Run all pending migrations against the database.
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

    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > current_version)
    {
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

        db.query("CREATE _migration SET version = $version, name = $name")
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
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
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

    #[test]
    fn serial_numbers_are_unique_per_ca() {
        assert!(SCHEMA_V1.contains("COLUMNS ca_id, serial_number UNIQUE"));
    }
}
