//! Database-specific error types and conversions.

use sigil_core::error::SigilError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query rejected: {0}")]
    Query(String),

    #[error("Corrupt row: {0}")]
    Decode(String),

    /// Lost a serial-number race against the `(ca_id, serial_number)`
    /// index. Nothing was committed; re-running the issuance draws a new serial.
    #[error("Serial number {serial} already issued by CA {ca_id}")]
    SerialCollision { ca_id: String, serial: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl From<DbError> for SigilError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => SigilError::NotFound { entity, id },
            other => SigilError::Database(other.to_string()),
        }
    }
}
