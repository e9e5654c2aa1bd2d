//! Error types for the Sigil system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SigilError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Trust error: {reason}")]
    Trust { reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Key management error: {0}")]
    Kms(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SigilResult<T> = Result<T, SigilError>;
