//! Issuance engine error types.
//!
//! Every rejection names the constraint that failed. [`PkiError::kind`]
//! groups them into the categories callers map onto responses.

use sigil_core::error::SigilError;
use thiserror::Error;

/// Coarse category of a [`PkiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The CA, subscriber or EST setup does not permit the operation.
    Configuration,
    /// The request (CSR, TTL, DN) violates the subscriber policy.
    Validation,
    /// The enrolling client could not be authenticated.
    Trust,
    Authorization,
    NotFound,
    /// KMS, persistence or lookup failure.
    Dependency,
}

#[derive(Debug, Error)]
pub enum PkiError {
    // Configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("EST enrollment is disabled for this configuration")]
    EstDisabled,

    #[error("certificate authority is not active")]
    CaInactive,

    #[error("certificate authority has no active CA certificate")]
    CaCertificateMissing,

    #[error("certificate authority only issues through certificate templates")]
    DirectIssuanceDisabled,

    #[error("certificate authority is external and cannot sign locally")]
    ExternalCa,

    #[error("subscriber is not active")]
    SubscriberInactive,

    #[error("subscriber has no certificate authority")]
    SubscriberWithoutCa,

    // Validation
    #[error("subject common name '{requested}' does not match subscriber common name '{expected}'")]
    CommonNameMismatch { expected: String, requested: String },

    #[error("key usage '{usage}' is not allowed for this subscriber")]
    KeyUsageNotAllowed { usage: String },

    #[error("extended key usage '{usage}' is not allowed for this subscriber")]
    ExtendedKeyUsageNotAllowed { usage: String },

    #[error("subject alternative name '{value}' is not allowed for this subscriber")]
    SanNotAllowed { value: String },

    #[error("certificate validity {not_before} .. {not_after} exceeds the CA certificate window")]
    TtlExceedsCaWindow { not_before: String, not_after: String },

    #[error("invalid ttl '{0}'")]
    InvalidTtl(String),

    #[error("malformed certificate signing request: {0}")]
    MalformedCsr(String),

    #[error("malformed distinguished name: {0}")]
    MalformedDn(String),

    // Trust
    #[error("missing client certificate")]
    MissingClientCertificate,

    #[error("failed to parse certificate chain: {0}")]
    ChainParseError(String),

    #[error("client certificate is not trusted: {0}")]
    UntrustedClient(String),

    // Authorization
    #[error("actor is not permitted to {action} subscriber '{subscriber}'")]
    Forbidden { action: String, subscriber: String },

    // Dependencies
    #[error("CA chain or CRL lookup failed: {0}")]
    CaChainUnavailable(String),

    #[error("key management failure: {0}")]
    Kms(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error(transparent)]
    Store(#[from] SigilError),
}

impl PkiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PkiError::InvalidConfig(_)
            | PkiError::EstDisabled
            | PkiError::CaInactive
            | PkiError::CaCertificateMissing
            | PkiError::DirectIssuanceDisabled
            | PkiError::ExternalCa
            | PkiError::SubscriberInactive
            | PkiError::SubscriberWithoutCa => ErrorKind::Configuration,

            PkiError::CommonNameMismatch { .. }
            | PkiError::KeyUsageNotAllowed { .. }
            | PkiError::ExtendedKeyUsageNotAllowed { .. }
            | PkiError::SanNotAllowed { .. }
            | PkiError::TtlExceedsCaWindow { .. }
            | PkiError::InvalidTtl(_)
            | PkiError::MalformedCsr(_)
            | PkiError::MalformedDn(_) => ErrorKind::Validation,

            PkiError::MissingClientCertificate
            | PkiError::ChainParseError(_)
            | PkiError::UntrustedClient(_) => ErrorKind::Trust,

            PkiError::Forbidden { .. } => ErrorKind::Authorization,

            PkiError::Store(SigilError::NotFound { .. }) => ErrorKind::NotFound,
            PkiError::Store(SigilError::AuthorizationDenied { .. }) => ErrorKind::Authorization,
            PkiError::Store(SigilError::Validation { .. })
            | PkiError::Store(SigilError::AlreadyExists { .. }) => ErrorKind::Validation,
            PkiError::Store(SigilError::Configuration { .. }) => ErrorKind::Configuration,
            PkiError::Store(SigilError::Trust { .. }) => ErrorKind::Trust,

            PkiError::CaChainUnavailable(_)
            | PkiError::Kms(_)
            | PkiError::Crypto(_)
            | PkiError::UnsupportedAlgorithm(_)
            | PkiError::Store(_) => ErrorKind::Dependency,
        }
    }

    /// Only dependency failures may be retried, and only by re-running
    /// the whole issuance. Encoding and algorithm failures repeat on retry.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Dependency
            && !matches!(self, PkiError::UnsupportedAlgorithm(_) | PkiError::Crypto(_))
    }
}

impl From<der::Error> for PkiError {
    fn from(err: der::Error) -> Self {
        PkiError::Crypto(format!("DER encoding: {err}"))
    }
}

impl From<PkiError> for SigilError {
    fn from(err: PkiError) -> Self {
        match err {
            PkiError::Store(inner) => inner,
            PkiError::Kms(msg) => SigilError::Kms(msg),
            PkiError::Crypto(msg) => SigilError::Crypto(msg),
            other => match other.kind() {
                ErrorKind::Configuration => SigilError::Configuration {
                    reason: other.to_string(),
                },
                ErrorKind::Validation => SigilError::Validation {
                    message: other.to_string(),
                },
                ErrorKind::Trust => SigilError::Trust {
                    reason: other.to_string(),
                },
                ErrorKind::Authorization => SigilError::AuthorizationDenied {
                    reason: other.to_string(),
                },
                ErrorKind::NotFound | ErrorKind::Dependency => {
                    SigilError::Certificate(other.to_string())
                }
            },
        }
    }
}

pub type PkiResult<T> = Result<T, PkiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_violations_are_not_retryable() {
        let err = PkiError::KeyUsageNotAllowed {
            usage: "keyEncipherment".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
    }

    #[test]
    fn kms_failures_are_retryable_dependency_errors() {
        let err = PkiError::Kms("timeout".into());
        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert!(err.is_retryable());
    }

    #[test]
    fn crypto_failures_are_not_retryable() {
        let err = PkiError::Crypto("invalid PKCS#8 key".into());
        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert!(!err.is_retryable());

        let err = PkiError::from(der::Error::from(der::ErrorKind::Failed));
        assert!(!err.is_retryable());
    }

    #[test]
    fn serial_collision_from_the_store_is_retryable() {
        let err = PkiError::Store(SigilError::Database(
            "Serial number 01 already issued by CA x".into(),
        ));
        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert!(err.is_retryable());
    }

    #[test]
    fn store_not_found_keeps_its_category() {
        let err = PkiError::Store(SigilError::NotFound {
            entity: "pki_subscriber".into(),
            id: "name=api".into(),
        });
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(SigilError::from(err), SigilError::NotFound { .. }));
    }

    #[test]
    fn trust_errors_surface_as_unauthorized() {
        let converted = SigilError::from(PkiError::UntrustedClient("bad link".into()));
        assert!(matches!(converted, SigilError::Trust { .. }));
    }
}
