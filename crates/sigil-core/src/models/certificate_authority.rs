//! Certificate authority domain models.
//!
//! A CA owns its signed certificates, an encrypted private key (the CA
//! secret) and a CRL record. Only the identifiers of the CRL are consumed
//! here; CRL generation happens elsewhere.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether the CA signs locally or proxies to an external authority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CaType {
    Internal,
    External,
}

/// Lifecycle status of a CA.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CaStatus {
    Active,
    Disabled,
    /// Key material exists but no signed CA certificate has been installed.
    PendingCertificate,
}

/// Key algorithm of a CA key pair. Determines the signature algorithm of
/// every certificate the CA issues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum KeyAlgorithm {
    #[serde(rename = "RSA_2048")]
    Rsa2048,
    #[serde(rename = "RSA_4096")]
    Rsa4096,
    #[serde(rename = "EC_prime256v1")]
    EcPrime256v1,
    #[serde(rename = "EC_secp384r1")]
    EcSecp384r1,
}

impl KeyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa2048 => "RSA_2048",
            KeyAlgorithm::Rsa4096 => "RSA_4096",
            KeyAlgorithm::EcPrime256v1 => "EC_prime256v1",
            KeyAlgorithm::EcSecp384r1 => "EC_secp384r1",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RSA_2048" => Ok(KeyAlgorithm::Rsa2048),
            "RSA_4096" => Ok(KeyAlgorithm::Rsa4096),
            "EC_prime256v1" => Ok(KeyAlgorithm::EcPrime256v1),
            "EC_secp384r1" => Ok(KeyAlgorithm::EcSecp384r1),
            other => Err(format!("unknown key algorithm: {other}")),
        }
    }
}

/// A certificate authority.
///
/// Signing requires `status == Active` and a non-null
/// `active_ca_cert_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateAuthority {
    pub id: Uuid,
    pub project_id: Uuid,
    pub ca_type: CaType,
    pub status: CaStatus,
    pub key_algorithm: KeyAlgorithm,
    /// The CA certificate currently used for signing.
    pub active_ca_cert_id: Option<Uuid>,
    /// When true, only template-mediated issuance is allowed and direct
    /// CSR signing is refused.
    pub disable_direct_issuance: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields required to register a CA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCertificateAuthority {
    pub project_id: Uuid,
    pub ca_type: CaType,
    pub status: CaStatus,
    pub key_algorithm: KeyAlgorithm,
    pub disable_direct_issuance: bool,
}

/// Fields that can be updated on a CA.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCertificateAuthority {
    pub status: Option<CaStatus>,
    pub active_ca_cert_id: Option<Uuid>,
    pub disable_direct_issuance: Option<bool>,
}

/// A signed certificate belonging to a CA.
///
/// Every leaf the CA signs must nest inside `[not_before, not_after]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaCertificate {
    pub id: Uuid,
    pub ca_id: Uuid,
    /// KMS-encrypted DER of the CA certificate.
    pub encrypted_certificate: Vec<u8>,
    /// KMS-encrypted PEM of the CA's own chain (issuer and ancestors,
    /// excluding the CA certificate itself). Empty for roots.
    pub encrypted_certificate_chain: Vec<u8>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaCertificate {
    pub ca_id: Uuid,
    pub encrypted_certificate: Vec<u8>,
    pub encrypted_certificate_chain: Vec<u8>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// KMS-encrypted PKCS#8 DER private key of a CA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaSecret {
    pub id: Uuid,
    pub ca_id: Uuid,
    pub encrypted_private_key: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaSecret {
    pub ca_id: Uuid,
    pub encrypted_private_key: Vec<u8>,
}

/// Reference to a CA's certificate revocation list. Only its identifier
/// is embedded into issued certificates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaCrl {
    pub id: Uuid,
    pub ca_id: Uuid,
    pub ca_secret_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaCrl {
    pub ca_id: Uuid,
    pub ca_secret_id: Uuid,
}
