//! Issued certificate domain models.
//!
//! A [`Certificate`] row records one successful issuance. Its encrypted
//! DER and chain live in the 1:1 [`CertificateBody`], written in the same
//! transaction.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an issued certificate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CertificateStatus {
    Active,
    Revoked,
}

/// X.509 key usage, in bit order of the KeyUsage BIT STRING.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyUsage {
    #[serde(rename = "digitalSignature")]
    DigitalSignature,
    #[serde(rename = "nonRepudiation")]
    NonRepudiation,
    #[serde(rename = "keyEncipherment")]
    KeyEncipherment,
    #[serde(rename = "dataEncipherment")]
    DataEncipherment,
    #[serde(rename = "keyAgreement")]
    KeyAgreement,
    #[serde(rename = "keyCertSign")]
    KeyCertSign,
    #[serde(rename = "cRLSign")]
    CrlSign,
    #[serde(rename = "encipherOnly")]
    EncipherOnly,
    #[serde(rename = "decipherOnly")]
    DecipherOnly,
}

impl KeyUsage {
    pub const ALL: [KeyUsage; 9] = [
        KeyUsage::DigitalSignature,
        KeyUsage::NonRepudiation,
        KeyUsage::KeyEncipherment,
        KeyUsage::DataEncipherment,
        KeyUsage::KeyAgreement,
        KeyUsage::KeyCertSign,
        KeyUsage::CrlSign,
        KeyUsage::EncipherOnly,
        KeyUsage::DecipherOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyUsage::DigitalSignature => "digitalSignature",
            KeyUsage::NonRepudiation => "nonRepudiation",
            KeyUsage::KeyEncipherment => "keyEncipherment",
            KeyUsage::DataEncipherment => "dataEncipherment",
            KeyUsage::KeyAgreement => "keyAgreement",
            KeyUsage::KeyCertSign => "keyCertSign",
            KeyUsage::CrlSign => "cRLSign",
            KeyUsage::EncipherOnly => "encipherOnly",
            KeyUsage::DecipherOnly => "decipherOnly",
        }
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyUsage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyUsage::ALL
            .into_iter()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| format!("unknown key usage: {s}"))
    }
}

/// Extended key usage purposes understood by the issuer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExtendedKeyUsage {
    #[serde(rename = "serverAuth")]
    ServerAuth,
    #[serde(rename = "clientAuth")]
    ClientAuth,
    #[serde(rename = "codeSigning")]
    CodeSigning,
    #[serde(rename = "emailProtection")]
    EmailProtection,
    #[serde(rename = "timeStamping")]
    TimeStamping,
    #[serde(rename = "ocspSigning")]
    OcspSigning,
}

impl ExtendedKeyUsage {
    pub const ALL: [ExtendedKeyUsage; 6] = [
        ExtendedKeyUsage::ServerAuth,
        ExtendedKeyUsage::ClientAuth,
        ExtendedKeyUsage::CodeSigning,
        ExtendedKeyUsage::EmailProtection,
        ExtendedKeyUsage::TimeStamping,
        ExtendedKeyUsage::OcspSigning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtendedKeyUsage::ServerAuth => "serverAuth",
            ExtendedKeyUsage::ClientAuth => "clientAuth",
            ExtendedKeyUsage::CodeSigning => "codeSigning",
            ExtendedKeyUsage::EmailProtection => "emailProtection",
            ExtendedKeyUsage::TimeStamping => "timeStamping",
            ExtendedKeyUsage::OcspSigning => "ocspSigning",
        }
    }
}

impl fmt::Display for ExtendedKeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtendedKeyUsage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExtendedKeyUsage::ALL
            .into_iter()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| format!("unknown extended key usage: {s}"))
    }
}

/// Issuance record. Immutable after creation apart from a status
/// transition to `Revoked`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: Uuid,
    pub project_id: Uuid,
    pub ca_id: Uuid,
    /// The CA certificate that signed this certificate.
    pub ca_cert_id: Uuid,
    pub subscriber_id: Option<Uuid>,
    /// Lowercase hex serial, unique per CA.
    pub serial_number: String,
    pub common_name: String,
    /// Comma-joined SAN values actually embedded in the certificate.
    pub alt_names: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub key_usages: Vec<KeyUsage>,
    pub extended_key_usages: Vec<ExtendedKeyUsage>,
    pub status: CertificateStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields required to record a newly issued certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCertificate {
    pub project_id: Uuid,
    pub ca_id: Uuid,
    pub ca_cert_id: Uuid,
    pub subscriber_id: Option<Uuid>,
    pub serial_number: String,
    pub common_name: String,
    pub alt_names: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub key_usages: Vec<KeyUsage>,
    pub extended_key_usages: Vec<ExtendedKeyUsage>,
}

/// Encrypted certificate material, owned by exactly one [`Certificate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateBody {
    pub cert_id: Uuid,
    /// KMS-encrypted leaf DER.
    pub encrypted_certificate: Vec<u8>,
    /// KMS-encrypted PEM chain: issuer followed by its ancestors.
    pub encrypted_certificate_chain: Vec<u8>,
}

/// Encrypted material to store alongside a new certificate row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCertificateBody {
    pub encrypted_certificate: Vec<u8>,
    pub encrypted_certificate_chain: Vec<u8>,
}
