//! Sigil PKI: leaf certificate issuance under per-subscriber policy,
//! client chain verification and EST simple enrollment.

pub mod builder;
pub mod chain;
pub mod config;
pub mod csr;
pub mod dn;
pub mod envelope;
pub mod error;
pub mod est;
pub mod extensions;
pub mod issuance;
pub mod kms;
pub mod pkcs7;
pub mod policy;
pub mod serial;
pub mod signer;
pub mod subscriber;
pub mod ttl;
pub mod usage;
pub mod verify;

#[cfg(test)]
mod test_support;

pub use config::PkiConfig;
pub use envelope::EnvelopePersistenceAdapter;
pub use error::{ErrorKind, PkiError, PkiResult};
pub use est::{EnrollmentStage, EstService};
pub use issuance::{CertificateIssuer, IssuanceMode, IssuedCertificate};
pub use kms::{LocalKms, LocalKmsConfig};
pub use policy::IssuancePolicyEngine;
pub use subscriber::{SignCertificateInput, SubscriberService, SubscriberView};
