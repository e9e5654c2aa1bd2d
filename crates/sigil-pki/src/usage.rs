//! Mappings between the domain usage enums and their X.509 encodings.
//!
//! Each key usage maps to exactly one KeyUsage bit; each extended key
//! usage to exactly one OID. The matches are exhaustive, so adding a
//! variant fails to compile until it is mapped here.

use const_oid::ObjectIdentifier;
use sigil_core::models::certificate::{ExtendedKeyUsage, KeyUsage};
use x509_cert::ext::pkix::KeyUsages;

pub const ID_KP_SERVER_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.1");
pub const ID_KP_CLIENT_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.2");
pub const ID_KP_CODE_SIGNING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.3");
pub const ID_KP_EMAIL_PROTECTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.4");
pub const ID_KP_TIME_STAMPING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.8");
pub const ID_KP_OCSP_SIGNING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.9");

/// KeyUsage BIT STRING flag for a usage (bit n is `1 << n`).
pub fn key_usage_bit(usage: KeyUsage) -> u16 {
    match usage {
        KeyUsage::DigitalSignature => 1 << 0,
        KeyUsage::NonRepudiation => 1 << 1,
        KeyUsage::KeyEncipherment => 1 << 2,
        KeyUsage::DataEncipherment => 1 << 3,
        KeyUsage::KeyAgreement => 1 << 4,
        KeyUsage::KeyCertSign => 1 << 5,
        KeyUsage::CrlSign => 1 << 6,
        KeyUsage::EncipherOnly => 1 << 7,
        KeyUsage::DecipherOnly => 1 << 8,
    }
}

pub fn key_usage_flag(usage: KeyUsage) -> KeyUsages {
    match usage {
        KeyUsage::DigitalSignature => KeyUsages::DigitalSignature,
        KeyUsage::NonRepudiation => KeyUsages::NonRepudiation,
        KeyUsage::KeyEncipherment => KeyUsages::KeyEncipherment,
        KeyUsage::DataEncipherment => KeyUsages::DataEncipherment,
        KeyUsage::KeyAgreement => KeyUsages::KeyAgreement,
        KeyUsage::KeyCertSign => KeyUsages::KeyCertSign,
        KeyUsage::CrlSign => KeyUsages::CRLSign,
        KeyUsage::EncipherOnly => KeyUsages::EncipherOnly,
        KeyUsage::DecipherOnly => KeyUsages::DecipherOnly,
    }
}

/// Decode the usages present in an X.509 KeyUsage extension value.
pub fn key_usages_from_extension(ext: &x509_cert::ext::pkix::KeyUsage) -> Vec<KeyUsage> {
    KeyUsage::ALL
        .into_iter()
        .filter(|usage| ext.0.contains(key_usage_flag(*usage)))
        .collect()
}

/// Build the X.509 KeyUsage value for a set of usages. Returns `None`
/// for an empty set.
pub fn key_usage_extension(usages: &[KeyUsage]) -> Option<x509_cert::ext::pkix::KeyUsage> {
    let mut iter = usages.iter().copied().map(key_usage_flag);
    let first = iter.next()?;
    let flags = iter.fold(first.into(), |acc: flagset::FlagSet<KeyUsages>, flag| acc | flag);
    Some(x509_cert::ext::pkix::KeyUsage(flags))
}

pub fn extended_key_usage_oid(usage: ExtendedKeyUsage) -> ObjectIdentifier {
    match usage {
        ExtendedKeyUsage::ServerAuth => ID_KP_SERVER_AUTH,
        ExtendedKeyUsage::ClientAuth => ID_KP_CLIENT_AUTH,
        ExtendedKeyUsage::CodeSigning => ID_KP_CODE_SIGNING,
        ExtendedKeyUsage::EmailProtection => ID_KP_EMAIL_PROTECTION,
        ExtendedKeyUsage::TimeStamping => ID_KP_TIME_STAMPING,
        ExtendedKeyUsage::OcspSigning => ID_KP_OCSP_SIGNING,
    }
}

/// Reverse lookup. Unknown OIDs return `None` and are rejected by the
/// policy engine rather than silently dropped.
pub fn extended_key_usage_from_oid(oid: &ObjectIdentifier) -> Option<ExtendedKeyUsage> {
    ExtendedKeyUsage::ALL
        .into_iter()
        .find(|usage| extended_key_usage_oid(*usage) == *oid)
}
