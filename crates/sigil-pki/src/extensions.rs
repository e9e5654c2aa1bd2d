//! Outgoing X.509 v3 extensions for leaf certificates.

use const_oid::{AssociatedOid, ObjectIdentifier};
use der::{Decode, Encode};
use der::asn1::{Ia5String, OctetString};
use sha1::{Digest, Sha1};
use sigil_core::models::certificate::{ExtendedKeyUsage, KeyUsage};
use sigil_core::models::subscriber::{SanKind, SubjectAltName};
use x509_cert::Certificate;
use x509_cert::ext::Extension;
use x509_cert::ext::pkix::certpolicy::PolicyInformation;
use x509_cert::ext::pkix::crl::dp::DistributionPoint;
use x509_cert::ext::pkix::name::{DistributionPointName, GeneralName};
use x509_cert::ext::pkix::{
    AccessDescription, AuthorityInfoAccessSyntax, AuthorityKeyIdentifier, BasicConstraints,
    CertificatePolicies, CrlDistributionPoints, ExtendedKeyUsage as EkuExtension,
    SubjectAltName as SanExtension, SubjectKeyIdentifier,
};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::PkiError;
use crate::usage;

pub const ANY_POLICY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.32.0");
pub const ID_AD_CA_ISSUERS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.2");

/// Issuer-side inputs: the CA certificate and the URLs that point back at it.
#[derive(Debug, Clone, Copy)]
pub struct IssuerExtensions<'a> {
    pub certificate: &'a Certificate,
    pub crl_url: &'a str,
    pub ca_issuer_url: &'a str,
}

/// The subject-side values decided by the policy engine.
#[derive(Debug, Clone, Copy)]
pub struct SubjectExtensions<'a> {
    pub public_key: &'a SubjectPublicKeyInfoOwned,
    pub key_usages: &'a [KeyUsage],
    pub extended_key_usages: &'a [ExtendedKeyUsage],
    pub subject_alt_names: &'a [SubjectAltName],
}

/// Build the full extension list for a leaf certificate.
///
/// The standard set is always present. Key usage, extended key usage and
/// SAN are appended only when non-empty; the usage extensions are critical.
pub fn leaf_extensions(
    issuer: IssuerExtensions<'_>,
    subject: SubjectExtensions<'_>,
) -> Result<Vec<Extension>, PkiError> {
    let mut extensions = vec![
        encode(
            &BasicConstraints {
                ca: false,
                path_len_constraint: None,
            },
            false,
        )?,
        encode(&authority_key_identifier(issuer.certificate)?, false)?,
        encode(
            &SubjectKeyIdentifier(OctetString::new(key_identifier(subject.public_key))?),
            false,
        )?,
        encode(&crl_distribution_points(issuer.crl_url)?, false)?,
        encode(
            &AuthorityInfoAccessSyntax(vec![AccessDescription {
                access_method: ID_AD_CA_ISSUERS,
                access_location: uri(issuer.ca_issuer_url)?,
            }]),
            false,
        )?,
        encode(
            &CertificatePolicies(vec![PolicyInformation {
                policy_identifier: ANY_POLICY,
                policy_qualifiers: None,
            }]),
            false,
        )?,
    ];

    if let Some(key_usage) = usage::key_usage_extension(subject.key_usages) {
        extensions.push(encode(&key_usage, true)?);
    }

    if !subject.extended_key_usages.is_empty() {
        let oids = subject
            .extended_key_usages
            .iter()
            .copied()
            .map(usage::extended_key_usage_oid)
            .collect();
        extensions.push(encode(&EkuExtension(oids), true)?);
    }

    if !subject.subject_alt_names.is_empty() {
        let names = subject
            .subject_alt_names
            .iter()
            .map(general_name)
            .collect::<Result<Vec<_>, _>>()?;
        extensions.push(encode(&SanExtension(names), false)?);
    }

    Ok(extensions)
}

/// SHA-1 over the subjectPublicKey BIT STRING (RFC 5280 §4.2.1.2 method 1).
pub fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec()
}

/// Reuse the issuer's own SKI when it carries one so AKI/SKI pairs match
/// across the chain; otherwise derive it from the issuer key.
fn authority_key_identifier(issuer: &Certificate) -> Result<AuthorityKeyIdentifier, PkiError> {
    let existing = issuer
        .tbs_certificate
        .extensions
        .iter()
        .flatten()
        .find(|ext| ext.extn_id == SubjectKeyIdentifier::OID);

    let key_id = match existing {
        Some(ext) => SubjectKeyIdentifier::from_der(ext.extn_value.as_bytes())?.0,
        None => OctetString::new(key_identifier(
            &issuer.tbs_certificate.subject_public_key_info,
        ))?,
    };

    Ok(AuthorityKeyIdentifier {
        key_identifier: Some(key_id),
        authority_cert_issuer: None,
        authority_cert_serial_number: None,
    })
}

fn crl_distribution_points(url: &str) -> Result<CrlDistributionPoints, PkiError> {
    Ok(CrlDistributionPoints(vec![DistributionPoint {
        distribution_point: Some(DistributionPointName::FullName(vec![uri(url)?])),
        reasons: None,
        crl_issuer: None,
    }]))
}

fn uri(value: &str) -> Result<GeneralName, PkiError> {
    Ok(GeneralName::UniformResourceIdentifier(Ia5String::new(value)?))
}

fn general_name(san: &SubjectAltName) -> Result<GeneralName, PkiError> {
    let value = Ia5String::new(&san.value)?;
    Ok(match san.kind {
        SanKind::Email => GeneralName::Rfc822Name(value),
        SanKind::Dns => GeneralName::DnsName(value),
    })
}

fn encode<T: Encode + AssociatedOid>(value: &T, critical: bool) -> Result<Extension, PkiError> {
    Ok(Extension {
        extn_id: T::OID,
        critical,
        extn_value: OctetString::new(value.to_der()?)?,
    })
}
