//! Fixtures for unit tests: deterministic P-256 keys, CA certificates and CSRs.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use const_oid::ObjectIdentifier;
use der::asn1::Ia5String;
use der::pem::LineEnding;
use der::EncodePem;
use p256::ecdsa::{DerSignature, SigningKey};
use p256::pkcs8::EncodePrivateKey;
use sigil_core::models::certificate::KeyUsage;
use sigil_core::models::certificate_authority::KeyAlgorithm;
use x509_cert::builder::{Builder, CertificateBuilder, Profile, RequestBuilder};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{ExtendedKeyUsage, SubjectAltName};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;
use x509_cert::Certificate;

use crate::builder::x509_time;
use crate::signer::IssuerKey;
use crate::usage;

pub struct CaFixture {
    pub key: SigningKey,
    pub certificate: Certificate,
    pub pem: String,
}

pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_slice(&[seed; 32]).unwrap()
}

pub fn spki_for(key: &SigningKey) -> SubjectPublicKeyInfoOwned {
    SubjectPublicKeyInfoOwned::from_key(*key.verifying_key()).unwrap()
}

pub fn issuer_key(key: &SigningKey) -> IssuerKey {
    let der = key.to_pkcs8_der().unwrap();
    IssuerKey::from_pkcs8_der(KeyAlgorithm::EcPrime256v1, der.as_bytes()).unwrap()
}

pub fn ca_fixture(cn: &str) -> CaFixture {
    let now = Utc::now();
    ca_fixture_valid(cn, 1, now - Duration::days(1), now + Duration::days(3650))
}

/// Self-signed root with an explicit validity window.
pub fn ca_fixture_valid(
    cn: &str,
    seed: u8,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
) -> CaFixture {
    let key = signing_key(seed);
    let certificate = CertificateBuilder::new(
        Profile::Root,
        SerialNumber::new(&[seed]).unwrap(),
        Validity {
            not_before: x509_time(not_before).unwrap(),
            not_after: x509_time(not_after).unwrap(),
        },
        Name::from_str(&format!("CN={cn}")).unwrap(),
        spki_for(&key),
        &key,
    )
    .unwrap()
    .build::<DerSignature>()
    .unwrap();
    let pem = certificate.to_pem(LineEnding::LF).unwrap();
    CaFixture {
        key,
        certificate,
        pem,
    }
}

/// A certificate for `subject_key` signed by `issuer`. With `ca = true`
/// it is an intermediate, otherwise a client leaf.
pub fn issue_from(issuer: &CaFixture, cn: &str, seed: u8, ca: bool) -> CaFixture {
    let key = signing_key(seed);
    let issuer_name = issuer.certificate.tbs_certificate.subject.clone();
    let profile = if ca {
        Profile::SubCA {
            issuer: issuer_name,
            path_len_constraint: None,
        }
    } else {
        Profile::Leaf {
            issuer: issuer_name,
            enable_key_agreement: false,
            enable_key_encipherment: false,
        }
    };
    let certificate = CertificateBuilder::new(
        profile,
        SerialNumber::new(&[seed]).unwrap(),
        Validity::from_now(std::time::Duration::from_secs(86_400)).unwrap(),
        Name::from_str(&format!("CN={cn}")).unwrap(),
        spki_for(&key),
        &issuer.key,
    )
    .unwrap()
    .build::<DerSignature>()
    .unwrap();
    let pem = certificate.to_pem(LineEnding::LF).unwrap();
    CaFixture {
        key,
        certificate,
        pem,
    }
}

#[derive(Debug, Default)]
pub struct CsrOptions {
    pub key_usages: Vec<KeyUsage>,
    pub extended_key_usages: Vec<ObjectIdentifier>,
    pub dns_names: Vec<&'static str>,
    pub emails: Vec<&'static str>,
}

pub fn csr_pem(key: &SigningKey, subject: &str, options: &CsrOptions) -> String {
    let mut builder = RequestBuilder::new(Name::from_str(subject).unwrap(), key).unwrap();

    if let Some(ku) = usage::key_usage_extension(&options.key_usages) {
        builder.add_extension(&ku).unwrap();
    }
    if !options.extended_key_usages.is_empty() {
        builder
            .add_extension(&ExtendedKeyUsage(options.extended_key_usages.clone()))
            .unwrap();
    }
    let names: Vec<GeneralName> = options
        .dns_names
        .iter()
        .map(|dns| GeneralName::DnsName(Ia5String::new(dns).unwrap()))
        .chain(
            options
                .emails
                .iter()
                .map(|email| GeneralName::Rfc822Name(Ia5String::new(email).unwrap())),
        )
        .collect();
    if !names.is_empty() {
        builder.add_extension(&SubjectAltName(names)).unwrap();
    }

    builder
        .build::<DerSignature>()
        .unwrap()
        .to_pem(LineEnding::LF)
        .unwrap()
}
