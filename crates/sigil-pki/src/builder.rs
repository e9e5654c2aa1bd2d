//! Leaf certificate assembly and signing.

use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use der::asn1::{BitString, GeneralizedTime, UtcTime};
use der::pem::LineEnding;
use der::{Encode, EncodePem};
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::{Time, Validity};

use crate::error::PkiError;
use crate::serial::Serial;
use crate::signer::IssuerKey;

/// Everything the builder needs to produce one leaf. The issuer name comes
/// from the issuing CA certificate's subject.
#[derive(Debug)]
pub struct LeafTemplate<'a> {
    pub serial: Serial,
    pub subject: Name,
    pub issuer: &'a Certificate,
    pub public_key: SubjectPublicKeyInfoOwned,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub extensions: Vec<Extension>,
}

#[derive(Debug, Clone)]
pub struct SignedCertificate {
    pub certificate: Certificate,
    pub der: Vec<u8>,
    pub pem: String,
    /// Lowercase hex, as returned to callers and stored on the record.
    pub serial_number: String,
}

/// Sign `template` with the CA key. Pure apart from the key material.
pub fn sign_leaf(
    key: &IssuerKey,
    template: LeafTemplate<'_>,
) -> Result<SignedCertificate, PkiError> {
    if template.not_before >= template.not_after {
        return Err(PkiError::InvalidTtl(format!(
            "validity window {} .. {} is empty",
            template.not_before, template.not_after
        )));
    }

    let algorithm = key.signature_algorithm();
    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: template.serial.number,
        signature: algorithm.clone(),
        issuer: template.issuer.tbs_certificate.subject.clone(),
        validity: Validity {
            not_before: x509_time(template.not_before)?,
            not_after: x509_time(template.not_after)?,
        },
        subject: template.subject,
        subject_public_key_info: template.public_key,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(template.extensions),
    };

    let tbs_der = tbs_certificate.to_der()?;
    let signature = key.sign(&tbs_der);

    let certificate = Certificate {
        tbs_certificate,
        signature_algorithm: algorithm,
        signature: BitString::from_bytes(&signature)?,
    };
    let der = certificate.to_der()?;
    let pem = certificate.to_pem(LineEnding::LF)?;

    Ok(SignedCertificate {
        certificate,
        der,
        pem,
        serial_number: template.serial.hex,
    })
}

/// RFC 5280 §4.1.2.5: UTCTime through 2049, GeneralizedTime from 2050.
pub fn x509_time(at: DateTime<Utc>) -> Result<Time, PkiError> {
    let secs = u64::try_from(at.timestamp())
        .map_err(|_| PkiError::InvalidTtl(format!("{at} is before the Unix epoch")))?;
    let since_epoch = Duration::from_secs(secs);

    if at.year() < 2050 {
        Ok(Time::UtcTime(UtcTime::from_unix_duration(since_epoch)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_unix_duration(since_epoch)?))
    }
}

pub fn from_x509_time(time: &Time) -> Result<DateTime<Utc>, PkiError> {
    let secs = i64::try_from(time.to_unix_duration().as_secs())
        .map_err(|_| PkiError::Crypto("certificate time out of range".into()))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| PkiError::Crypto("certificate time out of range".into()))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::TimeZone;

    use super::*;
    use crate::serial::generate_serial;
    use crate::test_support;
    use crate::verify::verify_issued_by;

    #[test]
    fn times_switch_encoding_at_2050() {
        let before = Utc.with_ymd_and_hms(2049, 12, 31, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap();

        assert!(matches!(x509_time(before).unwrap(), Time::UtcTime(_)));
        assert!(matches!(x509_time(after).unwrap(), Time::GeneralTime(_)));
        assert_eq!(from_x509_time(&x509_time(after).unwrap()).unwrap(), after);
    }

    #[test]
    fn signed_leaf_chains_to_issuer() {
        let ca = test_support::ca_fixture("Builder Test CA");
        let issuer_key = test_support::issuer_key(&ca.key);
        let serial = generate_serial().unwrap();
        let expected_serial = serial.hex.clone();
        let not_before = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap();
        let not_after = not_before + chrono::Duration::days(30);

        let signed = sign_leaf(
            &issuer_key,
            LeafTemplate {
                serial,
                subject: Name::from_str("CN=leaf.example.com").unwrap(),
                issuer: &ca.certificate,
                public_key: test_support::spki_for(&test_support::signing_key(21)),
                not_before,
                not_after,
                extensions: Vec::new(),
            },
        )
        .unwrap();

        let tbs = &signed.certificate.tbs_certificate;
        assert_eq!(tbs.issuer, ca.certificate.tbs_certificate.subject);
        assert_eq!(hex::encode(tbs.serial_number.as_bytes()), expected_serial);
        assert_eq!(signed.serial_number, expected_serial);
        assert!(signed.pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(verify_issued_by(&signed.certificate, &ca.certificate).unwrap());
        assert_eq!(from_x509_time(&tbs.validity.not_after).unwrap(), not_after);
    }

    #[test]
    fn empty_window_is_rejected() {
        let ca = test_support::ca_fixture("Builder Test CA");
        let now = Utc::now();
        let err = sign_leaf(
            &test_support::issuer_key(&ca.key),
            LeafTemplate {
                serial: generate_serial().unwrap(),
                subject: Name::from_str("CN=leaf").unwrap(),
                issuer: &ca.certificate,
                public_key: test_support::spki_for(&test_support::signing_key(22)),
                not_before: now,
                not_after: now,
                extensions: Vec::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, PkiError::InvalidTtl(_)));
    }
}
