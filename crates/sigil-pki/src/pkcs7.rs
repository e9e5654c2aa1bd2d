//! Certificates-only CMS SignedData, the simple-enroll response format.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cms::cert::CertificateChoices;
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{CertificateSet, EncapsulatedContentInfo, SignedData, SignerInfos};
use const_oid::ObjectIdentifier;
use der::asn1::{Any, SetOfVec};
use der::{Decode, Encode};
use x509_cert::Certificate;

use crate::error::PkiError;

pub const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
pub const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");

/// Wrap `certificates` in a degenerate SignedData: no content, no
/// signers, no digest algorithms.
pub fn certs_only(certificates: &[Certificate]) -> Result<Vec<u8>, PkiError> {
    let choices = certificates
        .iter()
        .cloned()
        .map(CertificateChoices::Certificate)
        .collect::<Vec<_>>();

    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: SetOfVec::new(),
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent: None,
        },
        certificates: Some(CertificateSet(SetOfVec::try_from(choices)?)),
        crls: None,
        signer_infos: SignerInfos(SetOfVec::new()),
    };

    let content_info = ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::encode_from(&signed_data)?,
    };
    Ok(content_info.to_der()?)
}

/// [`certs_only`], base64-encoded for the EST wire.
pub fn certs_only_base64(certificates: &[Certificate]) -> Result<String, PkiError> {
    Ok(STANDARD.encode(certs_only(certificates)?))
}

/// Read the certificates back out of a certs-only ContentInfo.
pub fn certificates_from_der(der: &[u8]) -> Result<Vec<Certificate>, PkiError> {
    let content_info = ContentInfo::from_der(der)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(PkiError::Crypto(format!(
            "expected signedData content, got {}",
            content_info.content_type
        )));
    }
    let signed_data: SignedData = content_info.content.decode_as()?;
    Ok(signed_data
        .certificates
        .map(|set| {
            set.0
                .into_vec()
                .into_iter()
                .filter_map(|choice| match choice {
                    CertificateChoices::Certificate(cert) => Some(cert),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default())
}
