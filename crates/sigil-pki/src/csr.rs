//! Certificate signing request intake.
//!
//! Accepts PEM (`CERTIFICATE REQUEST` or `NEW CERTIFICATE REQUEST`) or bare
//! base64 DER, verifies the self-signature and extracts the requested
//! usages and alternative names.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use const_oid::{AssociatedOid, ObjectIdentifier};
use der::{Decode, Encode};
use sigil_core::models::certificate::KeyUsage;
use sigil_core::models::subscriber::SubjectAltName;
use x509_cert::ext::Extension;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{ExtendedKeyUsage, SubjectAltName as SanExtension};
use x509_cert::name::Name;
use x509_cert::request::{CertReq, ExtensionReq};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::dn::DistinguishedName;
use crate::error::PkiError;
use crate::usage;
use crate::verify::verify_signature;

const PEM_LABELS: [&str; 2] = ["CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST"];

/// A CSR whose self-signature has been checked.
#[derive(Debug, Clone)]
pub struct ParsedCsr {
    pub subject: Name,
    pub dn: DistinguishedName,
    pub public_key: SubjectPublicKeyInfoOwned,
    /// Requested key usages, empty when the extension is absent.
    pub key_usages: Vec<KeyUsage>,
    /// Requested EKU OIDs, including ones the engine does not know.
    pub extended_key_usages: Vec<ObjectIdentifier>,
    /// Requested email and DNS names, in request order.
    pub subject_alt_names: Vec<SubjectAltName>,
}

impl ParsedCsr {
    /// Parse and verify a CSR supplied as PEM or base64 DER.
    pub fn parse(input: &str) -> Result<Self, PkiError> {
        let der = decode_input(input)?;
        Self::from_der(&der)
    }

    pub fn from_der(der: &[u8]) -> Result<Self, PkiError> {
        let req = CertReq::from_der(der).map_err(|e| PkiError::MalformedCsr(e.to_string()))?;

        let info_der = req.info.to_der()?;
        let verified = verify_signature(
            &req.info.public_key,
            &req.algorithm,
            &info_der,
            req.signature.raw_bytes(),
        )
        .map_err(|e| PkiError::MalformedCsr(format!("signature check failed: {e}")))?;
        if !verified {
            return Err(PkiError::MalformedCsr("self-signature does not verify".into()));
        }

        let dn = DistinguishedName::parse(&req.info.subject)?;
        let extensions = requested_extensions(&req)?;

        let mut parsed = ParsedCsr {
            subject: req.info.subject.clone(),
            dn,
            public_key: req.info.public_key.clone(),
            key_usages: Vec::new(),
            extended_key_usages: Vec::new(),
            subject_alt_names: Vec::new(),
        };

        for ext in &extensions {
            let value = ext.extn_value.as_bytes();
            if ext.extn_id == x509_cert::ext::pkix::KeyUsage::OID {
                let ku = x509_cert::ext::pkix::KeyUsage::from_der(value)
                    .map_err(|e| PkiError::MalformedCsr(format!("key usage: {e}")))?;
                parsed.key_usages = usage::key_usages_from_extension(&ku);
            } else if ext.extn_id == ExtendedKeyUsage::OID {
                let eku = ExtendedKeyUsage::from_der(value)
                    .map_err(|e| PkiError::MalformedCsr(format!("extended key usage: {e}")))?;
                parsed.extended_key_usages = eku.0;
            } else if ext.extn_id == SanExtension::OID {
                let san = SanExtension::from_der(value).map_err(|e| {
                    PkiError::MalformedCsr(format!("subject alternative name: {e}"))
                })?;
                // Only email and DNS names are policy-checked; other forms are ignored.
                parsed.subject_alt_names = san
                    .0
                    .iter()
                    .filter_map(|name| match name {
                        GeneralName::Rfc822Name(email) => {
                            Some(SubjectAltName::email(email.to_string()))
                        }
                        GeneralName::DnsName(dns) => Some(SubjectAltName::dns(dns.to_string())),
                        _ => None,
                    })
                    .collect();
            }
        }

        Ok(parsed)
    }

    pub fn common_name(&self) -> Result<&str, PkiError> {
        self.dn.require_common_name()
    }
}

fn decode_input(input: &str) -> Result<Vec<u8>, PkiError> {
    let trimmed = input.trim();
    if trimmed.starts_with("-----BEGIN") {
        let (label, der) = der::pem::decode_vec(trimmed.as_bytes())
            .map_err(|e| PkiError::MalformedCsr(format!("invalid PEM: {e}")))?;
        if !PEM_LABELS.contains(&label) {
            return Err(PkiError::MalformedCsr(format!(
                "unexpected PEM label '{label}'"
            )));
        }
        return Ok(der);
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| PkiError::MalformedCsr(format!("invalid base64: {e}")))
}

/// Collect the extensions from every PKCS#9 extensionRequest attribute.
fn requested_extensions(req: &CertReq) -> Result<Vec<Extension>, PkiError> {
    let mut extensions = Vec::new();
    for attr in req.info.attributes.iter() {
        if attr.oid != ExtensionReq::OID {
            continue;
        }
        for value in attr.values.iter() {
            let ext_req = ExtensionReq::from_der(&value.to_der()?)
                .map_err(|e| PkiError::MalformedCsr(format!("extension request: {e}")))?;
            extensions.extend(ext_req.0);
        }
    }
    Ok(extensions)
}
