//! Signature verification for certificates and CSRs.

use const_oid::ObjectIdentifier;
use der::{Decode, Encode};
use p256::ecdsa::signature::Verifier;
use rsa::RsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::Certificate;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::error::PkiError;

pub const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
pub const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
pub const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
pub const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
pub const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

fn crypto(e: impl std::fmt::Display) -> PkiError {
    PkiError::Crypto(e.to_string())
}

/// Verify `signature` over `message` with the key in `spki`.
///
/// Returns `Ok(false)` for a well-formed signature that does not verify,
/// and an error when the key or signature cannot be decoded.
pub fn verify_signature(
    spki: &SubjectPublicKeyInfoOwned,
    algorithm: &AlgorithmIdentifierOwned,
    message: &[u8],
    signature: &[u8],
) -> Result<bool, PkiError> {
    let key_bytes = spki.subject_public_key.raw_bytes();

    match algorithm.oid {
        ECDSA_WITH_SHA256 => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(key_bytes).map_err(crypto)?;
            let sig = p256::ecdsa::Signature::from_der(signature).map_err(crypto)?;
            Ok(key.verify(message, &sig).is_ok())
        }
        ECDSA_WITH_SHA384 => {
            let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(key_bytes).map_err(crypto)?;
            let sig = p384::ecdsa::Signature::from_der(signature).map_err(crypto)?;
            Ok(key.verify(message, &sig).is_ok())
        }
        SHA256_WITH_RSA | SHA384_WITH_RSA | SHA512_WITH_RSA => {
            let key = RsaPublicKey::from_public_key_der(&spki.to_der()?).map_err(crypto)?;
            let sig = rsa::pkcs1v15::Signature::try_from(signature).map_err(crypto)?;
            let verified = match algorithm.oid {
                SHA256_WITH_RSA => rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key)
                    .verify(message, &sig)
                    .is_ok(),
                SHA384_WITH_RSA => rsa::pkcs1v15::VerifyingKey::<Sha384>::new(key)
                    .verify(message, &sig)
                    .is_ok(),
                _ => rsa::pkcs1v15::VerifyingKey::<Sha512>::new(key)
                    .verify(message, &sig)
                    .is_ok(),
            };
            Ok(verified)
        }
        other => Err(PkiError::UnsupportedAlgorithm(other.to_string())),
    }
}

/// Verify that `issuer`'s key signed `cert`.
pub fn verify_issued_by(cert: &Certificate, issuer: &Certificate) -> Result<bool, PkiError> {
    let tbs = cert.tbs_certificate.to_der()?;
    verify_signature(
        &issuer.tbs_certificate.subject_public_key_info,
        &cert.signature_algorithm,
        &tbs,
        cert.signature.raw_bytes(),
    )
}

/// Decode a DER certificate.
pub fn certificate_from_der(der: &[u8]) -> Result<Certificate, PkiError> {
    Certificate::from_der(der).map_err(|e| PkiError::Crypto(format!("invalid certificate: {e}")))
}
