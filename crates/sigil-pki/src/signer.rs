//! CA private keys and the signature algorithm they imply.

use der::asn1::{Any, Null};
use p256::ecdsa::signature::Signer;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::SignatureEncoding;
use sha2::Sha256;
use sigil_core::models::certificate_authority::KeyAlgorithm;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::PkiError;
use crate::verify::{ECDSA_WITH_SHA256, ECDSA_WITH_SHA384, SHA256_WITH_RSA};

/// A decrypted CA signing key. Lives only for the duration of one
/// issuance and is never persisted.
pub enum IssuerKey {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    Rsa(rsa::pkcs1v15::SigningKey<Sha256>),
}

impl std::fmt::Debug for IssuerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            IssuerKey::P256(_) => "P256",
            IssuerKey::P384(_) => "P384",
            IssuerKey::Rsa(_) => "Rsa",
        };
        f.debug_tuple("IssuerKey").field(&kind).finish()
    }
}

impl IssuerKey {
    /// Load a PKCS#8 DER private key for the CA's declared algorithm.
    pub fn from_pkcs8_der(algorithm: KeyAlgorithm, der: &[u8]) -> Result<Self, PkiError> {
        let invalid = |e: &dyn std::fmt::Display| {
            PkiError::Crypto(format!("invalid {algorithm} CA private key: {e}"))
        };
        match algorithm {
            KeyAlgorithm::EcPrime256v1 => p256::ecdsa::SigningKey::from_pkcs8_der(der)
                .map(IssuerKey::P256)
                .map_err(|e| invalid(&e)),
            KeyAlgorithm::EcSecp384r1 => p384::ecdsa::SigningKey::from_pkcs8_der(der)
                .map(IssuerKey::P384)
                .map_err(|e| invalid(&e)),
            KeyAlgorithm::Rsa2048 | KeyAlgorithm::Rsa4096 => {
                rsa::RsaPrivateKey::from_pkcs8_der(der)
                    .map(|key| IssuerKey::Rsa(rsa::pkcs1v15::SigningKey::<Sha256>::new(key)))
                    .map_err(|e| invalid(&e))
            }
        }
    }

    /// AlgorithmIdentifier placed in both the TBS and outer certificate.
    pub fn signature_algorithm(&self) -> AlgorithmIdentifierOwned {
        match self {
            IssuerKey::P256(_) => AlgorithmIdentifierOwned {
                oid: ECDSA_WITH_SHA256,
                parameters: None,
            },
            IssuerKey::P384(_) => AlgorithmIdentifierOwned {
                oid: ECDSA_WITH_SHA384,
                parameters: None,
            },
            // RFC 4055: RSA PKCS#1 v1.5 identifiers carry explicit NULL parameters.
            IssuerKey::Rsa(_) => AlgorithmIdentifierOwned {
                oid: SHA256_WITH_RSA,
                parameters: Some(Any::from(Null)),
            },
        }
    }

    /// Sign `message`, returning the signature bytes as they appear in the
    /// certificate's signature BIT STRING (DER for ECDSA).
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            IssuerKey::P256(key) => {
                let signature: p256::ecdsa::Signature = key.sign(message);
                signature.to_der().as_bytes().to_vec()
            }
            IssuerKey::P384(key) => {
                let signature: p384::ecdsa::Signature = key.sign(message);
                signature.to_der().as_bytes().to_vec()
            }
            IssuerKey::Rsa(key) => key.sign(message).to_vec(),
        }
    }
}
