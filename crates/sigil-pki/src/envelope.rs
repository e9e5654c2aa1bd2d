//! Envelope persistence: encrypt the certificate and chain, then write
//! the certificate record and its body together.

use sigil_core::kms::KeyManagementService;
use sigil_core::models::certificate::{Certificate, CreateCertificate, CreateCertificateBody};
use sigil_core::repository::CertificateRepository;
use tracing::debug;

use crate::error::PkiError;

pub struct EnvelopePersistenceAdapter<C, K> {
    certificates: C,
    kms: K,
}

impl<C: CertificateRepository, K: KeyManagementService> EnvelopePersistenceAdapter<C, K> {
    pub fn new(certificates: C, kms: K) -> Self {
        Self { certificates, kms }
    }

    pub fn certificates(&self) -> &C {
        &self.certificates
    }

    pub fn kms(&self) -> &K {
        &self.kms
    }

    /// Encrypt `certificate_der` and `chain_pem` under the project's
    /// certificate key and persist them with `record`.
    ///
    /// Nothing is written if either encryption fails. The two rows are
    /// committed in one transaction; no retry happens here.
    pub async fn persist(
        &self,
        record: CreateCertificate,
        certificate_der: &[u8],
        chain_pem: &str,
    ) -> Result<Certificate, PkiError> {
        let key_id = self
            .kms
            .certificate_key_id(record.project_id)
            .await
            .map_err(kms_error)?;

        let encrypted_certificate = self
            .kms
            .encrypt(&key_id, certificate_der)
            .await
            .map_err(kms_error)?;
        let encrypted_certificate_chain = self
            .kms
            .encrypt(&key_id, chain_pem.as_bytes())
            .await
            .map_err(kms_error)?;

        debug!(serial_number = %record.serial_number, "persisting certificate envelope");
        let stored = self
            .certificates
            .create_with_body(
                record,
                CreateCertificateBody {
                    encrypted_certificate,
                    encrypted_certificate_chain,
                },
            )
            .await?;
        Ok(stored)
    }
}

pub(crate) fn kms_error(err: sigil_core::error::SigilError) -> PkiError {
    match err {
        sigil_core::error::SigilError::Kms(msg) => PkiError::Kms(msg),
        other => PkiError::Store(other),
    }
}
