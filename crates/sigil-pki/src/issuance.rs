//! Issuance orchestration shared by the subscriber and EST paths.

use chrono::{DateTime, Utc};
use der::EncodePem;
use der::pem::LineEnding;
use sigil_core::error::SigilError;
use sigil_core::kms::KeyManagementService;
use sigil_core::models::certificate::{Certificate as CertificateRecord, CreateCertificate};
use sigil_core::models::certificate_authority::{CaStatus, CaType, CertificateAuthority};
use sigil_core::models::subscriber::{Subscriber, SubscriberStatus};
use sigil_core::repository::{CertificateAuthorityRepository, CertificateRepository};
use tracing::{info, warn};
use uuid::Uuid;
use x509_cert::Certificate;

use crate::builder::{self, LeafTemplate};
use crate::csr::ParsedCsr;
use crate::envelope::{EnvelopePersistenceAdapter, kms_error};
use crate::error::{ErrorKind, PkiError};
use crate::policy::{IssuancePolicyEngine, IssuingCa, PolicyInput};
use crate::serial::generate_serial;
use crate::signer::IssuerKey;
use crate::verify::certificate_from_der;

/// How the request reached the issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceMode {
    /// A CSR signed straight against the subscriber. Refused when the CA
    /// has direct issuance disabled.
    Direct,
    /// Template-mediated enrollment (EST).
    Enrollment,
}

/// A freshly issued certificate and the material returned to the caller.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub certificate_pem: String,
    /// Issuing CA followed by its ancestors.
    pub certificate_chain_pem: String,
    pub issuing_ca_certificate_pem: String,
    pub serial_number: String,
    pub common_name: String,
    pub certificate: Certificate,
    pub record: CertificateRecord,
}

/// Decrypted issuing CA material for one issuance.
struct IssuingMaterial {
    certificate: Certificate,
    certificate_pem: String,
    chain_pem: String,
}

pub struct CertificateIssuer<A, C, K> {
    policy: IssuancePolicyEngine,
    authorities: A,
    envelope: EnvelopePersistenceAdapter<C, K>,
}

impl<A, C, K> CertificateIssuer<A, C, K>
where
    A: CertificateAuthorityRepository,
    C: CertificateRepository,
    K: KeyManagementService,
{
    pub fn new(
        policy: IssuancePolicyEngine,
        authorities: A,
        envelope: EnvelopePersistenceAdapter<C, K>,
    ) -> Self {
        Self {
            policy,
            authorities,
            envelope,
        }
    }

    pub fn authorities(&self) -> &A {
        &self.authorities
    }

    pub fn certificates(&self) -> &C {
        self.envelope.certificates()
    }

    pub async fn issue(
        &self,
        subscriber: &Subscriber,
        csr: &ParsedCsr,
        mode: IssuanceMode,
    ) -> Result<IssuedCertificate, PkiError> {
        self.issue_at(subscriber, csr, mode, Utc::now()).await
    }

    /// Issue at an explicit instant. Validation failures are logged at
    /// `warn` with the failed constraint.
    pub async fn issue_at(
        &self,
        subscriber: &Subscriber,
        csr: &ParsedCsr,
        mode: IssuanceMode,
        now: DateTime<Utc>,
    ) -> Result<IssuedCertificate, PkiError> {
        let result = self.run(subscriber, csr, mode, now).await;
        match &result {
            Ok(issued) => info!(
                subscriber = %subscriber.name,
                ca_id = %issued.record.ca_id,
                serial_number = %issued.serial_number,
                ?mode,
                "certificate issued"
            ),
            Err(err) if matches!(err.kind(), ErrorKind::Validation | ErrorKind::Configuration) => {
                warn!(subscriber = %subscriber.name, ?mode, error = %err, "issuance rejected")
            }
            Err(err) => warn!(subscriber = %subscriber.name, ?mode, error = %err, "issuance failed"),
        }
        result
    }

    async fn run(
        &self,
        subscriber: &Subscriber,
        csr: &ParsedCsr,
        mode: IssuanceMode,
        now: DateTime<Utc>,
    ) -> Result<IssuedCertificate, PkiError> {
        let ca_id = subscriber.ca_id.ok_or(PkiError::SubscriberWithoutCa)?;
        if subscriber.status != SubscriberStatus::Active {
            return Err(PkiError::SubscriberInactive);
        }

        let ca = self.authorities.get_by_id(ca_id).await?;
        let ca_cert_id = check_authority(&ca, mode)?;

        let key_id = self
            .envelope
            .kms()
            .certificate_key_id(ca.project_id)
            .await
            .map_err(kms_error)?;
        let issuing = self.load_issuing_material(ca_cert_id, &key_id).await?;

        let validity = &issuing.certificate.tbs_certificate.validity;
        let plan = self.policy.evaluate(PolicyInput {
            subscriber,
            csr,
            ca_not_before: builder::from_x509_time(&validity.not_before)?,
            ca_not_after: builder::from_x509_time(&validity.not_after)?,
            now,
        })?;

        let secret = self
            .authorities
            .get_secret_by_ca(ca.id)
            .await
            .map_err(|e| lookup_error("CA secret", e))?;
        let crl = self
            .authorities
            .get_crl_by_secret(secret.id)
            .await
            .map_err(|e| lookup_error("CA CRL", e))?;

        let extensions = self.policy.extensions(
            &plan,
            csr,
            IssuingCa {
                certificate: &issuing.certificate,
                ca_id: ca.id,
                ca_cert_id,
                crl_id: crl.id,
            },
        )?;

        let private_key = self
            .envelope
            .kms()
            .decrypt(&key_id, &secret.encrypted_private_key)
            .await
            .map_err(kms_error)?;
        let signer = IssuerKey::from_pkcs8_der(ca.key_algorithm, &private_key)?;
        drop(private_key);

        let signed = builder::sign_leaf(
            &signer,
            LeafTemplate {
                serial: generate_serial()?,
                subject: csr.subject.clone(),
                issuer: &issuing.certificate,
                public_key: csr.public_key.clone(),
                not_before: plan.not_before,
                not_after: plan.not_after,
                extensions,
            },
        )?;

        let chain_pem = format!("{}\n{}", issuing.certificate_pem, issuing.chain_pem)
            .trim()
            .to_string();

        // The row records the subscriber's allow-list, not the issued subset.
        let alt_names = subscriber
            .subject_alternative_names
            .iter()
            .map(|san| san.value.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let record = self
            .envelope
            .persist(
                CreateCertificate {
                    project_id: subscriber.project_id,
                    ca_id: ca.id,
                    ca_cert_id,
                    subscriber_id: Some(subscriber.id),
                    serial_number: signed.serial_number.clone(),
                    common_name: plan.common_name.clone(),
                    alt_names,
                    not_before: plan.not_before,
                    not_after: plan.not_after,
                    key_usages: plan.key_usages.clone(),
                    extended_key_usages: plan.extended_key_usages.clone(),
                },
                &signed.der,
                &chain_pem,
            )
            .await?;

        Ok(IssuedCertificate {
            certificate_pem: signed.pem,
            certificate_chain_pem: chain_pem,
            issuing_ca_certificate_pem: issuing.certificate_pem,
            serial_number: signed.serial_number,
            common_name: plan.common_name,
            certificate: signed.certificate,
            record,
        })
    }

    async fn load_issuing_material(
        &self,
        ca_cert_id: Uuid,
        key_id: &str,
    ) -> Result<IssuingMaterial, PkiError> {
        let ca_cert = self
            .authorities
            .get_certificate(ca_cert_id)
            .await
            .map_err(|e| lookup_error("CA certificate", e))?;
        let kms = self.envelope.kms();

        let der = kms
            .decrypt(key_id, &ca_cert.encrypted_certificate)
            .await
            .map_err(kms_error)?;
        let chain = kms
            .decrypt(key_id, &ca_cert.encrypted_certificate_chain)
            .await
            .map_err(kms_error)?;

        let certificate = certificate_from_der(&der)?;
        let certificate_pem = certificate.to_pem(LineEnding::LF)?;
        let chain_pem = String::from_utf8(chain)
            .map_err(|e| PkiError::CaChainUnavailable(format!("CA chain is not UTF-8: {e}")))?;

        Ok(IssuingMaterial {
            certificate,
            certificate_pem,
            chain_pem,
        })
    }
}

/// Status checks on the CA, in order. Returns the active CA certificate id.
fn check_authority(ca: &CertificateAuthority, mode: IssuanceMode) -> Result<Uuid, PkiError> {
    if ca.status != CaStatus::Active {
        return Err(PkiError::CaInactive);
    }
    if ca.ca_type != CaType::Internal {
        return Err(PkiError::ExternalCa);
    }
    let ca_cert_id = ca.active_ca_cert_id.ok_or(PkiError::CaCertificateMissing)?;
    if mode == IssuanceMode::Direct && ca.disable_direct_issuance {
        return Err(PkiError::DirectIssuanceDisabled);
    }
    Ok(ca_cert_id)
}

fn lookup_error(what: &str, err: SigilError) -> PkiError {
    match err {
        SigilError::NotFound { .. } => PkiError::CaChainUnavailable(format!("{what} not found")),
        other => PkiError::CaChainUnavailable(format!("{what}: {other}")),
    }
}
