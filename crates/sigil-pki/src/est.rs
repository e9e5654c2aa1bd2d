//! EST simple-enroll gateway.
//!
//! One pass, no internal retries:
//! `Start → ConfigLoaded → ClientCertExtracted → ChainVerified →
//! CertificateSigned → Pkcs7Wrapped → Done`. Any stage may exit early with
//! the error that stopped it.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use sigil_core::kms::KeyManagementService;
use sigil_core::repository::{
    CertificateAuthorityRepository, CertificateRepository, EstConfigRepository,
    SubscriberRepository,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chain::{extract_client_certificate, parse_pem_bundle, verify_chain};
use crate::csr::ParsedCsr;
use crate::error::PkiError;
use crate::issuance::{CertificateIssuer, IssuanceMode};
use crate::pkcs7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentStage {
    Start,
    ConfigLoaded,
    ClientCertExtracted,
    ChainVerified,
    CertificateSigned,
    Pkcs7Wrapped,
    Done,
}

impl fmt::Display for EnrollmentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnrollmentStage::Start => "start",
            EnrollmentStage::ConfigLoaded => "config_loaded",
            EnrollmentStage::ClientCertExtracted => "client_cert_extracted",
            EnrollmentStage::ChainVerified => "chain_verified",
            EnrollmentStage::CertificateSigned => "certificate_signed",
            EnrollmentStage::Pkcs7Wrapped => "pkcs7_wrapped",
            EnrollmentStage::Done => "done",
        };
        f.write_str(name)
    }
}

pub struct EstService<E, S, A, C, K> {
    configs: E,
    subscribers: S,
    issuer: Arc<CertificateIssuer<A, C, K>>,
}

impl<E, S, A, C, K> EstService<E, S, A, C, K>
where
    E: EstConfigRepository,
    S: SubscriberRepository,
    A: CertificateAuthorityRepository,
    C: CertificateRepository,
    K: KeyManagementService,
{
    pub fn new(configs: E, subscribers: S, issuer: Arc<CertificateIssuer<A, C, K>>) -> Self {
        Self {
            configs,
            subscribers,
            issuer,
        }
    }

    /// Enroll `csr` for the client presenting `client_cert` (the
    /// URL-encoded PEM forwarded by the TLS terminator).
    ///
    /// Returns the base64 DER of a certs-only PKCS#7 holding the new leaf.
    pub async fn simple_enroll(
        &self,
        config_id: Uuid,
        csr: &str,
        client_cert: Option<&str>,
    ) -> Result<String, PkiError> {
        let result = self.enroll(config_id, csr, client_cert).await;
        if let Err(err) = &result {
            warn!(%config_id, error = %err, "simple enroll failed");
        }
        result
    }

    async fn enroll(
        &self,
        config_id: Uuid,
        csr: &str,
        client_cert: Option<&str>,
    ) -> Result<String, PkiError> {
        stage(config_id, EnrollmentStage::Start);

        let config = self.configs.get_by_id(config_id).await?;
        if !config.is_enabled {
            return Err(PkiError::EstDisabled);
        }
        stage(config_id, EnrollmentStage::ConfigLoaded);

        let leaf = extract_client_certificate(client_cert)?;
        stage(config_id, EnrollmentStage::ClientCertExtracted);

        let anchors = parse_pem_bundle(&config.ca_chain)?;
        let verdict = verify_chain(&leaf, &anchors, Utc::now());
        if !verdict.trusted {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "certificate chain did not verify".into());
            return Err(PkiError::UntrustedClient(reason));
        }
        stage(config_id, EnrollmentStage::ChainVerified);

        let subscriber = self.subscribers.get_by_id(config.subscriber_id).await?;
        let csr = ParsedCsr::parse(csr)?;
        let issued = self
            .issuer
            .issue(&subscriber, &csr, IssuanceMode::Enrollment)
            .await?;
        stage(config_id, EnrollmentStage::CertificateSigned);

        let response = pkcs7::certs_only_base64(std::slice::from_ref(&issued.certificate))?;
        stage(config_id, EnrollmentStage::Pkcs7Wrapped);

        stage(config_id, EnrollmentStage::Done);
        info!(
            %config_id,
            subscriber = %subscriber.name,
            serial_number = %issued.serial_number,
            "simple enroll completed"
        );
        Ok(response)
    }
}

fn stage(config_id: Uuid, stage: EnrollmentStage) {
    debug!(%config_id, %stage, "est stage");
}
