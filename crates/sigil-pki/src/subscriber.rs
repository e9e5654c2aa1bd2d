//! Subscriber management and direct CSR signing.

use std::sync::Arc;

use sigil_core::authz::{Actor, Authorizer, Decision, SubscriberAction};
use sigil_core::error::SigilError;
use sigil_core::kms::KeyManagementService;
use sigil_core::models::certificate::Certificate;
use sigil_core::models::certificate_authority::CaType;
use sigil_core::models::subscriber::{CreateSubscriber, Subscriber, UpdateSubscriber};
use sigil_core::repository::{
    CertificateAuthorityRepository, CertificateRepository, PaginatedResult, Pagination,
    SubscriberRepository,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::csr::ParsedCsr;
use crate::error::PkiError;
use crate::issuance::{CertificateIssuer, IssuanceMode, IssuedCertificate};
use crate::ttl::parse_ttl;

/// A subscriber plus whether it can be issued to synchronously.
#[derive(Debug, Clone)]
pub struct SubscriberView {
    pub subscriber: Subscriber,
    /// True when the subscriber's CA exists and is internal.
    pub supports_immediate_issuance: bool,
}

#[derive(Debug, Clone)]
pub struct SignCertificateInput {
    pub project_id: Uuid,
    pub subscriber_name: String,
    /// PEM or base64 DER.
    pub csr: String,
}

pub struct SubscriberService<S, A, C, K, Z> {
    subscribers: S,
    issuer: Arc<CertificateIssuer<A, C, K>>,
    authorizer: Z,
}

impl<S, A, C, K, Z> SubscriberService<S, A, C, K, Z>
where
    S: SubscriberRepository,
    A: CertificateAuthorityRepository,
    C: CertificateRepository,
    K: KeyManagementService,
    Z: Authorizer,
{
    pub fn new(subscribers: S, issuer: Arc<CertificateIssuer<A, C, K>>, authorizer: Z) -> Self {
        Self {
            subscribers,
            issuer,
            authorizer,
        }
    }

    pub async fn create_subscriber(
        &self,
        actor: &Actor,
        input: CreateSubscriber,
    ) -> Result<Subscriber, PkiError> {
        self.authorize(actor, input.project_id, SubscriberAction::Create, &input.name)
            .await?;
        parse_ttl(&input.ttl)?;

        let subscriber = self.subscribers.create(input).await?;
        info!(subscriber = %subscriber.name, project_id = %subscriber.project_id, "subscriber created");
        Ok(subscriber)
    }

    pub async fn get_subscriber(
        &self,
        actor: &Actor,
        project_id: Uuid,
        name: &str,
    ) -> Result<SubscriberView, PkiError> {
        self.authorize(actor, project_id, SubscriberAction::Read, name)
            .await?;
        let subscriber = self.subscribers.get_by_name(project_id, name).await?;

        let supports_immediate_issuance = match subscriber.ca_id {
            Some(ca_id) => match self.issuer.authorities().get_by_id(ca_id).await {
                Ok(ca) => ca.ca_type == CaType::Internal,
                Err(SigilError::NotFound { .. }) => false,
                Err(e) => return Err(e.into()),
            },
            None => false,
        };

        Ok(SubscriberView {
            subscriber,
            supports_immediate_issuance,
        })
    }

    pub async fn update_subscriber(
        &self,
        actor: &Actor,
        project_id: Uuid,
        name: &str,
        input: UpdateSubscriber,
    ) -> Result<Subscriber, PkiError> {
        self.authorize(actor, project_id, SubscriberAction::Edit, name)
            .await?;
        if let Some(ttl) = &input.ttl {
            parse_ttl(ttl)?;
        }

        let existing = self.subscribers.get_by_name(project_id, name).await?;
        let updated = self.subscribers.update(existing.id, input).await?;
        info!(subscriber = %updated.name, "subscriber updated");
        Ok(updated)
    }

    /// Delete a subscriber. Certificates issued under it are kept.
    pub async fn delete_subscriber(
        &self,
        actor: &Actor,
        project_id: Uuid,
        name: &str,
    ) -> Result<Subscriber, PkiError> {
        self.authorize(actor, project_id, SubscriberAction::Delete, name)
            .await?;
        let existing = self.subscribers.get_by_name(project_id, name).await?;
        let deleted = self.subscribers.delete(existing.id).await?;
        info!(subscriber = %deleted.name, "subscriber deleted");
        Ok(deleted)
    }

    /// Sign a CSR directly under the subscriber's policy.
    pub async fn sign_certificate(
        &self,
        actor: &Actor,
        input: SignCertificateInput,
    ) -> Result<IssuedCertificate, PkiError> {
        self.authorize(
            actor,
            input.project_id,
            SubscriberAction::IssueCert,
            &input.subscriber_name,
        )
        .await?;

        let subscriber = self
            .subscribers
            .get_by_name(input.project_id, &input.subscriber_name)
            .await?;
        let csr = ParsedCsr::parse(&input.csr)?;

        self.issuer
            .issue(&subscriber, &csr, IssuanceMode::Direct)
            .await
    }

    /// Certificates issued under the subscriber, newest first.
    pub async fn list_certificates(
        &self,
        actor: &Actor,
        project_id: Uuid,
        name: &str,
        pagination: Pagination,
    ) -> Result<PaginatedResult<Certificate>, PkiError> {
        self.authorize(actor, project_id, SubscriberAction::ListCerts, name)
            .await?;
        let subscriber = self.subscribers.get_by_name(project_id, name).await?;
        Ok(self
            .issuer
            .certificates()
            .list_by_subscriber(subscriber.id, pagination)
            .await?)
    }

    async fn authorize(
        &self,
        actor: &Actor,
        project_id: Uuid,
        action: SubscriberAction,
        subscriber_name: &str,
    ) -> Result<(), PkiError> {
        match self
            .authorizer
            .check_permission(actor, project_id, action, subscriber_name)
            .await?
        {
            Decision::Allow => Ok(()),
            Decision::Deny => {
                warn!(
                    %actor,
                    action = action.as_str(),
                    subscriber = subscriber_name,
                    "permission denied"
                );
                Err(PkiError::Forbidden {
                    action: action.as_str().to_string(),
                    subscriber: subscriber_name.to_string(),
                })
            }
        }
    }
}
