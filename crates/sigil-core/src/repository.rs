//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Implementations live in
//! `sigil-db`; the issuance engine depends only on these traits.

use uuid::Uuid;

use crate::error::SigilResult;
use crate::models::{
    certificate::{Certificate, CertificateBody, CreateCertificate, CreateCertificateBody},
    certificate_authority::{
        CaCertificate, CaCrl, CaSecret, CertificateAuthority, CreateCaCertificate, CreateCaCrl,
        CreateCaSecret, CreateCertificateAuthority, UpdateCertificateAuthority,
    },
    est::{CreateEstConfig, EstConfig},
    subscriber::{CreateSubscriber, Subscriber, UpdateSubscriber},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Certificate authorities
// ---------------------------------------------------------------------------

/// CA records together with their certificates, secrets and CRL
/// references. Read-mostly from the engine's point of view.
pub trait CertificateAuthorityRepository: Send + Sync {
    fn create(
        &self,
        input: CreateCertificateAuthority,
    ) -> impl Future<Output = SigilResult<CertificateAuthority>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = SigilResult<CertificateAuthority>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateCertificateAuthority,
    ) -> impl Future<Output = SigilResult<CertificateAuthority>> + Send;

    fn create_certificate(
        &self,
        input: CreateCaCertificate,
    ) -> impl Future<Output = SigilResult<CaCertificate>> + Send;
    fn get_certificate(&self, id: Uuid) -> impl Future<Output = SigilResult<CaCertificate>> + Send;

    fn create_secret(
        &self,
        input: CreateCaSecret,
    ) -> impl Future<Output = SigilResult<CaSecret>> + Send;
    fn get_secret_by_ca(&self, ca_id: Uuid) -> impl Future<Output = SigilResult<CaSecret>> + Send;

    fn create_crl(&self, input: CreateCaCrl) -> impl Future<Output = SigilResult<CaCrl>> + Send;
    fn get_crl_by_secret(
        &self,
        ca_secret_id: Uuid,
    ) -> impl Future<Output = SigilResult<CaCrl>> + Send;
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

pub trait SubscriberRepository: Send + Sync {
    fn create(&self, input: CreateSubscriber) -> impl Future<Output = SigilResult<Subscriber>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = SigilResult<Subscriber>> + Send;
    fn get_by_name(
        &self,
        project_id: Uuid,
        name: &str,
    ) -> impl Future<Output = SigilResult<Subscriber>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateSubscriber,
    ) -> impl Future<Output = SigilResult<Subscriber>> + Send;
    /// Removes the subscriber and returns its last state.
    fn delete(&self, id: Uuid) -> impl Future<Output = SigilResult<Subscriber>> + Send;
    fn list(
        &self,
        project_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = SigilResult<PaginatedResult<Subscriber>>> + Send;
}

// ---------------------------------------------------------------------------
// Issued certificates
// ---------------------------------------------------------------------------

pub trait CertificateRepository: Send + Sync {
    /// Writes the certificate row and its encrypted body as one atomic
    /// unit. Either both are committed or neither is observable.
    fn create_with_body(
        &self,
        input: CreateCertificate,
        body: CreateCertificateBody,
    ) -> impl Future<Output = SigilResult<Certificate>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = SigilResult<Certificate>> + Send;
    fn get_by_serial(
        &self,
        ca_id: Uuid,
        serial_number: &str,
    ) -> impl Future<Output = SigilResult<Certificate>> + Send;
    fn get_body(&self, cert_id: Uuid) -> impl Future<Output = SigilResult<CertificateBody>> + Send;
    /// Newest first.
    fn list_by_subscriber(
        &self,
        subscriber_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = SigilResult<PaginatedResult<Certificate>>> + Send;
}

// ---------------------------------------------------------------------------
// EST
// ---------------------------------------------------------------------------

pub trait EstConfigRepository: Send + Sync {
    fn create(&self, input: CreateEstConfig) -> impl Future<Output = SigilResult<EstConfig>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = SigilResult<EstConfig>> + Send;
}
