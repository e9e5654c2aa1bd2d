//! Shared fixtures for the issuance integration tests: an in-memory
//! database, a local KMS, a two-level CA hierarchy and CSR helpers.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use const_oid::{AssociatedOid, ObjectIdentifier};
use der::asn1::Ia5String;
use der::pem::LineEnding;
use der::{Decode, Encode, EncodePem};
use p256::ecdsa::{DerSignature, SigningKey};
use p256::pkcs8::EncodePrivateKey;
use sigil_core::authz::{Actor, Authorizer, Decision, SubscriberAction};
use sigil_core::error::SigilResult;
use sigil_core::kms::KeyManagementService;
use sigil_core::models::certificate::{ExtendedKeyUsage, KeyUsage};
use sigil_core::models::certificate_authority::{
    CaStatus, CaType, CertificateAuthority, CreateCaCertificate, CreateCaCrl, CreateCaSecret,
    CreateCertificateAuthority, KeyAlgorithm, UpdateCertificateAuthority,
};
use sigil_core::models::est::{CreateEstConfig, EstConfig};
use sigil_core::models::subscriber::{
    CreateSubscriber, SubjectAltName, Subscriber, SubscriberStatus,
};
use sigil_core::repository::{
    CertificateAuthorityRepository, EstConfigRepository, SubscriberRepository,
};
use sigil_db::repository::{
    SurrealCertificateAuthorityRepository, SurrealCertificateRepository,
    SurrealEstConfigRepository, SurrealSubscriberRepository,
};
use sigil_pki::builder::x509_time;
use sigil_pki::{
    CertificateIssuer, EnvelopePersistenceAdapter, EstService, IssuancePolicyEngine, LocalKms,
    LocalKmsConfig, PkiConfig, SubscriberService,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use x509_cert::Certificate;
use x509_cert::builder::{Builder, CertificateBuilder, Profile, RequestBuilder};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{ExtendedKeyUsage as EkuExtension, SubjectAltName as SanExtension};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;

pub const MASTER_KEY: [u8; 32] = [42; 32];

pub type Issuer = CertificateIssuer<
    SurrealCertificateAuthorityRepository<Db>,
    SurrealCertificateRepository<Db>,
    LocalKms,
>;

pub type Subscribers = SubscriberService<
    SurrealSubscriberRepository<Db>,
    SurrealCertificateAuthorityRepository<Db>,
    SurrealCertificateRepository<Db>,
    LocalKms,
    TestAuthorizer,
>;

pub type Est = EstService<
    SurrealEstConfigRepository<Db>,
    SurrealSubscriberRepository<Db>,
    SurrealCertificateAuthorityRepository<Db>,
    SurrealCertificateRepository<Db>,
    LocalKms,
>;

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

/// Allows everything except the listed actions.
#[derive(Clone, Default)]
pub struct TestAuthorizer {
    pub denied: Vec<SubscriberAction>,
}

impl Authorizer for TestAuthorizer {
    async fn check_permission(
        &self,
        _actor: &Actor,
        _project_id: Uuid,
        action: SubscriberAction,
        _subscriber_name: &str,
    ) -> SigilResult<Decision> {
        if self.denied.contains(&action) {
            Ok(Decision::Deny)
        } else {
            Ok(Decision::Allow)
        }
    }
}

pub fn actor() -> Actor {
    Actor::User { id: Uuid::new_v4() }
}

// ---------------------------------------------------------------------------
// Keys and certificates
// ---------------------------------------------------------------------------

pub struct KeyedCert {
    pub key: SigningKey,
    pub certificate: Certificate,
    pub pem: String,
}

pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_slice(&[seed; 32]).unwrap()
}

fn spki_for(key: &SigningKey) -> SubjectPublicKeyInfoOwned {
    SubjectPublicKeyInfoOwned::from_key(*key.verifying_key()).unwrap()
}

fn build(
    profile: Profile,
    subject_cn: &str,
    seed: u8,
    signer: &SigningKey,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
) -> KeyedCert {
    let key = signing_key(seed);
    let certificate = CertificateBuilder::new(
        profile,
        SerialNumber::new(&[seed]).unwrap(),
        Validity {
            not_before: x509_time(not_before).unwrap(),
            not_after: x509_time(not_after).unwrap(),
        },
        Name::from_str(&format!("CN={subject_cn}")).unwrap(),
        spki_for(&key),
        signer,
    )
    .unwrap()
    .build::<DerSignature>()
    .unwrap();
    let pem = certificate.to_pem(LineEnding::LF).unwrap();
    KeyedCert {
        key,
        certificate,
        pem,
    }
}

pub fn root(cn: &str, seed: u8, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> KeyedCert {
    let key = signing_key(seed);
    build(Profile::Root, cn, seed, &key, not_before, not_after)
}

pub fn intermediate(
    issuer: &KeyedCert,
    cn: &str,
    seed: u8,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
) -> KeyedCert {
    build(
        Profile::SubCA {
            issuer: issuer.certificate.tbs_certificate.subject.clone(),
            path_len_constraint: None,
        },
        cn,
        seed,
        &issuer.key,
        not_before,
        not_after,
    )
}

pub fn client_leaf(issuer: &KeyedCert, cn: &str, seed: u8) -> KeyedCert {
    let now = Utc::now();
    build(
        Profile::Leaf {
            issuer: issuer.certificate.tbs_certificate.subject.clone(),
            enable_key_agreement: false,
            enable_key_encipherment: false,
        },
        cn,
        seed,
        &issuer.key,
        now - Duration::hours(1),
        now + Duration::days(1),
    )
}

// ---------------------------------------------------------------------------
// CSRs
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CsrOptions {
    pub key_usages: Vec<KeyUsage>,
    pub extended_key_usages: Vec<ObjectIdentifier>,
    pub dns_names: Vec<&'static str>,
    pub emails: Vec<&'static str>,
}

pub fn csr_pem(subject: &str, options: &CsrOptions) -> String {
    let key = signing_key(200);
    let mut builder = RequestBuilder::new(Name::from_str(subject).unwrap(), &key).unwrap();

    if let Some(ku) = sigil_pki::usage::key_usage_extension(&options.key_usages) {
        builder.add_extension(&ku).unwrap();
    }
    if !options.extended_key_usages.is_empty() {
        builder
            .add_extension(&EkuExtension(options.extended_key_usages.clone()))
            .unwrap();
    }
    let names: Vec<GeneralName> = options
        .dns_names
        .iter()
        .map(|dns| GeneralName::DnsName(Ia5String::new(dns).unwrap()))
        .chain(
            options
                .emails
                .iter()
                .map(|email| GeneralName::Rfc822Name(Ia5String::new(email).unwrap())),
        )
        .collect();
    if !names.is_empty() {
        builder.add_extension(&SanExtension(names)).unwrap();
    }

    builder
        .build::<DerSignature>()
        .unwrap()
        .to_pem(LineEnding::LF)
        .unwrap()
}

/// Same CSR as bare base64 DER, the form EST clients post.
pub fn csr_base64(subject: &str, options: &CsrOptions) -> String {
    use base64::Engine;
    let (_, der) = der::pem::decode_vec(csr_pem(subject, options).as_bytes()).unwrap();
    base64::engine::general_purpose::STANDARD.encode(der)
}

/// Decode the extension of type `T` from a certificate, if present.
pub fn extension<T: for<'a> Decode<'a> + AssociatedOid>(cert: &Certificate) -> Option<(bool, T)> {
    cert.tbs_certificate
        .extensions
        .iter()
        .flatten()
        .find(|ext| ext.extn_id == T::OID)
        .map(|ext| (ext.critical, T::from_der(ext.extn_value.as_bytes()).unwrap()))
}

pub fn serial_hex(cert: &Certificate) -> String {
    hex::encode(cert.tbs_certificate.serial_number.as_bytes())
}

pub fn percent_encode(pem: &str) -> String {
    percent_encoding::utf8_percent_encode(pem, percent_encoding::NON_ALPHANUMERIC).to_string()
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub db: Surreal<Db>,
    pub project_id: Uuid,
    pub root: KeyedCert,
    pub issuing: KeyedCert,
    pub ca: CertificateAuthority,
    pub subscriber: Subscriber,
    pub issuer: Arc<Issuer>,
}

/// Options controlling the CA hierarchy and subscriber policy.
pub struct HarnessOptions {
    pub ca_not_before: DateTime<Utc>,
    pub ca_not_after: DateTime<Utc>,
    pub ttl: &'static str,
    pub key_usages: Vec<KeyUsage>,
    pub extended_key_usages: Vec<ExtendedKeyUsage>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            ca_not_before: now - Duration::days(1),
            ca_not_after: now + Duration::days(365),
            ttl: "30d",
            key_usages: vec![KeyUsage::DigitalSignature, KeyUsage::KeyEncipherment],
            extended_key_usages: vec![ExtendedKeyUsage::ServerAuth, ExtendedKeyUsage::ClientAuth],
        }
    }
}

pub fn kms() -> LocalKms {
    LocalKms::new(&LocalKmsConfig {
        master_key: Some(MASTER_KEY),
    })
    .unwrap()
}

pub async fn setup_db() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    sigil_db::run_migrations(&db).await.unwrap();
    db
}

pub async fn harness() -> Harness {
    harness_with(HarnessOptions::default()).await
}

pub async fn harness_with(options: HarnessOptions) -> Harness {
    let db = setup_db().await;
    let project_id = Uuid::new_v4();
    let kms = kms();
    let key_id = kms.certificate_key_id(project_id).await.unwrap();

    let root = root(
        "Sigil Test Root",
        1,
        options.ca_not_before,
        options.ca_not_after,
    );
    let issuing = intermediate(
        &root,
        "Sigil Test Issuing CA",
        2,
        options.ca_not_before,
        options.ca_not_after,
    );

    let authorities = SurrealCertificateAuthorityRepository::new(db.clone());
    let ca = authorities
        .create(CreateCertificateAuthority {
            project_id,
            ca_type: CaType::Internal,
            status: CaStatus::Active,
            key_algorithm: KeyAlgorithm::EcPrime256v1,
            disable_direct_issuance: false,
        })
        .await
        .unwrap();

    let ca_cert = authorities
        .create_certificate(CreateCaCertificate {
            ca_id: ca.id,
            encrypted_certificate: kms
                .encrypt(&key_id, &issuing.certificate.to_der().unwrap())
                .await
                .unwrap(),
            encrypted_certificate_chain: kms.encrypt(&key_id, root.pem.as_bytes()).await.unwrap(),
            not_before: options.ca_not_before,
            not_after: options.ca_not_after,
        })
        .await
        .unwrap();

    let secret = authorities
        .create_secret(CreateCaSecret {
            ca_id: ca.id,
            encrypted_private_key: kms
                .encrypt(&key_id, issuing.key.to_pkcs8_der().unwrap().as_bytes())
                .await
                .unwrap(),
        })
        .await
        .unwrap();
    authorities
        .create_crl(CreateCaCrl {
            ca_id: ca.id,
            ca_secret_id: secret.id,
        })
        .await
        .unwrap();

    let ca = authorities
        .update(
            ca.id,
            UpdateCertificateAuthority {
                active_ca_cert_id: Some(ca_cert.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let subscriber = SurrealSubscriberRepository::new(db.clone())
        .create(CreateSubscriber {
            project_id,
            ca_id: Some(ca.id),
            name: "api".into(),
            common_name: "api.example.com".into(),
            status: SubscriberStatus::Active,
            ttl: options.ttl.into(),
            subject_alternative_names: vec![
                SubjectAltName::dns("api.example.com"),
                SubjectAltName::dns("www.example.com"),
                SubjectAltName::email("ops@example.com"),
            ],
            key_usages: options.key_usages,
            extended_key_usages: options.extended_key_usages,
        })
        .await
        .unwrap();

    let issuer = Arc::new(CertificateIssuer::new(
        IssuancePolicyEngine::new(PkiConfig {
            site_url: "https://pki.example.com".into(),
            ..Default::default()
        }),
        SurrealCertificateAuthorityRepository::new(db.clone()),
        EnvelopePersistenceAdapter::new(SurrealCertificateRepository::new(db.clone()), kms),
    ));

    Harness {
        db,
        project_id,
        root,
        issuing,
        ca,
        subscriber,
        issuer,
    }
}

impl Harness {
    pub fn subscribers(&self, authorizer: TestAuthorizer) -> Subscribers {
        SubscriberService::new(
            SurrealSubscriberRepository::new(self.db.clone()),
            self.issuer.clone(),
            authorizer,
        )
    }

    pub fn est(&self) -> Est {
        EstService::new(
            SurrealEstConfigRepository::new(self.db.clone()),
            SurrealSubscriberRepository::new(self.db.clone()),
            self.issuer.clone(),
        )
    }

    pub async fn est_config(&self, ca_chain: String, is_enabled: bool) -> EstConfig {
        SurrealEstConfigRepository::new(self.db.clone())
            .create(CreateEstConfig {
                project_id: self.project_id,
                subscriber_id: self.subscriber.id,
                is_enabled,
                ca_chain,
            })
            .await
            .unwrap()
    }

    pub async fn update_ca(&self, input: UpdateCertificateAuthority) -> CertificateAuthority {
        SurrealCertificateAuthorityRepository::new(self.db.clone())
            .update(self.ca.id, input)
            .await
            .unwrap()
    }
}
