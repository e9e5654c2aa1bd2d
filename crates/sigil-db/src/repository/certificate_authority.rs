//! SurrealDB implementation of [`CertificateAuthorityRepository`].

use chrono::{DateTime, Utc};
use sigil_core::error::SigilResult;
use sigil_core::models::certificate_authority::{
    CaCertificate, CaCrl, CaSecret, CaStatus, CaType, CertificateAuthority, CreateCaCertificate,
    CreateCaCrl, CreateCaSecret, CreateCertificateAuthority, KeyAlgorithm,
    UpdateCertificateAuthority,
};
use sigil_core::repository::CertificateAuthorityRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::codec::{decode_blob, encode_blob, parse_opt_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CaRowWithId {
    record_id: String,
    project_id: String,
    ca_type: String,
    status: String,
    key_algorithm: String,
    active_ca_cert_id: Option<String>,
    disable_direct_issuance: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CaCertificateRowWithId {
    record_id: String,
    ca_id: String,
    encrypted_certificate: String,
    encrypted_certificate_chain: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CaSecretRowWithId {
    record_id: String,
    ca_id: String,
    encrypted_private_key: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CaCrlRowWithId {
    record_id: String,
    ca_id: String,
    ca_secret_id: String,
    created_at: DateTime<Utc>,
}

fn parse_ca_type(s: &str) -> Result<CaType, DbError> {
    match s {
        "Internal" => Ok(CaType::Internal),
        "External" => Ok(CaType::External),
        other => Err(DbError::Decode(format!("unknown CA type: {other}"))),
    }
}

fn ca_type_to_string(t: &CaType) -> &'static str {
    match t {
        CaType::Internal => "Internal",
        CaType::External => "External",
    }
}

fn parse_status(s: &str) -> Result<CaStatus, DbError> {
    match s {
        "Active" => Ok(CaStatus::Active),
        "Disabled" => Ok(CaStatus::Disabled),
        "PendingCertificate" => Ok(CaStatus::PendingCertificate),
        other => Err(DbError::Decode(format!("unknown CA status: {other}"))),
    }
}

fn status_to_string(s: &CaStatus) -> &'static str {
    match s {
        CaStatus::Active => "Active",
        CaStatus::Disabled => "Disabled",
        CaStatus::PendingCertificate => "PendingCertificate",
    }
}

impl CaRowWithId {
    fn try_into_ca(self) -> Result<CertificateAuthority, DbError> {
        Ok(CertificateAuthority {
            id: parse_uuid("CA", &self.record_id)?,
            project_id: parse_uuid("project", &self.project_id)?,
            ca_type: parse_ca_type(&self.ca_type)?,
            status: parse_status(&self.status)?,
            key_algorithm: self
                .key_algorithm
                .parse::<KeyAlgorithm>()
                .map_err(DbError::Decode)?,
            active_ca_cert_id: parse_opt_uuid("CA certificate", self.active_ca_cert_id.as_deref())?,
            disable_direct_issuance: self.disable_direct_issuance,
            created_at: self.created_at,
        })
    }
}

impl CaCertificateRowWithId {
    fn try_into_ca_certificate(self) -> Result<CaCertificate, DbError> {
        Ok(CaCertificate {
            id: parse_uuid("CA certificate", &self.record_id)?,
            ca_id: parse_uuid("CA", &self.ca_id)?,
            encrypted_certificate: decode_blob("encrypted_certificate", &self.encrypted_certificate)?,
            encrypted_certificate_chain: decode_blob(
                "encrypted_certificate_chain",
                &self.encrypted_certificate_chain,
            )?,
            not_before: self.not_before,
            not_after: self.not_after,
            created_at: self.created_at,
        })
    }
}

impl CaSecretRowWithId {
    fn try_into_secret(self) -> Result<CaSecret, DbError> {
        Ok(CaSecret {
            id: parse_uuid("CA secret", &self.record_id)?,
            ca_id: parse_uuid("CA", &self.ca_id)?,
            encrypted_private_key: decode_blob("encrypted_private_key", &self.encrypted_private_key)?,
            created_at: self.created_at,
        })
    }
}

impl CaCrlRowWithId {
    fn try_into_crl(self) -> Result<CaCrl, DbError> {
        Ok(CaCrl {
            id: parse_uuid("CRL", &self.record_id)?,
            ca_id: parse_uuid("CA", &self.ca_id)?,
            ca_secret_id: parse_uuid("CA secret", &self.ca_secret_id)?,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the certificate authority repository.
#[derive(Clone)]
pub struct SurrealCertificateAuthorityRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCertificateAuthorityRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Runs a single-row `SELECT meta::id(id) AS record_id, *` query and
    /// returns the first row or `NotFound`.
    async fn select_one<R: SurrealValue>(
        &self,
        query: &str,
        binding: (&'static str, String),
        entity: &str,
    ) -> Result<R, DbError> {
        let id = binding.1.clone();
        let mut result = self
            .db
            .query(query)
            .bind(binding)
            .await
            .map_err(DbError::from)?;

        let rows: Vec<R> = result.take(0).map_err(DbError::from)?;
        rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: entity.into(),
            id,
        })
    }
}

impl<C: Connection> CertificateAuthorityRepository for SurrealCertificateAuthorityRepository<C> {
    async fn create(&self, input: CreateCertificateAuthority) -> SigilResult<CertificateAuthority> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('certificate_authority', $id) SET \
                 project_id = $project_id, \
                 ca_type = $ca_type, \
                 status = $status, \
                 key_algorithm = $key_algorithm, \
                 active_ca_cert_id = NONE, \
                 disable_direct_issuance = $disable_direct_issuance",
            )
            .bind(("id", id.to_string()))
            .bind(("project_id", input.project_id.to_string()))
            .bind(("ca_type", ca_type_to_string(&input.ca_type).to_string()))
            .bind(("status", status_to_string(&input.status).to_string()))
            .bind(("key_algorithm", input.key_algorithm.as_str().to_string()))
            .bind(("disable_direct_issuance", input.disable_direct_issuance))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> SigilResult<CertificateAuthority> {
        let row: CaRowWithId = self
            .select_one(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('certificate_authority', $id)",
                ("id", id.to_string()),
                "certificate_authority",
            )
            .await?;
        Ok(row.try_into_ca()?)
    }

    async fn update(
        &self,
        id: Uuid,
        input: UpdateCertificateAuthority,
    ) -> SigilResult<CertificateAuthority> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.active_ca_cert_id.is_some() {
            sets.push("active_ca_cert_id = $active_ca_cert_id");
        }
        if input.disable_direct_issuance.is_some() {
            sets.push("disable_direct_issuance = $disable_direct_issuance");
        }
        if sets.is_empty() {
            return self.get_by_id(id).await;
        }

        let query = format!(
            "UPDATE type::record('certificate_authority', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(ref status) = input.status {
            builder = builder.bind(("status", status_to_string(status).to_string()));
        }
        if let Some(cert_id) = input.active_ca_cert_id {
            builder = builder.bind(("active_ca_cert_id", cert_id.to_string()));
        }
        if let Some(disable) = input.disable_direct_issuance {
            builder = builder.bind(("disable_direct_issuance", disable));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(id).await
    }

    async fn create_certificate(&self, input: CreateCaCertificate) -> SigilResult<CaCertificate> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('ca_certificate', $id) SET \
                 ca_id = $ca_id, \
                 encrypted_certificate = $encrypted_certificate, \
                 encrypted_certificate_chain = $encrypted_certificate_chain, \
                 not_before = $not_before, \
                 not_after = $not_after",
            )
            .bind(("id", id.to_string()))
            .bind(("ca_id", input.ca_id.to_string()))
            .bind(("encrypted_certificate", encode_blob(&input.encrypted_certificate)))
            .bind((
                "encrypted_certificate_chain",
                encode_blob(&input.encrypted_certificate_chain),
            ))
            .bind(("not_before", input.not_before))
            .bind(("not_after", input.not_after))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_certificate(id).await
    }

    async fn get_certificate(&self, id: Uuid) -> SigilResult<CaCertificate> {
        let row: CaCertificateRowWithId = self
            .select_one(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('ca_certificate', $id)",
                ("id", id.to_string()),
                "ca_certificate",
            )
            .await?;
        Ok(row.try_into_ca_certificate()?)
    }

    async fn create_secret(&self, input: CreateCaSecret) -> SigilResult<CaSecret> {
        let id_str = Uuid::new_v4().to_string();

        self.db
            .query(
                "CREATE type::record('ca_secret', $id) SET \
                 ca_id = $ca_id, \
                 encrypted_private_key = $encrypted_private_key",
            )
            .bind(("id", id_str))
            .bind(("ca_id", input.ca_id.to_string()))
            .bind(("encrypted_private_key", encode_blob(&input.encrypted_private_key)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_secret_by_ca(input.ca_id).await
    }

    async fn get_secret_by_ca(&self, ca_id: Uuid) -> SigilResult<CaSecret> {
        let row: CaSecretRowWithId = self
            .select_one(
                "SELECT meta::id(id) AS record_id, * FROM ca_secret \
                 WHERE ca_id = $ca_id",
                ("ca_id", ca_id.to_string()),
                "ca_secret",
            )
            .await?;
        Ok(row.try_into_secret()?)
    }

    async fn create_crl(&self, input: CreateCaCrl) -> SigilResult<CaCrl> {
        let id_str = Uuid::new_v4().to_string();

        self.db
            .query(
                "CREATE type::record('ca_crl', $id) SET \
                 ca_id = $ca_id, \
                 ca_secret_id = $ca_secret_id",
            )
            .bind(("id", id_str))
            .bind(("ca_id", input.ca_id.to_string()))
            .bind(("ca_secret_id", input.ca_secret_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_crl_by_secret(input.ca_secret_id).await
    }

    async fn get_crl_by_secret(&self, ca_secret_id: Uuid) -> SigilResult<CaCrl> {
        let row: CaCrlRowWithId = self
            .select_one(
                "SELECT meta::id(id) AS record_id, * FROM ca_crl \
                 WHERE ca_secret_id = $ca_secret_id \
                 ORDER BY created_at DESC LIMIT 1",
                ("ca_secret_id", ca_secret_id.to_string()),
                "ca_crl",
            )
            .await?;
        Ok(row.try_into_crl()?)
    }
}
