//! SurrealDB implementation of [`CertificateRepository`].
//!
//! The certificate row and its encrypted body are written by a single
//! query wrapped in `BEGIN TRANSACTION` / `COMMIT TRANSACTION`, so a failed
//! body write rolls back the certificate row with it.

use chrono::{DateTime, Utc};
use sigil_core::error::{SigilError, SigilResult};
use sigil_core::models::certificate::{
    Certificate, CertificateBody, CertificateStatus, CreateCertificate, CreateCertificateBody,
};
use sigil_core::repository::{CertificateRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::codec::{decode_blob, encode_blob, list_to_strings, parse_list, parse_opt_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CertificateRowWithId {
    record_id: String,
    project_id: String,
    ca_id: String,
    ca_cert_id: String,
    subscriber_id: Option<String>,
    serial_number: String,
    common_name: String,
    alt_names: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    key_usages: Vec<String>,
    extended_key_usages: Vec<String>,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CertificateBodyRow {
    cert_id: String,
    encrypted_certificate: String,
    encrypted_certificate_chain: String,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_status(s: &str) -> Result<CertificateStatus, DbError> {
    match s {
        "Active" => Ok(CertificateStatus::Active),
        "Revoked" => Ok(CertificateStatus::Revoked),
        other => Err(DbError::Decode(format!("unknown certificate status: {other}"))),
    }
}

impl CertificateRowWithId {
    fn try_into_certificate(self) -> Result<Certificate, DbError> {
        Ok(Certificate {
            id: parse_uuid("certificate", &self.record_id)?,
            project_id: parse_uuid("project", &self.project_id)?,
            ca_id: parse_uuid("CA", &self.ca_id)?,
            ca_cert_id: parse_uuid("CA certificate", &self.ca_cert_id)?,
            subscriber_id: parse_opt_uuid("subscriber", self.subscriber_id.as_deref())?,
            serial_number: self.serial_number,
            common_name: self.common_name,
            alt_names: self.alt_names,
            not_before: self.not_before,
            not_after: self.not_after,
            key_usages: parse_list(self.key_usages)?,
            extended_key_usages: parse_list(self.extended_key_usages)?,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
        })
    }
}

impl CertificateBodyRow {
    fn try_into_body(self) -> Result<CertificateBody, DbError> {
        Ok(CertificateBody {
            cert_id: parse_uuid("certificate", &self.cert_id)?,
            encrypted_certificate: decode_blob("encrypted_certificate", &self.encrypted_certificate)?,
            encrypted_certificate_chain: decode_blob(
                "encrypted_certificate_chain",
                &self.encrypted_certificate_chain,
            )?,
        })
    }
}

fn map_write_error(input: &CreateCertificate) -> impl FnOnce(surrealdb::Error) -> SigilError {
    move |err| {
        let message = err.to_string();
        if message.contains("idx_certificate_ca_serial") {
            DbError::SerialCollision {
                ca_id: input.ca_id.to_string(),
                serial: input.serial_number.clone(),
            }
            .into()
        } else {
            DbError::Query(message).into()
        }
    }
}

/// SurrealDB implementation of the certificate repository.
#[derive(Clone)]
pub struct SurrealCertificateRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCertificateRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> CertificateRepository for SurrealCertificateRepository<C> {
    async fn create_with_body(
        &self,
        input: CreateCertificate,
        body: CreateCertificateBody,
    ) -> SigilResult<Certificate> {
        let id = Uuid::new_v4();
        let body_id = Uuid::new_v4();
        let created_at = Utc::now();

        debug!(
            cert_id = %id,
            serial_number = %input.serial_number,
            "Writing certificate and body"
        );

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('certificate', $id) SET \
                 project_id = $project_id, \
                 ca_id = $ca_id, \
                 ca_cert_id = $ca_cert_id, \
                 subscriber_id = $subscriber_id, \
                 serial_number = $serial_number, \
                 common_name = $common_name, \
                 alt_names = $alt_names, \
                 not_before = $not_before, \
                 not_after = $not_after, \
                 key_usages = $key_usages, \
                 extended_key_usages = $extended_key_usages, \
                 status = 'Active', \
                 created_at = $created_at; \
                 CREATE type::record('certificate_body', $body_id) SET \
                 cert_id = $id, \
                 encrypted_certificate = $encrypted_certificate, \
                 encrypted_certificate_chain = $encrypted_certificate_chain; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("body_id", body_id.to_string()))
            .bind(("project_id", input.project_id.to_string()))
            .bind(("ca_id", input.ca_id.to_string()))
            .bind(("ca_cert_id", input.ca_cert_id.to_string()))
            .bind(("subscriber_id", input.subscriber_id.map(|s| s.to_string())))
            .bind(("serial_number", input.serial_number.clone()))
            .bind(("common_name", input.common_name.clone()))
            .bind(("alt_names", input.alt_names.clone()))
            .bind(("not_before", input.not_before))
            .bind(("not_after", input.not_after))
            .bind(("key_usages", list_to_strings(&input.key_usages)))
            .bind((
                "extended_key_usages",
                list_to_strings(&input.extended_key_usages),
            ))
            .bind(("created_at", created_at))
            .bind(("encrypted_certificate", encode_blob(&body.encrypted_certificate)))
            .bind((
                "encrypted_certificate_chain",
                encode_blob(&body.encrypted_certificate_chain),
            ))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(map_write_error(&input))?;

        Ok(Certificate {
            id,
            project_id: input.project_id,
            ca_id: input.ca_id,
            ca_cert_id: input.ca_cert_id,
            subscriber_id: input.subscriber_id,
            serial_number: input.serial_number,
            common_name: input.common_name,
            alt_names: input.alt_names,
            not_before: input.not_before,
            not_after: input.not_after,
            key_usages: input.key_usages,
            extended_key_usages: input.extended_key_usages,
            status: CertificateStatus::Active,
            created_at,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> SigilResult<Certificate> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('certificate', $id)",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CertificateRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "certificate".into(),
            id: id_str,
        })?;

        Ok(row.try_into_certificate()?)
    }

    async fn get_by_serial(&self, ca_id: Uuid, serial_number: &str) -> SigilResult<Certificate> {
        let serial_owned = serial_number.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM certificate \
                 WHERE ca_id = $ca_id AND serial_number = $serial_number",
            )
            .bind(("ca_id", ca_id.to_string()))
            .bind(("serial_number", serial_owned.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CertificateRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "certificate".into(),
            id: format!("serial_number={serial_owned}"),
        })?;

        Ok(row.try_into_certificate()?)
    }

    async fn get_body(&self, cert_id: Uuid) -> SigilResult<CertificateBody> {
        let cert_id_str = cert_id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM certificate_body WHERE cert_id = $cert_id")
            .bind(("cert_id", cert_id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CertificateBodyRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "certificate_body".into(),
            id: cert_id_str,
        })?;

        Ok(row.try_into_body()?)
    }

    async fn list_by_subscriber(
        &self,
        subscriber_id: Uuid,
        pagination: Pagination,
    ) -> SigilResult<PaginatedResult<Certificate>> {
        let subscriber_id_str = subscriber_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM certificate \
                 WHERE subscriber_id = $subscriber_id GROUP ALL",
            )
            .bind(("subscriber_id", subscriber_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM certificate \
                 WHERE subscriber_id = $subscriber_id \
                 ORDER BY created_at DESC \
                 LIMIT $limit START $offset",
            )
            .bind(("subscriber_id", subscriber_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CertificateRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_certificate())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
