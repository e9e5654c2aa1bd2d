//! SurrealDB implementation of [`SubscriberRepository`].

use chrono::{DateTime, Utc};
use sigil_core::error::{SigilError, SigilResult};
use sigil_core::models::subscriber::{
    CreateSubscriber, SubjectAltName, Subscriber, SubscriberStatus, UpdateSubscriber,
};
use sigil_core::repository::{PaginatedResult, Pagination, SubscriberRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::codec::{list_to_strings, parse_list, parse_opt_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SubscriberRowWithId {
    record_id: String,
    project_id: String,
    ca_id: Option<String>,
    name: String,
    common_name: String,
    status: String,
    ttl: String,
    subject_alternative_names: Vec<String>,
    key_usages: Vec<String>,
    extended_key_usages: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_status(s: &str) -> Result<SubscriberStatus, DbError> {
    match s {
        "Active" => Ok(SubscriberStatus::Active),
        "Disabled" => Ok(SubscriberStatus::Disabled),
        other => Err(DbError::Decode(format!("unknown subscriber status: {other}"))),
    }
}

fn status_to_string(s: &SubscriberStatus) -> &'static str {
    match s {
        SubscriberStatus::Active => "Active",
        SubscriberStatus::Disabled => "Disabled",
    }
}

impl SubscriberRowWithId {
    fn try_into_subscriber(self) -> Result<Subscriber, DbError> {
        Ok(Subscriber {
            id: parse_uuid("subscriber", &self.record_id)?,
            project_id: parse_uuid("project", &self.project_id)?,
            ca_id: parse_opt_uuid("CA", self.ca_id.as_deref())?,
            name: self.name,
            common_name: self.common_name,
            status: parse_status(&self.status)?,
            ttl: self.ttl,
            subject_alternative_names: parse_list::<SubjectAltName>(self.subject_alternative_names)?,
            key_usages: parse_list(self.key_usages)?,
            extended_key_usages: parse_list(self.extended_key_usages)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Maps a unique-index violation on `(project_id, name)` to
/// `AlreadyExists`; everything else stays a query error.
fn map_write_error(err: impl std::fmt::Display) -> SigilError {
    let message = err.to_string();
    if message.contains("idx_pki_subscriber_project_name") {
        SigilError::AlreadyExists {
            entity: "pki_subscriber".into(),
        }
    } else {
        DbError::Query(message).into()
    }
}

/// SurrealDB implementation of the subscriber repository.
#[derive(Clone)]
pub struct SurrealSubscriberRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSubscriberRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SubscriberRepository for SurrealSubscriberRepository<C> {
    async fn create(&self, input: CreateSubscriber) -> SigilResult<Subscriber> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('pki_subscriber', $id) SET \
                 project_id = $project_id, \
                 ca_id = $ca_id, \
                 name = $name, \
                 common_name = $common_name, \
                 status = $status, \
                 ttl = $ttl, \
                 subject_alternative_names = $subject_alternative_names, \
                 key_usages = $key_usages, \
                 extended_key_usages = $extended_key_usages",
            )
            .bind(("id", id.to_string()))
            .bind(("project_id", input.project_id.to_string()))
            .bind(("ca_id", input.ca_id.map(|c| c.to_string())))
            .bind(("name", input.name))
            .bind(("common_name", input.common_name))
            .bind(("status", status_to_string(&input.status).to_string()))
            .bind(("ttl", input.ttl))
            .bind((
                "subject_alternative_names",
                list_to_strings(&input.subject_alternative_names),
            ))
            .bind(("key_usages", list_to_strings(&input.key_usages)))
            .bind((
                "extended_key_usages",
                list_to_strings(&input.extended_key_usages),
            ))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(map_write_error)?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> SigilResult<Subscriber> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('pki_subscriber', $id)",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SubscriberRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "pki_subscriber".into(),
            id: id_str,
        })?;

        Ok(row.try_into_subscriber()?)
    }

    async fn get_by_name(&self, project_id: Uuid, name: &str) -> SigilResult<Subscriber> {
        let name_owned = name.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM pki_subscriber \
                 WHERE project_id = $project_id AND name = $name",
            )
            .bind(("project_id", project_id.to_string()))
            .bind(("name", name_owned.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SubscriberRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "pki_subscriber".into(),
            id: format!("name={name_owned}"),
        })?;

        Ok(row.try_into_subscriber()?)
    }

    async fn update(&self, id: Uuid, input: UpdateSubscriber) -> SigilResult<Subscriber> {
        let mut sets = Vec::new();
        if input.ca_id.is_some() {
            sets.push("ca_id = $ca_id");
        }
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.common_name.is_some() {
            sets.push("common_name = $common_name");
        }
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.ttl.is_some() {
            sets.push("ttl = $ttl");
        }
        if input.subject_alternative_names.is_some() {
            sets.push("subject_alternative_names = $subject_alternative_names");
        }
        if input.key_usages.is_some() {
            sets.push("key_usages = $key_usages");
        }
        if input.extended_key_usages.is_some() {
            sets.push("extended_key_usages = $extended_key_usages");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('pki_subscriber', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id.to_string()));

        if let Some(ca_id) = input.ca_id {
            builder = builder.bind(("ca_id", ca_id.map(|c| c.to_string())));
        }
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(common_name) = input.common_name {
            builder = builder.bind(("common_name", common_name));
        }
        if let Some(ref status) = input.status {
            builder = builder.bind(("status", status_to_string(status).to_string()));
        }
        if let Some(ttl) = input.ttl {
            builder = builder.bind(("ttl", ttl));
        }
        if let Some(ref sans) = input.subject_alternative_names {
            builder = builder.bind(("subject_alternative_names", list_to_strings(sans)));
        }
        if let Some(ref usages) = input.key_usages {
            builder = builder.bind(("key_usages", list_to_strings(usages)));
        }
        if let Some(ref usages) = input.extended_key_usages {
            builder = builder.bind(("extended_key_usages", list_to_strings(usages)));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(map_write_error)?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid) -> SigilResult<Subscriber> {
        let existing = self.get_by_id(id).await?;

        self.db
            .query("DELETE type::record('pki_subscriber', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(existing)
    }

    async fn list(
        &self,
        project_id: Uuid,
        pagination: Pagination,
    ) -> SigilResult<PaginatedResult<Subscriber>> {
        let project_id_str = project_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM pki_subscriber \
                 WHERE project_id = $project_id GROUP ALL",
            )
            .bind(("project_id", project_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM pki_subscriber \
                 WHERE project_id = $project_id \
                 ORDER BY name ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("project_id", project_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SubscriberRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_subscriber())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
