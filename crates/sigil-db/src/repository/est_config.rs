//! SurrealDB implementation of [`EstConfigRepository`].

use chrono::{DateTime, Utc};
use sigil_core::error::SigilResult;
use sigil_core::models::est::{CreateEstConfig, EstConfig};
use sigil_core::repository::EstConfigRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::codec::parse_uuid;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct EstConfigRowWithId {
    record_id: String,
    project_id: String,
    subscriber_id: String,
    is_enabled: bool,
    ca_chain: String,
    created_at: DateTime<Utc>,
}

impl EstConfigRowWithId {
    fn try_into_config(self) -> Result<EstConfig, DbError> {
        Ok(EstConfig {
            id: parse_uuid("EST config", &self.record_id)?,
            project_id: parse_uuid("project", &self.project_id)?,
            subscriber_id: parse_uuid("subscriber", &self.subscriber_id)?,
            is_enabled: self.is_enabled,
            ca_chain: self.ca_chain,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealEstConfigRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealEstConfigRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> EstConfigRepository for SurrealEstConfigRepository<C> {
    async fn create(&self, input: CreateEstConfig) -> SigilResult<EstConfig> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('est_config', $id) SET \
                 project_id = $project_id, \
                 subscriber_id = $subscriber_id, \
                 is_enabled = $is_enabled, \
                 ca_chain = $ca_chain",
            )
            .bind(("id", id.to_string()))
            .bind(("project_id", input.project_id.to_string()))
            .bind(("subscriber_id", input.subscriber_id.to_string()))
            .bind(("is_enabled", input.is_enabled))
            .bind(("ca_chain", input.ca_chain))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> SigilResult<EstConfig> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('est_config', $id)",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<EstConfigRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "est_config".into(),
            id: id_str,
        })?;

        Ok(row.try_into_config()?)
    }
}
