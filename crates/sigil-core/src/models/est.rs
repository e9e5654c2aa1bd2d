//! EST enrollment configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-subscriber EST simple-enroll settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstConfig {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Subscriber whose policy governs enrolled certificates.
    pub subscriber_id: Uuid,
    pub is_enabled: bool,
    /// PEM bundle used as the trust anchor for client certificates.
    pub ca_chain: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEstConfig {
    pub project_id: Uuid,
    pub subscriber_id: Uuid,
    pub is_enabled: bool,
    pub ca_chain: String,
}
