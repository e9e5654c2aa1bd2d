//! PKI subscriber domain models.
//!
//! A subscriber is a named issuance policy: it bounds which common name,
//! usages and alternative names certificates issued under it may carry.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::certificate::{ExtendedKeyUsage, KeyUsage};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubscriberStatus {
    Active,
    Disabled,
}

/// Subject alternative name kinds a subscriber may allow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SanKind {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "dns")]
    Dns,
}

impl SanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SanKind::Email => "email",
            SanKind::Dns => "dns",
        }
    }
}

/// A typed subject alternative name. Rendered as `dns:example.com` or
/// `email:ops@example.com`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SubjectAltName {
    pub kind: SanKind,
    pub value: String,
}

impl SubjectAltName {
    pub fn dns(value: impl Into<String>) -> Self {
        Self {
            kind: SanKind::Dns,
            value: value.into(),
        }
    }

    pub fn email(value: impl Into<String>) -> Self {
        Self {
            kind: SanKind::Email,
            value: value.into(),
        }
    }
}

impl fmt::Display for SubjectAltName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.value)
    }
}

impl FromStr for SubjectAltName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| format!("malformed subject alternative name: {s}"))?;
        let kind = match kind {
            "dns" => SanKind::Dns,
            "email" => SanKind::Email,
            other => return Err(format!("unknown subject alternative name type: {other}")),
        };
        Ok(Self {
            kind,
            value: value.to_string(),
        })
    }
}

/// An issuance policy holder.
///
/// `subject_alternative_names`, `key_usages` and `extended_key_usages`
/// are allow-lists: issued values must be subsets of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: Uuid,
    pub project_id: Uuid,
    /// `None` means the subscriber cannot issue.
    pub ca_id: Option<Uuid>,
    /// Unique within the project.
    pub name: String,
    pub common_name: String,
    pub status: SubscriberStatus,
    /// Duration string, e.g. `90d` or `1y`.
    pub ttl: String,
    pub subject_alternative_names: Vec<SubjectAltName>,
    pub key_usages: Vec<KeyUsage>,
    pub extended_key_usages: Vec<ExtendedKeyUsage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriber {
    pub project_id: Uuid,
    pub ca_id: Option<Uuid>,
    pub name: String,
    pub common_name: String,
    pub status: SubscriberStatus,
    pub ttl: String,
    pub subject_alternative_names: Vec<SubjectAltName>,
    pub key_usages: Vec<KeyUsage>,
    pub extended_key_usages: Vec<ExtendedKeyUsage>,
}

/// Fields that can be updated on a subscriber.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSubscriber {
    /// `Some(None)` detaches the subscriber from its CA.
    pub ca_id: Option<Option<Uuid>>,
    pub name: Option<String>,
    pub common_name: Option<String>,
    pub status: Option<SubscriberStatus>,
    pub ttl: Option<String>,
    pub subject_alternative_names: Option<Vec<SubjectAltName>>,
    pub key_usages: Option<Vec<KeyUsage>>,
    pub extended_key_usages: Option<Vec<ExtendedKeyUsage>>,
}
