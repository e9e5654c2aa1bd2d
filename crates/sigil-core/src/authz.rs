//! Authorization collaborator.
//!
//! Permission evaluation is external. The engine asks before every
//! subscriber operation and treats [`Decision::Deny`] as terminal.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SigilResult;

/// Who is performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    User { id: Uuid },
    Identity { id: Uuid },
    /// An EST client authenticated by its certificate.
    EstClient { config_id: Uuid },
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::User { id } => write!(f, "user:{id}"),
            Actor::Identity { id } => write!(f, "identity:{id}"),
            Actor::EstClient { config_id } => write!(f, "est:{config_id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriberAction {
    Create,
    Read,
    Edit,
    Delete,
    IssueCert,
    ListCerts,
}

impl SubscriberAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberAction::Create => "create",
            SubscriberAction::Read => "read",
            SubscriberAction::Edit => "edit",
            SubscriberAction::Delete => "delete",
            SubscriberAction::IssueCert => "issue-cert",
            SubscriberAction::ListCerts => "list-certs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

pub trait Authorizer: Send + Sync {
    /// Decide whether `actor` may perform `action` on the named
    /// subscriber within `project_id`.
    fn check_permission(
        &self,
        actor: &Actor,
        project_id: Uuid,
        action: SubscriberAction,
        subscriber_name: &str,
    ) -> impl Future<Output = SigilResult<Decision>> + Send;
}
