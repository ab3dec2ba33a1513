use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a collaboration invitation. `Accepted` and `Rejected` are
/// terminal; nothing in this crate moves a resolved invitation back to
/// `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl CollaborationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CollaborationStatus::Pending)
    }
}

/// The decision an invitee can make. `Pending` is deliberately not
/// representable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteDecision {
    Accepted,
    Rejected,
}

impl From<InviteDecision> for CollaborationStatus {
    fn from(decision: InviteDecision) -> Self {
        match decision {
            InviteDecision::Accepted => CollaborationStatus::Accepted,
            InviteDecision::Rejected => CollaborationStatus::Rejected,
        }
    }
}

/// A collaborator row doubles as the invitation record: it is created
/// `Pending` by an invite and resolved by the invitee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: Uuid,
    pub todo_id: Uuid,
    pub user_id: Uuid,
    pub status: CollaborationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorsPage {
    pub data: Vec<Collaborator>,
    pub count: i64,
}
