use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{InviteDecision, TodoStatus};

/// Generic acknowledgement body returned by delete-style endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

/// Failure payloads carry a human-readable `detail` field.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct InviteRequest {
    pub invite_code: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmRequest {
    pub status: InviteDecision,
}

#[derive(Debug, Serialize)]
pub struct BulkStatusRequest {
    pub todo_ids: Vec<Uuid>,
    pub status: TodoStatus,
}
