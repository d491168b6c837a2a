use serde::{Deserialize, Serialize};

use crate::model::{Id, Timestamp};

/// Longest accepted message content, counted in characters.
pub const MAX_CONTENT_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Id,
    pub content: String,
    pub sender: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Optimistic-concurrency counter, bumped by the store on every update.
    pub version: i64,
}

/// Create payload. The sender is always the authenticated caller, so a
/// `sender` in the body is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageUpdate {
    #[serde(default)]
    pub content: String,
    /// Version the caller last saw. When absent the current stored version
    /// is used as the expected one.
    #[serde(default)]
    pub version: Option<i64>,
}
