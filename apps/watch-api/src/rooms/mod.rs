//! Per-room state: who is watching and what they have said.

pub mod comments;
pub mod presence;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a watch room: one episode of one piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomKey {
    pub content_id: String,
    pub episode_id: String,
}

impl RoomKey {
    pub fn new(content_id: impl Into<String>, episode_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            episode_id: episode_id.into(),
        }
    }

    /// Both components must be non-blank for the key to address a room.
    pub fn is_valid(&self) -> bool {
        !self.content_id.trim().is_empty() && !self.episode_id.trim().is_empty()
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.content_id, self.episode_id)
    }
}
