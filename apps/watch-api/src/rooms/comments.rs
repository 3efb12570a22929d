//! Append-only per-room comment logs with like counters.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use watch_common::id::{prefix, prefixed_ulid};

use super::RoomKey;

/// A chat message posted to a room.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    #[serde(flatten)]
    pub room: RoomKey,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub like_count: u64,
}

/// Operations over per-room comment logs.
///
/// Logs are strictly arrival-ordered per room and never reordered or
/// shortened. The only mutation after append is the like counter.
pub trait CommentStore: Send + Sync {
    /// Append a new comment with a fresh ID. `created_at` defaults to now.
    fn append(
        &self,
        room: &RoomKey,
        author_id: &str,
        author_name: &str,
        text: &str,
        created_at: Option<DateTime<Utc>>,
    ) -> Comment;

    /// Increment a comment's like count by one. Returns the new count, or
    /// `None` if the room has no comment with that ID.
    fn like(&self, room: &RoomKey, comment_id: &str) -> Option<u64>;

    /// The room's full log in arrival order. Empty for unknown rooms.
    fn list_for_room(&self, room: &RoomKey) -> Vec<Comment>;

    /// Log length of every room that has received a comment.
    fn room_lengths(&self) -> Vec<(RoomKey, usize)>;
}

/// DashMap-backed comment store. Appends to one room hold that room's shard
/// lock, which is what keeps arrival order exact under concurrent senders.
pub struct MemoryComments {
    logs: DashMap<RoomKey, Vec<Comment>>,
}

impl MemoryComments {
    pub fn new() -> Self {
        Self {
            logs: DashMap::new(),
        }
    }
}

impl Default for MemoryComments {
    fn default() -> Self {
        Self::new()
    }
}

impl CommentStore for MemoryComments {
    fn append(
        &self,
        room: &RoomKey,
        author_id: &str,
        author_name: &str,
        text: &str,
        created_at: Option<DateTime<Utc>>,
    ) -> Comment {
        let comment = Comment {
            id: prefixed_ulid(prefix::COMMENT),
            room: room.clone(),
            author_id: author_id.to_string(),
            author_name: author_name.to_string(),
            text: text.to_string(),
            created_at: created_at.unwrap_or_else(Utc::now),
            like_count: 0,
        };
        self.logs
            .entry(room.clone())
            .or_default()
            .push(comment.clone());
        comment
    }

    fn like(&self, room: &RoomKey, comment_id: &str) -> Option<u64> {
        let mut log = self.logs.get_mut(room)?;
        let comment = log.iter_mut().find(|c| c.id == comment_id)?;
        comment.like_count += 1;
        Some(comment.like_count)
    }

    fn list_for_room(&self, room: &RoomKey) -> Vec<Comment> {
        self.logs
            .get(room)
            .map(|log| log.value().clone())
            .unwrap_or_default()
    }

    fn room_lengths(&self) -> Vec<(RoomKey, usize)> {
        self.logs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect()
    }
}
