//! Per-user notification inboxes.

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::Serialize;
use watch_common::id::{prefix, prefixed_ulid};

/// A notification in a user's inbox.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub content_id: Option<String>,
    pub episode_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Fields supplied by the sender of a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub content_id: Option<String>,
    pub episode_id: Option<String>,
}

/// Append-only inboxes keyed by owner user ID.
pub struct NotificationCenter {
    inboxes: DashMap<String, Vec<Notification>>,
    /// `(user_id, content_id, episode_id)` release notices already sent.
    released: DashSet<(String, String, String)>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self {
            inboxes: DashMap::new(),
            released: DashSet::new(),
        }
    }

    /// Append an unread notification to the owner's inbox.
    pub fn send(&self, new: NewNotification) -> Notification {
        let notification = Notification {
            id: prefixed_ulid(prefix::NOTIFICATION),
            user_id: new.user_id,
            title: new.title,
            message: new.message,
            content_id: new.content_id,
            episode_id: new.episode_id,
            created_at: Utc::now(),
            read: false,
        };
        self.inboxes
            .entry(notification.user_id.clone())
            .or_default()
            .push(notification.clone());
        notification
    }

    /// Send a release notice unless this user was already told about this
    /// episode. Returns `None` for a repeat.
    pub fn send_release_once(
        &self,
        user_id: &str,
        content_id: &str,
        episode_id: &str,
        title: String,
        message: String,
    ) -> Option<Notification> {
        let key = (
            user_id.to_string(),
            content_id.to_string(),
            episode_id.to_string(),
        );
        if !self.released.insert(key) {
            return None;
        }
        Some(self.send(NewNotification {
            user_id: user_id.to_string(),
            title,
            message,
            content_id: Some(content_id.to_string()),
            episode_id: Some(episode_id.to_string()),
        }))
    }

    /// Flip a notification to read. Returns `false` if the user has no such
    /// notification. Already-read notifications stay read.
    pub fn mark_read(&self, user_id: &str, notification_id: &str) -> bool {
        let Some(mut inbox) = self.inboxes.get_mut(user_id) else {
            return false;
        };
        match inbox.iter_mut().find(|n| n.id == notification_id) {
            Some(notification) => {
                notification.read = true;
                true
            }
            None => false,
        }
    }

    /// The user's inbox, oldest first.
    pub fn list_for(&self, user_id: &str) -> Vec<Notification> {
        self.inboxes
            .get(user_id)
            .map(|inbox| inbox.value().clone())
            .unwrap_or_default()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}
