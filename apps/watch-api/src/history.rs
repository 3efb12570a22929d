//! Watch history and episode-release subscriptions.
//!
//! Both are fed by the catalog side of the product and read by the
//! scheduler's cleanup and notification sweeps.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// One watched episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchEntry {
    pub content_id: String,
    pub episode_id: String,
    pub watched_at: DateTime<Utc>,
    /// Playback position in seconds.
    pub position: u64,
}

pub struct WatchHistory {
    entries: DashMap<String, Vec<WatchEntry>>,
}

impl WatchHistory {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Record a watch. Re-watching an episode refreshes its existing entry.
    pub fn record(&self, user_id: &str, entry: WatchEntry) {
        let mut history = self.entries.entry(user_id.to_string()).or_default();
        match history
            .iter_mut()
            .find(|e| e.content_id == entry.content_id && e.episode_id == entry.episode_id)
        {
            Some(existing) => {
                existing.watched_at = entry.watched_at;
                existing.position = entry.position;
            }
            None => history.push(entry),
        }
    }

    pub fn list(&self, user_id: &str) -> Vec<WatchEntry> {
        self.entries
            .get(user_id)
            .map(|h| h.value().clone())
            .unwrap_or_default()
    }

    /// Drop every entry watched at or before `cutoff`. Returns how many were removed.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for mut history in self.entries.iter_mut() {
            let before = history.len();
            history.retain(|e| e.watched_at > cutoff);
            removed += before - history.len();
        }
        removed
    }
}

impl Default for WatchHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Which content each user wants release notices for.
pub struct Subscriptions {
    by_user: DashMap<String, HashSet<String>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self {
            by_user: DashMap::new(),
        }
    }

    /// Returns `true` if the subscription is new.
    pub fn subscribe(&self, user_id: &str, content_id: &str) -> bool {
        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(content_id.to_string())
    }

    /// Returns `true` if a subscription was removed.
    pub fn unsubscribe(&self, user_id: &str, content_id: &str) -> bool {
        self.by_user
            .get_mut(user_id)
            .map(|mut subs| subs.remove(content_id))
            .unwrap_or(false)
    }

    /// The user's subscribed content IDs, sorted.
    pub fn list(&self, user_id: &str) -> Vec<String> {
        let mut subs: Vec<String> = self
            .by_user
            .get(user_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        subs.sort();
        subs
    }

    /// Every `(user_id, content_id)` pair.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.by_user
            .iter()
            .flat_map(|entry| {
                let user_id = entry.key().clone();
                entry
                    .value()
                    .iter()
                    .map(|content_id| (user_id.clone(), content_id.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

impl Default for Subscriptions {
    fn default() -> Self {
        Self::new()
    }
}
