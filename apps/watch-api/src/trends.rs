//! Ranked "what's hot" table derived from presence and comment activity.
//!
//! The table is never edited in place. Every refresh recomputes it from the
//! stores and swaps the whole snapshot, so readers see either the previous
//! table or the new one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::rooms::comments::CommentStore;
use crate::rooms::presence::PresenceStore;
use crate::rooms::RoomKey;

/// Weight of one comment in the engagement score.
pub const COMMENT_WEIGHT: f64 = 0.7;
/// Weight of one present viewer in the engagement score.
pub const PRESENCE_WEIGHT: f64 = 0.3;
/// Length of the published table.
pub const MAX_TRENDS: usize = 10;

/// Engagement totals for one piece of content, summed over its episode rooms.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendMetric {
    pub content_id: String,
    pub comment_count: usize,
    pub active_user_count: usize,
    pub score: f64,
    /// 1-based position in the table.
    pub rank: usize,
}

/// A complete ranked table and when it was computed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSnapshot {
    pub trends: Vec<TrendMetric>,
    pub computed_at: DateTime<Utc>,
    /// Metric of the content whose activity triggered this refresh, with its
    /// true rank even when it falls outside the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<TrendMetric>,
}

impl TrendSnapshot {
    pub fn empty() -> Self {
        Self {
            trends: Vec::new(),
            computed_at: Utc::now(),
            updated: None,
        }
    }

    pub fn get(&self, content_id: &str) -> Option<&TrendMetric> {
        self.trends
            .iter()
            .find(|m| m.content_id == content_id)
            .or_else(|| self.updated.as_ref().filter(|m| m.content_id == content_id))
    }
}

pub fn score(comment_count: usize, active_user_count: usize) -> f64 {
    comment_count as f64 * COMMENT_WEIGHT + active_user_count as f64 * PRESENCE_WEIGHT
}

/// Rank content by engagement, keeping only the top [`MAX_TRENDS`].
pub fn rank(presence: &[(RoomKey, usize)], comments: &[(RoomKey, usize)]) -> Vec<TrendMetric> {
    let mut metrics = rank_all(presence, comments);
    metrics.truncate(MAX_TRENDS);
    metrics
}

/// Rank every content by engagement.
///
/// Inputs are per-room sizes; rooms are grouped by content ID. Order is score
/// descending, then content ID ascending, so equal scores always rank the
/// same way.
pub fn rank_all(presence: &[(RoomKey, usize)], comments: &[(RoomKey, usize)]) -> Vec<TrendMetric> {
    // content_id -> (comment_count, active_user_count)
    let mut totals: HashMap<&str, (usize, usize)> = HashMap::new();

    for (room, len) in comments {
        totals.entry(room.content_id.as_str()).or_default().0 += len;
    }
    for (room, size) in presence {
        totals.entry(room.content_id.as_str()).or_default().1 += size;
    }

    let mut metrics: Vec<TrendMetric> = totals
        .into_iter()
        .map(|(content_id, (comment_count, active_user_count))| TrendMetric {
            content_id: content_id.to_string(),
            comment_count,
            active_user_count,
            score: score(comment_count, active_user_count),
            rank: 0,
        })
        .collect();

    metrics.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.content_id.cmp(&b.content_id))
    });

    for (i, metric) in metrics.iter_mut().enumerate() {
        metric.rank = i + 1;
    }
    metrics
}

/// Holder of the current trend table.
pub struct TrendBoard {
    current: RwLock<Arc<TrendSnapshot>>,
}

impl TrendBoard {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(TrendSnapshot::empty())),
        }
    }

    /// The most recently installed table.
    pub fn current(&self) -> Arc<TrendSnapshot> {
        self.current.read().clone()
    }

    /// Recompute from the stores and replace the current table.
    pub fn refresh(
        &self,
        presence: &dyn PresenceStore,
        comments: &dyn CommentStore,
    ) -> Arc<TrendSnapshot> {
        self.refresh_and_publish(presence, comments, None, |_| {})
    }

    /// Recompute, install, then hand the snapshot to `publish`.
    ///
    /// The write lock is held from sampling the stores until `publish`
    /// returns, so concurrent refreshes install and publish in the same
    /// order. `changed` names the content whose metric is carried in
    /// `updated` for the published copy; the installed table never has it.
    pub fn refresh_and_publish(
        &self,
        presence: &dyn PresenceStore,
        comments: &dyn CommentStore,
        changed: Option<&str>,
        publish: impl FnOnce(Arc<TrendSnapshot>),
    ) -> Arc<TrendSnapshot> {
        let mut current = self.current.write();
        let mut ranked = rank_all(&presence.room_sizes(), &comments.room_lengths());
        let updated =
            changed.and_then(|id| ranked.iter().find(|m| m.content_id == id).cloned());
        ranked.truncate(MAX_TRENDS);

        let table = TrendSnapshot {
            trends: ranked,
            computed_at: Utc::now(),
            updated: None,
        };
        let snapshot = Arc::new(TrendSnapshot {
            updated,
            ..table.clone()
        });
        *current = Arc::new(table);
        publish(snapshot.clone());
        snapshot
    }
}

impl Default for TrendBoard {
    fn default() -> Self {
        Self::new()
    }
}
