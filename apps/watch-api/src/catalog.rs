//! Catalog collaborator: which episodes exist for a piece of content.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub content_id: String,
    pub number: u32,
    pub title: String,
}

/// Read access to the content catalog.
///
/// Backed by the catalog service in production and an in-memory map in tests.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// The highest-numbered episode of `content_id`, if any exist.
    async fn latest_episode(&self, content_id: &str) -> Result<Option<Episode>, ApiError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

pub struct MemoryCatalog {
    episodes: DashMap<String, Vec<Episode>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            episodes: DashMap::new(),
        }
    }

    pub fn insert_episode(&self, episode: Episode) {
        self.episodes
            .entry(episode.content_id.clone())
            .or_default()
            .push(episode);
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn latest_episode(&self, content_id: &str) -> Result<Option<Episode>, ApiError> {
        Ok(self
            .episodes
            .get(content_id)
            .and_then(|eps| eps.iter().max_by_key(|e| e.number).cloned()))
    }
}
