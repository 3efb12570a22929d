pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod notifications;
pub mod rooms;
pub mod routes;
pub mod scheduler;
pub mod trends;

use std::sync::Arc;

use catalog::{Catalog, MemoryCatalog};
use config::Config;
use gateway::events::ServerEvent;
use gateway::fanout::GatewayBroadcast;
use history::{Subscriptions, WatchHistory};
use notifications::NotificationCenter;
use rooms::comments::{CommentStore, MemoryComments};
use rooms::presence::{MemoryPresence, PresenceStore};
use trends::{TrendBoard, TrendSnapshot};

/// Process-wide context shared by route handlers, gateway sessions and the
/// scheduler. Every store is in memory and owned here, nowhere else.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub presence: Arc<dyn PresenceStore>,
    pub comments: Arc<dyn CommentStore>,
    pub trends: Arc<TrendBoard>,
    pub notifications: Arc<NotificationCenter>,
    pub history: Arc<WatchHistory>,
    pub subscriptions: Arc<Subscriptions>,
    pub catalog: Arc<dyn Catalog>,
    pub broadcast: Arc<GatewayBroadcast>,
}

impl AppState {
    /// Build a fresh state with empty in-memory stores.
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            presence: Arc::new(MemoryPresence::new()),
            comments: Arc::new(MemoryComments::new()),
            trends: Arc::new(TrendBoard::new()),
            notifications: Arc::new(NotificationCenter::new()),
            history: Arc::new(WatchHistory::new()),
            subscriptions: Arc::new(Subscriptions::new()),
            catalog: Arc::new(MemoryCatalog::new()),
            broadcast: Arc::new(GatewayBroadcast::new()),
        }
    }

    /// Swap in a different catalog collaborator.
    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Recompute the trend table from the live stores, install it and push a
    /// `trend-update` to every connection.
    ///
    /// Both the per-comment path (with `changed` set to the commented content)
    /// and the scheduled tick (with `None`) go through here, so the two can
    /// never disagree.
    pub fn refresh_trends(&self, changed: Option<&str>) -> Arc<TrendSnapshot> {
        self.trends.refresh_and_publish(
            self.presence.as_ref(),
            self.comments.as_ref(),
            changed,
            |snapshot| self.broadcast.to_all(ServerEvent::TrendUpdate(snapshot)),
        )
    }
}
