//! Broadcast hub for dispatching gateway events to connected sessions.
//!
//! Uses a single `tokio::sync::broadcast` channel. Each connected session
//! subscribes and filters events locally by audience. This fits the
//! single-process design: there is no cross-process fan-out.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::rooms::RoomKey;

use super::events::ServerEvent;

/// Capacity of the broadcast channel. Slow receivers that fall behind will
/// skip messages (RecvError::Lagged).
const BROADCAST_CAPACITY: usize = 4096;

/// Which sessions an event is meant for.
#[derive(Debug, Clone, PartialEq)]
pub enum Audience {
    /// Sessions that have joined the room.
    Room(RoomKey),
    /// Sessions that have joined the room, except the sender.
    RoomExcept { room: RoomKey, session_id: String },
    /// Every connected session.
    Global,
    /// Sessions identified as this user.
    User(String),
}

/// A payload broadcast to all connected gateway sessions.
#[derive(Debug, Clone)]
pub struct BroadcastPayload {
    pub audience: Audience,
    pub event: ServerEvent,
}

/// The global broadcast hub. Held in AppState.
#[derive(Clone)]
pub struct GatewayBroadcast {
    sender: broadcast::Sender<Arc<BroadcastPayload>>,
}

impl GatewayBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the broadcast channel. Each gateway session should call
    /// this once to get its own receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BroadcastPayload>> {
        self.sender.subscribe()
    }

    /// Dispatch an event to all connected sessions.
    pub fn dispatch(&self, audience: Audience, event: ServerEvent) {
        // send() returns Err if there are no receivers, which is fine.
        let _ = self.sender.send(Arc::new(BroadcastPayload { audience, event }));
    }

    pub fn to_room(&self, room: &RoomKey, event: ServerEvent) {
        self.dispatch(Audience::Room(room.clone()), event);
    }

    pub fn to_room_except(&self, room: &RoomKey, session_id: &str, event: ServerEvent) {
        self.dispatch(
            Audience::RoomExcept {
                room: room.clone(),
                session_id: session_id.to_string(),
            },
            event,
        );
    }

    pub fn to_all(&self, event: ServerEvent) {
        self.dispatch(Audience::Global, event);
    }

    pub fn to_user(&self, user_id: &str, event: ServerEvent) {
        self.dispatch(Audience::User(user_id.to_string()), event);
    }
}

impl Default for GatewayBroadcast {
    fn default() -> Self {
        Self::new()
    }
}
