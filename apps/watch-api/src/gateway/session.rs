//! Per-connection gateway session state.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use watch_common::id::{prefix, prefixed_ulid};

use crate::rooms::RoomKey;

use super::fanout::Audience;

/// A presence entry this connection created: room, user ID, display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room: RoomKey,
    pub user_id: String,
    pub user_name: String,
}

/// State for a single WebSocket connection.
pub struct GatewaySession {
    /// Unique session identifier (`gw_` prefixed ULID).
    pub session_id: String,
    /// User ID supplied at IDENTIFY.
    pub user_id: String,
    /// Display name supplied at IDENTIFY.
    pub user_name: String,
    /// Rooms whose broadcasts this connection receives.
    rooms: Mutex<HashSet<RoomKey>>,
    /// Presence entries to undo when the connection drops, keyed by (room, user ID).
    memberships: Mutex<HashMap<(RoomKey, String), String>>,
    /// Monotonically increasing sequence number for dispatch events.
    seq: AtomicU64,
}

impl GatewaySession {
    pub fn new(user_id: String, user_name: String) -> Self {
        Self {
            session_id: prefixed_ulid(prefix::GATEWAY_SESSION),
            user_id,
            user_name,
            rooms: Mutex::new(HashSet::new()),
            memberships: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Get the next sequence number for a dispatch event.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Start receiving the room's broadcasts and remember the presence entry.
    pub fn enter_room(&self, room: &RoomKey, user_id: &str, user_name: &str) {
        self.rooms.lock().insert(room.clone());
        self.memberships
            .lock()
            .insert((room.clone(), user_id.to_string()), user_name.to_string());
    }

    /// Forget the presence entry; stop receiving the room's broadcasts once
    /// no entry for the room is left.
    pub fn exit_room(&self, room: &RoomKey, user_id: &str) {
        let mut memberships = self.memberships.lock();
        memberships.remove(&(room.clone(), user_id.to_string()));
        if !memberships.keys().any(|(r, _)| r == room) {
            self.rooms.lock().remove(room);
        }
    }

    pub fn is_in_room(&self, room: &RoomKey) -> bool {
        self.rooms.lock().contains(room)
    }

    /// Drain every presence entry this connection still holds.
    pub fn take_memberships(&self) -> Vec<Membership> {
        self.rooms.lock().clear();
        self.memberships
            .lock()
            .drain()
            .map(|((room, user_id), user_name)| Membership {
                room,
                user_id,
                user_name,
            })
            .collect()
    }

    /// Whether an event with this audience should be written to this connection.
    pub fn wants(&self, audience: &Audience) -> bool {
        match audience {
            Audience::Room(room) => self.is_in_room(room),
            Audience::RoomExcept { room, session_id } => {
                *session_id != self.session_id && self.is_in_room(room)
            }
            Audience::Global => true,
            Audience::User(user_id) => *user_id == self.user_id,
        }
    }
}
