//! In-memory per-room presence tracking.
//!
//! Presence is a set of user IDs per room. The member count is always the
//! set's cardinality, so repeated joins or leaves cannot make it drift.

use std::collections::HashSet;

use dashmap::DashMap;

use super::RoomKey;

/// Membership operations over rooms. All operations are total: unknown rooms
/// simply have no members.
pub trait PresenceStore: Send + Sync {
    /// Add `user_id` to the room. Returns the resulting member count.
    fn join(&self, room: &RoomKey, user_id: &str) -> usize;
    /// Remove `user_id` from the room. Returns the resulting member count.
    fn leave(&self, room: &RoomKey, user_id: &str) -> usize;
    /// Current member count, 0 for unknown rooms.
    fn count(&self, room: &RoomKey) -> usize;
    /// Member count of every room ever joined, including empty ones.
    fn room_sizes(&self) -> Vec<(RoomKey, usize)>;
}

/// DashMap-backed presence registry. Each room's set is guarded by its shard
/// lock, so concurrent joins to different rooms do not contend.
pub struct MemoryPresence {
    rooms: DashMap<RoomKey, HashSet<String>>,
}

impl MemoryPresence {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }
}

impl Default for MemoryPresence {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceStore for MemoryPresence {
    fn join(&self, room: &RoomKey, user_id: &str) -> usize {
        let mut members = self.rooms.entry(room.clone()).or_default();
        members.insert(user_id.to_string());
        members.len()
    }

    fn leave(&self, room: &RoomKey, user_id: &str) -> usize {
        // The set itself stays behind even when it empties; rejoining is common.
        match self.rooms.get_mut(room) {
            Some(mut members) => {
                members.remove(user_id);
                members.len()
            }
            None => 0,
        }
    }

    fn count(&self, room: &RoomKey) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    fn room_sizes(&self) -> Vec<(RoomKey, usize)> {
        self.rooms
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomKey {
        RoomKey::new("anime-1", "ep-1")
    }

    #[test]
    fn join_is_idempotent() {
        let presence = MemoryPresence::new();
        assert_eq!(presence.join(&room(), "u1"), 1);
        assert_eq!(presence.join(&room(), "u1"), 1);
        assert_eq!(presence.join(&room(), "u2"), 2);
        assert_eq!(presence.count(&room()), 2);
    }

    #[test]
    fn leave_is_idempotent() {
        let presence = MemoryPresence::new();
        presence.join(&room(), "u1");
        presence.join(&room(), "u2");

        assert_eq!(presence.leave(&room(), "u1"), 1);
        assert_eq!(presence.leave(&room(), "u1"), 1);
        assert_eq!(presence.leave(&room(), "nobody"), 1);
        assert_eq!(presence.count(&room()), 1);
    }

    #[test]
    fn unknown_room_counts_zero() {
        let presence = MemoryPresence::new();
        assert_eq!(presence.count(&room()), 0);
        assert_eq!(presence.leave(&room(), "u1"), 0);
        // Leaving an unknown room must not create it.
        assert!(presence.room_sizes().is_empty());
    }

    #[test]
    fn count_matches_distinct_members_over_mixed_sequence() {
        let presence = MemoryPresence::new();
        let ops: &[(&str, bool)] = &[
            ("a", true),
            ("b", true),
            ("a", true),
            ("c", true),
            ("b", false),
            ("b", false),
            ("a", false),
            ("d", true),
        ];

        let mut expected = HashSet::new();
        for (user, join) in ops {
            let reported = if *join {
                expected.insert(*user);
                presence.join(&room(), user)
            } else {
                expected.remove(user);
                presence.leave(&room(), user)
            };
            assert_eq!(reported, expected.len());
        }
    }

    #[test]
    fn emptied_room_is_kept() {
        let presence = MemoryPresence::new();
        presence.join(&room(), "u1");
        presence.leave(&room(), "u1");

        let sizes = presence.room_sizes();
        assert_eq!(sizes, vec![(room(), 0)]);
    }

    #[test]
    fn rooms_are_independent() {
        let presence = MemoryPresence::new();
        let other = RoomKey::new("anime-1", "ep-2");
        presence.join(&room(), "u1");
        presence.join(&other, "u1");
        presence.leave(&room(), "u1");

        assert_eq!(presence.count(&room()), 0);
        assert_eq!(presence.count(&other), 1);
    }
}
