//! Gateway opcodes, event types, and wire-format messages.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::notifications::Notification;
use crate::rooms::comments::Comment;
use crate::rooms::RoomKey;
use crate::trends::TrendSnapshot;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

pub const OP_DISPATCH: u8 = 0;
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_IDENTIFY: u8 = 2;
pub const OP_HEARTBEAT_ACK: u8 = 6;

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// A message sent from the server to the client over WebSocket.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayMessage {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    pub d: Value,
}

impl GatewayMessage {
    /// Build a DISPATCH message (op=0).
    pub fn dispatch(seq: u64, event: &ServerEvent) -> Self {
        Self {
            op: OP_DISPATCH,
            t: Some(event.name().to_string()),
            s: Some(seq),
            d: event.data(),
        }
    }

    /// Build a HEARTBEAT_ACK message (op=6).
    pub fn heartbeat_ack(seq: u64) -> Self {
        Self {
            op: OP_HEARTBEAT_ACK,
            t: None,
            s: None,
            d: serde_json::json!({ "ack": seq }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server message
// ---------------------------------------------------------------------------

/// A message received from the client over WebSocket.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub op: u8,
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub d: Value,
}

// ---------------------------------------------------------------------------
// IDENTIFY payload
// ---------------------------------------------------------------------------

/// Identity handed over by the auth collaborator. Not verified here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyPayload {
    pub user_id: String,
    pub user_name: String,
}

// ---------------------------------------------------------------------------
// HEARTBEAT payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(default)]
    pub seq: u64,
}

// ---------------------------------------------------------------------------
// Inbound dispatch events
// ---------------------------------------------------------------------------

/// `join-room` / `leave-room`. Identity defaults to the connection's.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPayload {
    #[serde(flatten)]
    pub room: RoomKey,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCommentPayload {
    #[serde(flatten)]
    pub room: RoomKey,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeCommentPayload {
    #[serde(flatten)]
    pub room: RoomKey,
    pub comment_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    #[serde(flatten)]
    pub room: RoomKey,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationPayload {
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default)]
    pub episode_id: Option<String>,
}

/// Every event a client may dispatch. Anything else fails to parse.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "t", content = "d", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(MembershipPayload),
    LeaveRoom(MembershipPayload),
    SendComment(SendCommentPayload),
    LikeComment(LikeCommentPayload),
    Typing(TypingPayload),
    StopTyping(RoomKey),
    SendNotification(SendNotificationPayload),
}

impl ClientEvent {
    /// Decode the `t`/`d` pair of a DISPATCH frame.
    pub fn parse(name: &str, data: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({ "t": name, "d": data }))
    }

    /// Reject blank identifiers and text before anything is mutated.
    pub fn validate(&self) -> Result<(), &'static str> {
        let room_ok = match self {
            ClientEvent::JoinRoom(p) | ClientEvent::LeaveRoom(p) => p.room.is_valid(),
            ClientEvent::SendComment(p) => p.room.is_valid(),
            ClientEvent::LikeComment(p) => p.room.is_valid(),
            ClientEvent::Typing(p) => p.room.is_valid(),
            ClientEvent::StopTyping(room) => room.is_valid(),
            ClientEvent::SendNotification(_) => true,
        };
        if !room_ok {
            return Err("contentId and episodeId are required");
        }

        match self {
            ClientEvent::SendComment(p) if p.text.trim().is_empty() => Err("text is required"),
            ClientEvent::LikeComment(p) if p.comment_id.trim().is_empty() => {
                Err("commentId is required")
            }
            ClientEvent::SendNotification(p)
                if p.user_id.trim().is_empty() || p.title.trim().is_empty() =>
            {
                Err("userId and title are required")
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound dispatch events
// ---------------------------------------------------------------------------

/// Event names dispatched to clients.
pub struct EventName;

impl EventName {
    pub const READY: &'static str = "ready";
    pub const USER_JOINED: &'static str = "user-joined";
    pub const USER_LEFT: &'static str = "user-left";
    pub const NEW_COMMENT: &'static str = "new-comment";
    pub const COMMENT_LIKED: &'static str = "comment-liked";
    pub const USER_TYPING: &'static str = "user-typing";
    pub const USER_STOP_TYPING: &'static str = "user-stop-typing";
    pub const TREND_UPDATE: &'static str = "trend-update";
    pub const NOTIFICATION: &'static str = "notification";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyPayload {
    pub session_id: String,
    pub user_id: String,
    pub user_name: String,
    pub heartbeat_interval: u64,
    pub trends: Arc<TrendSnapshot>,
}

/// Body of `user-joined` and `user-left`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChange {
    pub user_id: String,
    pub user_name: String,
    pub active_users: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentLiked {
    pub comment_id: String,
    pub likes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTyping {
    pub user_name: String,
}

/// A notification tagged with its owner so clients can filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEnvelope {
    pub user_id: String,
    pub notification: Notification,
}

/// Every event the server dispatches.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Ready(ReadyPayload),
    UserJoined(MembershipChange),
    UserLeft(MembershipChange),
    NewComment(Comment),
    CommentLiked(CommentLiked),
    UserTyping(UserTyping),
    UserStopTyping,
    /// Full ranked table. Used for both per-comment and scheduled updates.
    TrendUpdate(Arc<TrendSnapshot>),
    Notification(NotificationEnvelope),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Ready(_) => EventName::READY,
            ServerEvent::UserJoined(_) => EventName::USER_JOINED,
            ServerEvent::UserLeft(_) => EventName::USER_LEFT,
            ServerEvent::NewComment(_) => EventName::NEW_COMMENT,
            ServerEvent::CommentLiked(_) => EventName::COMMENT_LIKED,
            ServerEvent::UserTyping(_) => EventName::USER_TYPING,
            ServerEvent::UserStopTyping => EventName::USER_STOP_TYPING,
            ServerEvent::TrendUpdate(_) => EventName::TREND_UPDATE,
            ServerEvent::Notification(_) => EventName::NOTIFICATION,
        }
    }

    pub fn data(&self) -> Value {
        let value = match self {
            ServerEvent::Ready(p) => serde_json::to_value(p),
            ServerEvent::UserJoined(p) | ServerEvent::UserLeft(p) => serde_json::to_value(p),
            ServerEvent::NewComment(c) => serde_json::to_value(c),
            ServerEvent::CommentLiked(p) => serde_json::to_value(p),
            ServerEvent::UserTyping(p) => serde_json::to_value(p),
            ServerEvent::UserStopTyping => Ok(serde_json::json!({})),
            ServerEvent::TrendUpdate(s) => serde_json::to_value(s.as_ref()),
            ServerEvent::Notification(p) => serde_json::to_value(p),
        };
        value.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_join_room_with_optional_identity() {
        let event = ClientEvent::parse(
            "join-room",
            json!({ "contentId": "anime-1", "episodeId": "ep-1" }),
        )
        .unwrap();
        match event {
            ClientEvent::JoinRoom(p) => {
                assert_eq!(p.room, RoomKey::new("anime-1", "ep-1"));
                assert!(p.user_id.is_none());
            }
            other => panic!("expected JoinRoom, got {other:?}"),
        }
    }

    #[test]
    fn parses_send_comment_timestamp() {
        let event = ClientEvent::parse(
            "send-comment",
            json!({
                "contentId": "anime-1",
                "episodeId": "ep-1",
                "userId": "u1",
                "userName": "Alice",
                "text": "hi",
                "timestamp": "2024-05-01T12:00:00Z",
            }),
        )
        .unwrap();
        let ClientEvent::SendComment(p) = event else {
            panic!("expected SendComment");
        };
        assert_eq!(p.text, "hi");
        assert_eq!(p.user_id.as_deref(), Some("u1"));
        assert!(p.timestamp.is_some());
    }

    #[test]
    fn missing_required_field_fails_to_parse() {
        assert!(ClientEvent::parse("send-comment", json!({ "contentId": "a", "episodeId": "e" }))
            .is_err());
        assert!(ClientEvent::parse("like-comment", json!({ "contentId": "a" })).is_err());
    }

    #[test]
    fn unknown_event_fails_to_parse() {
        assert!(ClientEvent::parse("delete-everything", json!({})).is_err());
    }

    #[test]
    fn validate_rejects_blank_fields() {
        let blank_room =
            ClientEvent::parse("stop-typing", json!({ "contentId": "", "episodeId": "e" }))
                .unwrap();
        assert!(blank_room.validate().is_err());

        let blank_text = ClientEvent::parse(
            "send-comment",
            json!({ "contentId": "a", "episodeId": "e", "text": "   " }),
        )
        .unwrap();
        assert!(blank_text.validate().is_err());

        let ok = ClientEvent::parse(
            "like-comment",
            json!({ "contentId": "a", "episodeId": "e", "commentId": "cmt_1" }),
        )
        .unwrap();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn dispatch_frame_shape() {
        let event = ServerEvent::CommentLiked(CommentLiked {
            comment_id: "cmt_1".to_string(),
            likes: 3,
        });
        let msg = serde_json::to_value(GatewayMessage::dispatch(7, &event)).unwrap();
        assert_eq!(msg["op"], 0);
        assert_eq!(msg["t"], "comment-liked");
        assert_eq!(msg["s"], 7);
        assert_eq!(msg["d"], json!({ "commentId": "cmt_1", "likes": 3 }));
    }

    #[test]
    fn stop_typing_has_empty_body() {
        assert_eq!(ServerEvent::UserStopTyping.data(), json!({}));
    }

    #[test]
    fn heartbeat_ack_omits_name_and_seq() {
        let msg = serde_json::to_value(GatewayMessage::heartbeat_ack(4)).unwrap();
        assert_eq!(msg, json!({ "op": 6, "d": { "ack": 4 } }));
    }
}
