//! Inbound event dispatch: one handler per `ClientEvent` variant.
//!
//! Handlers run to completion against the stores and return before anything
//! else touches this connection. A handler that returns `Err` has mutated
//! nothing and emitted nothing.

use crate::notifications::{NewNotification, Notification};
use crate::rooms::RoomKey;
use crate::AppState;

use super::events::{
    ClientEvent, CommentLiked, LikeCommentPayload, MembershipChange, MembershipPayload,
    NotificationEnvelope, SendCommentPayload, SendNotificationPayload, ServerEvent, TypingPayload,
    UserTyping,
};
use super::session::GatewaySession;

/// Apply one inbound event and fan out its effects.
pub fn handle_event(
    state: &AppState,
    session: &GatewaySession,
    event: ClientEvent,
) -> Result<(), &'static str> {
    event.validate()?;
    match event {
        ClientEvent::JoinRoom(p) => join_room(state, session, p),
        ClientEvent::LeaveRoom(p) => leave_room(state, session, p),
        ClientEvent::SendComment(p) => send_comment(state, session, p),
        ClientEvent::LikeComment(p) => like_comment(state, session, p),
        ClientEvent::Typing(p) => typing(state, session, p),
        ClientEvent::StopTyping(room) => stop_typing(state, session, room),
        ClientEvent::SendNotification(p) => send_notification(state, p),
    }
}

/// Undo the presence entries a dropped connection still holds.
///
/// Returns how many rooms were left.
pub fn handle_disconnect(state: &AppState, session: &GatewaySession) -> usize {
    if !state.config.leave_on_disconnect {
        return 0;
    }

    let memberships = session.take_memberships();
    for m in &memberships {
        let active_users = state.presence.leave(&m.room, &m.user_id);
        state.broadcast.to_room(
            &m.room,
            ServerEvent::UserLeft(MembershipChange {
                user_id: m.user_id.clone(),
                user_name: m.user_name.clone(),
                active_users,
            }),
        );
        tracing::debug!(
            session_id = %session.session_id,
            room = %m.room,
            user_id = %m.user_id,
            active_users,
            "left room on disconnect"
        );
    }
    memberships.len()
}

/// Deliver a notification: to everyone tagged with its owner, or only to the
/// owner's connections when targeted delivery is configured.
pub fn publish_notification(state: &AppState, notification: Notification) {
    let owner = notification.user_id.clone();
    let event = ServerEvent::Notification(NotificationEnvelope {
        user_id: owner.clone(),
        notification,
    });
    if state.config.targeted_notifications {
        state.broadcast.to_user(&owner, event);
    } else {
        state.broadcast.to_all(event);
    }
}

fn require_member(
    state: &AppState,
    session: &GatewaySession,
    room: &RoomKey,
) -> Result<(), &'static str> {
    if state.config.require_room_membership && !session.is_in_room(room) {
        return Err("connection has not joined this room");
    }
    Ok(())
}

/// Payload identity wins; otherwise the identity given at IDENTIFY.
fn identity(
    session: &GatewaySession,
    user_id: Option<String>,
    user_name: Option<String>,
) -> (String, String) {
    (
        user_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| session.user_id.clone()),
        user_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| session.user_name.clone()),
    )
}

fn join_room(
    state: &AppState,
    session: &GatewaySession,
    p: MembershipPayload,
) -> Result<(), &'static str> {
    let (user_id, user_name) = identity(session, p.user_id, p.user_name);

    // Enter first so the joiner also sees its own user-joined.
    session.enter_room(&p.room, &user_id, &user_name);
    let active_users = state.presence.join(&p.room, &user_id);

    tracing::info!(
        session_id = %session.session_id,
        room = %p.room,
        user_id = %user_id,
        active_users,
        "joined room"
    );

    state.broadcast.to_room(
        &p.room,
        ServerEvent::UserJoined(MembershipChange {
            user_id,
            user_name,
            active_users,
        }),
    );
    Ok(())
}

fn leave_room(
    state: &AppState,
    session: &GatewaySession,
    p: MembershipPayload,
) -> Result<(), &'static str> {
    let (user_id, user_name) = identity(session, p.user_id, p.user_name);

    session.exit_room(&p.room, &user_id);
    let active_users = state.presence.leave(&p.room, &user_id);

    tracing::info!(
        session_id = %session.session_id,
        room = %p.room,
        user_id = %user_id,
        active_users,
        "left room"
    );

    state.broadcast.to_room(
        &p.room,
        ServerEvent::UserLeft(MembershipChange {
            user_id,
            user_name,
            active_users,
        }),
    );
    Ok(())
}

fn send_comment(
    state: &AppState,
    session: &GatewaySession,
    p: SendCommentPayload,
) -> Result<(), &'static str> {
    require_member(state, session, &p.room)?;
    let (user_id, user_name) = identity(session, p.user_id, p.user_name);

    let comment = state
        .comments
        .append(&p.room, &user_id, &user_name, &p.text, p.timestamp);

    // Room-scoped: the message itself. Global: its effect on trends.
    state.broadcast.to_room(&p.room, ServerEvent::NewComment(comment));
    state.refresh_trends(Some(&p.room.content_id));
    Ok(())
}

fn like_comment(
    state: &AppState,
    session: &GatewaySession,
    p: LikeCommentPayload,
) -> Result<(), &'static str> {
    require_member(state, session, &p.room)?;

    let likes = state
        .comments
        .like(&p.room, &p.comment_id)
        .ok_or("comment not found")?;

    state.broadcast.to_room(
        &p.room,
        ServerEvent::CommentLiked(CommentLiked {
            comment_id: p.comment_id,
            likes,
        }),
    );
    Ok(())
}

fn typing(
    state: &AppState,
    session: &GatewaySession,
    p: TypingPayload,
) -> Result<(), &'static str> {
    require_member(state, session, &p.room)?;
    let (_, user_name) = identity(session, None, p.user_name);

    state.broadcast.to_room_except(
        &p.room,
        &session.session_id,
        ServerEvent::UserTyping(UserTyping { user_name }),
    );
    Ok(())
}

fn stop_typing(
    state: &AppState,
    session: &GatewaySession,
    room: RoomKey,
) -> Result<(), &'static str> {
    require_member(state, session, &room)?;
    state
        .broadcast
        .to_room_except(&room, &session.session_id, ServerEvent::UserStopTyping);
    Ok(())
}

fn send_notification(state: &AppState, p: SendNotificationPayload) -> Result<(), &'static str> {
    let notification = state.notifications.send(NewNotification {
        user_id: p.user_id,
        title: p.title,
        message: p.message,
        content_id: p.content_id,
        episode_id: p.episode_id,
    });
    publish_notification(state, notification);
    Ok(())
}
