mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time;
use tokio_tungstenite::tungstenite;

use common::{connect_and_identify, expect_silence, next_event, room, send_event};
use watch_api::config::Config;
use watch_api::rooms::comments::CommentStore;
use watch_api::rooms::presence::PresenceStore;
use watch_api::rooms::RoomKey;
use watch_api::AppState;

#[tokio::test]
async fn identify_returns_ready() {
    let addr = common::start_ws_server(common::test_state()).await;
    let (_ws, ready) = connect_and_identify(addr, "u1", "Alice").await;

    assert!(ready["sessionId"].as_str().unwrap().starts_with("gw_"));
    assert_eq!(ready["userId"], "u1");
    assert_eq!(ready["userName"], "Alice");
    assert!(ready["heartbeatInterval"].as_u64().unwrap() > 0);
    assert!(ready["trends"]["trends"].is_array());
}

#[tokio::test]
async fn first_frame_must_be_identify() {
    let addr = common::start_ws_server(common::test_state()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/gateway"))
        .await
        .expect("ws connect");

    let frame = json!({ "op": 0, "t": "join-room", "d": room("a", "e") });
    ws.send(tungstenite::Message::Text(frame.to_string().into()))
        .await
        .unwrap();

    let msg = time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timeout")
        .expect("stream ended")
        .expect("read error");
    match msg {
        tungstenite::Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), 4003);
        }
        tungstenite::Message::Close(None) => {}
        other => panic!("Expected Close frame, got: {other:?}"),
    }
}

#[tokio::test]
async fn heartbeat_is_acknowledged() {
    let addr = common::start_ws_server(common::test_state()).await;
    let (mut ws, _) = connect_and_identify(addr, "u1", "Alice").await;

    ws.send(tungstenite::Message::Text(
        json!({ "op": 1, "d": { "seq": 1 } }).to_string().into(),
    ))
    .await
    .unwrap();

    let msg = time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timeout")
        .expect("stream ended")
        .expect("read error");
    let ack: serde_json::Value = serde_json::from_str(&msg.into_text().unwrap()).unwrap();
    assert_eq!(ack["op"], 6);
    assert_eq!(ack["d"]["ack"], 1);
}

#[tokio::test]
async fn watch_room_scenario() {
    let state = common::test_state();
    let addr = common::start_ws_server(state.clone()).await;
    let (mut a, _) = connect_and_identify(addr, "user-a", "Alice").await;
    let (mut b, _) = connect_and_identify(addr, "user-b", "Bob").await;

    // A joins.
    send_event(&mut a, "join-room", room("anime-1", "ep-1")).await;
    let (name, data) = next_event(&mut a).await;
    assert_eq!(name, "user-joined");
    assert_eq!(data["userId"], "user-a");
    assert_eq!(data["activeUsers"], 1);

    // B joins; both see the count go to 2.
    send_event(&mut b, "join-room", room("anime-1", "ep-1")).await;
    for ws in [&mut a, &mut b] {
        let (name, data) = next_event(ws).await;
        assert_eq!(name, "user-joined");
        assert_eq!(data["userName"], "Bob");
        assert_eq!(data["activeUsers"], 2);
    }

    // A comments: room gets new-comment, then everyone gets trend-update.
    let mut comment = room("anime-1", "ep-1");
    comment["text"] = json!("hi");
    send_event(&mut a, "send-comment", comment).await;

    let mut comment_id = String::new();
    for ws in [&mut a, &mut b] {
        let (name, data) = next_event(ws).await;
        assert_eq!(name, "new-comment");
        assert_eq!(data["text"], "hi");
        assert_eq!(data["likeCount"], 0);
        assert_eq!(data["authorId"], "user-a");
        comment_id = data["id"].as_str().unwrap().to_string();

        let (name, data) = next_event(ws).await;
        assert_eq!(name, "trend-update");
        assert_eq!(data["trends"][0]["contentId"], "anime-1");
        assert_eq!(data["trends"][0]["commentCount"], 1);
        assert_eq!(data["trends"][0]["activeUserCount"], 2);
    }

    // B likes it.
    let mut like = room("anime-1", "ep-1");
    like["commentId"] = json!(comment_id);
    send_event(&mut b, "like-comment", like).await;
    for ws in [&mut a, &mut b] {
        let (name, data) = next_event(ws).await;
        assert_eq!(name, "comment-liked");
        assert_eq!(data["commentId"], comment_id.as_str());
        assert_eq!(data["likes"], 1);
    }

    // A leaves; B sees the count drop, A no longer receives room events.
    send_event(&mut a, "leave-room", room("anime-1", "ep-1")).await;
    let (name, data) = next_event(&mut b).await;
    assert_eq!(name, "user-left");
    assert_eq!(data["userId"], "user-a");
    assert_eq!(data["activeUsers"], 1);
    expect_silence(&mut a).await;

    assert_eq!(state.presence.count(&RoomKey::new("anime-1", "ep-1")), 1);
}

#[tokio::test]
async fn comment_trend_update_reaches_clients_outside_the_room() {
    let addr = common::start_ws_server(common::test_state()).await;
    let (mut a, _) = connect_and_identify(addr, "user-a", "Alice").await;
    let (mut lobby, _) = connect_and_identify(addr, "user-l", "Lurker").await;

    let mut comment = room("anime-9", "ep-1");
    comment["text"] = json!("first");
    send_event(&mut a, "send-comment", comment).await;

    // Not joined anywhere: only the global half of the fan-out arrives.
    let (name, data) = next_event(&mut lobby).await;
    assert_eq!(name, "trend-update");
    assert_eq!(data["trends"][0]["contentId"], "anime-9");
}

#[tokio::test]
async fn typing_is_not_echoed_to_sender() {
    let addr = common::start_ws_server(common::test_state()).await;
    let (mut a, _) = connect_and_identify(addr, "user-a", "Alice").await;
    let (mut b, _) = connect_and_identify(addr, "user-b", "Bob").await;

    send_event(&mut a, "join-room", room("anime-1", "ep-1")).await;
    next_event(&mut a).await;
    send_event(&mut b, "join-room", room("anime-1", "ep-1")).await;
    next_event(&mut a).await;
    next_event(&mut b).await;

    send_event(&mut a, "typing", room("anime-1", "ep-1")).await;
    let (name, data) = next_event(&mut b).await;
    assert_eq!(name, "user-typing");
    assert_eq!(data["userName"], "Alice");

    send_event(&mut b, "stop-typing", room("anime-1", "ep-1")).await;
    // A skipped its own typing event; the next thing it sees is B's stop.
    let (name, _) = next_event(&mut a).await;
    assert_eq!(name, "user-stop-typing");
}

#[tokio::test]
async fn malformed_event_is_ignored() {
    let state = common::test_state();
    let addr = common::start_ws_server(state.clone()).await;
    let (mut a, _) = connect_and_identify(addr, "user-a", "Alice").await;

    send_event(&mut a, "join-room", room("anime-1", "ep-1")).await;
    next_event(&mut a).await;

    // No text: rejected without closing the connection.
    send_event(&mut a, "send-comment", room("anime-1", "ep-1")).await;
    send_event(&mut a, "no-such-event", json!({})).await;
    expect_silence(&mut a).await;
    assert!(state
        .comments
        .list_for_room(&RoomKey::new("anime-1", "ep-1"))
        .is_empty());

    // The connection is still usable.
    send_event(&mut a, "join-room", room("anime-1", "ep-2")).await;
    let (name, _) = next_event(&mut a).await;
    assert_eq!(name, "user-joined");
}

#[tokio::test]
async fn disconnect_leaves_joined_rooms() {
    let state = common::test_state();
    let addr = common::start_ws_server(state.clone()).await;
    let (mut a, _) = connect_and_identify(addr, "user-a", "Alice").await;
    let (mut b, _) = connect_and_identify(addr, "user-b", "Bob").await;

    send_event(&mut a, "join-room", room("anime-1", "ep-1")).await;
    next_event(&mut a).await;
    send_event(&mut b, "join-room", room("anime-1", "ep-1")).await;
    next_event(&mut b).await;

    a.close(None).await.unwrap();
    drop(a);

    let (name, data) = next_event(&mut b).await;
    assert_eq!(name, "user-left");
    assert_eq!(data["userId"], "user-a");
    assert_eq!(data["activeUsers"], 1);
    assert_eq!(state.presence.count(&RoomKey::new("anime-1", "ep-1")), 1);
}

#[tokio::test]
async fn targeted_notifications_reach_only_the_owner() {
    let state = AppState::new(Config {
        targeted_notifications: true,
        ..Config::default()
    });
    let addr = common::start_ws_server(state.clone()).await;
    let (mut owner, _) = connect_and_identify(addr, "u1", "Owner").await;
    let (mut other, _) = connect_and_identify(addr, "u2", "Other").await;

    send_event(
        &mut other,
        "send-notification",
        json!({ "userId": "u1", "title": "New Episode", "message": "ep 2 is out" }),
    )
    .await;

    let (name, data) = next_event(&mut owner).await;
    assert_eq!(name, "notification");
    assert_eq!(data["userId"], "u1");
    assert_eq!(data["notification"]["title"], "New Episode");
    assert_eq!(data["notification"]["read"], false);
    expect_silence(&mut other).await;

    assert_eq!(state.notifications.list_for("u1").len(), 1);
}
