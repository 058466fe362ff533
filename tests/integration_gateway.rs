mod common;

use common::TestApp;
use std::time::Duration;

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn recipient_receives_message_then_summary() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    let mut ws = app.connect_ws(&bob.token).await;

    app.send_message(&alice.token, bob.user_id, "hi").await;

    // New pair: contact-added push, the raw message, then the summary
    let frames = ws.collect_frames(3, FRAME_TIMEOUT).await;
    assert_eq!(frames.len(), 3, "expected three frames, got {frames:?}");

    let conversation_topic = format!("topic/messages/{}/{}", bob.user_id, alice.user_id);
    let summary_topic = format!("topic/messages/{}", bob.user_id);
    let contacts_topic = format!("topic/contacts/{}", bob.user_id);

    let topic_of = |frame: &serde_json::Value| frame["topic"].as_str().unwrap().to_string();

    let message_idx = frames.iter().position(|f| topic_of(f) == conversation_topic).expect("message frame");
    let summary_idx = frames.iter().position(|f| topic_of(f) == summary_topic).expect("summary frame");
    assert!(frames.iter().any(|f| topic_of(f) == contacts_topic), "contact-added frame missing");
    assert!(message_idx < summary_idx, "message must arrive before its summary");

    let message = &frames[message_idx]["payload"];
    assert_eq!(message["content"], "hi");
    assert_eq!(message["senderId"], alice.user_id.to_string());
    assert!(message.get("hiddenFor").is_none());

    let summary = &frames[summary_idx]["payload"];
    assert_eq!(summary["id"], alice.user_id.to_string());
    assert_eq!(summary["unreadCount"], 1);
    assert_eq!(summary["lastMessageContent"], "hi");

    ws.close().await;
}

#[tokio::test]
async fn sender_summary_carries_zero_unread() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    let mut ws = app.connect_ws(&alice.token).await;

    app.send_message(&alice.token, bob.user_id, "hello").await;

    let frames = ws.collect_frames(3, FRAME_TIMEOUT).await;
    let summary_topic = format!("topic/messages/{}", alice.user_id);
    let summary = frames
        .iter()
        .find(|f| f["topic"].as_str() == Some(summary_topic.as_str()))
        .expect("sender summary frame");

    assert_eq!(summary["payload"]["id"], bob.user_id.to_string());
    assert_eq!(summary["payload"]["unreadCount"], 0);

    ws.close().await;
}

#[tokio::test]
async fn mark_read_pushes_a_refreshed_summary() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    app.send_message(&alice.token, bob.user_id, "hi").await;

    let mut ws = app.connect_ws(&bob.token).await;
    assert_eq!(app.mark_read(&bob.token, alice.user_id).await.status(), 204);

    let summary_topic = format!("topic/messages/{}", bob.user_id);
    let frame = ws.recv_frame(FRAME_TIMEOUT).await.expect("summary frame");
    assert_eq!(frame["topic"], summary_topic.as_str());
    assert_eq!(frame["payload"]["unreadCount"], 0);
    assert_eq!(frame["payload"]["lastMessageContent"], "hi");

    ws.close().await;
}

#[tokio::test]
async fn contact_removal_notifies_the_remover_only() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    app.send_message(&alice.token, bob.user_id, "hi").await;

    let mut alice_ws = app.connect_ws(&alice.token).await;
    let mut bob_ws = app.connect_ws(&bob.token).await;

    assert_eq!(app.remove_contact(&alice.token, bob.user_id).await.status(), 204);

    let frame = alice_ws.recv_frame(FRAME_TIMEOUT).await.expect("removal frame");
    assert_eq!(frame["topic"], format!("topic/contacts/remove/{}", alice.user_id));
    assert_eq!(frame["payload"]["id"], bob.user_id.to_string());

    // The other side keeps the contact and hears nothing
    assert!(bob_ws.recv_frame(Duration::from_millis(500)).await.is_none());

    alice_ws.close().await;
    bob_ws.close().await;
}

#[tokio::test]
async fn handshake_with_a_bad_token_is_rejected() {
    let app = TestApp::spawn().await;

    let result = app.try_connect_ws("not-a-real-token").await;
    assert!(result.is_err(), "handshake should fail");
}
