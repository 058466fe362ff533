mod common;

use common::TestApp;

#[tokio::test]
async fn first_message_creates_symmetric_contact_edges() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    app.send_message(&alice.token, bob.user_id, "hello").await;

    assert_eq!(app.contact_edge_count(alice.user_id, bob.user_id).await, 1);
    assert_eq!(app.contact_edge_count(bob.user_id, alice.user_id).await, 1);

    // A second message must not duplicate edges
    app.send_message(&alice.token, bob.user_id, "again").await;
    assert_eq!(app.contact_edge_count(alice.user_id, bob.user_id).await, 1);
    assert_eq!(app.contact_edge_count(bob.user_id, alice.user_id).await, 1);
}

#[tokio::test]
async fn unread_count_and_mark_read_scenario() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    app.send_message(&alice.token, bob.user_id, "hi").await;

    let summary = app.summary_for(&bob.token, alice.user_id).await.expect("summary for alice");
    assert_eq!(summary["unreadCount"], 1);
    assert_eq!(summary["lastMessageContent"], "hi");

    let resp = app.mark_read(&bob.token, alice.user_id).await;
    assert_eq!(resp.status(), 204);

    let summary = app.summary_for(&bob.token, alice.user_id).await.expect("summary for alice");
    assert_eq!(summary["unreadCount"], 0);

    app.send_message(&alice.token, bob.user_id, "again").await;

    let summary = app.summary_for(&bob.token, alice.user_id).await.expect("summary for alice");
    assert_eq!(summary["unreadCount"], 1);
    assert_eq!(summary["lastMessageContent"], "again");
}

#[tokio::test]
async fn mark_read_with_nothing_unread_is_a_silent_no_op() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    // No messages at all yet
    let resp = app.mark_read(&bob.token, alice.user_id).await;
    assert_eq!(resp.status(), 204);

    // Marking twice is idempotent
    app.send_message(&alice.token, bob.user_id, "hi").await;
    assert_eq!(app.mark_read(&bob.token, alice.user_id).await.status(), 204);
    assert_eq!(app.mark_read(&bob.token, alice.user_id).await.status(), 204);

    let summary = app.summary_for(&bob.token, alice.user_id).await.expect("summary");
    assert_eq!(summary["unreadCount"], 0);
}

#[tokio::test]
async fn conversation_is_ordered_and_symmetric() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    app.send_message(&alice.token, bob.user_id, "one").await;
    app.send_message(&bob.token, alice.user_id, "two").await;
    app.send_message(&alice.token, bob.user_id, "three").await;

    let for_alice: Vec<String> = app
        .conversation(&alice.token, bob.user_id)
        .await
        .iter()
        .map(|m| m["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(for_alice, vec!["one", "two", "three"]);

    let for_bob: Vec<String> = app
        .conversation(&bob.token, alice.user_id)
        .await
        .iter()
        .map(|m| m["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(for_bob, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn message_wire_shape_has_no_overlay_sets() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    let message = app.send_message(&alice.token, bob.user_id, "hello").await;
    let obj = message.as_object().unwrap();

    assert!(obj.contains_key("id"));
    assert_eq!(obj["senderId"], alice.user_id.to_string());
    assert_eq!(obj["recipientId"], bob.user_id.to_string());
    assert!(obj["sentAt"].as_str().is_some());
    assert!(!obj.contains_key("hiddenFor"));
    assert!(!obj.contains_key("readBy"));
}

#[tokio::test]
async fn empty_content_is_rejected() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    let resp = app.try_send_message(&alice.token, bob.user_id, "   ").await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn self_send_is_rejected() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;

    let resp = app.try_send_message(&alice.token, alice.user_id, "me").await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn unknown_recipient_is_not_found() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;

    let resp = app.try_send_message(&alice.token, uuid::Uuid::new_v4(), "hello?").await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn mark_read_for_unknown_contact_is_not_found() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;

    let resp = app.mark_read(&alice.token, uuid::Uuid::new_v4()).await;
    assert_eq!(resp.status(), 404);
}
