mod common;

use common::TestApp;

#[tokio::test]
async fn add_contact_is_idempotent_and_directed() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    assert_eq!(app.add_contact(&alice.token, &bob.username).await.status(), 200);
    // Adding an existing contact is a no-op success, not a failure
    assert_eq!(app.add_contact(&alice.token, &bob.username).await.status(), 200);

    assert_eq!(app.contact_edge_count(alice.user_id, bob.user_id).await, 1);
    // Explicit add is one-directional; symmetry comes from messaging only
    assert_eq!(app.contact_edge_count(bob.user_id, alice.user_id).await, 0);
}

#[tokio::test]
async fn add_contact_unknown_identifier_is_not_found() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;

    let resp = app.add_contact(&alice.token, "nobody-by-this-name").await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn removing_a_contact_hides_history_for_the_remover_only() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    app.send_message(&alice.token, bob.user_id, "one").await;
    app.send_message(&bob.token, alice.user_id, "two").await;

    let resp = app.remove_contact(&alice.token, bob.user_id).await;
    assert_eq!(resp.status(), 204);

    // The remover sees nothing; the other party keeps everything
    assert!(app.conversation(&alice.token, bob.user_id).await.is_empty());
    assert_eq!(app.conversation(&bob.token, alice.user_id).await.len(), 2);

    // Hiding applies to rows existing at the time of the call, not future ones
    app.send_message(&bob.token, alice.user_id, "are you there?").await;
    let visible: Vec<String> = app
        .conversation(&alice.token, bob.user_id)
        .await
        .iter()
        .map(|m| m["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(visible, vec!["are you there?"]);
}

#[tokio::test]
async fn repeated_hide_leaves_overlay_state_unchanged() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    app.send_message(&alice.token, bob.user_id, "one").await;
    app.send_message(&bob.token, alice.user_id, "two").await;

    assert_eq!(app.remove_contact(&alice.token, bob.user_id).await.status(), 204);

    let flags_after_first: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM message_flags WHERE user_id = $1 AND kind = 0")
            .bind(alice.user_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(flags_after_first, 2);

    // Re-add and remove again; the second hide must not duplicate flags
    assert_eq!(app.add_contact(&alice.token, &bob.username).await.status(), 200);
    assert_eq!(app.remove_contact(&alice.token, bob.user_id).await.status(), 204);

    let flags_after_second: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM message_flags WHERE user_id = $1 AND kind = 0")
            .bind(alice.user_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(flags_after_second, flags_after_first);
    assert!(app.conversation(&alice.token, bob.user_id).await.is_empty());
}

#[tokio::test]
async fn removing_an_absent_contact_is_not_found() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let carol = app.register_user(&format!("carol_{run_id}")).await;

    // No edge, no history
    let resp = app.remove_contact(&alice.token, carol.user_id).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn hidden_messages_do_not_count_as_unread() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    app.send_message(&bob.token, alice.user_id, "unseen").await;

    let summary = app.summary_for(&alice.token, bob.user_id).await.expect("summary");
    assert_eq!(summary["unreadCount"], 1);

    // Removing the contact hides the history; the unread count follows
    assert_eq!(app.remove_contact(&alice.token, bob.user_id).await.status(), 204);
    app.add_contact(&alice.token, &bob.username).await;

    let summary = app.summary_for(&alice.token, bob.user_id).await.expect("summary");
    assert_eq!(summary["unreadCount"], 0);
    assert!(summary["lastMessageContent"].is_null());
}

#[tokio::test]
async fn search_merges_pinned_contacts_with_matches() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;
    let carol = app.register_user(&format!("carol_{run_id}")).await;

    app.add_contact(&alice.token, &bob.username).await;

    let results = app.search(&alice.token, &format!("carol_{run_id}")).await;
    let ids: Vec<&str> = results.iter().map(|s| s["id"].as_str().unwrap()).collect();

    assert!(ids.contains(&bob.user_id.to_string().as_str()), "pinned contact missing");
    assert!(ids.contains(&carol.user_id.to_string().as_str()), "match missing");

    // A contact matching the query must not appear twice
    let results = app.search(&alice.token, &format!("bob_{run_id}")).await;
    let bob_count = results
        .iter()
        .filter(|s| s["id"].as_str() == Some(bob.user_id.to_string().as_str()))
        .count();
    assert_eq!(bob_count, 1);
}

#[tokio::test]
async fn profile_update_is_visible_to_contacts() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    app.send_message(&alice.token, bob.user_id, "hi").await;

    let new_name = format!("alicia_{run_id}");
    let resp = app
        .client
        .put(format!("{}/v1/profile", app.server_url))
        .bearer_auth(&alice.token)
        .json(&serde_json::json!({ "username": new_name }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let summary = app.summary_for(&bob.token, alice.user_id).await.expect("summary");
    assert_eq!(summary["username"], new_name.as_str());
}
