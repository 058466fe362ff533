mod common;

use common::TestApp;
use parley_server::storage::message_repo::MessageRepository;
use parley_server::workers::MessagePurgeWorker;

#[tokio::test]
async fn purge_deletes_old_messages_and_their_flags() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();
    let config = common::get_test_config();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    let old = app.send_message(&alice.token, bob.user_id, "old news").await;
    let old_id = old["id"].as_str().unwrap().to_string();
    app.send_message(&alice.token, bob.user_id, "fresh").await;

    // Hide the history for bob so the old row carries an overlay flag
    assert_eq!(app.remove_contact(&bob.token, alice.user_id).await.status(), 204);

    // Age one message past the retention window
    sqlx::query("UPDATE messages SET sent_at = NOW() - INTERVAL '48 hours' WHERE id = $1::uuid")
        .bind(&old_id)
        .execute(&app.pool)
        .await
        .unwrap();

    let worker = MessagePurgeWorker::new(app.pool.clone(), MessageRepository::new(), config.messaging);
    worker.perform_purge().await.unwrap();

    let remaining: Vec<String> =
        sqlx::query_scalar("SELECT content FROM messages WHERE sender_id = $1 AND recipient_id = $2")
            .bind(alice.user_id)
            .bind(bob.user_id)
            .fetch_all(&app.pool)
            .await
            .unwrap();
    assert_eq!(remaining, vec!["fresh"]);

    // Overlay flags went with the purged row
    let orphaned_flags: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM message_flags WHERE message_id = $1::uuid")
            .bind(&old_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(orphaned_flags, 0);

    // The surviving row keeps its flag
    let kept_flags: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM message_flags f JOIN messages m ON m.id = f.message_id
         WHERE f.user_id = $1 AND f.kind = 0",
    )
    .bind(bob.user_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(kept_flags, 1);
}

#[tokio::test]
async fn purge_is_a_no_op_on_recent_messages() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();
    let config = common::get_test_config();

    let alice = app.register_user(&format!("alice_{run_id}")).await;
    let bob = app.register_user(&format!("bob_{run_id}")).await;

    app.send_message(&alice.token, bob.user_id, "keep me").await;

    let worker = MessagePurgeWorker::new(app.pool.clone(), MessageRepository::new(), config.messaging);
    worker.perform_purge().await.unwrap();

    assert_eq!(app.conversation(&bob.token, alice.user_id).await.len(), 1);
}
