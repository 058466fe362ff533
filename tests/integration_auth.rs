mod common;

use common::TestApp;

#[tokio::test]
async fn register_login_and_profile_round_trip() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let user = app.register_user(&format!("alice_{run_id}")).await;

    let resp = app
        .client
        .get(format!("{}/v1/profile", app.server_url))
        .bearer_auth(&user.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let profile: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(profile["username"], user.username.as_str());
    assert_eq!(profile["email"], format!("{}@example.com", user.username));
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();
    let username = format!("dup_{run_id}");

    app.register_user(&username).await;

    let resp = app
        .client
        .post(format!("{}/v1/users", app.server_url))
        .json(&serde_json::json!({
            "username": username.to_uppercase(),
            "email": format!("other_{run_id}@example.com"),
            "password": "password123",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409, "case-insensitive duplicate should conflict");
}

#[tokio::test]
async fn login_by_email_is_case_insensitive() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();
    let user = app.register_user(&format!("casey_{run_id}")).await;

    let resp = app
        .client
        .post(format!("{}/v1/sessions", app.server_url))
        .json(&serde_json::json!({
            "identifier": format!("{}@EXAMPLE.com", user.username),
            "password": "password123",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn bad_password_is_unauthorized() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();
    let user = app.register_user(&format!("bob_{run_id}")).await;

    let resp = app
        .client
        .post(format!("{}/v1/sessions", app.server_url))
        .json(&serde_json::json!({ "identifier": user.username, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(format!("{}/v1/profile", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn short_password_is_rejected() {
    let app = TestApp::spawn().await;
    let run_id = common::run_id();

    let resp = app
        .client
        .post(format!("{}/v1/users", app.server_url))
        .json(&serde_json::json!({
            "username": format!("tiny_{run_id}"),
            "email": format!("tiny_{run_id}@example.com"),
            "password": "short",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
