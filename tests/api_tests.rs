// tests/api_tests.rs

use std::net::SocketAddr;
use std::sync::Arc;

use std::time::Duration;

use bayanihan::{
    config::Config, models::comment::CommentRecord, routes,
    services::tree::DEFAULT_MAX_ANCESTOR_DEPTH, state::AppState, store::MemoryStore,
};
use chrono::Utc;
use serde_json::{Value, json};

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    spawn_app_with(Arc::new(MemoryStore::new())).await
}

/// Same as `spawn_app`, over a store the test keeps a handle to.
async fn spawn_app_with(store: Arc<MemoryStore>) -> String {
    let config = Config {
        database_url: None,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        log_dir: "logs".to_string(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        max_reply_depth: DEFAULT_MAX_ANCESTOR_DEPTH,
    };

    let state = AppState {
        store,
        config,
    };
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Registers `username` and returns a bearer token for it.
async fn sign_up(client: &reqwest::Client, address: &str, username: &str) -> String {
    let password = "password123";

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    let login: Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    login["token"].as_str().expect("Token not found").to_string()
}

async fn create_post(client: &reqwest::Client, address: &str, token: &str) -> i64 {
    let response: Value = client
        .post(format!("{}/api/posts", address))
        .bearer_auth(token)
        .json(&json!({ "title": "Flooding in Barangay San Isidro", "content": "Need boats" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    response["id"].as_i64().expect("post id")
}

async fn comment(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    post_id: i64,
    content: &str,
    parent_id: Option<i64>,
) -> reqwest::Response {
    client
        .post(format!("{}/api/posts/{}/comments", address, post_id))
        .bearer_auth(token)
        .json(&json!({ "content": content, "parent_id": parent_id }))
        .send()
        .await
        .unwrap()
}

async fn comment_id(response: reqwest::Response) -> i64 {
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    body["id"].as_i64().expect("comment id")
}

async fn thread(client: &reqwest::Client, address: &str, post_id: i64) -> Vec<Value> {
    client
        .get(format!("{}/api/posts/{}/comments", address, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Reads the event stream until `needle` shows up, returning everything read.
async fn read_until(response: &mut reqwest::Response, needle: &str) -> String {
    let mut text = String::new();
    while !text.contains(needle) {
        let chunk = tokio::time::timeout(Duration::from_secs(5), response.chunk())
            .await
            .unwrap_or_else(|_| panic!("no `{}` within 5s, got: {}", needle, text))
            .unwrap()
            .expect("stream ended");
        text.push_str(&String::from_utf8_lossy(&chunk));
    }
    text
}

async fn open_stream(client: &reqwest::Client, address: &str, post_id: i64) -> reqwest::Response {
    let response = client
        .get(format!("{}/api/posts/{}/comments/stream", address, post_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    response
}

#[tokio::test]
async fn health_check_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "username": "yo", "password": "password123" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    sign_up(&client, &address, "maria").await;

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "username": "maria", "password": "password123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    sign_up(&client, &address, "maria").await;

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": "maria", "password": "nope-nope" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn posting_requires_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/posts", address))
        .json(&json!({ "title": "t", "content": "c" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn thread_flattens_replies_and_restores_mentions() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let alice = sign_up(&client, &address, "alice").await;
    let bob = sign_up(&client, &address, "bob").await;

    let post_id = create_post(&client, &address, &alice).await;
    let a = comment_id(comment(&client, &address, &alice, post_id, "Boats at the chapel", None).await).await;
    let b = comment_id(comment(&client, &address, &bob, post_id, "@alice how many?", Some(a)).await).await;
    let c = comment_id(comment(&client, &address, &alice, post_id, "@bob three", Some(b)).await).await;

    let forest = thread(&client, &address, post_id).await;
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0]["id"], a);

    let replies = forest[0]["replies"].as_array().unwrap();
    let reply_ids: Vec<i64> = replies.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(reply_ids, vec![c, b]);

    assert_eq!(replies[1]["content"], "how many?");
    assert_eq!(replies[1]["tagged_username"], "alice");
    assert_eq!(replies[1]["display_content"], "@alice how many?");
    assert!(replies[0]["replies"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn blank_comment_is_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let alice = sign_up(&client, &address, "alice").await;
    let post_id = create_post(&client, &address, &alice).await;

    let response = comment(&client, &address, &alice, post_id, "   ", None).await;
    assert_eq!(response.status().as_u16(), 400);
    assert!(thread(&client, &address, post_id).await.is_empty());
}

#[tokio::test]
async fn comment_on_missing_post_is_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let alice = sign_up(&client, &address, "alice").await;

    let response = comment(&client, &address, &alice, 4242, "hello", None).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn moderation_rules_and_one_level_cascade() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let owner = sign_up(&client, &address, "owner").await;
    let writer = sign_up(&client, &address, "writer").await;
    let stranger = sign_up(&client, &address, "stranger").await;

    let post_id = create_post(&client, &address, &owner).await;
    let a = comment_id(comment(&client, &address, &writer, post_id, "first", None).await).await;
    let b = comment_id(comment(&client, &address, &writer, post_id, "second", Some(a)).await).await;
    let c = comment_id(comment(&client, &address, &writer, post_id, "third", Some(b)).await).await;

    let forbidden = client
        .delete(format!("{}/api/posts/{}/comments/{}", address, post_id, a))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);
    assert_eq!(thread(&client, &address, post_id).await[0]["replies"].as_array().unwrap().len(), 2);

    // The post owner may moderate comments they did not write.
    let deleted: Value = client
        .delete(format!("{}/api/posts/{}/comments/{}", address, post_id, a))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted["deleted"], json!([a, b]));

    let forest = thread(&client, &address, post_id).await;
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0]["id"], c);
    assert_eq!(forest[0]["parent_id"], b);
}

#[tokio::test]
async fn activity_history_is_flattened() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let alice = sign_up(&client, &address, "alice").await;

    let post_id = create_post(&client, &address, &alice).await;
    let id = comment_id(comment(&client, &address, &alice, post_id, "ok", None).await).await;

    let history: Vec<Value> = client
        .get(format!("{}/api/me/activity", address))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["kind"], "comment_created");
    assert_eq!(history[1]["kind"], "post_created");

    let rows = history[0]["details"].as_array().unwrap();
    assert!(rows.contains(&json!({ "key": "comment_id", "value": id.to_string() })));
    assert!(rows.contains(&json!({ "key": "parent_id", "value": "" })));
}

#[tokio::test]
async fn stream_sends_current_thread_first() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let alice = sign_up(&client, &address, "alice").await;
    let post_id = create_post(&client, &address, &alice).await;
    comment_id(comment(&client, &address, &alice, post_id, "Evacuate now", None).await).await;

    let mut response = client
        .get(format!("{}/api/posts/{}/comments/stream", address, post_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let chunk = tokio::time::timeout(std::time::Duration::from_secs(5), response.chunk())
        .await
        .expect("no event within 5s")
        .unwrap()
        .expect("stream ended");
    let text = String::from_utf8_lossy(&chunk);
    assert!(text.contains("event: snapshot"));
    assert!(text.contains("Evacuate now"));
}

#[tokio::test]
async fn stream_pushes_a_new_snapshot_after_each_comment() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let alice = sign_up(&client, &address, "alice").await;
    let post_id = create_post(&client, &address, &alice).await;

    let mut stream = open_stream(&client, &address, post_id).await;
    read_until(&mut stream, "event: snapshot").await;

    comment_id(comment(&client, &address, &alice, post_id, "Second wave expected", None).await).await;

    let text = read_until(&mut stream, "Second wave expected").await;
    assert!(text.contains("event: snapshot"));
}

#[tokio::test]
async fn stream_reports_malformed_thread_as_error_event() {
    let store = Arc::new(MemoryStore::new());
    let address = spawn_app_with(store.clone()).await;
    let client = reqwest::Client::new();
    let alice = sign_up(&client, &address, "alice").await;
    let post_id = create_post(&client, &address, &alice).await;

    let mut stream = open_stream(&client, &address, post_id).await;
    read_until(&mut stream, "event: snapshot").await;

    for (id, parent) in [(70, 71), (71, 70)] {
        store
            .insert_raw_comment(CommentRecord {
                id,
                post_id,
                user_id: 1,
                username: "alice".to_string(),
                content: "loop".to_string(),
                tagged_username: None,
                parent_id: Some(parent),
                created_at: Utc::now(),
            })
            .await;
    }

    let text = read_until(&mut stream, "event: error").await;
    assert!(text.contains("cyclic"), "{}", text);
}

#[tokio::test]
async fn comment_text_round_trips_unescaped() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let alice = sign_up(&client, &address, "alice").await;
    let bob = sign_up(&client, &address, "bob").await;

    let post_id = create_post(&client, &address, &alice).await;
    let root = comment_id(comment(&client, &address, &alice, post_id, "Relief & rescue", None).await).await;
    comment_id(comment(&client, &address, &bob, post_id, "@alice water < 2m", Some(root)).await).await;

    let forest = thread(&client, &address, post_id).await;
    assert_eq!(forest[0]["content"], "Relief & rescue");
    let reply = &forest[0]["replies"][0];
    assert_eq!(reply["content"], "water < 2m");
    assert_eq!(reply["display_content"], "@alice water < 2m");
}
