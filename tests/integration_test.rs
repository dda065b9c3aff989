//! Integration tests: spawn the server in-process on a random port and
//! exercise the API over HTTP with an in-memory database.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use driftwood::config::AppConfig;
use driftwood::db::now;
use driftwood::handlers;
use driftwood::state::{AppState, SharedState};

struct TestServer {
    base_url: String,
    client: Client,
    state: SharedState,
    _upload_dir: tempfile::TempDir,
}

impl TestServer {
    async fn new() -> Self {
        let upload_dir = tempfile::tempdir().unwrap();
        let config = AppConfig::for_tests(upload_dir.path().to_path_buf());
        let state = AppState::new(":memory:", config).await.unwrap();

        let app = handlers::router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            base_url: format!("http://{addr}"),
            client: Client::new(),
            state,
            _upload_dir: upload_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Registers a user and returns (token, user id).
    async fn register(&self, username: &str) -> (String, i64) {
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "hunter22hunter22",
                "fullName": format!("{username} Tester"),
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        let token = body["data"]["token"].as_str().unwrap().to_string();
        let id = body["data"]["user"]["id"].as_i64().unwrap();
        (token, id)
    }

    async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn put(&self, path: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = self.client.put(self.url(path)).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    /// Creates a text-only post and returns its numeric id.
    async fn create_post(&self, token: &str, content: &str) -> i64 {
        let form = Form::new().text("content", content.to_string());
        let response = self
            .client
            .post(self.url("/api/posts"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        body["data"]["postId"].as_i64().unwrap()
    }

    /// Makes two registered users friends: a requests, b accepts.
    async fn befriend(&self, token_a: &str, token_b: &str, id_a: i64, id_b: i64) {
        let (status, _) = self
            .post(&format!("/api/friends/request/{id_b}"), token_a, json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = self
            .put(&format!("/api/friends/accept/{id_a}"), token_b, None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn health_endpoint() {
    let ts = TestServer::new().await;
    let (status, body) = ts.get("/api/health", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert!(body["data"]["version"].is_string());
}

#[tokio::test]
async fn unknown_route_returns_envelope_404() {
    let ts = TestServer::new().await;
    let (status, body) = ts.get("/api/nope", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn malformed_input_rejections_use_envelope() {
    let ts = TestServer::new().await;
    let (token, _) = ts.register("strict").await;

    // Non-numeric path parameter.
    let response = ts
        .client
        .post(ts.url("/api/friends/request/notanumber"))
        .bearer_auth(&token)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("path parameter"));

    // Body that is not JSON at all.
    let response = ts
        .client
        .post(ts.url("/api/posts/1/comments"))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);

    // Unparseable query parameters.
    let (status, body) = ts.get("/api/posts/feed?page=abc", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn register_login_verify_flow() {
    let ts = TestServer::new().await;
    let (token, id) = ts.register("mira").await;

    let (status, body) = ts.get("/api/auth/verify", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["id"].as_i64().unwrap(), id);
    assert_eq!(body["data"]["user"]["username"], "mira");

    let response = ts
        .client
        .post(ts.url("/api/auth/login"))
        .json(&json!({ "email": "mira@example.com", "password": "hunter22hunter22" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert!(body["data"]["token"].is_string());
}

#[tokio::test]
async fn register_rejects_duplicates_and_bad_input() {
    let ts = TestServer::new().await;
    ts.register("taken").await;

    let response = ts
        .client
        .post(ts.url("/api/auth/register"))
        .json(&json!({
            "username": "taken",
            "email": "other@example.com",
            "password": "hunter22hunter22",
            "fullName": "Other",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ts
        .client
        .post(ts.url("/api/auth/register"))
        .json(&json!({
            "username": "shortpw",
            "email": "shortpw@example.com",
            "password": "short",
            "fullName": "Short",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let ts = TestServer::new().await;
    ts.register("finn").await;

    let response = ts
        .client
        .post(ts.url("/api/auth/login"))
        .json(&json!({ "email": "finn@example.com", "password": "not-the-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let ts = TestServer::new().await;
    let response = ts
        .client
        .get(ts.url("/api/posts/feed"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ts
        .client
        .get(ts.url("/api/posts/feed"))
        .bearer_auth("garbage-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_flow() {
    let ts = TestServer::new().await;
    let (token, _) = ts.register("rotate").await;

    let (status, _) = ts
        .put(
            "/api/auth/change-password",
            &token,
            Some(json!({ "currentPassword": "wrong-password-1", "newPassword": "fresh-password-9" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ts
        .put(
            "/api/auth/change-password",
            &token,
            Some(json!({ "currentPassword": "hunter22hunter22", "newPassword": "fresh-password-9" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let response = ts
        .client
        .post(ts.url("/api/auth/login"))
        .json(&json!({ "email": "rotate@example.com", "password": "hunter22hunter22" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ts
        .client
        .post(ts.url("/api/auth/login"))
        .json(&json!({ "email": "rotate@example.com", "password": "fresh-password-9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn friend_request_lifecycle() {
    let ts = TestServer::new().await;
    let (token_a, id_a) = ts.register("anna").await;
    let (token_b, id_b) = ts.register("bruno").await;

    // Self-requests and requests to unknown users are rejected.
    let (status, _) = ts
        .post(&format!("/api/friends/request/{id_a}"), &token_a, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = ts
        .post("/api/friends/request/9999", &token_a, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ts
        .post(&format!("/api/friends/request/{id_b}"), &token_a, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Duplicate edge in either direction conflicts.
    let (status, _) = ts
        .post(&format!("/api/friends/request/{id_b}"), &token_a, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = ts
        .post(&format!("/api/friends/request/{id_a}"), &token_b, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ts.get("/api/friends/requests", &token_b).await;
    assert_eq!(status, StatusCode::OK);
    let requests = body["data"]["requests"].as_array().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["username"], "anna");

    // Accepting a request that does not exist is a 404.
    let (status, _) = ts
        .put(&format!("/api/friends/accept/{id_b}"), &token_a, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ts
        .put(&format!("/api/friends/accept/{id_a}"), &token_b, None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // Both sides now list each other.
    let (_, body) = ts.get("/api/friends", &token_a).await;
    assert_eq!(body["data"]["friends"][0]["username"], "bruno");
    let (_, body) = ts.get("/api/friends", &token_b).await;
    assert_eq!(body["data"]["friends"][0]["username"], "anna");

    // Both ends got their notification.
    let (_, body) = ts.get("/api/notifications", &token_b).await;
    assert_eq!(body["data"]["notifications"][0]["type"], "friend_request");
    let (_, body) = ts.get("/api/notifications", &token_a).await;
    assert_eq!(body["data"]["notifications"][0]["type"], "friend_accept");

    // Removal is idempotent.
    let (status, _) = ts.delete(&format!("/api/friends/{id_b}"), &token_a).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ts.delete(&format!("/api/friends/{id_b}"), &token_a).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = ts.get("/api/friends", &token_b).await;
    assert!(body["data"]["friends"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn declined_requests_can_not_be_accepted() {
    let ts = TestServer::new().await;
    let (token_a, id_a) = ts.register("carla").await;
    let (token_b, id_b) = ts.register("dario").await;

    ts.post(&format!("/api/friends/request/{id_b}"), &token_a, json!({}))
        .await;
    let (status, _) = ts
        .put(&format!("/api/friends/decline/{id_a}"), &token_b, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ts
        .put(&format!("/api/friends/accept/{id_a}"), &token_b, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feed_is_scoped_to_friends() {
    let ts = TestServer::new().await;
    let (token_a, id_a) = ts.register("ella").await;
    let (token_b, id_b) = ts.register("felix").await;
    let (token_c, _) = ts.register("greta").await;

    ts.create_post(&token_a, "my own post").await;
    ts.create_post(&token_b, "friend post").await;
    ts.create_post(&token_c, "stranger post").await;

    ts.befriend(&token_a, &token_b, id_a, id_b).await;

    let (status, body) = ts.get("/api/posts/feed", &token_a).await;
    assert_eq!(status, StatusCode::OK);
    let posts = body["data"]["posts"].as_array().unwrap();
    let contents: Vec<&str> = posts
        .iter()
        .map(|p| p["content"].as_str().unwrap())
        .collect();
    assert!(contents.contains(&"my own post"));
    assert!(contents.contains(&"friend post"));
    assert!(!contents.contains(&"stranger post"));
    assert_eq!(body["data"]["hasMore"], false);
}

#[tokio::test]
async fn feed_pagination_has_precise_has_more() {
    let ts = TestServer::new().await;
    let (token, _) = ts.register("pager").await;
    for i in 0..3 {
        ts.create_post(&token, &format!("post {i}")).await;
    }

    let (_, body) = ts.get("/api/posts/feed?page=1&limit=2", &token).await;
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["hasMore"], true);

    let (_, body) = ts.get("/api/posts/feed?page=2&limit=2", &token).await;
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["page"], 2);
    assert_eq!(body["data"]["hasMore"], false);

    // Ridiculous page numbers fall off the end instead of erroring out.
    let (status, body) = ts
        .get(
            &format!("/api/posts/feed?page={}&limit=50", i64::MAX),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 0);
    assert_eq!(body["data"]["hasMore"], false);

    let (_, body) = ts.get("/api/posts/user/pager?page=1&limit=2", &token).await;
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["hasMore"], true);
}

#[tokio::test]
async fn post_creation_extracts_hashtags() {
    let ts = TestServer::new().await;
    let (token, _) = ts.register("hashtagger").await;

    ts.create_post(&token, "sunset at the #beach with #Beach vibes")
        .await;
    ts.create_post(&token, "back at the #beach").await;

    assert_eq!(
        ts.state.db.hashtag_posts_count("beach").await.unwrap(),
        Some(2)
    );
}

#[tokio::test]
async fn empty_posts_are_rejected() {
    let ts = TestServer::new().await;
    let (token, _) = ts.register("hollow").await;

    let form = Form::new().text("content", "   ");
    let response = ts
        .client
        .post(ts.url("/api/posts"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn like_toggle_and_notification() {
    let ts = TestServer::new().await;
    let (token_a, _) = ts.register("author").await;
    let (token_b, _) = ts.register("admirer").await;
    let post_id = ts.create_post(&token_a, "like me").await;

    let (status, body) = ts
        .post(&format!("/api/posts/{post_id}/like"), &token_b, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isLiked"], true);

    let (_, body) = ts.get(&format!("/api/posts/{post_id}"), &token_b).await;
    assert_eq!(body["data"]["post"]["likesCount"].as_i64().unwrap(), 1);
    assert_eq!(body["data"]["post"]["isLiked"], true);

    let (_, body) = ts.get("/api/notifications", &token_a).await;
    let notification = &body["data"]["notifications"][0];
    assert_eq!(notification["type"], "like");
    assert_eq!(notification["postId"].as_i64().unwrap(), post_id);
    assert_eq!(notification["actor"]["username"], "admirer");

    // Second toggle removes the like.
    let (_, body) = ts
        .post(&format!("/api/posts/{post_id}/like"), &token_b, json!({}))
        .await;
    assert_eq!(body["data"]["isLiked"], false);
    let (_, body) = ts.get(&format!("/api/posts/{post_id}"), &token_b).await;
    assert_eq!(body["data"]["post"]["likesCount"].as_i64().unwrap(), 0);

    // Self-likes do not notify.
    ts.post(&format!("/api/posts/{post_id}/like"), &token_a, json!({}))
        .await;
    let (_, body) = ts.get("/api/notifications", &token_a).await;
    assert_eq!(body["data"]["notifications"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn comments_are_flat_and_counted_live() {
    let ts = TestServer::new().await;
    let (token_a, _) = ts.register("poster").await;
    let (token_b, _) = ts.register("replier").await;
    let post_id = ts.create_post(&token_a, "discuss").await;

    let (status, _) = ts
        .post(
            &format!("/api/posts/{post_id}/comments"),
            &token_b,
            json!({ "content": "   " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ts
        .post(
            &format!("/api/posts/{post_id}/comments"),
            &token_b,
            json!({ "content": "first!" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    ts.post(
        &format!("/api/posts/{post_id}/comments"),
        &token_a,
        json!({ "content": "thanks" }),
    )
    .await;

    let (_, body) = ts
        .get(&format!("/api/posts/{post_id}/comments"), &token_b)
        .await;
    let comments = body["data"]["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["content"], "first!");

    let (_, body) = ts.get(&format!("/api/posts/{post_id}"), &token_a).await;
    assert_eq!(body["data"]["post"]["commentsCount"].as_i64().unwrap(), 2);

    // Comment notification carries the preview, suppressed for self-comments.
    let (_, body) = ts.get("/api/notifications", &token_a).await;
    let notifications = body["data"]["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["type"], "comment");
    assert_eq!(notifications[0]["preview"], "first!");

    let (status, _) = ts
        .post(
            "/api/posts/424242/comments",
            &token_b,
            json!({ "content": "?" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn posts_are_addressable_by_id_and_uuid_and_owner_deletable() {
    let ts = TestServer::new().await;
    let (token_a, _) = ts.register("owner").await;
    let (token_b, _) = ts.register("intruder").await;
    let post_id = ts.create_post(&token_a, "mine").await;

    let (_, body) = ts.get(&format!("/api/posts/{post_id}"), &token_a).await;
    let uuid = body["data"]["post"]["uuid"].as_str().unwrap().to_string();
    let (status, _) = ts.get(&format!("/api/posts/{uuid}"), &token_a).await;
    assert_eq!(status, StatusCode::OK);

    // Non-owners get a 404, not a 403.
    let (status, _) = ts.delete(&format!("/api/posts/{post_id}"), &token_b).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ts.delete(&format!("/api/posts/{uuid}"), &token_a).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ts.get(&format!("/api/posts/{post_id}"), &token_a).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn save_toggle_round_trip() {
    let ts = TestServer::new().await;
    let (token, _) = ts.register("collector").await;
    let post_id = ts.create_post(&token, "keep this").await;

    let (_, body) = ts
        .post(&format!("/api/posts/{post_id}/save"), &token, json!({}))
        .await;
    assert_eq!(body["data"]["isSaved"], true);
    let (_, body) = ts.get(&format!("/api/posts/{post_id}"), &token).await;
    assert_eq!(body["data"]["post"]["isSaved"], true);

    let (_, body) = ts
        .post(&format!("/api/posts/{post_id}/save"), &token, json!({}))
        .await;
    assert_eq!(body["data"]["isSaved"], false);
}

#[tokio::test]
async fn messaging_flow_with_unread_tracking() {
    let ts = TestServer::new().await;
    let (token_a, id_a) = ts.register("sender").await;
    let (token_b, id_b) = ts.register("receiver").await;

    let (status, _) = ts
        .post(
            &format!("/api/messages/{id_b}"),
            &token_a,
            json!({ "content": "  " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ts
        .post(
            &format!("/api/messages/{id_b}"),
            &token_a,
            json!({ "content": "hello over there" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Receiver sees one conversation with one unread message.
    let (_, body) = ts.get("/api/messages/conversations", &token_b).await;
    let conversations = body["data"]["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["username"], "sender");
    assert_eq!(conversations[0]["unreadCount"].as_i64().unwrap(), 1);
    assert_eq!(conversations[0]["isOwnMessage"], false);

    // Message notification with preview.
    let (_, body) = ts.get("/api/notifications", &token_b).await;
    assert_eq!(body["data"]["notifications"][0]["type"], "message");
    assert_eq!(
        body["data"]["notifications"][0]["preview"],
        "hello over there"
    );

    // Reading the thread marks it read.
    let (_, body) = ts.get(&format!("/api/messages/{id_a}"), &token_b).await;
    let messages = body["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "hello over there");
    let (_, body) = ts.get("/api/messages/conversations", &token_b).await;
    assert_eq!(
        body["data"]["conversations"][0]["unreadCount"]
            .as_i64()
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn thread_pages_are_chronological() {
    let ts = TestServer::new().await;
    let (token_a, id_a) = ts.register("left").await;
    let (token_b, id_b) = ts.register("right").await;

    for i in 0..3 {
        ts.post(
            &format!("/api/messages/{id_b}"),
            &token_a,
            json!({ "content": format!("message {i}") }),
        )
        .await;
    }

    let (_, body) = ts
        .get(&format!("/api/messages/{id_a}?page=1&limit=2"), &token_b)
        .await;
    let messages = body["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    // Newest page, oldest first within it.
    assert_eq!(messages[0]["content"], "message 1");
    assert_eq!(messages[1]["content"], "message 2");
    assert_eq!(body["data"]["hasMore"], true);
}

#[tokio::test]
async fn messages_are_sender_deletable_only() {
    let ts = TestServer::new().await;
    let (token_a, _) = ts.register("writes").await;
    let (token_b, id_b) = ts.register("reads").await;

    let (_, body) = ts
        .post(
            &format!("/api/messages/{id_b}"),
            &token_a,
            json!({ "content": "take this back" }),
        )
        .await;
    let message_id = body["data"]["message"]["id"].as_i64().unwrap();

    let (status, _) = ts
        .delete(&format!("/api/messages/{message_id}"), &token_b)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = ts
        .delete(&format!("/api/messages/{message_id}"), &token_a)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn notifications_read_state_management() {
    let ts = TestServer::new().await;
    let (token_a, _) = ts.register("busy").await;
    let (token_b, id_b) = ts.register("noisy").await;

    // noisy likes two of busy's posts.
    let post_one = ts.create_post(&token_a, "one").await;
    let post_two = ts.create_post(&token_a, "two").await;
    ts.post(&format!("/api/posts/{post_one}/like"), &token_b, json!({}))
        .await;
    ts.post(&format!("/api/posts/{post_two}/like"), &token_b, json!({}))
        .await;
    // and busy messages noisy, which must not notify busy.
    ts.post(
        &format!("/api/messages/{id_b}"),
        &token_a,
        json!({ "content": "hi" }),
    )
    .await;

    let (_, body) = ts.get("/api/notifications", &token_a).await;
    assert_eq!(body["data"]["unreadCount"].as_i64().unwrap(), 2);
    let first = body["data"]["notifications"][0]["id"].as_i64().unwrap();

    let (status, _) = ts
        .put(&format!("/api/notifications/{first}/read"), &token_a, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = ts.get("/api/notifications", &token_a).await;
    assert_eq!(body["data"]["unreadCount"].as_i64().unwrap(), 1);

    let (status, _) = ts.put("/api/notifications/read-all", &token_a, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = ts.get("/api/notifications", &token_a).await;
    assert_eq!(body["data"]["unreadCount"].as_i64().unwrap(), 0);

    // Deleting is scoped to the caller's own rows.
    let (status, _) = ts
        .delete(&format!("/api/notifications/{first}"), &token_b)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = ts.get("/api/notifications", &token_a).await;
    assert_eq!(body["data"]["notifications"].as_array().unwrap().len(), 2);
    let (status, _) = ts
        .delete(&format!("/api/notifications/{first}"), &token_a)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = ts.get("/api/notifications", &token_a).await;
    assert_eq!(body["data"]["notifications"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn story_lifecycle_with_unique_views() {
    let ts = TestServer::new().await;
    let (token_a, id_a) = ts.register("narrator").await;
    let (token_b, id_b) = ts.register("audience").await;
    ts.befriend(&token_a, &token_b, id_a, id_b).await;

    let form = Form::new().text("caption", "low tide").part(
        "storyMedia",
        Part::bytes(vec![0u8; 64])
            .file_name("tide.jpg")
            .mime_str("image/jpeg")
            .unwrap(),
    );
    let response = ts
        .client
        .post(ts.url("/api/stories"))
        .bearer_auth(&token_a)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    let story_id = body["data"]["storyId"].as_i64().unwrap();

    // The friend sees the story in their feed, unviewed.
    let (_, body) = ts.get("/api/stories/feed", &token_b).await;
    let groups = body["data"]["storyGroups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["user"]["username"], "narrator");
    assert_eq!(groups[0]["stories"][0]["caption"], "low tide");
    assert_eq!(groups[0]["stories"][0]["isViewed"], false);

    // Viewing twice still counts one unique viewer.
    ts.post(
        &format!("/api/stories/{story_id}/view"),
        &token_b,
        json!({}),
    )
    .await;
    ts.post(
        &format!("/api/stories/{story_id}/view"),
        &token_b,
        json!({}),
    )
    .await;
    let (_, body) = ts.get("/api/stories/feed", &token_b).await;
    assert_eq!(
        body["data"]["storyGroups"][0]["stories"][0]["viewsCount"]
            .as_i64()
            .unwrap(),
        1
    );
    assert_eq!(
        body["data"]["storyGroups"][0]["stories"][0]["isViewed"],
        true
    );

    // Viewer list is owner-only.
    let (status, _) = ts
        .get(&format!("/api/stories/{story_id}/views"), &token_b)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = ts
        .get(&format!("/api/stories/{story_id}/views"), &token_a)
        .await;
    assert_eq!(status, StatusCode::OK);
    let viewers = body["data"]["viewers"].as_array().unwrap();
    assert_eq!(viewers.len(), 1);
    assert_eq!(viewers[0]["username"], "audience");

    // Owner-only delete.
    let (status, _) = ts
        .delete(&format!("/api/stories/{story_id}"), &token_b)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = ts
        .delete(&format!("/api/stories/{story_id}"), &token_a)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = ts.get("/api/stories/feed", &token_b).await;
    assert!(body["data"]["storyGroups"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn expired_stories_disappear() {
    let ts = TestServer::new().await;
    let (token, id) = ts.register("ephemeral").await;

    let (story_id, _) = ts
        .state
        .db
        .create_story(id, "/uploads/stories/old.jpg", "image", None, now() - 10)
        .await
        .unwrap();

    let (_, body) = ts.get("/api/stories/feed", &token).await;
    assert!(body["data"]["storyGroups"].as_array().unwrap().is_empty());
    let (status, _) = ts
        .post(&format!("/api/stories/{story_id}/view"), &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn own_story_group_comes_first() {
    let ts = TestServer::new().await;
    let (token_a, id_a) = ts.register("me_first").await;
    let (token_b, id_b) = ts.register("aardvark").await;
    ts.befriend(&token_a, &token_b, id_a, id_b).await;

    ts.state
        .db
        .create_story(id_b, "/uploads/stories/b.jpg", "image", None, now() + 3600)
        .await
        .unwrap();
    ts.state
        .db
        .create_story(id_a, "/uploads/stories/a.jpg", "image", None, now() + 3600)
        .await
        .unwrap();

    let (_, body) = ts.get("/api/stories/feed", &token_a).await;
    let groups = body["data"]["storyGroups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["user"]["username"], "me_first");
    assert_eq!(groups[1]["user"]["username"], "aardvark");
}

#[tokio::test]
async fn profile_view_and_partial_update() {
    let ts = TestServer::new().await;
    let (token_a, id_a) = ts.register("hazel").await;
    let (token_b, id_b) = ts.register("ivo").await;

    ts.create_post(&token_a, "hello").await;
    ts.befriend(&token_a, &token_b, id_a, id_b).await;

    let (_, body) = ts.get("/api/users/hazel", &token_a).await;
    assert_eq!(body["data"]["user"]["isOwnProfile"], true);
    assert_eq!(body["data"]["user"]["postsCount"].as_i64().unwrap(), 1);
    assert_eq!(body["data"]["user"]["friendsCount"].as_i64().unwrap(), 1);

    let (_, body) = ts.get("/api/users/hazel", &token_b).await;
    assert_eq!(body["data"]["user"]["isOwnProfile"], false);
    assert_eq!(body["data"]["user"]["friendshipStatus"], "accepted");

    let (status, _) = ts.get("/api/users/nobody_here", &token_a).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Absent fields keep their value; explicit null clears.
    let (status, _) = ts
        .put(
            "/api/users/profile",
            &token_a,
            Some(json!({ "bio": "tide watcher", "location": "coast" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = ts.get("/api/users/hazel", &token_a).await;
    assert_eq!(body["data"]["user"]["bio"], "tide watcher");

    ts.put("/api/users/profile", &token_a, Some(json!({ "bio": null })))
        .await;
    let (_, body) = ts.get("/api/users/hazel", &token_a).await;
    assert!(body["data"]["user"]["bio"].is_null());
    assert_eq!(body["data"]["user"]["location"], "coast");
}

#[tokio::test]
async fn user_search_matches_username_and_name() {
    let ts = TestServer::new().await;
    let (token, _) = ts.register("searcher").await;
    ts.register("coastline").await;
    ts.register("inland").await;

    let (_, body) = ts.get("/api/users/search/coast", &token).await;
    let users = body["data"]["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["username"], "coastline");
}

#[tokio::test]
async fn profile_picture_upload_and_static_serving() {
    let ts = TestServer::new().await;
    let (token, _) = ts.register("facefwd").await;

    let form = Form::new().part(
        "profilePicture",
        Part::bytes(vec![1u8; 128])
            .file_name("face.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let response = ts
        .client
        .post(ts.url("/api/users/profile-picture"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let url = body["data"]["profilePicture"].as_str().unwrap();
    assert!(url.starts_with("http://"));

    // The stored file is reachable through the static mount.
    let served = ts.client.get(url).send().await.unwrap();
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.bytes().await.unwrap().len(), 128);

    // Non-image uploads for the avatar are rejected.
    let form = Form::new().part(
        "profilePicture",
        Part::bytes(vec![1u8; 16])
            .file_name("clip.mp4")
            .mime_str("video/mp4")
            .unwrap(),
    );
    let response = ts
        .client
        .post(ts.url("/api/users/profile-picture"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_media_upload_classifies_video() {
    let ts = TestServer::new().await;
    let (token, _) = ts.register("filmer").await;

    let form = Form::new().text("content", "clip day").part(
        "postMedia",
        Part::bytes(vec![2u8; 256])
            .file_name("clip.mp4")
            .mime_str("video/mp4")
            .unwrap(),
    );
    let response = ts
        .client
        .post(ts.url("/api/posts"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    let post_id = body["data"]["postId"].as_i64().unwrap();

    let (_, body) = ts.get(&format!("/api/posts/{post_id}"), &token).await;
    let post = &body["data"]["post"];
    assert!(post["imageUrl"].is_null());
    assert!(post["videoUrl"]
        .as_str()
        .unwrap()
        .contains("/uploads/posts/"));
}

#[tokio::test]
async fn blocked_users_lose_the_friendship() {
    let ts = TestServer::new().await;
    let (token_a, id_a) = ts.register("walls").await;
    let (token_b, id_b) = ts.register("outside").await;
    ts.befriend(&token_a, &token_b, id_a, id_b).await;

    let (status, _) = ts
        .post(&format!("/api/friends/block/{id_b}"), &token_a, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = ts.get("/api/friends", &token_a).await;
    assert!(body["data"]["friends"].as_array().unwrap().is_empty());
    let (_, body) = ts.get("/api/friends", &token_b).await;
    assert!(body["data"]["friends"].as_array().unwrap().is_empty());

    // The blocked edge shows up as the friendship status.
    let (_, body) = ts.get("/api/users/outside", &token_a).await;
    assert_eq!(body["data"]["user"]["friendshipStatus"], "blocked");
}
