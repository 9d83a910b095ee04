//! HTTP client for end-to-end tests
//!
//! Wraps reqwest and provides one method per API route. When routes or
//! request formats change, update only this file.

use super::constants::*;
use super::server::TestServer;
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client sending a bearer token
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    token: Option<String>,
}

impl TestClient {
    /// Creates a client that sends no credentials
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            token: None,
        }
    }

    pub fn with_token(base_url: String, token: &str) -> Self {
        let mut client = Self::new(base_url);
        client.token = Some(token.to_string());
        client
    }

    /// Client acting as the regular test user
    pub fn authenticated(server: &TestServer) -> Self {
        Self::with_token(server.base_url.clone(), &server.user.token)
    }

    /// Client acting as the second regular user
    pub fn authenticated_other(server: &TestServer) -> Self {
        Self::with_token(server.base_url.clone(), &server.other_user.token)
    }

    /// Client acting as a user listed in `admins`
    pub fn authenticated_admin(server: &TestServer) -> Self {
        Self::with_token(server.base_url.clone(), &server.admin.token)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Response {
        builder.send().await.expect("Request failed")
    }

    // ========================================================================
    // Server
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        Self::send(self.request(reqwest::Method::GET, "/")).await
    }

    /// GET /metrics
    pub async fn metrics(&self) -> Response {
        Self::send(self.request(reqwest::Method::GET, "/metrics")).await
    }

    // ========================================================================
    // Posts
    // ========================================================================

    /// POST /v1/posts
    pub async fn create_post(&self, body: &str) -> Response {
        Self::send(
            self.request(reqwest::Method::POST, "/v1/posts")
                .json(&json!({ "body": body })),
        )
        .await
    }

    /// POST /v1/posts and returns the new post id
    pub async fn create_post_ok(&self, body: &str) -> i64 {
        let response = self.create_post(body).await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let post: Value = response.json().await.expect("Invalid post JSON");
        post["id"].as_i64().expect("Post without id")
    }

    /// PUT /v1/posts/{id}
    pub async fn update_post(&self, id: i64, body: &str) -> Response {
        Self::send(
            self.request(reqwest::Method::PUT, &format!("/v1/posts/{}", id))
                .json(&json!({ "body": body })),
        )
        .await
    }

    /// DELETE /v1/posts/{id}
    pub async fn delete_post(&self, id: i64) -> Response {
        Self::send(self.request(reqwest::Method::DELETE, &format!("/v1/posts/{}", id))).await
    }

    /// GET /v1/timeline
    pub async fn timeline(&self, page: u32) -> Response {
        Self::send(
            self.request(reqwest::Method::GET, "/v1/timeline")
                .query(&[("page", page)]),
        )
        .await
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// GET /v1/search?q=
    pub async fn search(&self, q: &str, page: u32, per_page: u32) -> Response {
        Self::send(
            self.request(reqwest::Method::GET, "/v1/search").query(&[
                ("q", q.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ]),
        )
        .await
    }

    /// GET /v1/search without a query
    pub async fn search_without_query(&self) -> Response {
        Self::send(self.request(reqwest::Method::GET, "/v1/search")).await
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// GET /v1/users/{id}
    pub async fn get_user(&self, id: i64) -> Response {
        Self::send(self.request(reqwest::Method::GET, &format!("/v1/users/{}", id))).await
    }

    /// PUT /v1/users/me
    pub async fn update_profile(&self, about_me: &str) -> Response {
        Self::send(
            self.request(reqwest::Method::PUT, "/v1/users/me")
                .json(&json!({ "about_me": about_me })),
        )
        .await
    }

    /// POST /v1/users/{id}/follow
    pub async fn follow(&self, id: i64) -> Response {
        Self::send(self.request(reqwest::Method::POST, &format!("/v1/users/{}/follow", id))).await
    }

    /// DELETE /v1/users/{id}/follow
    pub async fn unfollow(&self, id: i64) -> Response {
        Self::send(self.request(
            reqwest::Method::DELETE,
            &format!("/v1/users/{}/follow", id),
        ))
        .await
    }

    /// GET /v1/users/{id}/followers
    pub async fn followers(&self, id: i64) -> Response {
        Self::send(self.request(
            reqwest::Method::GET,
            &format!("/v1/users/{}/followers", id),
        ))
        .await
    }

    /// GET /v1/users/{id}/followed
    pub async fn followed(&self, id: i64) -> Response {
        Self::send(self.request(
            reqwest::Method::GET,
            &format!("/v1/users/{}/followed", id),
        ))
        .await
    }

    // ========================================================================
    // Messages and notifications
    // ========================================================================

    /// POST /v1/messages
    pub async fn send_message(&self, recipient: &str, body: &str) -> Response {
        Self::send(
            self.request(reqwest::Method::POST, "/v1/messages")
                .json(&json!({ "recipient": recipient, "body": body })),
        )
        .await
    }

    /// GET /v1/messages
    pub async fn messages(&self) -> Response {
        Self::send(self.request(reqwest::Method::GET, "/v1/messages")).await
    }

    /// GET /v1/notifications?since=
    pub async fn notifications(&self, since: f64) -> Response {
        Self::send(
            self.request(reqwest::Method::GET, "/v1/notifications")
                .query(&[("since", since)]),
        )
        .await
    }

    /// GET /v1/notifications and returns the parsed list
    pub async fn notifications_ok(&self) -> Vec<Value> {
        let response = self.notifications(0.0).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Invalid notifications JSON")
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// POST /v1/tasks/{name}
    pub async fn launch_task(&self, name: &str) -> Response {
        Self::send(self.request(reqwest::Method::POST, &format!("/v1/tasks/{}", name))).await
    }

    /// GET /v1/tasks
    pub async fn list_tasks(&self) -> Response {
        Self::send(self.request(reqwest::Method::GET, "/v1/tasks")).await
    }

    /// GET /v1/tasks/{id}
    pub async fn get_task(&self, id: &str) -> Response {
        Self::send(self.request(reqwest::Method::GET, &format!("/v1/tasks/{}", id))).await
    }

    /// Polls GET /v1/tasks/{id} until the task has an outcome
    ///
    /// # Panics
    ///
    /// Panics if the task is still running after [`TASK_TIMEOUT_MS`].
    pub async fn wait_for_task(&self, id: &str) -> Value {
        let start = std::time::Instant::now();
        loop {
            let response = self.get_task(id).await;
            assert_eq!(response.status(), reqwest::StatusCode::OK);
            let task: Value = response.json().await.expect("Invalid task JSON");
            if !task["outcome"].is_null() {
                return task;
            }
            if start.elapsed() > Duration::from_millis(TASK_TIMEOUT_MS) {
                panic!("Task {} did not finish: {}", id, task);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    // ========================================================================
    // Admin
    // ========================================================================

    /// POST /v1/admin/reindex
    pub async fn reindex(&self) -> Response {
        Self::send(self.request(reqwest::Method::POST, "/v1/admin/reindex")).await
    }
}
