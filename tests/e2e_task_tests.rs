//! End-to-end tests for background tasks
//!
//! Launches the post export through the API and follows it through the
//! queue, the progress notifications and the outgoing mail.

mod common;

use common::{TestClient, TestServer, MAIL_SENDER, TEST_USER_EMAIL};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

async fn launch(client: &TestClient, name: &str) -> Value {
    let response = client.launch_task(name).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_export_posts_mails_archive() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(&server);
    client.create_post_ok("my first post").await;
    client.create_post_ok("my second post").await;

    let task = launch(&client, "export_posts").await;
    assert_eq!(task["name"], "export_posts");
    assert_eq!(task["description"], "Exporting posts...");
    assert_eq!(task["user_id"], server.user.id);
    assert_eq!(task["complete"], false);

    let id = task["id"].as_str().unwrap();
    let finished = client.wait_for_task(id).await;
    assert_eq!(finished["outcome"], "succeeded");
    assert_eq!(finished["complete"], true);
    assert_eq!(finished["progress"], 100);

    let sent = server.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sender, MAIL_SENDER);
    assert_eq!(sent[0].recipients, vec![TEST_USER_EMAIL.to_string()]);
    let attachment = &sent[0].attachments[0];
    assert_eq!(attachment.filename, "posts.json");
    let archive: Value = serde_json::from_slice(&attachment.data).unwrap();
    let bodies: Vec<&str> = archive["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["body"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["my first post", "my second post"]);
}

#[tokio::test]
async fn test_export_progress_is_notified() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(&server);
    client.create_post_ok("something to export").await;

    let task = launch(&client, "export_posts").await;
    let id = task["id"].as_str().unwrap();
    client.wait_for_task(id).await;

    let notifications = client.notifications_ok().await;
    let progress: Vec<&Value> = notifications
        .iter()
        .filter(|n| n["name"] == "export_posts_progress")
        .collect();
    // Each update replaces the previous one
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0]["data"], json!({"task_id": id, "progress": 100}));
}

#[tokio::test]
async fn test_finished_task_leaves_in_progress_list() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(&server);

    let task = launch(&client, "export_posts").await;
    client.wait_for_task(task["id"].as_str().unwrap()).await;

    let response = client.list_tasks().await;
    assert_eq!(response.status(), StatusCode::OK);
    let tasks: Vec<Value> = response.json().await.unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn test_second_launch_while_running_conflicts() {
    let server = TestServer::spawn_with_export_delay(Duration::from_millis(300)).await;
    let client = TestClient::authenticated(&server);
    for i in 0..3 {
        client.create_post_ok(&format!("post {}", i)).await;
    }

    let task = launch(&client, "export_posts").await;
    let response = client.launch_task("export_posts").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client.list_tasks().await;
    let tasks: Vec<Value> = response.json().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], task["id"]);
    let progress = tasks[0]["progress"].as_u64().unwrap();
    assert!(progress < 100);

    client.wait_for_task(task["id"].as_str().unwrap()).await;

    // Free again once the first one finished
    let response = client.launch_task("export_posts").await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_simultaneous_launches_start_one_task() {
    let server = TestServer::spawn_with_export_delay(Duration::from_millis(300)).await;
    let first = TestClient::authenticated(&server);
    let second = TestClient::authenticated(&server);
    for i in 0..3 {
        first.create_post_ok(&format!("post {}", i)).await;
    }

    let (a, b) = tokio::join!(
        first.launch_task("export_posts"),
        second.launch_task("export_posts")
    );
    let mut statuses = vec![a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::ACCEPTED, StatusCode::CONFLICT]);

    let response = first.list_tasks().await;
    let tasks: Vec<Value> = response.json().await.unwrap();
    assert_eq!(tasks.len(), 1);
}

#[tokio::test]
async fn test_unknown_task_type_is_not_found() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(&server);

    let response = client.launch_task("mine_bitcoin").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_task_of_another_user_is_hidden() {
    let server = TestServer::spawn().await;
    let owner = TestClient::authenticated(&server);
    let stranger = TestClient::authenticated_other(&server);

    let task = launch(&owner, "export_posts").await;
    let id = task["id"].as_str().unwrap();

    let response = stranger.get_task(id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = stranger.get_task("no-such-task").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tasks_require_authentication() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.launch_task("export_posts").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(server.mailer.sent().is_empty());
}
