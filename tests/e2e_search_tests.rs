//! End-to-end tests for full-text search
//!
//! Posts written through the API reach the index after commit and
//! disappear from it when edited away or deleted.

mod common;

use common::{TestClient, TestServer};
use reqwest::StatusCode;
use serde_json::Value;

async fn search_ids(client: &TestClient, q: &str) -> Vec<i64> {
    let response = client.search(q, 1, 20).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page: Value = response.json().await.unwrap();
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_new_post_is_searchable() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(&server);

    let id = client.create_post_ok("learning rust with the borrow checker").await;
    client.create_post_ok("baking sourdough bread").await;

    assert_eq!(search_ids(&client, "borrow").await, vec![id]);
    assert_eq!(server.search_index.document_count("post").unwrap(), 2);
}

#[tokio::test]
async fn test_search_results_are_visible_to_other_users() {
    let server = TestServer::spawn().await;
    let author = TestClient::authenticated(&server);
    let reader = TestClient::authenticated_other(&server);

    let id = author.create_post_ok("a post about lighthouses").await;

    let response = reader.search("lighthouses", 1, 10).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["items"][0]["id"], id);
    assert_eq!(page["items"][0]["user_id"], server.user.id);
}

#[tokio::test]
async fn test_edited_post_is_reindexed() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(&server);

    let id = client.create_post_ok("first draft about kayaks").await;
    let response = client.update_post(id, "final version about canoes").await;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(search_ids(&client, "kayaks").await.is_empty());
    assert_eq!(search_ids(&client, "canoes").await, vec![id]);
}

#[tokio::test]
async fn test_deleted_post_leaves_index() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(&server);

    let id = client.create_post_ok("ephemeral thoughts").await;
    assert_eq!(search_ids(&client, "ephemeral").await, vec![id]);

    let response = client.delete_post(id).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert!(search_ids(&client, "ephemeral").await.is_empty());
    assert_eq!(server.search_index.document_count("post").unwrap(), 0);
}

#[tokio::test]
async fn test_search_requires_query() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(&server);

    let response = client.search_without_query().await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client.search("   ", 1, 10).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Bad Request");
}

#[tokio::test]
async fn test_search_paginates_with_links() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(&server);

    for i in 0..5 {
        client.create_post_ok(&format!("garden update number {}", i)).await;
    }

    let response = client.search("garden", 2, 2).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["_meta"]["page"], 2);
    assert_eq!(page["_meta"]["total_items"], 5);
    assert_eq!(page["_meta"]["total_pages"], 3);
    assert!(page["_links"]["next"]
        .as_str()
        .unwrap()
        .contains("q=garden"));
    assert!(page["_links"]["prev"].as_str().unwrap().contains("page=1"));

    let response = client.search("garden", 3, 2).await;
    let last: Value = response.json().await.unwrap();
    assert_eq!(last["items"].as_array().unwrap().len(), 1);
    assert!(last["_links"]["next"].is_null());
}

#[tokio::test]
async fn test_search_second_page_of_fifteen() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(&server);

    for i in 0..15 {
        client.create_post_ok(&format!("harbour log entry {}", i)).await;
    }
    client.create_post_ok("unrelated chatter").await;

    let ids = |page: &Value| -> Vec<i64> {
        page["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_i64().unwrap())
            .collect()
    };

    let first: Value = client.search("harbour", 1, 10).await.json().await.unwrap();
    let second: Value = client.search("harbour", 2, 10).await.json().await.unwrap();
    assert_eq!(second["_meta"]["total_items"], 15);
    assert_eq!(second["_meta"]["total_pages"], 2);
    let (first, second) = (ids(&first), ids(&second));
    assert_eq!(first.len(), 10);
    assert_eq!(second.len(), 5);
    assert!(second.iter().all(|id| !first.contains(id)));
}

#[tokio::test]
async fn test_search_requires_authentication() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.search("anything", 1, 10).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
