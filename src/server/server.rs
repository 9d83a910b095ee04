use anyhow::{Context, Result};
use std::time::Duration;

use tower_http::services::ServeDir;
use tracing::info;

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::admin_routes::make_admin_routes;
use super::message_routes::make_message_routes;
use super::metrics::metrics_handler;
use super::post_routes::make_post_routes;
use super::search::make_search_routes;
use super::session::Session;
use super::task_routes::make_task_routes;
use super::user_routes::make_user_routes;
use super::{log_requests, mail_internal_errors, state::ServerState};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub search_backend: &'static str,
    pub username: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        search_backend: state.search_index.describe(),
        username: session.map(|s| s.user.username),
    };
    Json(stats)
}

pub fn make_app(state: ServerState) -> Router {
    let api_routes: Router = Router::new()
        .merge(make_post_routes(state.clone()))
        .merge(make_search_routes(state.clone()))
        .merge(make_user_routes(state.clone()))
        .merge(make_message_routes(state.clone()))
        .merge(make_task_routes(state.clone()))
        .nest("/admin", make_admin_routes(state.clone()));

    let home_router: Router = match state.config.frontend_dir_path.clone() {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    home_router
        .route("/metrics", get(metrics_handler))
        .nest("/v1", api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), mail_internal_errors))
        .layer(middleware::from_fn_with_state(state, log_requests))
}

/// Serves the API until `shutdown` is cancelled.
pub async fn run_server(state: ServerState, shutdown: CancellationToken) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on {}", listener.local_addr()?);

    serve(listener, app, shutdown).await
}

/// Serves `app` on an already bound listener.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::{InMemoryJobQueue, TaskManager, TaskRegistry};
    use crate::mail::MemoryMailer;
    use crate::search::NoOpSearchIndex;
    use crate::server::ServerConfig;
    use crate::store::Database;
    use axum::{body::Body, http::Request, http::StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app() -> (Router, Database) {
        let db = Database::open_in_memory(vec![]).unwrap();
        let queue = Arc::new(InMemoryJobQueue::new(Duration::from_secs(500)));
        let manager = TaskManager::new(db.clone(), queue, Arc::new(TaskRegistry::new()));
        let state = ServerState::new(
            ServerConfig::default(),
            db.clone(),
            Arc::new(NoOpSearchIndex),
            manager,
            Arc::new(MemoryMailer::new()),
        );
        (make_app(state), db)
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 01:01:01");
    }

    #[tokio::test]
    async fn responds_unauthorized_on_protected_routes() {
        let (app, _db) = test_app();

        let protected_routes = vec![
            ("GET", "/v1/timeline"),
            ("GET", "/v1/search?q=hello"),
            ("GET", "/v1/users/1"),
            ("GET", "/v1/messages"),
            ("GET", "/v1/notifications"),
            ("GET", "/v1/tasks"),
            ("POST", "/v1/tasks/export_posts"),
            ("POST", "/v1/admin/reindex"),
        ];

        for (method, route) in protected_routes.into_iter() {
            let request = Request::builder()
                .method(method)
                .uri(route)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", route);
        }
    }

    #[tokio::test]
    async fn home_reports_search_backend() {
        let (app, _db) = test_app();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["search_backend"], "noop");
        assert!(json["username"].is_null());
    }

    #[tokio::test]
    async fn bearer_token_authenticates() {
        let (app, db) = test_app();
        let user = db
            .write(|tx| tx.insert_user("diana", "diana@example.com"))
            .unwrap();
        let token = db.issue_token(user.id).unwrap();

        let request = Request::builder()
            .uri("/")
            .header("Authorization", format!("Bearer {}", token.0))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["username"], "diana");
    }
}
