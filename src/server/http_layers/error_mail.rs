//! Mails administrators about requests that failed with an internal error.

use super::super::error::InternalErrorDetail;
use super::super::state::ServerState;
use crate::mail::{send_email, DeliveryMode, EmailMessage};
use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, Uri},
    middleware::Next,
    response::Response,
};
use tracing::warn;

pub const ERROR_REPORT_SUBJECT: &str = "Microblog Failure";

fn error_report(
    sender: &str,
    recipients: Vec<String>,
    method: &Method,
    uri: &Uri,
    detail: &str,
) -> EmailMessage {
    EmailMessage::new(
        ERROR_REPORT_SUBJECT,
        sender,
        recipients,
        format!("{} {} failed.\n\n{}\n", method, uri.path(), detail),
    )
}

/// Sends an error report to `admin_emails` for every response carrying an
/// [`InternalErrorDetail`]. Delivery is detached, the response never waits
/// on the relay.
pub async fn mail_internal_errors(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let response = next.run(request).await;

    let recipients = &state.config.admin_emails;
    if recipients.is_empty() {
        return response;
    }
    if let Some(detail) = response.extensions().get::<InternalErrorDetail>() {
        let report = error_report(
            &state.config.mail_sender,
            recipients.clone(),
            &method,
            &uri,
            &detail.0,
        );
        if let Err(e) = send_email(state.mailer.clone(), report, DeliveryMode::Detached) {
            warn!("Could not hand off error report: {}", e);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::{InMemoryJobQueue, TaskManager, TaskRegistry};
    use crate::mail::MemoryMailer;
    use crate::search::NoOpSearchIndex;
    use crate::server::{ApiError, ServerConfig};
    use crate::store::Database;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(admin_emails: Vec<String>) -> (Router, MemoryMailer) {
        let db = Database::open_in_memory(vec![]).unwrap();
        let queue = Arc::new(InMemoryJobQueue::new(Duration::from_secs(500)));
        let manager = TaskManager::new(db.clone(), queue, Arc::new(TaskRegistry::new()));
        let mailer = MemoryMailer::new();
        let config = ServerConfig {
            admin_emails,
            ..Default::default()
        };
        let state = ServerState::new(
            config,
            db,
            Arc::new(NoOpSearchIndex),
            manager,
            Arc::new(mailer.clone()),
        );
        let router = Router::new()
            .route(
                "/broken",
                get(|| async { Err::<(), _>(ApiError::Internal("disk on fire".to_string())) }),
            )
            .route(
                "/missing",
                get(|| async { Err::<(), _>(ApiError::NotFound("post 7".to_string())) }),
            )
            .layer(middleware::from_fn_with_state(state, mail_internal_errors));
        (router, mailer)
    }

    async fn call(router: &Router, path: &str) -> StatusCode {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        router.clone().oneshot(request).await.unwrap().status()
    }

    async fn wait_for_mail(mailer: &MemoryMailer) {
        for _ in 0..50 {
            if !mailer.sent().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn internal_error_is_mailed_to_admins() {
        let (router, mailer) = app(vec!["ops@example.com".to_string()]);

        assert_eq!(call(&router, "/broken").await, StatusCode::INTERNAL_SERVER_ERROR);
        wait_for_mail(&mailer).await;

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, ERROR_REPORT_SUBJECT);
        assert_eq!(sent[0].recipients, vec!["ops@example.com".to_string()]);
        assert!(sent[0].text_body.starts_with("GET /broken failed."));
        assert!(sent[0].text_body.contains("disk on fire"));
    }

    #[tokio::test]
    async fn client_errors_and_missing_admins_send_nothing() {
        let (router, mailer) = app(vec!["ops@example.com".to_string()]);
        assert_eq!(call(&router, "/missing").await, StatusCode::NOT_FOUND);

        let (quiet, quiet_mailer) = app(Vec::new());
        assert_eq!(call(&quiet, "/broken").await, StatusCode::INTERNAL_SERVER_ERROR);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(mailer.sent().is_empty());
        assert!(quiet_mailer.sent().is_empty());
    }
}
