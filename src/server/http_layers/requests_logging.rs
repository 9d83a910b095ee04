//! Request logging middleware

use super::super::state::ServerState;
use crate::server::metrics::record_http_request;
use axum::extract::{MatchedPath, State};
use axum::{
    body::{Body, Bytes},
    http::{
        header::{AUTHORIZATION, CONTENT_LENGTH, COOKIE, SET_COOKIE},
        HeaderMap, HeaderName, Request, Response, StatusCode,
    },
    middleware::Next,
    response::IntoResponse,
};
use std::time::Instant;
use tracing::{error, info};

#[derive(PartialEq, PartialOrd, Clone, Debug, Default, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    #[default]
    Path,
    Headers,
    Body,
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const MAX_LOGGABLE_BODY_LENGTH: usize = 1024;

/// Headers carrying API tokens. Their values never reach the logs.
const SECRET_HEADERS: [HeaderName; 3] = [AUTHORIZATION, COOKIE, SET_COOKIE];

fn content_length(headers: &HeaderMap) -> Result<usize, &'static str> {
    headers
        .get(CONTENT_LENGTH)
        .ok_or("Content-length not set.")?
        .to_str()
        .map_err(|_| "Could not get Content-length string value.")?
        .parse::<usize>()
        .map_err(|_| "Could not parse Content-length numeric value.")
}

fn log_headers(label: &str, headers: &HeaderMap) {
    info!("  {} Headers:", label);
    for (name, value) in headers.iter() {
        if SECRET_HEADERS.contains(name) {
            info!("    {:?}: <redacted>", name);
        } else {
            info!("    {:?}: {:?}", name, value);
        }
    }
}

/// Logs a small enough body and returns a replacement for the consumed one.
async fn log_body(label: &str, headers: &HeaderMap, body: Body) -> Result<Body, StatusCode> {
    let size = match content_length(headers) {
        Ok(size) => size,
        Err(reason) => {
            info!("  {} Body: {}", label, reason);
            return Ok(body);
        }
    };
    if size >= MAX_LOGGABLE_BODY_LENGTH {
        info!(
            "  {} Body: Too big to log ({:#})",
            label,
            byte_unit::Byte::from(size)
        );
        return Ok(body);
    }

    let bytes: Bytes = axum::body::to_bytes(body, size).await.map_err(|err| {
        error!("Failed to read {} body: {:?}", label.to_lowercase(), err);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    info!("  {} Body:\n{}", label, String::from_utf8_lossy(&bytes));
    Ok(Body::from(bytes))
}

/// Logs each request at the configured verbosity and records its metrics.
///
/// Metrics are labelled with the route template, e.g. `/v1/posts/{id}`.
pub async fn log_requests(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let level = state.config.requests_logging_level.clone();
    let start = Instant::now();

    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    if level > RequestsLoggingLevel::None {
        info!(">>> {} {}", method, request.uri());
    }

    let request = if level >= RequestsLoggingLevel::Headers {
        log_headers("Req", request.headers());
        let (parts, body) = request.into_parts();
        let body = if level >= RequestsLoggingLevel::Body {
            match log_body("Req", &parts.headers, body).await {
                Ok(body) => body,
                Err(status) => return status.into_response(),
            }
        } else {
            body
        };
        Request::from_parts(parts, body)
    } else {
        request
    };

    let response = next.run(request).await;
    let status = response.status().as_u16();

    let response = if level >= RequestsLoggingLevel::Headers {
        log_headers("Resp", response.headers());
        let (parts, body) = response.into_parts();
        let body = if level >= RequestsLoggingLevel::Body {
            match log_body("Resp", &parts.headers, body).await {
                Ok(body) => body,
                Err(status) => return status.into_response(),
            }
        } else {
            body
        };
        Response::from_parts(parts, body)
    } else {
        response
    };

    let duration = start.elapsed();
    if level > RequestsLoggingLevel::None {
        info!("<<< {} {} ({}ms)", status, route, duration.as_millis());
    }
    record_http_request(&method, &route, status, duration);

    response
}
