use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use colored::Color;
use common::logger::Logger;
use std::sync::LazyLock;
use std::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

static LOGGER: LazyLock<Logger> = LazyLock::new(|| Logger::new("HTTP", Color::Blue));

/// Logs each request and its response under one request id, reusing the
/// caller's `X-Request-ID` when present, and echoes the id back.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 64)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    LOGGER.info(format!("[{request_id}] {method} {path}"));
    let mut response = next.run(request).await;

    let status = response.status();
    let elapsed = started.elapsed().as_millis();
    let line = format!("[{request_id}] {method} {path} -> {} in {elapsed}ms", status.as_u16());
    if status.is_server_error() {
        LOGGER.error(line);
    } else if status.is_client_error() {
        LOGGER.warn(line);
    } else {
        LOGGER.info(line);
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
