use crate::error::AppError;
use axum::Json;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use common::types::api::ApiResponse;
use serde::Serialize;
use std::time::Duration;

pub type ApiResult = Result<Response, AppError>;

pub fn respond<T: Serialize>(status: StatusCode, data: T, message: &str) -> Response {
    (status, Json(ApiResponse::ok(data, message, status.as_u16()))).into_response()
}

pub fn ok<T: Serialize>(data: T, message: &str) -> ApiResult {
    Ok(respond(StatusCode::OK, data, message))
}

pub fn created<T: Serialize>(data: T, message: &str) -> ApiResult {
    Ok(respond(StatusCode::CREATED, data, message))
}

/// `Set-Cookie` value for an auth token. `Secure` is left out in debug mode.
pub fn auth_cookie(name: &str, value: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{name}={value}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_cookie(name: &str, secure: bool) -> String {
    auth_cookie(name, "", Duration::ZERO, secure)
}

pub fn with_cookies(mut response: Response, cookies: &[String]) -> ApiResult {
    for cookie in cookies {
        let value = HeaderValue::from_str(cookie)
            .map_err(|e| AppError::Internal(format!("invalid cookie header: {e}")))?;
        response.headers_mut().append(SET_COOKIE, value);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_cookies_are_http_only() {
        let cookie = auth_cookie("access_token", "abc", Duration::from_secs(300), true);
        assert_eq!(
            cookie,
            "access_token=abc; HttpOnly; Path=/; Max-Age=300; SameSite=Lax; Secure"
        );
        assert!(!auth_cookie("a", "b", Duration::from_secs(1), false).contains("Secure"));
    }

    #[test]
    fn cleared_cookies_expire_immediately() {
        assert!(clear_cookie("refresh_token", false).starts_with("refresh_token=; HttpOnly"));
        assert!(clear_cookie("refresh_token", false).contains("Max-Age=0"));
    }
}
