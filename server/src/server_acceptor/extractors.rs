use crate::error::AppError;
use crate::messages::internal_messages::{Authenticate, Session};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Request};
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE, USER_AGENT};
use axum::http::request::Parts;
use common::constants::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use common::types::user::UserRole;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;

pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// The caller's session. Rejects with 401 when no valid access token is presented.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Session);

impl AuthUser {
    pub fn id(&self) -> u64 {
        self.0.user_id
    }

    pub fn role(&self) -> UserRole {
        self.0.role
    }

    pub fn require(&self, role: UserRole) -> Result<(), AppError> {
        if self.0.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Only {} accounts can do this",
                role.label().to_lowercase()
            )))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let access_token = cookie(&parts.headers, ACCESS_TOKEN_COOKIE)
            .or_else(|| bearer_token(&parts.headers))
            .ok_or_else(|| {
                AppError::Unauthorized("Authentication credentials were not provided".to_string())
            })?;
        let session = state
            .sessions
            .send(Authenticate { access_token })
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;
        Ok(AuthUser(session))
    }
}

/// Whatever tokens the request carries, valid or not.
#[derive(Debug, Clone, Default)]
pub struct PresentedTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for PresentedTokens {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PresentedTokens {
            access_token: cookie(&parts.headers, ACCESS_TOKEN_COOKIE)
                .or_else(|| bearer_token(&parts.headers)),
            refresh_token: cookie(&parts.headers, REFRESH_TOKEN_COOKIE),
        })
    }
}

/// Client address and user agent, recorded with consent logs.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(ClientMeta {
            ip_address: forwarded.or(peer),
            user_agent,
        })
    }
}

/// JSON body that may arrive sealed as `{"payload": "..."}`. An empty body reads as `{}`.
#[derive(Debug, Clone)]
pub struct SealedJson<T>(pub T);

impl<T: DeserializeOwned> FromRequest<AppState> for SealedJson<T> {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let value = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Object(Default::default())
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?
        };
        let value = state
            .payload_cipher
            .open_if_sealed(value)
            .map_err(|e| AppError::BadRequest(format!("Invalid encrypted payload: {e}")))?;
        serde_json::from_value(value)
            .map(SealedJson)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookies_are_found_among_several() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; access_token=abc123; refresh_token=r"),
        );
        assert_eq!(cookie(&headers, "access_token").as_deref(), Some("abc123"));
        assert_eq!(cookie(&headers, "refresh_token").as_deref(), Some("r"));
        assert_eq!(cookie(&headers, "missing"), None);
    }

    #[test]
    fn bearer_tokens_need_the_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("tok"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);
    }
}
