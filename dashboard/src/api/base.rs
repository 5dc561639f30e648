use crate::error::ApiError;
use colored::Color;
use common::constants::HTTP_TIMEOUT;
use common::crypto::PayloadCipher;
use common::logger::Logger;
use common::types::api::ApiResponse;
use common::types::user::{RefreshRequest, RefreshResponse};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

pub(crate) const AUTH_PREFIX: &str = "auth";

#[derive(Debug, Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// Connection state shared by every resource client: the HTTP client with its
/// cookie jar, the payload cipher and the current tokens.
pub struct ApiSession {
    http: Client,
    base_url: String,
    cipher: PayloadCipher,
    tokens: RwLock<Tokens>,
    /// Bumped whenever a new access token is stored.
    generation: AtomicU64,
    refresh_lock: Mutex<()>,
    logged_in: AtomicBool,
    logger: Logger,
}

impl ApiSession {
    pub fn new(base_url: &str, cipher: PayloadCipher) -> Result<Arc<Self>, ApiError> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Arc::new(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cipher,
            tokens: RwLock::new(Tokens::default()),
            generation: AtomicU64::new(0),
            refresh_lock: Mutex::new(()),
            logged_in: AtomicBool::new(false),
            logger: Logger::new("Api", Color::Blue),
        }))
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    pub fn has_token(&self) -> bool {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access
            .is_some()
    }

    fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access
            .clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh
            .clone()
    }

    pub(crate) fn store_tokens(&self, access: String, refresh: Option<String>) {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        tokens.access = Some(access);
        if refresh.is_some() {
            tokens.refresh = refresh;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.logged_in.store(true, Ordering::SeqCst);
    }

    pub(crate) fn clear(&self) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Tokens::default();
        self.logged_in.store(false, Ordering::SeqCst);
    }

    pub(crate) fn seal<B: Serialize>(&self, body: &B) -> Result<Value, ApiError> {
        let sealed = self.cipher.seal_json(body)?;
        Ok(serde_json::to_value(sealed)?)
    }

    fn url(&self, prefix: &str, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            format!("{}/{prefix}/", self.base_url)
        } else {
            format!("{}/{prefix}/{path}", self.base_url)
        }
    }

    /// Exchanges the refresh token (cookie or stored) for a new access token.
    pub async fn refresh(&self) -> Result<RefreshResponse, ApiError> {
        let body = RefreshRequest {
            refresh_token: self.refresh_token(),
        };
        let response = self
            .http
            .post(self.url(AUTH_PREFIX, "refresh/"))
            .json(&body)
            .send()
            .await?;
        let refreshed: RefreshResponse = decode::<RefreshResponse>(response)
            .await?
            .data
            .ok_or_else(|| ApiError::Decode("refresh response carried no token".to_string()))?;
        self.store_tokens(refreshed.access_token.clone(), None);
        Ok(refreshed)
    }

    /// Refreshes unless another request already did so since `seen` was read.
    async fn refresh_after(&self, seen: u64) -> Result<(), ApiError> {
        let _guard = self.refresh_lock.lock().await;
        if self.generation.load(Ordering::SeqCst) != seen {
            return Ok(());
        }
        match self.refresh().await {
            Ok(_) => {
                self.logger.debug("Access token refreshed after 401");
                Ok(())
            }
            Err(e) => {
                self.logger.warn(format!("Session expired: {e}"));
                self.clear();
                Err(e)
            }
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<ApiResponse<T>, ApiError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if status.is_success() {
        return serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()));
    }
    let message = serde_json::from_slice::<ApiResponse<Value>>(&bytes)
        .map(|body| body.message)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
    Err(ApiError::Server {
        status: status.as_u16(),
        message,
    })
}

/// Credential endpoints answer 401 for bad input, not for an expired session.
fn retries_on_unauthorized(prefix: &str, path: &str) -> bool {
    !(prefix == AUTH_PREFIX
        && matches!(
            path.trim_start_matches('/'),
            "login/" | "register/" | "refresh/" | "logout/"
        ))
}

/// Requests against one resource prefix (`auth`, `bookings`, ...).
#[derive(Clone)]
pub struct BaseApiClient {
    session: Arc<ApiSession>,
    prefix: &'static str,
}

impl BaseApiClient {
    pub fn new(session: Arc<ApiSession>, prefix: &'static str) -> Self {
        Self { session, prefix }
    }

    pub fn session(&self) -> &Arc<ApiSession> {
        &self.session
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, ApiError> {
        self.request(Method::GET, path, &[], None).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse<T>, ApiError> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, ApiError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn post_sealed<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, ApiError> {
        let body = self.session.seal(body)?;
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn patch_sealed<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, ApiError> {
        let body = self.session.seal(body)?;
        self.request(Method::PATCH, path, &[], Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, ApiError> {
        self.request(Method::DELETE, path, &[], None).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<ApiResponse<T>, ApiError> {
        let seen = self.session.generation.load(Ordering::SeqCst);
        match self.send_once(method.clone(), path, query, body.as_ref()).await {
            Err(e) if e.is_unauthorized() && retries_on_unauthorized(self.prefix, path) => {
                if self.session.refresh_after(seen).await.is_err() {
                    return Err(e);
                }
                self.send_once(method, path, query, body.as_ref()).await
            }
            result => result,
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse<T>, ApiError> {
        let url = self.session.url(self.prefix, path);
        self.session.logger.debug(format!("{method} {url}"));

        let mut request = self.session.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = self.session.access_token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        decode(request.send().await?).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use common::constants::KEY_LEN;
    use common::crypto::SealedPayload;
    use ntest::timeout;
    use std::sync::Mutex as StdMutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    pub(crate) const TEST_KEY: [u8; KEY_LEN] = [1u8; KEY_LEN];

    pub(crate) type Seen = Arc<StdMutex<Vec<String>>>;

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Answers one connection per scripted reply and records each raw request.
    pub(crate) async fn stub_server(replies: Vec<(u16, &'static str)>) -> (String, Seen) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen: Seen = Arc::new(StdMutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            for (status, body) in replies {
                let (mut stream, _) = listener.accept().await.unwrap();
                let request = read_request(&mut stream).await;
                log.lock().unwrap().push(request);
                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).await.unwrap();
                let _ = stream.shutdown().await;
            }
        });
        (format!("http://{addr}/api"), seen)
    }

    pub(crate) fn session(base_url: &str) -> Arc<ApiSession> {
        ApiSession::new(base_url, PayloadCipher::from_key(TEST_KEY)).unwrap()
    }

    const UNAUTHORIZED: &str =
        r#"{"success":false,"message":"Invalid or expired token","status_code":401}"#;

    #[actix_rt::test]
    #[timeout(10000)]
    async fn error_envelopes_become_server_errors() {
        let (url, _) = stub_server(vec![(
            404,
            r#"{"success":false,"message":"Booking not found","status_code":404}"#,
        )])
        .await;
        let client = BaseApiClient::new(session(&url), "bookings");
        let err = client.get::<Value>("missing/").await.unwrap_err();
        assert_eq!(err.status(), 404);
        assert!(matches!(err, ApiError::Server { message, .. } if message == "Booking not found"));
    }

    #[actix_rt::test]
    #[timeout(10000)]
    async fn unauthorized_requests_refresh_once_and_replay() {
        let (url, seen) = stub_server(vec![
            (401, UNAUTHORIZED),
            (
                200,
                r#"{"success":true,"message":"Token refreshed","status_code":200,"data":{"access_token":"new-access","expires_in":300}}"#,
            ),
            (
                200,
                r#"{"success":true,"message":"Booking statistics retrieved","status_code":200,"data":{"total":2}}"#,
            ),
        ])
        .await;
        let session = session(&url);
        session.store_tokens("old-access".into(), Some("the-refresh".into()));
        let client = BaseApiClient::new(session.clone(), "bookings");

        let response = client.get::<Value>("stats/").await.unwrap();
        assert_eq!(response.data.unwrap()["total"], 2);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen[1].starts_with("POST /api/auth/refresh/"));
        assert!(seen[1].contains("the-refresh"));
        assert!(seen[2].to_lowercase().contains("authorization: bearer new-access"));
        assert!(session.is_logged_in());
    }

    #[actix_rt::test]
    #[timeout(10000)]
    async fn failed_refresh_logs_the_session_out() {
        let (url, seen) = stub_server(vec![(401, UNAUTHORIZED), (401, UNAUTHORIZED)]).await;
        let session = session(&url);
        session.store_tokens("old-access".into(), Some("stale".into()));
        let client = BaseApiClient::new(session.clone(), "bookings");

        let err = client.get::<Value>("stats/").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(!session.is_logged_in());
        assert!(!session.has_token());
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[actix_rt::test]
    #[timeout(10000)]
    async fn sealed_bodies_travel_encrypted() {
        let (url, seen) = stub_server(vec![(
            201,
            r#"{"success":true,"message":"Booking created","status_code":201,"data":{}}"#,
        )])
        .await;
        let client = BaseApiClient::new(session(&url), "bookings");
        client
            .post_sealed::<Value, _>("create/", &serde_json::json!({ "phone": "0400 111 222" }))
            .await
            .unwrap();

        let request = seen.lock().unwrap()[0].clone();
        assert!(!request.contains("0400 111 222"));
        let body = request.split("\r\n\r\n").nth(1).unwrap();
        let sealed: SealedPayload = serde_json::from_str(body).unwrap();
        let opened: Value = PayloadCipher::from_key(TEST_KEY).open_json(&sealed).unwrap();
        assert_eq!(opened["phone"], "0400 111 222");
    }

    #[actix_rt::test]
    #[timeout(15000)]
    async fn unreachable_servers_are_network_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = BaseApiClient::new(session(&format!("http://{addr}/api")), "services");
        let err = client.get::<Value>("").await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(err.status(), 0);
    }

    #[test]
    fn credential_endpoints_do_not_trigger_a_refresh() {
        assert!(!retries_on_unauthorized("auth", "login/"));
        assert!(!retries_on_unauthorized("auth", "refresh/"));
        assert!(retries_on_unauthorized("auth", "me/"));
        assert!(retries_on_unauthorized("bookings", "login/"));
    }
}
