use crate::error::AppError;
use crate::messages::internal_messages::{
    CreateUser, DeleteUser, ExpireCheckout, FindUserByEmail, GetDashboard, GetUser, IssueTokens,
    RecordLogin, RefreshAccess, RevokeTokens, RevokeUser, Session, SetPasswordHash, UpdateUser,
};
use crate::password::validate_new_password;
use crate::server_acceptor::extractors::{AuthUser, ClientMeta, PresentedTokens, SealedJson};
use crate::server_acceptor::responses::{
    ApiResult, auth_cookie, clear_cookie, created, ok, respond, with_cookies,
};
use crate::state::AppState;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use common::constants::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use common::types::user::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
    RegisterRequest, UpdateProfileRequest, UserRole,
};
use tokio::task::spawn_blocking;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register/", post(register))
        .route("/login/", post(login))
        .route("/logout/", post(logout))
        .route("/refresh/", post(refresh))
        .route("/me/", get(me).patch(update_me).delete(delete_me))
        .route("/password/", post(change_password))
        .route("/customer/dashboard/", get(customer_dashboard))
        .route("/provider/dashboard/", get(provider_dashboard))
}

fn looks_like_email(email: &str) -> bool {
    match email.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

async fn hash_password(state: &AppState, password: String) -> Result<String, AppError> {
    let hasher = state.passwords;
    spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

async fn verify_password(state: &AppState, password: String, encoded: String) -> Result<bool, AppError> {
    let hasher = state.passwords;
    spawn_blocking(move || hasher.verify(&password, &encoded))
        .await
        .map_err(|e| AppError::Internal(format!("password check failed: {e}")))
}

async fn reject_absent(state: &AppState, password: String) -> Result<(), AppError> {
    let hasher = state.passwords;
    spawn_blocking(move || hasher.verify_absent(&password))
        .await
        .map(|_| ())
        .map_err(|e| AppError::Internal(format!("password check failed: {e}")))
}

fn session_cookies(state: &AppState, access_token: &str, refresh_token: Option<&str>) -> Vec<String> {
    let secure = !state.config.debug;
    let mut cookies = vec![auth_cookie(
        ACCESS_TOKEN_COOKIE,
        access_token,
        state.config.access_token_ttl,
        secure,
    )];
    if let Some(refresh_token) = refresh_token {
        cookies.push(auth_cookie(
            REFRESH_TOKEN_COOKIE,
            refresh_token,
            state.config.refresh_token_ttl,
            secure,
        ));
    }
    cookies
}

fn cleared_cookies(state: &AppState) -> Vec<String> {
    let secure = !state.config.debug;
    vec![
        clear_cookie(ACCESS_TOKEN_COOKIE, secure),
        clear_cookie(REFRESH_TOKEN_COOKIE, secure),
    ]
}

async fn register(
    State(state): State<AppState>,
    meta: ClientMeta,
    SealedJson(request): SealedJson<RegisterRequest>,
) -> ApiResult {
    if !looks_like_email(&request.email) {
        return Err(AppError::BadRequest("Enter a valid email address".to_string()));
    }
    if request.username.trim().is_empty() {
        return Err(AppError::BadRequest("Username is required".to_string()));
    }
    validate_new_password(&request.password, &request.password_confirm)
        .map_err(AppError::BadRequest)?;
    if !request.consent {
        return Err(AppError::BadRequest(
            "You must accept the privacy policy to register".to_string(),
        ));
    }

    let password_hash = hash_password(&state, request.password.clone()).await?;
    let user = state
        .storage
        .send(CreateUser {
            request,
            password_hash,
            ip_address: meta.ip_address,
            user_agent: meta.user_agent,
        })
        .await??;
    created(user, "Registration successful")
}

async fn login(State(state): State<AppState>, SealedJson(request): SealedJson<LoginRequest>) -> ApiResult {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let found = state
        .storage
        .send(FindUserByEmail {
            email: request.email,
        })
        .await?;
    let Ok(user) = found else {
        reject_absent(&state, request.password).await?;
        return Err(invalid());
    };
    if !verify_password(&state, request.password, user.password_hash.clone()).await? {
        return Err(invalid());
    }
    if let Some(role) = request.role {
        if role != user.role {
            return Err(AppError::Forbidden(format!(
                "This account is not registered as a {}",
                role.label().to_lowercase()
            )));
        }
    }

    state.storage.send(RecordLogin { user_id: user.id }).await??;
    let tokens = state
        .sessions
        .send(IssueTokens {
            session: Session {
                user_id: user.id,
                role: user.role,
            },
        })
        .await?;
    let mut user = user.to_dto();
    user.last_login = Some(chrono::Utc::now());

    let cookies = session_cookies(&state, &tokens.access_token, Some(&tokens.refresh_token));
    let response = respond(
        StatusCode::OK,
        LoginResponse {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        },
        "Login successful",
    );
    with_cookies(response, &cookies)
}

async fn logout(
    State(state): State<AppState>,
    tokens: PresentedTokens,
    SealedJson(body): SealedJson<RefreshRequest>,
) -> ApiResult {
    state
        .sessions
        .send(RevokeTokens {
            access_token: tokens.access_token,
            refresh_token: body.refresh_token.or(tokens.refresh_token),
        })
        .await?;
    with_cookies(respond(StatusCode::OK, (), "Logged out"), &cleared_cookies(&state))
}

async fn refresh(
    State(state): State<AppState>,
    tokens: PresentedTokens,
    SealedJson(body): SealedJson<RefreshRequest>,
) -> ApiResult {
    let refresh_token = body
        .refresh_token
        .or(tokens.refresh_token)
        .ok_or_else(|| AppError::Unauthorized("Refresh token was not provided".to_string()))?;
    let access_token = state
        .sessions
        .send(RefreshAccess { refresh_token })
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token".to_string()))?;

    let cookies = session_cookies(&state, &access_token, None);
    let response = respond(
        StatusCode::OK,
        RefreshResponse {
            access_token,
            expires_in: state.config.access_token_ttl.as_secs(),
        },
        "Token refreshed",
    );
    with_cookies(response, &cookies)
}

async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult {
    let record = state.storage.send(GetUser { user_id: user.id() }).await??;
    ok(record.to_dto(), "Profile retrieved")
}

async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    SealedJson(update): SealedJson<UpdateProfileRequest>,
) -> ApiResult {
    let profile = state
        .storage
        .send(UpdateUser {
            user_id: user.id(),
            update,
        })
        .await??;
    ok(profile, "Profile updated")
}

async fn delete_me(State(state): State<AppState>, user: AuthUser) -> ApiResult {
    let open_sessions = state.storage.send(DeleteUser { user_id: user.id() }).await??;
    for session_id in open_sessions {
        state.payments.do_send(ExpireCheckout { session_id });
    }
    state.sessions.send(RevokeUser { user_id: user.id() }).await?;
    with_cookies(
        respond(StatusCode::OK, (), "Account deleted"),
        &cleared_cookies(&state),
    )
}

async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    SealedJson(request): SealedJson<ChangePasswordRequest>,
) -> ApiResult {
    let record = state.storage.send(GetUser { user_id: user.id() }).await??;
    if !verify_password(&state, request.current_password, record.password_hash).await? {
        return Err(AppError::BadRequest("Current password is incorrect".to_string()));
    }
    validate_new_password(&request.new_password, &request.new_password_confirm)
        .map_err(AppError::BadRequest)?;

    let password_hash = hash_password(&state, request.new_password).await?;
    state
        .storage
        .send(SetPasswordHash {
            user_id: user.id(),
            password_hash,
        })
        .await??;
    ok((), "Password changed")
}

async fn dashboard(state: &AppState, user: AuthUser, role: UserRole) -> ApiResult {
    user.require(role)?;
    let data = state
        .storage
        .send(GetDashboard {
            user_id: user.id(),
            role,
        })
        .await??;
    ok(data, "Dashboard retrieved")
}

async fn customer_dashboard(State(state): State<AppState>, user: AuthUser) -> ApiResult {
    dashboard(&state, user, UserRole::Customer).await
}

async fn provider_dashboard(State(state): State<AppState>, user: AuthUser) -> ApiResult {
    dashboard(&state, user, UserRole::Provider).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_is_checked() {
        assert!(looks_like_email("ana@example.com"));
        assert!(!looks_like_email("ana.example.com"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ana@localhost"));
        assert!(!looks_like_email("ana@example."));
    }
}
