use crate::api::base::{AUTH_PREFIX, ApiSession, BaseApiClient};
use crate::error::ApiError;
use crate::token_refresh::{RefreshFuture, RefreshToken};
use common::types::dashboard::DashboardData;
use common::types::user::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
    RegisterRequest, UpdateProfileRequest, UserDTO, UserRole,
};
use std::sync::Arc;

fn required<T>(data: Option<T>, what: &str) -> Result<T, ApiError> {
    data.ok_or_else(|| ApiError::Decode(format!("{what} missing from response")))
}

#[derive(Clone)]
pub struct AuthApi {
    base: BaseApiClient,
}

impl AuthApi {
    pub fn new(session: Arc<ApiSession>) -> Self {
        Self {
            base: BaseApiClient::new(session, AUTH_PREFIX),
        }
    }

    pub fn session(&self) -> &Arc<ApiSession> {
        self.base.session()
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        role: Option<UserRole>,
    ) -> Result<UserDTO, ApiError> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
            role,
        };
        let response = self.base.post_sealed::<LoginResponse, _>("login/", &request).await?;
        let login = required(response.data, "login data")?;
        self.session()
            .store_tokens(login.access_token, Some(login.refresh_token));
        Ok(login.user)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<UserDTO, ApiError> {
        let response = self.base.post_sealed("register/", request).await?;
        required(response.data, "user")
    }

    pub async fn me(&self) -> Result<UserDTO, ApiError> {
        required(self.base.get("me/").await?.data, "profile")
    }

    pub async fn update_profile(&self, update: &UpdateProfileRequest) -> Result<UserDTO, ApiError> {
        required(self.base.patch_sealed("me/", update).await?.data, "profile")
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ApiError> {
        self.base
            .post_sealed::<serde_json::Value, _>("password/", request)
            .await
            .map(|_| ())
    }

    /// Revokes the session server-side. Local tokens are dropped even if the call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self
            .base
            .post::<serde_json::Value, _>("logout/", &RefreshRequest::default())
            .await;
        self.session().clear();
        result.map(|_| ())
    }

    pub async fn refresh_token(&self) -> Result<RefreshResponse, ApiError> {
        self.session().refresh().await
    }

    pub async fn delete_account(&self) -> Result<(), ApiError> {
        let result = self.base.delete::<serde_json::Value>("me/").await;
        if result.is_ok() {
            self.session().clear();
        }
        result.map(|_| ())
    }

    pub async fn customer_dashboard(&self) -> Result<DashboardData, ApiError> {
        required(self.base.get("customer/dashboard/").await?.data, "dashboard")
    }

    pub async fn provider_dashboard(&self) -> Result<DashboardData, ApiError> {
        required(self.base.get("provider/dashboard/").await?.data, "dashboard")
    }
}

impl RefreshToken for AuthApi {
    fn refresh(&self) -> RefreshFuture {
        let api = self.clone();
        Box::pin(async move { api.refresh_token().await.map(|_| ()) })
    }
}
