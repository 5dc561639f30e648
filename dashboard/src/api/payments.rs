use crate::api::base::{ApiSession, BaseApiClient};
use crate::error::ApiError;
use common::types::api::ApiResponse;
use common::types::payment::{
    CheckoutRequest, CheckoutResponse, GatewayConfig, PaymentCancelResponse, PaymentDTO,
    PaymentQrData, PaymentSuccessResponse,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentsApi {
    base: BaseApiClient,
}

fn data<T>(response: ApiResponse<T>) -> Result<T, ApiError> {
    response
        .data
        .ok_or_else(|| ApiError::Decode(format!("empty response: {}", response.message)))
}

impl PaymentsApi {
    pub fn new(session: Arc<ApiSession>) -> Self {
        Self {
            base: BaseApiClient::new(session, "payments"),
        }
    }

    pub async fn gateway_config(&self) -> Result<GatewayConfig, ApiError> {
        data(self.base.get("gateway/config/").await?)
    }

    pub async fn checkout(&self, booking_id: Uuid) -> Result<CheckoutResponse, ApiError> {
        data(
            self.base
                .post_sealed("checkout/", &CheckoutRequest { booking_id })
                .await?,
        )
    }

    pub async fn verify_session(&self, session_id: &str) -> Result<PaymentSuccessResponse, ApiError> {
        let query = [("session_id", session_id.trim().to_string())];
        data(self.base.get_with("success/", &query).await?)
    }

    pub async fn cancel(&self) -> Result<PaymentCancelResponse, ApiError> {
        data(self.base.get("cancel/").await?)
    }

    pub async fn qr_data(&self, payment_id: Uuid) -> Result<PaymentQrData, ApiError> {
        data(self.base.get(&format!("{payment_id}/qr/")).await?)
    }

    pub async fn get(&self, payment_id: Uuid) -> Result<PaymentDTO, ApiError> {
        data(self.base.get(&format!("{payment_id}/")).await?)
    }
}
