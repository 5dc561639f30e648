use crate::api::base::{ApiSession, BaseApiClient};
use crate::error::ApiError;
use common::types::service::ServiceDTO;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct ServicesApi {
    base: BaseApiClient,
}

impl ServicesApi {
    pub fn new(session: Arc<ApiSession>) -> Self {
        Self {
            base: BaseApiClient::new(session, "services"),
        }
    }

    pub async fn list(&self) -> Result<Vec<ServiceDTO>, ApiError> {
        Ok(self.base.get("").await?.data.unwrap_or_default())
    }

    pub async fn get(&self, id: Uuid) -> Result<ServiceDTO, ApiError> {
        self.base
            .get(&format!("{id}/"))
            .await?
            .data
            .ok_or_else(|| ApiError::Decode("service missing from response".to_string()))
    }
}
