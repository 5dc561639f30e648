use crate::api::base::{ApiSession, BaseApiClient};
use crate::error::ApiError;
use common::types::api::{ApiResponse, Paginated};
use common::types::booking::{
    AcceptBookingRequest, BookingDTO, BookingFilter, BookingStats, CreateBookingRequest,
    StartJobRequest, UpdateBookingRequest,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct BookingsApi {
    base: BaseApiClient,
}

fn filter_query(filter: &BookingFilter) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(status) = filter.status {
        query.push(("status", status.as_str().to_string()));
    }
    if let Some(kind) = filter.service_type {
        query.push(("service_type", kind.as_str().to_string()));
    }
    if let Some(page) = filter.page {
        query.push(("page", page.to_string()));
    }
    if let Some(page_size) = filter.page_size {
        query.push(("page_size", page_size.to_string()));
    }
    query
}

fn booking(response: ApiResponse<BookingDTO>) -> Result<BookingDTO, ApiError> {
    response
        .data
        .ok_or_else(|| ApiError::Decode("booking missing from response".to_string()))
}

fn page<T>(response: ApiResponse<Paginated<T>>) -> Paginated<T> {
    response.data.unwrap_or(Paginated {
        count: 0,
        next: None,
        previous: None,
        results: Vec::new(),
    })
}

impl BookingsApi {
    pub fn new(session: Arc<ApiSession>) -> Self {
        Self {
            base: BaseApiClient::new(session, "bookings"),
        }
    }

    /// Follows `next` links from the filter's page until the listing runs out.
    async fn all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        filter: &BookingFilter,
    ) -> Result<Vec<T>, ApiError> {
        let mut filter = filter.clone();
        let mut number = filter.page.unwrap_or(1);
        let mut results = Vec::new();
        loop {
            filter.page = Some(number);
            let current: Paginated<T> = page(self.base.get_with(path, &filter_query(&filter)).await?);
            let last = current.next.is_none() || current.results.is_empty();
            results.extend(current.results);
            if last {
                return Ok(results);
            }
            number += 1;
        }
    }

    pub async fn list_all(&self, filter: &BookingFilter) -> Result<Vec<BookingDTO>, ApiError> {
        self.all_pages("my-bookings/", filter).await
    }

    pub async fn available_all(&self, filter: &BookingFilter) -> Result<Vec<BookingDTO>, ApiError> {
        self.all_pages("provider/available/", filter).await
    }

    pub async fn received_all(&self, filter: &BookingFilter) -> Result<Vec<BookingDTO>, ApiError> {
        self.all_pages("provider/received/", filter).await
    }

    pub async fn create(&self, request: &CreateBookingRequest) -> Result<BookingDTO, ApiError> {
        booking(self.base.post_sealed("create/", request).await?)
    }

    pub async fn list(&self, filter: &BookingFilter) -> Result<Paginated<BookingDTO>, ApiError> {
        Ok(page(self.base.get_with("my-bookings/", &filter_query(filter)).await?))
    }

    pub async fn get(&self, id: Uuid) -> Result<BookingDTO, ApiError> {
        booking(self.base.get(&format!("{id}/")).await?)
    }

    pub async fn update(&self, id: Uuid, update: &UpdateBookingRequest) -> Result<BookingDTO, ApiError> {
        booking(self.base.patch_sealed(&format!("{id}/update/"), update).await?)
    }

    pub async fn cancel(&self, id: Uuid) -> Result<BookingDTO, ApiError> {
        booking(self.base.post(&format!("{id}/cancel/"), &json!({})).await?)
    }

    pub async fn stats(&self) -> Result<BookingStats, ApiError> {
        Ok(self.base.get("stats/").await?.data.unwrap_or_default())
    }

    pub async fn available_tasks(&self, filter: &BookingFilter) -> Result<Paginated<BookingDTO>, ApiError> {
        Ok(page(
            self.base
                .get_with("provider/available/", &filter_query(filter))
                .await?,
        ))
    }

    pub async fn received_orders(&self, filter: &BookingFilter) -> Result<Paginated<BookingDTO>, ApiError> {
        Ok(page(
            self.base
                .get_with("provider/received/", &filter_query(filter))
                .await?,
        ))
    }

    pub async fn accept(&self, id: Uuid, provider_quote: Option<f64>) -> Result<BookingDTO, ApiError> {
        let request = AcceptBookingRequest { provider_quote };
        booking(self.base.post_sealed(&format!("{id}/accept/"), &request).await?)
    }

    pub async fn start_job(&self, id: Uuid, confirmation_code: &str) -> Result<BookingDTO, ApiError> {
        let request = StartJobRequest {
            confirmation_code: confirmation_code.trim().to_string(),
        };
        booking(self.base.post_sealed(&format!("{id}/start/"), &request).await?)
    }

    pub async fn complete_job(&self, id: Uuid) -> Result<BookingDTO, ApiError> {
        booking(self.base.post(&format!("{id}/complete/"), &json!({})).await?)
    }
}
