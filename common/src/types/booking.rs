use crate::types::booking_status::BookingStatus;
use crate::types::payment_status::PaymentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Cleaning,
    Plumbing,
    Electrical,
    Gardening,
    Other,
}

impl ServiceType {
    pub const ALL: [ServiceType; 5] = [
        ServiceType::Cleaning,
        ServiceType::Plumbing,
        ServiceType::Electrical,
        ServiceType::Gardening,
        ServiceType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Cleaning => "cleaning",
            ServiceType::Plumbing => "plumbing",
            ServiceType::Electrical => "electrical",
            ServiceType::Gardening => "gardening",
            ServiceType::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceType::Cleaning => "Cleaning",
            ServiceType::Plumbing => "Plumbing",
            ServiceType::Electrical => "Electrical",
            ServiceType::Gardening => "Gardening",
            ServiceType::Other => "Other",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ServiceType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown service type '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// A booking as returned by the API.
///
/// `address`, `phone` and `confirmation_code` are only filled in for callers
/// allowed to see them; list endpoints leave them out.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDTO {
    pub id: Uuid,
    pub user: u64,
    pub customer_name: String,
    pub provider: Option<ProviderSummary>,
    pub service_type: ServiceType,
    pub budget: Option<f64>,
    pub provider_quote: Option<f64>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub start_time: DateTime<Utc>,
    pub duration_hours: u32,
    pub status: BookingStatus,
    pub confirmation_code: Option<String>,
    pub notes: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingDTO {
    /// Price the customer pays: the provider's quote wins over the budget.
    pub fn price(&self) -> Option<f64> {
        self.provider_quote.or(self.budget)
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub service_type: ServiceType,
    pub budget: Option<f64>,
    pub address: String,
    pub phone: String,
    pub city: String,
    pub state: Option<String>,
    pub country: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_hours: Option<u32>,
    pub notes: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateBookingRequest {
    pub service_type: Option<ServiceType>,
    pub budget: Option<f64>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_hours: Option<u32>,
    pub notes: Option<String>,
}

impl UpdateBookingRequest {
    pub fn is_empty(&self) -> bool {
        *self == UpdateBookingRequest::default()
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcceptBookingRequest {
    pub provider_quote: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartJobRequest {
    pub confirmation_code: String,
}

/// Query parameters accepted by the booking list endpoints.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub service_type: Option<ServiceType>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &BookingDTO) -> bool {
        self.status.is_none_or(|status| booking.status == status)
            && self
                .service_type
                .is_none_or(|kind| booking.service_type == kind)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingStats {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl BookingStats {
    pub fn record(&mut self, status: BookingStatus) {
        self.total += 1;
        match status {
            BookingStatus::Pending => self.pending += 1,
            BookingStatus::Confirmed => self.confirmed += 1,
            BookingStatus::InProgress => self.in_progress += 1,
            BookingStatus::Completed => self.completed += 1,
            BookingStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn count(&self, status: BookingStatus) -> usize {
        match status {
            BookingStatus::Pending => self.pending,
            BookingStatus::Confirmed => self.confirmed,
            BookingStatus::InProgress => self.in_progress,
            BookingStatus::Completed => self.completed,
            BookingStatus::Cancelled => self.cancelled,
        }
    }
}

impl FromIterator<BookingStatus> for BookingStats {
    fn from_iter<I: IntoIterator<Item = BookingStatus>>(iter: I) -> Self {
        let mut stats = BookingStats::default();
        for status in iter {
            stats.record(status);
        }
        stats
    }
}
