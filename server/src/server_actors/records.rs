//! Rows kept by the [`Storage`](super::storage::Storage) actor.

use chrono::{DateTime, Utc};
use common::types::booking::ServiceType;
use common::types::booking_status::BookingStatus;
use common::types::payment::PaymentDTO;
use common::types::payment_status::PaymentStatus;
use common::types::user::{UserDTO, UserRole};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: u64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub city: Option<String>,
    pub vaccinated: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn to_dto(&self) -> UserDTO {
        UserDTO {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
            city: self.city.clone(),
            vaccinated: self.vaccinated,
            date_joined: self.date_joined,
            last_login: self.last_login,
        }
    }
}

/// Audit entry written when a user accepts the privacy policy at sign-up.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsentLog {
    pub user_id: u64,
    pub policy_version: String,
    pub consented_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Address and phone are stored sealed with the field cipher.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRecord {
    pub id: Uuid,
    pub user_id: u64,
    pub provider_id: Option<u64>,
    pub service_type: ServiceType,
    pub budget: Option<f64>,
    pub provider_quote: Option<f64>,
    pub address_enc: String,
    pub phone_enc: String,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub start_time: DateTime<Utc>,
    pub duration_hours: u32,
    pub status: BookingStatus,
    pub confirmation_code: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingRecord {
    pub fn price(&self) -> Option<f64> {
        self.provider_quote.or(self.budget)
    }

    pub fn is_assigned_to(&self, provider_id: u64) -> bool {
        self.provider_id == Some(provider_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub user_id: u64,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub payment_method: Option<String>,
    pub qr_token: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    pub fn to_dto(&self) -> PaymentDTO {
        PaymentDTO {
            id: self.id,
            booking: self.booking_id,
            amount: self.amount,
            currency: self.currency.clone(),
            status: self.status,
            session_id: self.session_id.clone(),
            payment_intent_id: self.payment_intent_id.clone(),
            payment_method: self.payment_method.clone(),
            created_at: self.created_at,
            paid_at: self.paid_at,
        }
    }
}
