use crate::error::StorageError;
use crate::server_actors::records::{ConsentLog, UserRecord};
use actix::prelude::*;
use common::messages::payment_messages::{CheckoutCreated, CreateCheckout, SessionStatus};
use common::types::booking::{
    BookingDTO, BookingFilter, BookingStats, CreateBookingRequest, UpdateBookingRequest,
};
use common::types::dashboard::DashboardData;
use common::types::payment::{PaymentDTO, PaymentQrData};
use common::types::service::ServiceDTO;
use common::types::user::{RegisterRequest, UpdateProfileRequest, UserDTO, UserRole};
use uuid::Uuid;

/////////////////////////////////////////////////////////////////////
// Users
/////////////////////////////////////////////////////////////////////

/// Stores a validated registration together with its consent record.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<UserDTO, StorageError>")]
pub struct CreateUser {
    pub request: RegisterRequest,
    pub password_hash: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<UserRecord, StorageError>")]
pub struct FindUserByEmail {
    pub email: String,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<UserRecord, StorageError>")]
pub struct GetUser {
    pub user_id: u64,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<UserDTO, StorageError>")]
pub struct UpdateUser {
    pub user_id: u64,
    pub update: UpdateProfileRequest,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), StorageError>")]
pub struct SetPasswordHash {
    pub user_id: u64,
    pub password_hash: String,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), StorageError>")]
pub struct RecordLogin {
    pub user_id: u64,
}

/// Removes the account, its bookings and payments. Unfinished jobs the user
/// had accepted as a provider go back to the open pool.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<Vec<String>, StorageError>")]
pub struct DeleteUser {
    pub user_id: u64,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Vec<ConsentLog>")]
pub struct GetConsentLogs {
    pub user_id: u64,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<DashboardData, StorageError>")]
pub struct GetDashboard {
    pub user_id: u64,
    pub role: UserRole,
}

/////////////////////////////////////////////////////////////////////
// Services catalog
/////////////////////////////////////////////////////////////////////

#[derive(Message, Debug, Clone)]
#[rtype(result = "Vec<ServiceDTO>")]
pub struct ListServices;

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<ServiceDTO, StorageError>")]
pub struct GetService {
    pub service_id: Uuid,
}

/////////////////////////////////////////////////////////////////////
// Bookings
/////////////////////////////////////////////////////////////////////

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<BookingDTO, StorageError>")]
pub struct CreateBooking {
    pub user_id: u64,
    pub request: CreateBookingRequest,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Vec<BookingDTO>")]
pub struct ListUserBookings {
    pub user_id: u64,
    pub filter: BookingFilter,
}

/// Pending bookings nobody has claimed yet, excluding the provider's own.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Vec<BookingDTO>")]
pub struct ListAvailableBookings {
    pub provider_id: u64,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Vec<BookingDTO>")]
pub struct ListProviderBookings {
    pub provider_id: u64,
    pub filter: BookingFilter,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<BookingDTO, StorageError>")]
pub struct GetBooking {
    pub booking_id: Uuid,
    pub user_id: u64,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<BookingDTO, StorageError>")]
pub struct UpdateBooking {
    pub booking_id: Uuid,
    pub user_id: u64,
    pub update: UpdateBookingRequest,
}

/// Result of a cancellation: the booking plus the checkout session to void, if any.
#[derive(Debug, Clone)]
pub struct CancelledBooking {
    pub booking: BookingDTO,
    pub open_session: Option<String>,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<CancelledBooking, StorageError>")]
pub struct CancelBooking {
    pub booking_id: Uuid,
    pub user_id: u64,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<BookingDTO, StorageError>")]
pub struct AcceptBooking {
    pub booking_id: Uuid,
    pub provider_id: u64,
    pub provider_quote: Option<f64>,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<BookingDTO, StorageError>")]
pub struct StartJob {
    pub booking_id: Uuid,
    pub provider_id: u64,
    pub confirmation_code: String,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<BookingDTO, StorageError>")]
pub struct CompleteJob {
    pub booking_id: Uuid,
    pub provider_id: u64,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "BookingStats")]
pub struct GetBookingStats {
    pub user_id: u64,
    pub role: UserRole,
}

/////////////////////////////////////////////////////////////////////
// Payments
/////////////////////////////////////////////////////////////////////

/// Validates the booking and opens (or reuses) its payment record.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<CheckoutDraft, StorageError>")]
pub struct PrepareCheckout {
    pub booking_id: Uuid,
    pub user_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutDraft {
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub description: String,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), StorageError>")]
pub struct AttachSession {
    pub payment_id: Uuid,
    pub session_id: String,
}

/// Applies a gateway outcome. `session_id` guards against stale sessions.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<PaymentDTO, StorageError>")]
pub struct SettlePayment {
    pub payment_id: Uuid,
    pub session_id: Option<String>,
    pub paid: bool,
    pub payment_intent_id: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<PaymentDTO, StorageError>")]
pub struct GetPaymentBySession {
    pub session_id: String,
    pub user_id: u64,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<PaymentDTO, StorageError>")]
pub struct GetPayment {
    pub payment_id: Uuid,
    pub user_id: u64,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<PaymentQrData, StorageError>")]
pub struct GetPaymentQr {
    pub payment_id: Uuid,
    pub user_id: u64,
}

/////////////////////////////////////////////////////////////////////
// Sessions
/////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: u64,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "TokenPair")]
pub struct IssueTokens {
    pub session: Session,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Option<Session>")]
pub struct Authenticate {
    pub access_token: String,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Option<String>")]
pub struct RefreshAccess {
    pub refresh_token: String,
}

#[derive(Message, Debug, Clone, Default)]
#[rtype(result = "()")]
pub struct RevokeTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "usize")]
pub struct RevokeUser {
    pub user_id: u64,
}

/////////////////////////////////////////////////////////////////////
// Payment gateway link
/////////////////////////////////////////////////////////////////////

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<CheckoutCreated, crate::server_actors::payment_service::GatewayError>")]
pub struct StartCheckout(pub CreateCheckout);

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<SessionStatus, crate::server_actors::payment_service::GatewayError>")]
pub struct QuerySession {
    pub session_id: String,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct ExpireCheckout {
    pub session_id: String,
}

#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "bool")]
pub struct IsGatewayConnected;
