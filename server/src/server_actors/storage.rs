use crate::error::StorageError;
use crate::messages::internal_messages::{
    AcceptBooking, AttachSession, CancelBooking, CancelledBooking, CheckoutDraft, CompleteJob,
    CreateBooking, CreateUser, DeleteUser, FindUserByEmail, GetBooking, GetBookingStats,
    GetConsentLogs, GetDashboard, GetPayment, GetPaymentBySession, GetPaymentQr, GetService,
    GetUser, ListAvailableBookings, ListProviderBookings, ListServices, ListUserBookings,
    PrepareCheckout, RecordLogin, SetPasswordHash, SettlePayment, StartJob, UpdateBooking,
    UpdateUser,
};
use crate::server_actors::records::{BookingRecord, ConsentLog, PaymentRecord, UserRecord};
use actix::prelude::*;
use chrono::Utc;
use colored::Color;
use common::bimap::BiMap;
use common::constants::{
    CONSENT_POLICY_VERSION, DEFAULT_COUNTRY, DEFAULT_CURRENCY, DEFAULT_DURATION_HOURS,
    RECENT_BOOKINGS_LIMIT,
};
use common::crypto::PayloadCipher;
use common::logger::Logger;
use common::types::booking::{BookingDTO, BookingStats, ProviderSummary};
use common::types::booking_status::BookingStatus;
use common::types::dashboard::DashboardData;
use common::types::payment::{PaymentDTO, PaymentQrData};
use common::types::payment_status::PaymentStatus;
use common::types::service::ServiceDTO;
use common::types::user::{UserDTO, UserRole};
use common::utils::{clean_city, generate_confirmation_code, generate_qr_token};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Who is looking at a booking, and how much of it they get to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    /// Full record including address, phone and confirmation code.
    Owner,
    /// Full record minus the confirmation code.
    AssignedProvider,
    /// List entry: no address or phone. The code is kept for the owner's own lists.
    Listing { owner: bool },
}

/// The `Storage` actor owns every account, booking and payment.
///
/// All mutations go through its mailbox, so each handler sees a consistent
/// snapshot and lifecycle checks cannot race with each other.
///
/// # Responsibilities
/// - Registers users, records their consent and keeps the log after deletion.
/// - Holds the service catalog.
/// - Drives bookings through pending, confirmed, in progress and completed.
/// - Seals address and phone at rest and decides what each viewer may see.
/// - Tracks payments and the gateway checkout session attached to each one.
/// - Builds per-role dashboards and status counts.
pub struct Storage {
    /// Users by id.
    users: HashMap<u64, UserRecord>,
    /// Lower-cased email to user id.
    emails: HashMap<String, u64>,
    /// Append-only record of accepted privacy policies.
    consent_logs: Vec<ConsentLog>,
    /// Service catalog.
    services: Vec<ServiceDTO>,
    /// Bookings by id.
    bookings: HashMap<Uuid, BookingRecord>,
    /// Payments by id.
    payments: HashMap<Uuid, PaymentRecord>,
    /// At most one payment per booking.
    payment_by_booking: HashMap<Uuid, Uuid>,
    /// Gateway checkout session id to payment id.
    checkout_sessions: BiMap<String, Uuid>,
    /// Next id handed to a registering user.
    next_user_id: u64,
    /// Cipher for address and phone fields.
    field_cipher: Arc<PayloadCipher>,
    /// Logger for storage events.
    logger: Logger,
}

impl Storage {
    /// Creates an empty `Storage` with the default service catalog.
    ///
    /// # Arguments
    /// * `field_cipher` - Cipher used to seal sensitive booking fields.
    pub fn new(field_cipher: Arc<PayloadCipher>) -> Self {
        Self {
            users: HashMap::new(),
            emails: HashMap::new(),
            consent_logs: Vec::new(),
            services: default_services(),
            bookings: HashMap::new(),
            payments: HashMap::new(),
            payment_by_booking: HashMap::new(),
            checkout_sessions: BiMap::new(),
            next_user_id: 1,
            field_cipher,
            logger: Logger::new("Storage", Color::White),
        }
    }

    fn seal(&self, value: &str) -> Result<String, StorageError> {
        self.field_cipher
            .encrypt(value)
            .map_err(|e| StorageError::Crypto(e.to_string()))
    }

    fn unseal(&self, value: &str) -> Result<String, StorageError> {
        self.field_cipher
            .decrypt(value)
            .map_err(|e| StorageError::Crypto(e.to_string()))
    }

    fn user(&self, user_id: u64) -> Result<&UserRecord, StorageError> {
        self.users.get(&user_id).ok_or(StorageError::NotFound("User"))
    }

    /// Looks up a booking visible to `user_id` (owner or assigned provider).
    fn visible_booking(&self, booking_id: Uuid, user_id: u64) -> Result<&BookingRecord, StorageError> {
        self.bookings
            .get(&booking_id)
            .filter(|b| b.user_id == user_id || b.is_assigned_to(user_id))
            .ok_or(StorageError::NotFound("Booking"))
    }

    /// A booking the customer owns; the assigned provider gets `Forbidden`.
    fn owned_booking_mut(
        &mut self,
        booking_id: Uuid,
        user_id: u64,
        action: &str,
    ) -> Result<&mut BookingRecord, StorageError> {
        let booking = self
            .bookings
            .get_mut(&booking_id)
            .filter(|b| b.user_id == user_id || b.is_assigned_to(user_id))
            .ok_or(StorageError::NotFound("Booking"))?;
        if booking.user_id != user_id {
            return Err(StorageError::Forbidden(format!(
                "Only the customer who made this booking can {action} it"
            )));
        }
        Ok(booking)
    }

    /// A booking assigned to the provider; the owner gets `Forbidden`.
    fn assigned_booking_mut(
        &mut self,
        booking_id: Uuid,
        provider_id: u64,
    ) -> Result<&mut BookingRecord, StorageError> {
        let booking = self
            .bookings
            .get_mut(&booking_id)
            .filter(|b| b.user_id == provider_id || b.is_assigned_to(provider_id))
            .ok_or(StorageError::NotFound("Booking"))?;
        if !booking.is_assigned_to(provider_id) {
            return Err(StorageError::Forbidden(
                "Only the assigned provider can do this".to_string(),
            ));
        }
        Ok(booking)
    }

    fn provider_summary(&self, provider_id: Option<u64>) -> Option<ProviderSummary> {
        let provider = self.users.get(&provider_id?)?;
        Some(ProviderSummary {
            id: provider.id,
            name: provider.to_dto().full_name(),
            email: provider.email.clone(),
        })
    }

    /// Unseals and shapes a record for the given viewer.
    fn booking_dto(&self, record: &BookingRecord, view: View) -> Result<BookingDTO, StorageError> {
        let detailed = matches!(view, View::Owner | View::AssignedProvider);
        let show_code = matches!(view, View::Owner | View::Listing { owner: true });
        let (address, phone) = if detailed {
            (
                Some(self.unseal(&record.address_enc)?),
                Some(self.unseal(&record.phone_enc)?),
            )
        } else {
            (None, None)
        };
        let customer_name = self
            .users
            .get(&record.user_id)
            .map(|u| u.to_dto().full_name())
            .unwrap_or_default();
        let payment_status = self
            .payment_by_booking
            .get(&record.id)
            .and_then(|id| self.payments.get(id))
            .map(|p| p.status);

        Ok(BookingDTO {
            id: record.id,
            user: record.user_id,
            customer_name,
            provider: self.provider_summary(record.provider_id),
            service_type: record.service_type,
            budget: record.budget,
            provider_quote: record.provider_quote,
            address,
            phone,
            city: record.city.clone(),
            state: record.state.clone(),
            country: record.country.clone(),
            start_time: record.start_time,
            duration_hours: record.duration_hours,
            status: record.status,
            confirmation_code: show_code.then(|| record.confirmation_code.clone()),
            notes: record.notes.clone(),
            payment_status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Renders a list of bookings newest first. Rows that fail to render are logged and skipped.
    fn listing<'a>(
        &self,
        records: impl Iterator<Item = &'a BookingRecord>,
        viewer: u64,
    ) -> Vec<BookingDTO> {
        let mut records: Vec<&BookingRecord> = records.collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
            .into_iter()
            .filter_map(|record| {
                let view = View::Listing {
                    owner: record.user_id == viewer,
                };
                match self.booking_dto(record, view) {
                    Ok(dto) => Some(dto),
                    Err(e) => {
                        self.logger
                            .error(format!("Skipping booking {}: {}", record.id, e));
                        None
                    }
                }
            })
            .collect()
    }

    fn bookings_for(&self, user_id: u64, role: UserRole) -> impl Iterator<Item = &BookingRecord> {
        self.bookings.values().filter(move |b| match role {
            UserRole::Customer => b.user_id == user_id,
            UserRole::Provider => b.is_assigned_to(user_id),
        })
    }

    fn payment_for_user(&self, payment_id: Uuid, user_id: u64) -> Result<&PaymentRecord, StorageError> {
        self.payments
            .get(&payment_id)
            .filter(|p| p.user_id == user_id)
            .ok_or(StorageError::NotFound("Payment"))
    }

    /// Cancels or refunds the payment attached to a booking. Returns the
    /// checkout session that should be expired at the gateway, if one was open.
    fn release_payment(&mut self, booking_id: Uuid) -> Option<String> {
        let payment_id = *self.payment_by_booking.get(&booking_id)?;
        let payment = self.payments.get_mut(&payment_id)?;

        if payment.status.can_transition_to(PaymentStatus::Cancelled) {
            payment.status = PaymentStatus::Cancelled;
            self.logger
                .info(format!("Payment {payment_id} cancelled with its booking"));
            return self.checkout_sessions.remove_by_value(&payment_id);
        }
        if payment.status.can_transition_to(PaymentStatus::Refunded) {
            payment.status = PaymentStatus::Refunded;
            self.logger
                .info(format!("Payment {payment_id} refunded after cancellation"));
        }
        None
    }

    fn remove_booking(&mut self, booking_id: Uuid) -> Option<String> {
        self.bookings.remove(&booking_id);
        let payment_id = self.payment_by_booking.remove(&booking_id)?;
        let payment = self.payments.remove(&payment_id)?;
        let session = self.checkout_sessions.remove_by_value(&payment_id);
        session.filter(|_| payment.status.can_transition_to(PaymentStatus::Cancelled))
    }
}

fn default_services() -> Vec<ServiceDTO> {
    [
        ("House Cleaning", "Full home clean, kitchen and bathrooms included", 150.0, "Cleaning", 4),
        ("Plumbing Repair", "Leaks, blocked drains and tap replacements", 80.0, "Maintenance", 2),
        ("Emergency Locksmith", "Lock-outs and lock changes, same day", 120.0, "Emergency", 1),
        ("Garden Maintenance", "Mowing, pruning and green waste removal", 60.0, "Maintenance", 3),
    ]
    .into_iter()
    .map(|(title, description, price, category, hours)| ServiceDTO {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: Some(description.to_string()),
        price,
        category: category.to_string(),
        is_active: true,
        estimated_duration: Some(hours),
    })
    .collect()
}

fn required(field: &str, value: &str) -> Result<String, StorageError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StorageError::Invalid(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn positive(field: &str, amount: Option<f64>) -> Result<Option<f64>, StorageError> {
    match amount {
        Some(value) if !(value.is_finite() && value > 0.0) => Err(StorageError::Invalid(format!(
            "{field} must be greater than zero"
        ))),
        other => Ok(other),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Actor for Storage {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        self.logger.info(format!(
            "Storage ready with {} catalog services",
            self.services.len()
        ));
    }
}

/////////////////////////////////////////////////////////////////////
// Users
/////////////////////////////////////////////////////////////////////

/// Handles registration: rejects taken emails and usernames, stores the consent log.
impl Handler<CreateUser> for Storage {
    type Result = Result<UserDTO, StorageError>;

    fn handle(&mut self, msg: CreateUser, _ctx: &mut Self::Context) -> Self::Result {
        let request = msg.request;
        let email = required("Email", &request.email)?.to_lowercase();
        let username = required("Username", &request.username)?;

        if self.emails.contains_key(&email) {
            return Err(StorageError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }
        if self
            .users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&username))
        {
            return Err(StorageError::Conflict(
                "A user with this username already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let id = self.next_user_id;
        self.next_user_id += 1;

        let user = UserRecord {
            id,
            email: email.clone(),
            username,
            password_hash: msg.password_hash,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            role: request.role,
            city: non_blank(request.city.map(|c| clean_city(&c))),
            vaccinated: request.vaccinated,
            date_joined: now,
            last_login: None,
        };
        let dto = user.to_dto();
        self.users.insert(id, user);
        self.emails.insert(email, id);
        self.consent_logs.push(ConsentLog {
            user_id: id,
            policy_version: CONSENT_POLICY_VERSION.to_string(),
            consented_at: now,
            ip_address: msg.ip_address,
            user_agent: msg.user_agent,
        });

        self.logger
            .info(format!("Registered {} #{} ({})", dto.role, id, dto.email));
        Ok(dto)
    }
}

/// Handles lookups by email, case-insensitively.
impl Handler<FindUserByEmail> for Storage {
    type Result = Result<UserRecord, StorageError>;

    fn handle(&mut self, msg: FindUserByEmail, _ctx: &mut Self::Context) -> Self::Result {
        let email = msg.email.trim().to_lowercase();
        self.emails
            .get(&email)
            .and_then(|id| self.users.get(id))
            .cloned()
            .ok_or(StorageError::NotFound("User"))
    }
}

/// Handles requests to get a user by ID.
impl Handler<GetUser> for Storage {
    type Result = Result<UserRecord, StorageError>;

    fn handle(&mut self, msg: GetUser, _ctx: &mut Self::Context) -> Self::Result {
        self.user(msg.user_id).cloned()
    }
}

/// Handles profile updates.
impl Handler<UpdateUser> for Storage {
    type Result = Result<UserDTO, StorageError>;

    fn handle(&mut self, msg: UpdateUser, _ctx: &mut Self::Context) -> Self::Result {
        let user = self
            .users
            .get_mut(&msg.user_id)
            .ok_or(StorageError::NotFound("User"))?;
        let update = msg.update;

        if let Some(first_name) = update.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name.trim().to_string();
        }
        if let Some(city) = update.city {
            user.city = non_blank(Some(clean_city(&city)));
        }
        if let Some(vaccinated) = update.vaccinated {
            user.vaccinated = vaccinated;
        }
        Ok(user.to_dto())
    }
}

/// Handles replacing a user's password hash.
impl Handler<SetPasswordHash> for Storage {
    type Result = Result<(), StorageError>;

    fn handle(&mut self, msg: SetPasswordHash, _ctx: &mut Self::Context) -> Self::Result {
        let user = self
            .users
            .get_mut(&msg.user_id)
            .ok_or(StorageError::NotFound("User"))?;
        user.password_hash = msg.password_hash;
        self.logger
            .info(format!("Password changed for user #{}", msg.user_id));
        Ok(())
    }
}

/// Stamps the user's last login time.
impl Handler<RecordLogin> for Storage {
    type Result = Result<(), StorageError>;

    fn handle(&mut self, msg: RecordLogin, _ctx: &mut Self::Context) -> Self::Result {
        let user = self
            .users
            .get_mut(&msg.user_id)
            .ok_or(StorageError::NotFound("User"))?;
        user.last_login = Some(Utc::now());
        Ok(())
    }
}

/// Handles account deletion. Customers lose their bookings and payments;
/// a provider's open jobs go back to pending.
impl Handler<DeleteUser> for Storage {
    type Result = Result<Vec<String>, StorageError>;

    fn handle(&mut self, msg: DeleteUser, _ctx: &mut Self::Context) -> Self::Result {
        let user = self
            .users
            .remove(&msg.user_id)
            .ok_or(StorageError::NotFound("User"))?;
        self.emails.remove(&user.email);

        let owned: Vec<Uuid> = self
            .bookings
            .values()
            .filter(|b| b.user_id == user.id)
            .map(|b| b.id)
            .collect();
        let open_sessions: Vec<String> = owned
            .into_iter()
            .filter_map(|id| self.remove_booking(id))
            .collect();

        let now = Utc::now();
        let mut released = 0;
        for booking in self.bookings.values_mut() {
            if booking.is_assigned_to(user.id)
                && matches!(
                    booking.status,
                    BookingStatus::Confirmed | BookingStatus::InProgress
                )
            {
                booking.provider_id = None;
                booking.provider_quote = None;
                booking.status = BookingStatus::Pending;
                booking.updated_at = now;
                released += 1;
            }
        }

        self.logger.info(format!(
            "Deleted user #{} ({}); {} accepted jobs returned to the pool",
            user.id, user.email, released
        ));
        Ok(open_sessions)
    }
}

/// Handles requests for a user's consent history.
impl Handler<GetConsentLogs> for Storage {
    type Result = Vec<ConsentLog>;

    fn handle(&mut self, msg: GetConsentLogs, _ctx: &mut Self::Context) -> Self::Result {
        self.consent_logs
            .iter()
            .filter(|log| log.user_id == msg.user_id)
            .cloned()
            .collect()
    }
}

/// Builds the dashboard for the user's role.
impl Handler<GetDashboard> for Storage {
    type Result = Result<DashboardData, StorageError>;

    fn handle(&mut self, msg: GetDashboard, _ctx: &mut Self::Context) -> Self::Result {
        let user = self.user(msg.user_id)?.to_dto();
        let stats: BookingStats = self
            .bookings_for(msg.user_id, msg.role)
            .map(|b| b.status)
            .collect();
        let mut recent_bookings = self.listing(self.bookings_for(msg.user_id, msg.role), msg.user_id);
        recent_bookings.truncate(RECENT_BOOKINGS_LIMIT);

        let earnings = (msg.role == UserRole::Provider).then(|| {
            self.bookings_for(msg.user_id, msg.role)
                .filter(|b| b.status == BookingStatus::Completed)
                .filter_map(BookingRecord::price)
                .sum::<f64>()
        });

        Ok(DashboardData {
            user,
            stats,
            recent_bookings,
            earnings,
        })
    }
}

/////////////////////////////////////////////////////////////////////
// Services catalog
/////////////////////////////////////////////////////////////////////

/// Handles requests to get the whole catalog.
impl Handler<ListServices> for Storage {
    type Result = Vec<ServiceDTO>;

    fn handle(&mut self, _msg: ListServices, _ctx: &mut Self::Context) -> Self::Result {
        self.services.iter().filter(|s| s.is_active).cloned().collect()
    }
}

/// Handles requests to get a service by ID.
impl Handler<GetService> for Storage {
    type Result = Result<ServiceDTO, StorageError>;

    fn handle(&mut self, msg: GetService, _ctx: &mut Self::Context) -> Self::Result {
        self.services
            .iter()
            .find(|s| s.id == msg.service_id && s.is_active)
            .cloned()
            .ok_or(StorageError::NotFound("Service"))
    }
}

/////////////////////////////////////////////////////////////////////
// Bookings
/////////////////////////////////////////////////////////////////////

/// Handles creating a pending booking with a fresh confirmation code.
impl Handler<CreateBooking> for Storage {
    type Result = Result<BookingDTO, StorageError>;

    fn handle(&mut self, msg: CreateBooking, _ctx: &mut Self::Context) -> Self::Result {
        self.user(msg.user_id)?;
        let request = msg.request;
        let now = Utc::now();

        if request.start_time <= now {
            return Err(StorageError::Invalid(
                "Start time must be in the future".to_string(),
            ));
        }
        let duration_hours = request.duration_hours.unwrap_or(DEFAULT_DURATION_HOURS);
        if duration_hours < 1 {
            return Err(StorageError::Invalid(
                "Duration must be at least one hour".to_string(),
            ));
        }
        let budget = positive("Budget", request.budget)?;
        let address = required("Address", &request.address)?;
        let phone = required("Phone", &request.phone)?;
        let city = required("City", &clean_city(&request.city))?;

        let record = BookingRecord {
            id: Uuid::new_v4(),
            user_id: msg.user_id,
            provider_id: None,
            service_type: request.service_type,
            budget,
            provider_quote: None,
            address_enc: self.seal(&address)?,
            phone_enc: self.seal(&phone)?,
            city,
            state: non_blank(request.state).map(|s| s.to_uppercase()),
            country: non_blank(request.country)
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            start_time: request.start_time,
            duration_hours,
            status: BookingStatus::Pending,
            confirmation_code: generate_confirmation_code(),
            notes: non_blank(request.notes),
            created_at: now,
            updated_at: now,
        };

        let dto = self.booking_dto(&record, View::Owner)?;
        self.logger.info(format!(
            "Booking {} created by user #{} ({})",
            record.id, record.user_id, record.service_type
        ));
        self.bookings.insert(record.id, record);
        Ok(dto)
    }
}

/// Lists the bookings a user owns or is assigned to.
impl Handler<ListUserBookings> for Storage {
    type Result = Vec<BookingDTO>;

    fn handle(&mut self, msg: ListUserBookings, _ctx: &mut Self::Context) -> Self::Result {
        self.listing(self.bookings_for(msg.user_id, UserRole::Customer), msg.user_id)
            .into_iter()
            .filter(|b| msg.filter.matches(b))
            .collect()
    }
}

/// Lists pending bookings with no provider yet.
impl Handler<ListAvailableBookings> for Storage {
    type Result = Vec<BookingDTO>;

    fn handle(&mut self, msg: ListAvailableBookings, _ctx: &mut Self::Context) -> Self::Result {
        let open = self.bookings.values().filter(|b| {
            b.status == BookingStatus::Pending
                && b.provider_id.is_none()
                && b.user_id != msg.provider_id
        });
        let mut available = self.listing(open, msg.provider_id);
        available.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        available
    }
}

/// Lists the bookings assigned to a provider.
impl Handler<ListProviderBookings> for Storage {
    type Result = Vec<BookingDTO>;

    fn handle(&mut self, msg: ListProviderBookings, _ctx: &mut Self::Context) -> Self::Result {
        self.listing(
            self.bookings_for(msg.provider_id, UserRole::Provider),
            msg.provider_id,
        )
        .into_iter()
        .filter(|b| msg.filter.matches(b))
        .collect()
    }
}

/// Handles requests to get a booking visible to the user.
impl Handler<GetBooking> for Storage {
    type Result = Result<BookingDTO, StorageError>;

    fn handle(&mut self, msg: GetBooking, _ctx: &mut Self::Context) -> Self::Result {
        let record = self.visible_booking(msg.booking_id, msg.user_id)?;
        let view = if record.user_id == msg.user_id {
            View::Owner
        } else {
            View::AssignedProvider
        };
        self.booking_dto(record, view)
    }
}

/// Handles owner edits while the booking is pending or confirmed.
impl Handler<UpdateBooking> for Storage {
    type Result = Result<BookingDTO, StorageError>;

    fn handle(&mut self, msg: UpdateBooking, _ctx: &mut Self::Context) -> Self::Result {
        let status = self
            .owned_booking_mut(msg.booking_id, msg.user_id, "update")?
            .status;
        if !status.is_editable() {
            return Err(StorageError::Invalid(format!(
                "{status} bookings can no longer be updated"
            )));
        }
        let update = msg.update;
        if update.is_empty() {
            return Err(StorageError::Invalid("No changes supplied".to_string()));
        }
        if update.start_time.is_some_and(|start| start <= Utc::now()) {
            return Err(StorageError::Invalid(
                "Start time must be in the future".to_string(),
            ));
        }
        if update.duration_hours.is_some_and(|hours| hours < 1) {
            return Err(StorageError::Invalid(
                "Duration must be at least one hour".to_string(),
            ));
        }
        positive("Budget", update.budget)?;
        let address = match &update.address {
            Some(address) => Some(self.seal(&required("Address", address)?)?),
            None => None,
        };
        let phone = match &update.phone {
            Some(phone) => Some(self.seal(&required("Phone", phone)?)?),
            None => None,
        };
        let city = match &update.city {
            Some(city) => Some(required("City", &clean_city(city))?),
            None => None,
        };

        let booking = self.owned_booking_mut(msg.booking_id, msg.user_id, "update")?;
        if let Some(service_type) = update.service_type {
            booking.service_type = service_type;
        }
        if update.budget.is_some() {
            booking.budget = update.budget;
        }
        if let Some(address) = address {
            booking.address_enc = address;
        }
        if let Some(phone) = phone {
            booking.phone_enc = phone;
        }
        if let Some(city) = city {
            booking.city = city;
        }
        if let Some(state) = update.state {
            booking.state = non_blank(Some(state)).map(|s| s.to_uppercase());
        }
        if let Some(country) = non_blank(update.country) {
            booking.country = country.to_uppercase();
        }
        if let Some(start_time) = update.start_time {
            booking.start_time = start_time;
        }
        if let Some(hours) = update.duration_hours {
            booking.duration_hours = hours;
        }
        if let Some(notes) = update.notes {
            booking.notes = non_blank(Some(notes));
        }
        booking.updated_at = Utc::now();

        let record = booking.clone();
        self.logger.info(format!("Booking {} updated", record.id));
        self.booking_dto(&record, View::Owner)
    }
}

/// Handles cancellation and releases the booking's payment.
impl Handler<CancelBooking> for Storage {
    type Result = Result<CancelledBooking, StorageError>;

    fn handle(&mut self, msg: CancelBooking, _ctx: &mut Self::Context) -> Self::Result {
        let booking = self.owned_booking_mut(msg.booking_id, msg.user_id, "cancel")?;
        if !booking.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(StorageError::Invalid(format!(
                "{} bookings cannot be cancelled",
                booking.status
            )));
        }
        booking.status = BookingStatus::Cancelled;
        booking.updated_at = Utc::now();
        let record = booking.clone();

        let open_session = self.release_payment(record.id);
        self.logger.info(format!("Booking {} cancelled", record.id));
        Ok(CancelledBooking {
            booking: self.booking_dto(&record, View::Owner)?,
            open_session,
        })
    }
}

/// Assigns a pending booking to a provider, optionally with a quote.
impl Handler<AcceptBooking> for Storage {
    type Result = Result<BookingDTO, StorageError>;

    fn handle(&mut self, msg: AcceptBooking, _ctx: &mut Self::Context) -> Self::Result {
        if self.user(msg.provider_id)?.role != UserRole::Provider {
            return Err(StorageError::Forbidden(
                "Only providers can accept bookings".to_string(),
            ));
        }
        let quote = positive("Quote", msg.provider_quote)?;

        let booking = self
            .bookings
            .get_mut(&msg.booking_id)
            .ok_or(StorageError::NotFound("Booking"))?;
        if booking.user_id == msg.provider_id {
            return Err(StorageError::Forbidden(
                "You cannot accept your own booking".to_string(),
            ));
        }
        if booking.status != BookingStatus::Pending || booking.provider_id.is_some() {
            return Err(StorageError::Conflict(
                "This booking is no longer available".to_string(),
            ));
        }

        booking.provider_id = Some(msg.provider_id);
        booking.provider_quote = quote;
        booking.status = BookingStatus::Confirmed;
        booking.updated_at = Utc::now();
        let record = booking.clone();

        self.logger.info(format!(
            "Booking {} accepted by provider #{}",
            record.id, msg.provider_id
        ));
        self.booking_dto(&record, View::AssignedProvider)
    }
}

/// Moves a confirmed booking to in progress once the code matches.
impl Handler<StartJob> for Storage {
    type Result = Result<BookingDTO, StorageError>;

    fn handle(&mut self, msg: StartJob, _ctx: &mut Self::Context) -> Self::Result {
        let booking = self.assigned_booking_mut(msg.booking_id, msg.provider_id)?;
        if booking.status != BookingStatus::Confirmed {
            return Err(StorageError::Invalid(format!(
                "Only confirmed bookings can be started (this one is {})",
                booking.status
            )));
        }
        if booking.confirmation_code != msg.confirmation_code.trim() {
            return Err(StorageError::Invalid("Invalid confirmation code".to_string()));
        }

        booking.status = BookingStatus::InProgress;
        booking.updated_at = Utc::now();
        let record = booking.clone();

        self.logger.info(format!("Job {} started", record.id));
        self.booking_dto(&record, View::AssignedProvider)
    }
}

/// Marks an in-progress booking as completed.
impl Handler<CompleteJob> for Storage {
    type Result = Result<BookingDTO, StorageError>;

    fn handle(&mut self, msg: CompleteJob, _ctx: &mut Self::Context) -> Self::Result {
        let booking = self.assigned_booking_mut(msg.booking_id, msg.provider_id)?;
        if booking.status != BookingStatus::InProgress {
            return Err(StorageError::Invalid(format!(
                "Only jobs in progress can be completed (this one is {})",
                booking.status
            )));
        }

        booking.status = BookingStatus::Completed;
        booking.updated_at = Utc::now();
        let record = booking.clone();

        self.logger.info(format!("Job {} completed", record.id));
        self.booking_dto(&record, View::AssignedProvider)
    }
}

/// Counts the user's bookings per status.
impl Handler<GetBookingStats> for Storage {
    type Result = MessageResult<GetBookingStats>;

    fn handle(&mut self, msg: GetBookingStats, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(
            self.bookings_for(msg.user_id, msg.role)
                .map(|b| b.status)
                .collect(),
        )
    }
}

/////////////////////////////////////////////////////////////////////
// Payments
/////////////////////////////////////////////////////////////////////

/// Creates or reuses the payment for a booking ahead of a gateway checkout.
impl Handler<PrepareCheckout> for Storage {
    type Result = Result<CheckoutDraft, StorageError>;

    fn handle(&mut self, msg: PrepareCheckout, _ctx: &mut Self::Context) -> Self::Result {
        let booking = self
            .bookings
            .get(&msg.booking_id)
            .filter(|b| b.user_id == msg.user_id)
            .ok_or(StorageError::NotFound("Booking"))?;
        if booking.status == BookingStatus::Cancelled {
            return Err(StorageError::Invalid(
                "Cancelled bookings cannot be paid".to_string(),
            ));
        }
        let amount = booking
            .price()
            .filter(|amount| *amount > 0.0)
            .ok_or_else(|| StorageError::Invalid("Booking has no price to pay".to_string()))?;
        let description = format!("{} booking {}", booking.service_type, booking.id);
        let booking_id = booking.id;

        let payment_id = match self.payment_by_booking.get(&booking_id).copied() {
            Some(payment_id) => {
                let payment = self
                    .payments
                    .get_mut(&payment_id)
                    .ok_or(StorageError::NotFound("Payment"))?;
                if !payment.status.allows_checkout() {
                    return Err(StorageError::Conflict(format!(
                        "Payment is already {}",
                        payment.status
                    )));
                }
                if payment.status == PaymentStatus::Failed {
                    payment.status = PaymentStatus::Pending;
                }
                payment.amount = amount;
                payment_id
            }
            None => {
                let payment = PaymentRecord {
                    id: Uuid::new_v4(),
                    booking_id,
                    user_id: msg.user_id,
                    amount,
                    currency: DEFAULT_CURRENCY.to_string(),
                    status: PaymentStatus::Pending,
                    session_id: None,
                    payment_intent_id: None,
                    payment_method: None,
                    qr_token: generate_qr_token(),
                    created_at: Utc::now(),
                    paid_at: None,
                };
                let id = payment.id;
                self.payments.insert(id, payment);
                self.payment_by_booking.insert(booking_id, id);
                id
            }
        };

        let currency = self
            .payments
            .get(&payment_id)
            .map(|p| p.currency.clone())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        Ok(CheckoutDraft {
            payment_id,
            booking_id,
            amount,
            currency,
            description,
        })
    }
}

/// Links a gateway checkout session to its payment.
impl Handler<AttachSession> for Storage {
    type Result = Result<(), StorageError>;

    fn handle(&mut self, msg: AttachSession, _ctx: &mut Self::Context) -> Self::Result {
        let payment = self
            .payments
            .get_mut(&msg.payment_id)
            .ok_or(StorageError::NotFound("Payment"))?;
        if payment.status.can_transition_to(PaymentStatus::Processing) {
            payment.status = PaymentStatus::Processing;
        }
        payment.session_id = Some(msg.session_id.clone());
        self.checkout_sessions.insert(msg.session_id, msg.payment_id);
        Ok(())
    }
}

/// Applies a gateway outcome to the payment.
impl Handler<SettlePayment> for Storage {
    type Result = Result<PaymentDTO, StorageError>;

    fn handle(&mut self, msg: SettlePayment, _ctx: &mut Self::Context) -> Self::Result {
        let payment = self
            .payments
            .get_mut(&msg.payment_id)
            .ok_or(StorageError::NotFound("Payment"))?;

        // A completion may overtake AttachSession; only a different session is stale.
        if let (Some(incoming), Some(current)) = (&msg.session_id, &payment.session_id) {
            if incoming != current {
                return Err(StorageError::Conflict(format!(
                    "Session {incoming} no longer belongs to payment {}",
                    msg.payment_id
                )));
            }
        }

        let next = if msg.paid {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Failed
        };
        if payment.status == next {
            return Ok(payment.to_dto());
        }
        if !payment.status.can_transition_to(next) {
            return Err(StorageError::Conflict(format!(
                "Payment is already {}",
                payment.status
            )));
        }

        payment.status = next;
        if payment.session_id.is_none() {
            if let Some(session_id) = msg.session_id {
                payment.session_id = Some(session_id.clone());
                self.checkout_sessions.insert(session_id, msg.payment_id);
            }
        }
        if msg.paid {
            payment.paid_at = Some(Utc::now());
            payment.payment_intent_id = msg.payment_intent_id;
            payment.payment_method = msg.payment_method;
        }
        let dto = payment.to_dto();
        self.logger.info(format!(
            "Payment {} for booking {} is {}",
            dto.id, dto.booking, dto.status
        ));
        Ok(dto)
    }
}

/// Handles requests to get a payment by checkout session.
impl Handler<GetPaymentBySession> for Storage {
    type Result = Result<PaymentDTO, StorageError>;

    fn handle(&mut self, msg: GetPaymentBySession, _ctx: &mut Self::Context) -> Self::Result {
        let payment_id = *self
            .checkout_sessions
            .get_by_key(&msg.session_id)
            .ok_or(StorageError::NotFound("Checkout session"))?;
        Ok(self.payment_for_user(payment_id, msg.user_id)?.to_dto())
    }
}

/// Handles requests to get a payment owned by the user.
impl Handler<GetPayment> for Storage {
    type Result = Result<PaymentDTO, StorageError>;

    fn handle(&mut self, msg: GetPayment, _ctx: &mut Self::Context) -> Self::Result {
        Ok(self.payment_for_user(msg.payment_id, msg.user_id)?.to_dto())
    }
}

/// Handles requests for a payment's QR data.
impl Handler<GetPaymentQr> for Storage {
    type Result = Result<PaymentQrData, StorageError>;

    fn handle(&mut self, msg: GetPaymentQr, _ctx: &mut Self::Context) -> Self::Result {
        let payment = self.payment_for_user(msg.payment_id, msg.user_id)?;
        Ok(PaymentQrData {
            payment_id: payment.id,
            booking_id: payment.booking_id,
            qr_token: payment.qr_token.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            status: payment.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::constants::KEY_LEN;
    use common::types::booking::{BookingFilter, CreateBookingRequest, ServiceType, UpdateBookingRequest};
    use common::types::user::RegisterRequest;
    use common::utils::is_valid_confirmation_code;

    fn storage() -> Addr<Storage> {
        Storage::new(Arc::new(PayloadCipher::from_key([3u8; KEY_LEN]))).start()
    }

    async fn register(storage: &Addr<Storage>, email: &str, role: UserRole) -> u64 {
        let request = RegisterRequest {
            email: email.to_string(),
            username: email.split('@').next().unwrap_or(email).to_string(),
            password: "unused".into(),
            password_confirm: "unused".into(),
            first_name: "Test".into(),
            last_name: role.label().into(),
            role,
            city: Some("Adelaide".into()),
            vaccinated: true,
            consent: true,
        };
        storage
            .send(CreateUser {
                request,
                password_hash: "hash".into(),
                ip_address: Some("10.0.0.1".into()),
                user_agent: Some("tests".into()),
            })
            .await
            .unwrap()
            .unwrap()
            .id
    }

    fn booking_request() -> CreateBookingRequest {
        CreateBookingRequest {
            service_type: ServiceType::Plumbing,
            budget: Some(120.0),
            address: "12 King William St".into(),
            phone: "0400 000 000".into(),
            city: " Adelaide/ ".into(),
            state: Some("sa".into()),
            country: None,
            start_time: Utc::now() + Duration::days(2),
            duration_hours: Some(2),
            notes: None,
        }
    }

    async fn create_booking(storage: &Addr<Storage>, user_id: u64) -> BookingDTO {
        storage
            .send(CreateBooking {
                user_id,
                request: booking_request(),
            })
            .await
            .unwrap()
            .unwrap()
    }

    #[actix_rt::test]
    async fn duplicate_emails_are_rejected_case_insensitively() {
        let storage = storage();
        register(&storage, "ana@example.com", UserRole::Customer).await;

        let mut request = RegisterRequest {
            email: "ANA@example.com".into(),
            username: "other".into(),
            password: "x".into(),
            password_confirm: "x".into(),
            first_name: String::new(),
            last_name: String::new(),
            role: UserRole::Customer,
            city: None,
            vaccinated: false,
            consent: true,
        };
        let result = storage
            .send(CreateUser {
                request: request.clone(),
                password_hash: "h".into(),
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap();
        assert!(matches!(result, Err(StorageError::Conflict(_))));

        request.email = "new@example.com".into();
        let created = storage
            .send(CreateUser {
                request,
                password_hash: "h".into(),
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap();
        assert!(created.is_ok());
    }

    #[actix_rt::test]
    async fn registration_writes_a_consent_log() {
        let storage = storage();
        let id = register(&storage, "ana@example.com", UserRole::Customer).await;
        let logs = storage.send(GetConsentLogs { user_id: id }).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].policy_version, CONSENT_POLICY_VERSION);
        assert_eq!(logs[0].ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[actix_rt::test]
    async fn new_bookings_are_pending_with_a_code_and_sealed_fields() {
        let storage = storage();
        let customer = register(&storage, "ana@example.com", UserRole::Customer).await;
        let booking = create_booking(&storage, customer).await;

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.city, "Adelaide");
        assert_eq!(booking.state.as_deref(), Some("SA"));
        assert_eq!(booking.country, DEFAULT_COUNTRY);
        assert_eq!(booking.address.as_deref(), Some("12 King William St"));
        assert!(is_valid_confirmation_code(
            booking.confirmation_code.as_deref().unwrap()
        ));

        let listed = storage
            .send(ListUserBookings {
                user_id: customer,
                filter: BookingFilter::default(),
            })
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].address.is_none());
        assert!(listed[0].phone.is_none());
    }

    #[actix_rt::test]
    async fn bookings_in_the_past_are_rejected() {
        let storage = storage();
        let customer = register(&storage, "ana@example.com", UserRole::Customer).await;
        let mut request = booking_request();
        request.start_time = Utc::now() - Duration::hours(1);
        let result = storage
            .send(CreateBooking {
                user_id: customer,
                request,
            })
            .await
            .unwrap();
        assert!(matches!(result, Err(StorageError::Invalid(_))));

        let mut request = booking_request();
        request.address = "   ".into();
        let result = storage
            .send(CreateBooking {
                user_id: customer,
                request,
            })
            .await
            .unwrap();
        assert!(matches!(result, Err(StorageError::Invalid(_))));
    }

    #[actix_rt::test]
    async fn full_lifecycle_requires_the_confirmation_code() {
        let storage = storage();
        let customer = register(&storage, "ana@example.com", UserRole::Customer).await;
        let provider = register(&storage, "bob@example.com", UserRole::Provider).await;
        let booking = create_booking(&storage, customer).await;
        let code = booking.confirmation_code.clone().unwrap();

        let available = storage
            .send(ListAvailableBookings { provider_id: provider })
            .await
            .unwrap();
        assert_eq!(available.len(), 1);
        assert!(available[0].confirmation_code.is_none());

        let accepted = storage
            .send(AcceptBooking {
                booking_id: booking.id,
                provider_id: provider,
                provider_quote: Some(95.0),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(accepted.status, BookingStatus::Confirmed);
        assert_eq!(accepted.price(), Some(95.0));
        assert!(accepted.confirmation_code.is_none());
        assert_eq!(accepted.address.as_deref(), Some("12 King William St"));

        let wrong = if code == "0000" { "1111" } else { "0000" };
        let result = storage
            .send(StartJob {
                booking_id: booking.id,
                provider_id: provider,
                confirmation_code: wrong.into(),
            })
            .await
            .unwrap();
        assert!(matches!(result, Err(StorageError::Invalid(_))));

        let started = storage
            .send(StartJob {
                booking_id: booking.id,
                provider_id: provider,
                confirmation_code: code,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(started.status, BookingStatus::InProgress);

        let completed = storage
            .send(CompleteJob {
                booking_id: booking.id,
                provider_id: provider,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);

        let dashboard = storage
            .send(GetDashboard {
                user_id: provider,
                role: UserRole::Provider,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dashboard.earnings, Some(95.0));
        assert_eq!(dashboard.stats.completed, 1);
    }

    #[actix_rt::test]
    async fn accept_rules() {
        let storage = storage();
        let customer = register(&storage, "ana@example.com", UserRole::Customer).await;
        let provider = register(&storage, "bob@example.com", UserRole::Provider).await;
        let rival = register(&storage, "eve@example.com", UserRole::Provider).await;
        let booking = create_booking(&storage, customer).await;

        let by_customer = storage
            .send(AcceptBooking {
                booking_id: booking.id,
                provider_id: customer,
                provider_quote: None,
            })
            .await
            .unwrap();
        assert!(matches!(by_customer, Err(StorageError::Forbidden(_))));

        let bad_quote = storage
            .send(AcceptBooking {
                booking_id: booking.id,
                provider_id: provider,
                provider_quote: Some(-5.0),
            })
            .await
            .unwrap();
        assert!(matches!(bad_quote, Err(StorageError::Invalid(_))));

        storage
            .send(AcceptBooking {
                booking_id: booking.id,
                provider_id: provider,
                provider_quote: None,
            })
            .await
            .unwrap()
            .unwrap();
        let second = storage
            .send(AcceptBooking {
                booking_id: booking.id,
                provider_id: rival,
                provider_quote: None,
            })
            .await
            .unwrap();
        assert!(matches!(second, Err(StorageError::Conflict(_))));

        let hidden = storage
            .send(GetBooking {
                booking_id: booking.id,
                user_id: rival,
            })
            .await
            .unwrap();
        assert_eq!(hidden, Err(StorageError::NotFound("Booking")));

        let start_by_rival = storage
            .send(CompleteJob {
                booking_id: booking.id,
                provider_id: rival,
            })
            .await
            .unwrap();
        assert_eq!(start_by_rival, Err(StorageError::NotFound("Booking")));
    }

    #[actix_rt::test]
    async fn only_pending_or_confirmed_bookings_can_change() {
        let storage = storage();
        let customer = register(&storage, "ana@example.com", UserRole::Customer).await;
        let booking = create_booking(&storage, customer).await;

        let updated = storage
            .send(UpdateBooking {
                booking_id: booking.id,
                user_id: customer,
                update: UpdateBookingRequest {
                    notes: Some("Side gate".into()),
                    ..Default::default()
                },
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("Side gate"));

        let cancelled = storage
            .send(CancelBooking {
                booking_id: booking.id,
                user_id: customer,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.booking.status, BookingStatus::Cancelled);
        assert!(cancelled.open_session.is_none());

        let again = storage
            .send(CancelBooking {
                booking_id: booking.id,
                user_id: customer,
            })
            .await
            .unwrap();
        assert!(matches!(again, Err(StorageError::Invalid(_))));

        let edit = storage
            .send(UpdateBooking {
                booking_id: booking.id,
                user_id: customer,
                update: UpdateBookingRequest {
                    notes: Some("late".into()),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        assert!(matches!(edit, Err(StorageError::Invalid(_))));
    }

    #[actix_rt::test]
    async fn checkout_settles_and_cancel_refunds() {
        let storage = storage();
        let customer = register(&storage, "ana@example.com", UserRole::Customer).await;
        let booking = create_booking(&storage, customer).await;

        let draft = storage
            .send(PrepareCheckout {
                booking_id: booking.id,
                user_id: customer,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(draft.amount, 120.0);
        storage
            .send(AttachSession {
                payment_id: draft.payment_id,
                session_id: "cs_1".into(),
            })
            .await
            .unwrap()
            .unwrap();

        let stale = storage
            .send(SettlePayment {
                payment_id: draft.payment_id,
                session_id: Some("cs_old".into()),
                paid: true,
                payment_intent_id: None,
                payment_method: None,
            })
            .await
            .unwrap();
        assert!(matches!(stale, Err(StorageError::Conflict(_))));

        let paid = storage
            .send(SettlePayment {
                payment_id: draft.payment_id,
                session_id: Some("cs_1".into()),
                paid: true,
                payment_intent_id: Some("pi_1".into()),
                payment_method: Some("card".into()),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert!(paid.paid_at.is_some());

        let by_session = storage
            .send(GetPaymentBySession {
                session_id: "cs_1".into(),
                user_id: customer,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_session.id, draft.payment_id);

        let again = storage
            .send(PrepareCheckout {
                booking_id: booking.id,
                user_id: customer,
            })
            .await
            .unwrap();
        assert!(matches!(again, Err(StorageError::Conflict(_))));

        let cancelled = storage
            .send(CancelBooking {
                booking_id: booking.id,
                user_id: customer,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.booking.payment_status, Some(PaymentStatus::Refunded));
    }

    #[actix_rt::test]
    async fn cancelling_an_unpaid_booking_returns_its_open_session() {
        let storage = storage();
        let customer = register(&storage, "ana@example.com", UserRole::Customer).await;
        let booking = create_booking(&storage, customer).await;
        let draft = storage
            .send(PrepareCheckout {
                booking_id: booking.id,
                user_id: customer,
            })
            .await
            .unwrap()
            .unwrap();
        storage
            .send(AttachSession {
                payment_id: draft.payment_id,
                session_id: "cs_open".into(),
            })
            .await
            .unwrap()
            .unwrap();

        let cancelled = storage
            .send(CancelBooking {
                booking_id: booking.id,
                user_id: customer,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.open_session.as_deref(), Some("cs_open"));
        assert_eq!(cancelled.booking.payment_status, Some(PaymentStatus::Cancelled));

        let qr = storage
            .send(GetPaymentQr {
                payment_id: draft.payment_id,
                user_id: customer,
            })
            .await
            .unwrap()
            .unwrap();
        assert!(!qr.qr_token.is_empty());
    }

    #[actix_rt::test]
    async fn deleting_a_provider_releases_their_jobs() {
        let storage = storage();
        let customer = register(&storage, "ana@example.com", UserRole::Customer).await;
        let provider = register(&storage, "bob@example.com", UserRole::Provider).await;
        let booking = create_booking(&storage, customer).await;
        storage
            .send(AcceptBooking {
                booking_id: booking.id,
                provider_id: provider,
                provider_quote: Some(200.0),
            })
            .await
            .unwrap()
            .unwrap();

        storage
            .send(DeleteUser { user_id: provider })
            .await
            .unwrap()
            .unwrap();

        let released = storage
            .send(GetBooking {
                booking_id: booking.id,
                user_id: customer,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(released.status, BookingStatus::Pending);
        assert!(released.provider.is_none());
        assert!(released.provider_quote.is_none());

        let gone = storage
            .send(FindUserByEmail {
                email: "bob@example.com".into(),
            })
            .await
            .unwrap();
        assert_eq!(gone, Err(StorageError::NotFound("User")));
    }

    #[actix_rt::test]
    async fn catalog_lists_active_services() {
        let storage = storage();
        let services = storage.send(ListServices).await.unwrap();
        assert_eq!(services.len(), 4);
        let first = storage
            .send(GetService {
                service_id: services[0].id,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.title, "House Cleaning");
    }
}
