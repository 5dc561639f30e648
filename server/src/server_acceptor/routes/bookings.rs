use crate::error::AppError;
use crate::messages::internal_messages::{
    AcceptBooking, CancelBooking, CompleteJob, CreateBooking, ExpireCheckout, GetBooking,
    GetBookingStats, ListAvailableBookings, ListProviderBookings, ListUserBookings, StartJob,
    UpdateBooking,
};
use crate::server_acceptor::extractors::{AuthUser, SealedJson};
use crate::server_acceptor::responses::{ApiResult, created, ok};
use crate::server_acceptor::routes::{PageQuery, paginated, parse_id};
use crate::state::AppState;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use common::types::booking::{
    AcceptBookingRequest, BookingFilter, CreateBookingRequest, StartJobRequest,
    UpdateBookingRequest,
};
use common::types::user::UserRole;
use serde::Deserialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create/", post(create_booking))
        .route("/my-bookings/", get(my_bookings))
        .route("/stats/", get(booking_stats))
        .route("/provider/available/", get(available_bookings))
        .route("/provider/received/", get(received_bookings))
        .route("/{id}/", get(booking_detail))
        .route("/{id}/update/", patch(update_booking))
        .route("/{id}/cancel/", post(cancel_booking))
        .route("/{id}/accept/", post(accept_booking))
        .route("/{id}/start/", post(start_job))
        .route("/{id}/complete/", post(complete_job))
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ListQuery {
    status: Option<String>,
    service_type: Option<String>,
    #[serde(flatten)]
    paging: PageQuery,
}

impl ListQuery {
    fn filter(&self) -> Result<BookingFilter, AppError> {
        let status = match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse().map_err(AppError::BadRequest)?),
            None => None,
        };
        let service_type = match self
            .service_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(raw) => Some(raw.parse().map_err(AppError::BadRequest)?),
            None => None,
        };
        Ok(BookingFilter {
            status,
            service_type,
            page: self.paging.page()?,
            page_size: self.paging.page_size()?,
        })
    }
}

async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    SealedJson(request): SealedJson<CreateBookingRequest>,
) -> ApiResult {
    let booking = state
        .storage
        .send(CreateBooking {
            user_id: user.id(),
            request,
        })
        .await??;
    created(booking, "Booking created")
}

async fn my_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult {
    let filter = query.filter()?;
    let (page, page_size) = (filter.page, filter.page_size);
    let bookings = state
        .storage
        .send(ListUserBookings {
            user_id: user.id(),
            filter,
        })
        .await?;
    ok(paginated(bookings, page, page_size), "Bookings retrieved")
}

async fn booking_stats(State(state): State<AppState>, user: AuthUser) -> ApiResult {
    let stats = state
        .storage
        .send(GetBookingStats {
            user_id: user.id(),
            role: user.role(),
        })
        .await?;
    ok(stats, "Booking statistics retrieved")
}

async fn available_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(paging): Query<PageQuery>,
) -> ApiResult {
    user.require(UserRole::Provider)?;
    let bookings = state
        .storage
        .send(ListAvailableBookings {
            provider_id: user.id(),
        })
        .await?;
    ok(
        paginated(bookings, paging.page()?, paging.page_size()?),
        "Available bookings retrieved",
    )
}

async fn received_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult {
    user.require(UserRole::Provider)?;
    let filter = query.filter()?;
    let (page, page_size) = (filter.page, filter.page_size);
    let bookings = state
        .storage
        .send(ListProviderBookings {
            provider_id: user.id(),
            filter,
        })
        .await?;
    ok(paginated(bookings, page, page_size), "Accepted bookings retrieved")
}

async fn booking_detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult {
    let booking = state
        .storage
        .send(GetBooking {
            booking_id: parse_id(&id, "Booking")?,
            user_id: user.id(),
        })
        .await??;
    ok(booking, "Booking retrieved")
}

async fn update_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    SealedJson(update): SealedJson<UpdateBookingRequest>,
) -> ApiResult {
    let booking = state
        .storage
        .send(UpdateBooking {
            booking_id: parse_id(&id, "Booking")?,
            user_id: user.id(),
            update,
        })
        .await??;
    ok(booking, "Booking updated")
}

async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult {
    let cancelled = state
        .storage
        .send(CancelBooking {
            booking_id: parse_id(&id, "Booking")?,
            user_id: user.id(),
        })
        .await??;
    if let Some(session_id) = cancelled.open_session {
        state.payments.do_send(ExpireCheckout { session_id });
    }
    ok(cancelled.booking, "Booking cancelled")
}

async fn accept_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    SealedJson(request): SealedJson<AcceptBookingRequest>,
) -> ApiResult {
    user.require(UserRole::Provider)?;
    let booking = state
        .storage
        .send(AcceptBooking {
            booking_id: parse_id(&id, "Booking")?,
            provider_id: user.id(),
            provider_quote: request.provider_quote,
        })
        .await??;
    ok(booking, "Booking accepted")
}

async fn start_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    SealedJson(request): SealedJson<StartJobRequest>,
) -> ApiResult {
    user.require(UserRole::Provider)?;
    let booking = state
        .storage
        .send(StartJob {
            booking_id: parse_id(&id, "Booking")?,
            provider_id: user.id(),
            confirmation_code: request.confirmation_code,
        })
        .await??;
    ok(booking, "Job started")
}

async fn complete_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult {
    user.require(UserRole::Provider)?;
    let booking = state
        .storage
        .send(CompleteJob {
            booking_id: parse_id(&id, "Booking")?,
            provider_id: user.id(),
        })
        .await??;
    ok(booking, "Job completed")
}
