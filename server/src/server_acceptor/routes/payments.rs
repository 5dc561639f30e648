use crate::error::AppError;
use crate::messages::internal_messages::{
    AttachSession, GetPayment, GetPaymentBySession, GetPaymentQr, PrepareCheckout, QuerySession,
    SettlePayment, StartCheckout,
};
use crate::server_acceptor::extractors::{AuthUser, SealedJson};
use crate::server_acceptor::responses::{ApiResult, created, ok};
use crate::server_acceptor::routes::parse_id;
use crate::state::AppState;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use colored::Color;
use common::logger::Logger;
use common::messages::payment_messages::{CreateCheckout, GatewaySessionStatus};
use common::types::payment::{
    CheckoutRequest, CheckoutResponse, GatewayConfig, PaymentCancelResponse, PaymentDTO,
    PaymentSuccessResponse, to_minor_units,
};
use common::types::payment_status::PaymentStatus;
use serde::Deserialize;
use std::sync::LazyLock;

static LOGGER: LazyLock<Logger> = LazyLock::new(|| Logger::new("Payments", Color::Yellow));

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/gateway/config/", get(gateway_config))
        .route("/checkout/", post(checkout))
        .route("/success/", get(payment_success))
        .route("/cancel/", get(payment_cancel))
        .route("/{id}/", get(payment_detail))
        .route("/{id}/qr/", get(payment_qr))
}

#[derive(Debug, Default, Deserialize)]
struct SessionQuery {
    session_id: Option<String>,
}

async fn gateway_config(State(state): State<AppState>) -> ApiResult {
    ok(
        GatewayConfig {
            publishable_key: state.config.publishable_key.clone(),
        },
        "Gateway configuration retrieved",
    )
}

async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    SealedJson(request): SealedJson<CheckoutRequest>,
) -> ApiResult {
    let draft = state
        .storage
        .send(PrepareCheckout {
            booking_id: request.booking_id,
            user_id: user.id(),
        })
        .await??;

    let session = state
        .payments
        .send(StartCheckout(CreateCheckout {
            payment_id: draft.payment_id,
            booking_id: draft.booking_id,
            amount: to_minor_units(draft.amount),
            currency: draft.currency,
            description: draft.description,
            success_url: state.config.success_url(),
            cancel_url: state.config.cancel_url(),
        }))
        .await??;

    state
        .storage
        .send(AttachSession {
            payment_id: draft.payment_id,
            session_id: session.session_id.clone(),
        })
        .await??;

    created(
        CheckoutResponse {
            payment_id: draft.payment_id,
            session_id: session.session_id,
            checkout_url: session.checkout_url,
        },
        "Checkout session created",
    )
}

/// Brings the stored payment in line with what the gateway reports, when it can be reached.
async fn reconcile(state: &AppState, payment: PaymentDTO) -> PaymentDTO {
    let Some(session_id) = payment.session_id.clone() else {
        return payment;
    };
    if !matches!(payment.status, PaymentStatus::Pending | PaymentStatus::Processing) {
        return payment;
    }

    let paid = match state.payments.send(QuerySession { session_id: session_id.clone() }).await {
        Ok(Ok(status)) => match status.status {
            GatewaySessionStatus::Paid => true,
            GatewaySessionStatus::Failed => false,
            GatewaySessionStatus::Open | GatewaySessionStatus::Expired => return payment,
        },
        Ok(Err(e)) => {
            LOGGER.warn(format!("Could not verify session {session_id}: {e}"));
            return payment;
        }
        Err(e) => {
            LOGGER.error(format!("Payment service unavailable: {e}"));
            return payment;
        }
    };

    let settled = state
        .storage
        .send(SettlePayment {
            payment_id: payment.id,
            session_id: Some(session_id),
            paid,
            payment_intent_id: None,
            payment_method: None,
        })
        .await;
    match settled {
        Ok(Ok(updated)) => updated,
        _ => payment,
    }
}

async fn payment_success(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SessionQuery>,
) -> ApiResult {
    let session_id = query
        .session_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("session_id is required".to_string()))?;

    let payment = state
        .storage
        .send(GetPaymentBySession {
            session_id,
            user_id: user.id(),
        })
        .await??;
    let payment = reconcile(&state, payment).await;

    ok(
        PaymentSuccessResponse {
            payment_status: payment.status,
            amount_total: to_minor_units(payment.amount),
            currency: payment.currency,
            booking_id: payment.booking,
        },
        "Payment status retrieved",
    )
}

async fn payment_cancel(_user: AuthUser) -> ApiResult {
    ok(
        PaymentCancelResponse {
            status: "cancelled".to_string(),
        },
        "Payment cancelled",
    )
}

async fn payment_detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult {
    let payment = state
        .storage
        .send(GetPayment {
            payment_id: parse_id(&id, "Payment")?,
            user_id: user.id(),
        })
        .await??;
    ok(payment, "Payment retrieved")
}

async fn payment_qr(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult {
    let qr = state
        .storage
        .send(GetPaymentQr {
            payment_id: parse_id(&id, "Payment")?,
            user_id: user.id(),
        })
        .await??;
    ok(qr, "Payment QR data retrieved")
}
