//! Typed client for the SafeHome REST API.
//!
//! All resource clients share one [`ApiSession`], so a token refreshed by one
//! of them is immediately used by the others.

pub mod auth;
pub mod base;
pub mod bookings;
pub mod covid;
pub mod payments;
pub mod services;

use crate::api::auth::AuthApi;
use crate::api::base::ApiSession;
use crate::api::bookings::BookingsApi;
use crate::api::covid::CovidApi;
use crate::api::payments::PaymentsApi;
use crate::api::services::ServicesApi;
use crate::error::ApiError;
use common::crypto::PayloadCipher;
use std::sync::Arc;

#[derive(Clone)]
pub struct SafeHomeApi {
    pub auth: AuthApi,
    pub bookings: BookingsApi,
    pub services: ServicesApi,
    pub payments: PaymentsApi,
    pub covid: CovidApi,
}

impl SafeHomeApi {
    pub fn new(base_url: &str, cipher: PayloadCipher) -> Result<Self, ApiError> {
        Ok(Self::with_session(ApiSession::new(base_url, cipher)?))
    }

    pub fn with_session(session: Arc<ApiSession>) -> Self {
        Self {
            auth: AuthApi::new(session.clone()),
            bookings: BookingsApi::new(session.clone()),
            services: ServicesApi::new(session.clone()),
            payments: PaymentsApi::new(session.clone()),
            covid: CovidApi::new(session),
        }
    }

    pub fn session(&self) -> &Arc<ApiSession> {
        self.auth.session()
    }
}
