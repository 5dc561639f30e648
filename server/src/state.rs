use crate::config::Config;
use crate::password::PasswordHasher;
use crate::server_actors::payment_service::PaymentService;
use crate::server_actors::session_manager::SessionManager;
use crate::server_actors::storage::Storage;
use actix::prelude::*;
use common::crypto::PayloadCipher;
use std::sync::Arc;

/// Handles shared by every HTTP handler. Must be built inside a running actix system.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Addr<Storage>,
    pub sessions: Addr<SessionManager>,
    pub payments: Addr<PaymentService>,
    pub payload_cipher: Arc<PayloadCipher>,
    pub passwords: PasswordHasher,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let payload_cipher = PayloadCipher::from_secret(&config.payload_key);
        let field_cipher = PayloadCipher::from_secret(&config.field_key);
        Self::with_ciphers(config, payload_cipher, field_cipher)
    }

    pub fn with_ciphers(
        config: Config,
        payload_cipher: PayloadCipher,
        field_cipher: PayloadCipher,
    ) -> Self {
        let storage = Storage::new(Arc::new(field_cipher)).start();
        let sessions = SessionManager::new(config.access_token_ttl, config.refresh_token_ttl).start();
        let payments = PaymentService::new(
            config.gateway_addr.clone(),
            config.gateway_connect_attempts,
            storage.clone(),
        )
        .start();

        Self {
            passwords: PasswordHasher::new(config.password_iterations),
            config: Arc::new(config),
            storage,
            sessions,
            payments,
            payload_cipher: Arc::new(payload_cipher),
        }
    }
}
