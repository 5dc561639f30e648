use colored::Color;
use common::config::{read_secret, try_load, try_load_string};
use common::constants::{
    ACCESS_TOKEN_TTL_SECS, API_PORT, DEFAULT_FRONTEND_URL, DEV_PAYLOAD_KEY, PAYMENT_GATEWAY_PORT,
    REFRESH_TOKEN_TTL_SECS, SERVER_IP_ADDRESS,
};
use common::logger::Logger;
use std::time::Duration;

const DEV_FIELD_KEY: &str = "safehome-dev-field-key";
const DEV_PUBLISHABLE_KEY: &str = "pk_test_safehome";
const DEFAULT_PASSWORD_ITERATIONS: u32 = 260_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Shared with the dashboard; seals request bodies.
    pub payload_key: String,
    /// Server-only; seals addresses and phone numbers at rest.
    pub field_key: String,
    pub gateway_addr: String,
    pub gateway_connect_attempts: usize,
    pub frontend_url: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub password_iterations: u32,
    pub publishable_key: String,
    /// Drops the `Secure` cookie attribute so plain-HTTP local runs keep their session.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: SERVER_IP_ADDRESS.to_string(),
            port: API_PORT,
            payload_key: DEV_PAYLOAD_KEY.to_string(),
            field_key: DEV_FIELD_KEY.to_string(),
            gateway_addr: format!("{SERVER_IP_ADDRESS}:{PAYMENT_GATEWAY_PORT}"),
            gateway_connect_attempts: 3,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            access_token_ttl: Duration::from_secs(ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::from_secs(REFRESH_TOKEN_TTL_SECS),
            password_iterations: DEFAULT_PASSWORD_ITERATIONS,
            publishable_key: DEV_PUBLISHABLE_KEY.to_string(),
            debug: true,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let logger = Logger::new("Config", Color::Cyan);
        let defaults = Config::default();

        Self {
            host: try_load_string("SAFEHOME_HOST", &defaults.host, &logger),
            port: try_load("SAFEHOME_PORT", defaults.port, &logger),
            payload_key: read_secret("PAYLOAD_KEY", DEV_PAYLOAD_KEY, &logger),
            field_key: read_secret("FERNET_KEY", DEV_FIELD_KEY, &logger),
            gateway_addr: try_load_string("PAYMENT_GATEWAY_ADDR", &defaults.gateway_addr, &logger),
            gateway_connect_attempts: try_load(
                "PAYMENT_GATEWAY_CONNECT_ATTEMPTS",
                defaults.gateway_connect_attempts,
                &logger,
            ),
            frontend_url: try_load_string("FRONTEND_URL", &defaults.frontend_url, &logger),
            access_token_ttl: Duration::from_secs(try_load(
                "ACCESS_TOKEN_TTL_SECS",
                ACCESS_TOKEN_TTL_SECS,
                &logger,
            )),
            refresh_token_ttl: Duration::from_secs(try_load(
                "REFRESH_TOKEN_TTL_SECS",
                REFRESH_TOKEN_TTL_SECS,
                &logger,
            )),
            password_iterations: try_load(
                "PASSWORD_ITERATIONS",
                defaults.password_iterations,
                &logger,
            ),
            publishable_key: read_secret("GATEWAY_PUBLISHABLE_KEY", DEV_PUBLISHABLE_KEY, &logger),
            debug: try_load("SAFEHOME_DEBUG", defaults.debug, &logger),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn success_url(&self) -> String {
        format!(
            "{}/payments/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.frontend_url.trim_end_matches('/')
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/payments/cancel", self.frontend_url.trim_end_matches('/'))
    }
}
