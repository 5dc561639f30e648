use std::time::Duration;

pub const SERVER_IP_ADDRESS: &str = "127.0.0.1";
pub const API_PORT: u16 = 8000;
pub const PAYMENT_GATEWAY_PORT: u16 = 8090;
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

pub const LOG_LEVEL_ENV: &str = "SAFEHOME_LOG";

// Payload cipher parameters, shared by every process that seals request bodies.
pub const PAYLOAD_SALT: &[u8] = b"safehome_salt_2024";
pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
/// Shared payload secret used when `PAYLOAD_KEY` is not configured.
pub const DEV_PAYLOAD_KEY: &str = "safehome-dev-payload-key";

pub const DEFAULT_COUNTRY: &str = "AU";
pub const DEFAULT_DURATION_HOURS: u32 = 1;

pub const CONFIRMATION_CODE_DIGITS: usize = 4;
pub const QR_TOKEN_BYTES: usize = 32;
pub const SESSION_TOKEN_BYTES: usize = 32;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const ACCESS_TOKEN_TTL_SECS: u64 = 5 * 60;
pub const REFRESH_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

pub const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(3 * 60);
pub const MAX_CONSECUTIVE_REFRESH_FAILURES: u32 = 3;
pub const PUBLIC_ROUTES: [&str; 3] = ["/", "/login", "/register"];

pub const PAYMENT_SUCCESS_PROBABILITY: f32 = 0.9;
pub const PAYMENT_SETTLE_MILLIS: u64 = 1500;
pub const DEFAULT_CURRENCY: &str = "USD";
pub const SUPPORTED_CURRENCIES: [&str; 3] = ["USD", "EUR", "GBP"];

pub const CONSENT_POLICY_VERSION: &str = "1.0";
pub const MIN_PASSWORD_LEN: usize = 8;

pub const SERVER_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;
pub const DASHBOARD_PAGE_SIZE: usize = 5;
pub const RECENT_BOOKINGS_LIMIT: usize = 5;

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
pub const TIMEOUT_SECONDS: u64 = 2;
pub const GATEWAY_REPLY_TIMEOUT: Duration = Duration::from_secs(5);
