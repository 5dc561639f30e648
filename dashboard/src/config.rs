use colored::Color;
use common::config::{read_secret, try_load, try_load_optional, try_load_string};
use common::constants::{DEFAULT_API_URL, DEV_PAYLOAD_KEY, TOKEN_REFRESH_INTERVAL};
use common::logger::Logger;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub api_url: String,
    pub payload_key: String,
    pub refresh_interval: Duration,
    /// Geocoding is skipped when unset.
    pub maps_api_key: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            payload_key: DEV_PAYLOAD_KEY.to_string(),
            refresh_interval: TOKEN_REFRESH_INTERVAL,
            maps_api_key: None,
        }
    }
}

impl DashboardConfig {
    pub fn load() -> Self {
        let logger = Logger::new("Config", Color::Cyan);
        let defaults = DashboardConfig::default();

        Self {
            api_url: try_load_string("SAFEHOME_API_URL", &defaults.api_url, &logger)
                .trim_end_matches('/')
                .to_string(),
            payload_key: read_secret("PAYLOAD_KEY", DEV_PAYLOAD_KEY, &logger),
            refresh_interval: Duration::from_secs(try_load(
                "TOKEN_REFRESH_SECS",
                defaults.refresh_interval.as_secs(),
                &logger,
            ))
            .max(Duration::from_secs(1)),
            maps_api_key: try_load_optional("GOOGLE_MAPS_API_KEY"),
        }
    }
}
