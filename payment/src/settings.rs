use colored::Color;
use common::config::{try_load, try_load_string};
use common::constants::{
    PAYMENT_GATEWAY_PORT, PAYMENT_SETTLE_MILLIS, PAYMENT_SUCCESS_PROBABILITY, SERVER_IP_ADDRESS,
};
use common::logger::Logger;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub host: String,
    pub port: u16,
    pub success_probability: f32,
    pub settle_delay: Duration,
    pub checkout_base_url: String,
}

impl GatewaySettings {
    pub fn load() -> Self {
        let logger = Logger::new("Gateway Config", Color::Cyan);
        let host = try_load_string("PAYMENT_GATEWAY_HOST", SERVER_IP_ADDRESS, &logger);
        let port = try_load("PAYMENT_GATEWAY_PORT", PAYMENT_GATEWAY_PORT, &logger);
        let success_probability = try_load(
            "PAYMENT_SUCCESS_PROBABILITY",
            PAYMENT_SUCCESS_PROBABILITY,
            &logger,
        )
        .clamp(0.0, 1.0);
        let settle_millis = try_load("PAYMENT_SETTLE_MILLIS", PAYMENT_SETTLE_MILLIS, &logger);
        let checkout_base_url = try_load_string(
            "PAYMENT_CHECKOUT_URL",
            &format!("http://{host}:{port}/checkout"),
            &logger,
        );

        Self {
            host,
            port,
            success_probability,
            settle_delay: Duration::from_millis(settle_millis),
            checkout_base_url,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
