//! Environment lookups shared by every binary.
//!
//! Values come from the environment, then (for secrets) from
//! `/run/secrets/<NAME>`, then from the given default. Each fallback is logged.

use crate::logger::Logger;
use std::env;
use std::fmt::Display;
use std::fs::read_to_string;
use std::str::FromStr;

const SECRETS_DIR: &str = "/run/secrets";

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

pub fn try_load<T>(key: &str, default: T, logger: &Logger) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = var(key) else {
        logger.debug(format!("{key} not set, using default: {default}"));
        return default;
    };
    raw.trim().parse().unwrap_or_else(|e| {
        logger.warn(format!("Invalid {key} value '{raw}': {e}; using default: {default}"));
        default
    })
}

pub fn try_load_string(key: &str, default: &str, logger: &Logger) -> String {
    var(key).unwrap_or_else(|| {
        logger.debug(format!("{key} not set, using default: {default}"));
        default.to_string()
    })
}

pub fn try_load_optional(key: &str) -> Option<String> {
    var(key)
}

/// Reads a secret from the environment or the secrets directory. Falls back to
/// `dev_default` with a warning so local runs work without setup.
pub fn read_secret(name: &str, dev_default: &str, logger: &Logger) -> String {
    if let Some(value) = var(name) {
        return value;
    }
    let path = format!("{SECRETS_DIR}/{name}");
    match read_to_string(&path) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => {
            logger.warn(format!(
                "{name} not found in environment or {path}, using development default"
            ));
            dev_default.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colored::Color;

    fn logger() -> Logger {
        Logger::new("config-test", Color::White)
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let port: u16 = try_load("SAFEHOME_TEST_UNSET_PORT", 8123, &logger());
        assert_eq!(port, 8123);
        assert_eq!(
            try_load_string("SAFEHOME_TEST_UNSET_URL", "http://x", &logger()),
            "http://x"
        );
        assert!(try_load_optional("SAFEHOME_TEST_UNSET_KEY").is_none());
    }

    #[test]
    fn missing_secrets_use_the_development_default() {
        let secret = read_secret("SAFEHOME_TEST_UNSET_SECRET", "dev-secret", &logger());
        assert_eq!(secret, "dev-secret");
    }
}
