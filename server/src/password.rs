//! Password hashes in the `pbkdf2_sha256$<iterations>$<salt>$<base64 hash>` format.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::constants::MIN_PASSWORD_LEN;
use common::utils::generate_urlsafe_token;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

const ALGORITHM: &str = "pbkdf2_sha256";
const SALT_BYTES: usize = 12;
const HASH_LEN: usize = 32;
const ABSENT_SALT: &str = "no-such-account";

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    fn derive(password: &str, salt: &str, iterations: u32) -> [u8; HASH_LEN] {
        let mut out = [0u8; HASH_LEN];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
        out
    }

    pub fn hash(&self, password: &str) -> String {
        let salt = generate_urlsafe_token(SALT_BYTES);
        let hash = Self::derive(password, &salt, self.iterations);
        format!(
            "{ALGORITHM}${}${salt}${}",
            self.iterations,
            STANDARD.encode(hash)
        )
    }

    /// Verifies against the iteration count stored in `encoded`, not the current one.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let mut parts = encoded.split('$');
        let (Some(algorithm), Some(iterations), Some(salt), Some(expected), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return false;
        };
        if algorithm != ALGORITHM {
            return false;
        }
        let Ok(iterations) = iterations.parse::<u32>() else {
            return false;
        };
        let Ok(expected) = STANDARD.decode(expected) else {
            return false;
        };
        let actual = Self::derive(password, salt, iterations.max(1));
        constant_time_eq(&actual, &expected)
    }

    /// Runs one full derivation for a login whose account does not exist, so
    /// unknown emails take as long to reject as wrong passwords. Always false.
    pub fn verify_absent(&self, password: &str) -> bool {
        std::hint::black_box(Self::derive(password, ABSENT_SALT, self.iterations));
        false
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("Password cannot be entirely numeric".to_string());
    }
    if password != confirmation {
        return Err("Passwords do not match".to_string());
    }
    Ok(())
}
