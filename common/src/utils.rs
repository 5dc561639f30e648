use crate::constants::{CONFIRMATION_CODE_DIGITS, QR_TOKEN_BYTES, SESSION_TOKEN_BYTES};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{Rng, RngCore, random};

pub fn random_bool_by_given_probability(probability: f32) -> bool {
    let rand_value: f32 = random();
    rand_value < probability
}

/// Zero-padded numeric code the customer shares with the provider to start a job.
pub fn generate_confirmation_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CONFIRMATION_CODE_DIGITS)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

pub fn is_valid_confirmation_code(code: &str) -> bool {
    code.len() == CONFIRMATION_CODE_DIGITS && code.chars().all(|c| c.is_ascii_digit())
}

pub fn generate_urlsafe_token(num_bytes: usize) -> String {
    let mut bytes = vec![0u8; num_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn generate_qr_token() -> String {
    generate_urlsafe_token(QR_TOKEN_BYTES)
}

pub fn generate_session_token() -> String {
    generate_urlsafe_token(SESSION_TOKEN_BYTES)
}

/// Title-cases each whitespace-separated word: `"new  york"` → `"New York"`.
pub fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trims a city name and drops trailing slashes left by copy-pasted URLs.
pub fn clean_city(raw: &str) -> String {
    raw.trim().trim_end_matches(['/', ' ']).trim().to_string()
}
