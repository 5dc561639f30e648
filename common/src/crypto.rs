//! Symmetric encryption for request bodies and sensitive fields.
//!
//! Keys are derived with PBKDF2-HMAC-SHA256 from a shared secret. Payloads are
//! sealed with AES-256-GCM using a random 16-byte IV and travel as
//! `ivhex:ciphertexthex:taghex`.

use crate::constants::{IV_LEN, KEY_LEN, PAYLOAD_SALT, PBKDF2_ITERATIONS, TAG_LEN};
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

type Aes256Gcm16 = AesGcm<Aes256, U16>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encrypted payload must have the form iv:ciphertext:tag")]
    Format,
    #[error("invalid hex in encrypted payload: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("payload could not be encrypted")]
    Encrypt,
    #[error("payload failed authentication")]
    Authentication,
    #[error("decrypted payload is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Body shape of a sealed request: `{"payload": "<iv:ct:tag>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    pub payload: String,
}

pub fn derive_key(secret: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, iterations, &mut key);
    key
}

#[derive(Clone)]
pub struct PayloadCipher {
    key: [u8; KEY_LEN],
}

impl fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadCipher").finish_non_exhaustive()
    }
}

impl PayloadCipher {
    /// Derives the key once. This runs 100k PBKDF2 rounds, so build the
    /// cipher at startup and share it.
    pub fn from_secret(secret: &str) -> Self {
        Self::from_key(derive_key(secret, PAYLOAD_SALT, PBKDF2_ITERATIONS))
    }

    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    fn cipher(&self) -> Aes256Gcm16 {
        Aes256Gcm16::new(GenericArray::from_slice(&self.key))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut sealed = self
            .cipher()
            .encrypt(Nonce::<U16>::from_slice(&iv), plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(sealed),
            hex::encode(tag)
        ))
    }

    pub fn decrypt(&self, token: &str) -> Result<String, CryptoError> {
        let mut parts = token.trim().split(':');
        let (Some(iv), Some(body), Some(tag), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CryptoError::Format);
        };

        let iv = hex::decode(iv)?;
        let mut body = hex::decode(body)?;
        let tag = hex::decode(tag)?;
        if iv.len() != IV_LEN || tag.len() != TAG_LEN {
            return Err(CryptoError::Format);
        }
        body.extend_from_slice(&tag);

        let plain = self
            .cipher()
            .decrypt(Nonce::<U16>::from_slice(&iv), body.as_slice())
            .map_err(|_| CryptoError::Authentication)?;
        Ok(String::from_utf8(plain)?)
    }

    pub fn seal_json<T: Serialize>(&self, value: &T) -> Result<SealedPayload, CryptoError> {
        let json = serde_json::to_string(value)?;
        Ok(SealedPayload {
            payload: self.encrypt(&json)?,
        })
    }

    pub fn open_json<T: DeserializeOwned>(&self, sealed: &SealedPayload) -> Result<T, CryptoError> {
        let json = self.decrypt(&sealed.payload)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Decrypts `{"payload": "..."}` bodies and hands anything else back untouched.
    pub fn open_if_sealed(&self, value: Value) -> Result<Value, CryptoError> {
        match sealed_token(&value) {
            Some(token) => {
                let json = self.decrypt(token)?;
                Ok(serde_json::from_str(&json)?)
            }
            None => Ok(value),
        }
    }
}

fn sealed_token(value: &Value) -> Option<&str> {
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object.get("payload")?.as_str()
}
