use common::crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with an error envelope.
    #[error("{message} ({status})")]
    Server { status: u16, message: String },
    #[error("could not reach the server: {0}")]
    Network(String),
    #[error("could not seal request: {0}")]
    Crypto(#[from] CryptoError),
    #[error("could not encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status of the failure; `0` when no response arrived.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Server { status, .. } => *status,
            _ => 0,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == 401
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}
