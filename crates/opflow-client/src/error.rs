use std::time::Duration;

use opflow_core::StoreError;
use opflow_crypto::CryptoError;

/// Description the resource server attaches to a 401 for an expired token.
pub const INVALID_TOKEN: &str = "Invalid Token";

/// Description the resource server attaches to a 403 for a revoked/inactive token.
pub const INACTIVE_TOKEN: &str = "Inactive Token";

/// Client-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{method} {url} failed with HTTP {status}: {description}")]
    Api {
        method: String,
        url: String,
        status: u16,
        code: Option<String>,
        description: String,
    },

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL {0}")]
    InvalidUrl(String),

    #[error("invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("invalid key material: {0}")]
    InvalidKey(#[from] CryptoError),

    #[error("expected an interactive grant but the grant was already finalized")]
    GrantAlreadyFinalized,

    #[error("expected a finalized incoming payment grant but it is pending")]
    PendingIncomingPaymentGrant,

    #[error("polling timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not open authorization URL: {0}")]
    Interaction(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("gave up after {0} token rotation(s)")]
    RotationLimitExceeded(u32),

    #[error("operation cancelled")]
    Cancelled,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl ClientError {
    /// Build an API error from a status and description.
    pub fn api(method: &str, url: &str, status: u16, description: impl Into<String>) -> Self {
        Self::Api {
            method: method.to_string(),
            url: url.to_string(),
            status,
            code: None,
            description: description.into(),
        }
    }

    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the resource server rejected the access token as expired or
    /// inactive, i.e. a token rotation may make the call succeed.
    pub fn is_token_expired(&self) -> bool {
        match self {
            Self::Api {
                status: 401,
                description,
                ..
            } => description == INVALID_TOKEN,
            Self::Api {
                status: 403,
                description,
                ..
            } => description == INACTIVE_TOKEN,
            _ => false,
        }
    }
}
