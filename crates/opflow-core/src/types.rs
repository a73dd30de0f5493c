use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::identifier::{IdPrefix, Identifier};

/// A connected wallet address together with the credentials needed to act
/// on its behalf.
///
/// Created once after grant finalization and mutated in place on every
/// successful token rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCredential {
    /// Record identifier (`wal_...`).
    pub id: String,
    /// Wallet address URL, the lookup key.
    pub url: String,
    /// Key id registered with the wallet's auth server.
    pub key_id: String,
    /// Base64 of a PKCS#8 PEM document.
    pub private_key: String,
    /// Base64 of the JWK public key.
    pub public_key: String,
    /// Current GNAP access token.
    pub access_token: String,
    /// Management URL used to rotate `access_token`.
    pub token_management_url: String,
    /// Continuation token of the connecting grant.
    pub grant_continuation_token: String,
    /// Continuation URI of the connecting grant.
    pub grant_continuation_uri: String,
    /// Unix milliseconds.
    pub created_at: i64,
    /// Unix milliseconds.
    pub updated_at: i64,
}

impl WalletCredential {
    /// Replace the access token and its management URL, bumping `updated_at`.
    pub fn apply_rotation(&mut self, access_token: &str, management_url: &str) {
        self.access_token = access_token.to_string();
        self.token_management_url = management_url.to_string();
        self.updated_at = Utc::now().timestamp_millis();
    }
}

/// Insertable form of a [`WalletCredential`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWallet {
    /// Optional explicit id; one is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub url: String,
    pub key_id: String,
    pub private_key: String,
    pub public_key: String,
    pub access_token: String,
    pub token_management_url: String,
    pub grant_continuation_token: String,
    pub grant_continuation_uri: String,
}

impl NewWallet {
    /// Stamp the record with an id and creation timestamps.
    pub fn into_credential(self) -> WalletCredential {
        let now = Utc::now().timestamp_millis();
        WalletCredential {
            id: self
                .id
                .unwrap_or_else(|| Identifier::create(IdPrefix::Wallet)),
            url: self.url,
            key_id: self.key_id,
            private_key: self.private_key,
            public_key: self.public_key,
            access_token: self.access_token,
            token_management_url: self.token_management_url,
            grant_continuation_token: self.grant_continuation_token,
            grant_continuation_uri: self.grant_continuation_uri,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A named, stored flow script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    /// Record identifier (`flow_...`).
    pub id: String,
    pub name: String,
    /// Script text, one command per line.
    pub steps: String,
}
