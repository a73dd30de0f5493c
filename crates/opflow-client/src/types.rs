use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ClientError;

/// Turn the `$host/path` payment-pointer shorthand into an `https://` URL.
pub fn normalize_wallet_url(url: &str) -> String {
    let trimmed = url.trim();
    match trimmed.strip_prefix('$') {
        Some(rest) => format!("https://{}", rest),
        None => trimmed.to_string(),
    }
}

/// Public metadata served at a wallet address URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddress {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_name: Option<String>,
    pub asset_code: String,
    pub asset_scale: u8,
    pub auth_server: String,
    pub resource_server: String,
}

/// An amount in minor units of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amount {
    pub value: String,
    pub asset_code: String,
    pub asset_scale: u8,
}

impl Amount {
    /// Convert a decimal amount into minor units, rounding to the nearest unit.
    pub fn from_decimal(amount: f64, asset_code: &str, asset_scale: u8) -> Result<Self, ClientError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ClientError::InvalidAmount(format!(
                "{} is not a positive number",
                amount
            )));
        }
        let minor = (amount * 10f64.powi(i32::from(asset_scale))).round();
        if minor < 1.0 {
            return Err(ClientError::InvalidAmount(format!(
                "{} {} is below the smallest unit",
                amount, asset_code
            )));
        }
        if minor >= u64::MAX as f64 {
            return Err(ClientError::InvalidAmount(format!("{} is too large", amount)));
        }
        Ok(Self {
            value: (minor as u64).to_string(),
            asset_code: asset_code.to_string(),
            asset_scale,
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = usize::from(self.asset_scale);
        if scale == 0 {
            return write!(f, "{} {}", self.value, self.asset_code);
        }
        let digits = format!("{:0>width$}", self.value, width = scale + 1);
        let (whole, fraction) = digits.split_at(digits.len() - scale);
        write!(f, "{}.{} {}", whole, fraction, self.asset_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessType {
    IncomingPayment,
    OutgoingPayment,
    Quote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessAction {
    Create,
    Read,
    ReadAll,
    List,
    ListAll,
    Complete,
}

/// One entry of a GNAP access request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessItem {
    #[serde(rename = "type")]
    pub access_type: AccessType,
    pub actions: Vec<AccessAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenRequest {
    pub access: Vec<AccessItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractRequest {
    pub start: Vec<String>,
}

/// Body of a GNAP grant request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    pub access_token: AccessTokenRequest,
    /// Wallet address of the requesting client.
    pub client: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interact: Option<InteractRequest>,
}

impl GrantRequest {
    /// Interactive grant covering outgoing payments, incoming payments and
    /// quotes on the given wallet.
    pub fn wallet_connection(wallet: &WalletAddress, client: &str) -> Self {
        use AccessAction::*;
        Self {
            access_token: AccessTokenRequest {
                access: vec![
                    AccessItem {
                        access_type: AccessType::OutgoingPayment,
                        actions: vec![Create, Read, List, ListAll, ReadAll],
                        identifier: Some(wallet.id.clone()),
                    },
                    AccessItem {
                        access_type: AccessType::IncomingPayment,
                        actions: vec![Create, Read, List, ListAll, ReadAll, Complete],
                        identifier: Some(wallet.id.clone()),
                    },
                    AccessItem {
                        access_type: AccessType::Quote,
                        actions: vec![Create, Read, ReadAll],
                        identifier: None,
                    },
                ],
            },
            client: client.to_string(),
            interact: Some(InteractRequest {
                start: vec!["redirect".into()],
            }),
        }
    }

    /// Non-interactive grant to create incoming payments on a receiver wallet.
    pub fn incoming_payment(receiver_id: &str, client: &str) -> Self {
        Self {
            access_token: AccessTokenRequest {
                access: vec![AccessItem {
                    access_type: AccessType::IncomingPayment,
                    actions: vec![AccessAction::Create],
                    identifier: Some(receiver_id.to_string()),
                }],
            },
            client: client.to_string(),
            interact: None,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interact.is_some()
    }
}

/// A bearer access token together with its management URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub value: String,
    pub manage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueToken {
    pub value: String,
}

/// Continuation handle of a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantContinuation {
    pub access_token: ContinueToken,
    pub uri: String,
    /// Suggested poll interval in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractResponse {
    pub redirect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<String>,
}

/// Grant waiting on user interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGrant {
    pub interact: InteractResponse,
    #[serde(rename = "continue")]
    pub continuation: GrantContinuation,
}

/// Grant that carries an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedGrant {
    pub access_token: AccessToken,
    #[serde(rename = "continue", default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<GrantContinuation>,
}

/// Grant still waiting on the user, as answered by a continuation poll:
/// only the `continue` block, no interaction and no token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuingGrant {
    #[serde(rename = "continue")]
    pub continuation: GrantContinuation,
}

/// Response to a grant request or continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GrantResponse {
    Finalized(FinalizedGrant),
    Pending(PendingGrant),
    Continuing(ContinuingGrant),
}

impl GrantResponse {
    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized(_))
    }

    pub fn into_finalized(self) -> Option<FinalizedGrant> {
        match self {
            Self::Finalized(grant) => Some(grant),
            Self::Pending(_) | Self::Continuing(_) => None,
        }
    }
}

/// Body of a token rotation response.
#[derive(Debug, Clone, Deserialize)]
pub struct RotatedToken {
    pub access_token: AccessToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIncomingPayment {
    pub wallet_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming_amount: Option<Amount>,
    /// RFC 3339 expiry timestamp.
    pub expires_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingPayment {
    pub id: String,
    pub wallet_address: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutgoingPayment {
    pub wallet_address: String,
    /// URL of the receiver's incoming payment.
    pub incoming_payment: String,
    pub debit_amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingPayment {
    pub id: String,
    pub wallet_address: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debit_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_amount: Option<Amount>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// One page of a list response.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub result: Vec<T>,
}
