use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ClientError;
use crate::types::{
    AccessToken, CreateIncomingPayment, CreateOutgoingPayment, GrantRequest, GrantResponse,
    IncomingPayment, OutgoingPayment, WalletAddress,
};

/// Open Payments protocol interface.
///
/// A client is bound to one wallet address and signs every request with
/// that wallet's key. Implementations bridge to a concrete transport (the
/// signed HTTP adapter, or the in-process sandbox).
#[async_trait]
pub trait OpenPaymentsApi: Send + Sync {
    /// Wallet address this client acts for.
    fn wallet_address_url(&self) -> &str;

    /// Fetch public wallet address metadata.
    async fn get_wallet_address(&self, url: &str) -> Result<WalletAddress, ClientError>;

    /// Request a new grant from an authorization server.
    async fn request_grant(
        &self,
        auth_server: &str,
        request: &GrantRequest,
    ) -> Result<GrantResponse, ClientError>;

    /// Continue a pending grant.
    async fn continue_grant(
        &self,
        continue_uri: &str,
        continue_token: &str,
    ) -> Result<GrantResponse, ClientError>;

    /// Cancel (revoke) a grant through its continuation handle.
    async fn cancel_grant(&self, continue_uri: &str, continue_token: &str)
        -> Result<(), ClientError>;

    /// Exchange an access token for a fresh one.
    async fn rotate_token(
        &self,
        management_url: &str,
        access_token: &str,
    ) -> Result<AccessToken, ClientError>;

    async fn create_incoming_payment(
        &self,
        resource_server: &str,
        access_token: &str,
        request: &CreateIncomingPayment,
    ) -> Result<IncomingPayment, ClientError>;

    async fn create_outgoing_payment(
        &self,
        resource_server: &str,
        access_token: &str,
        request: &CreateOutgoingPayment,
    ) -> Result<OutgoingPayment, ClientError>;

    /// First `first` outgoing payments of a wallet.
    async fn list_outgoing_payments(
        &self,
        resource_server: &str,
        access_token: &str,
        wallet_address: &str,
        first: u32,
    ) -> Result<Vec<OutgoingPayment>, ClientError>;
}

/// Shared handle to a client.
pub type ClientHandle = Arc<dyn OpenPaymentsApi>;

/// Builds authenticated clients from wallet key material.
pub trait ClientFactory: Send + Sync {
    fn create(
        &self,
        wallet_url: &str,
        private_key: &str,
        key_id: &str,
    ) -> Result<ClientHandle, ClientError>;
}
