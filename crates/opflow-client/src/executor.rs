use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use opflow_core::{PaymentsConfig, Store, WalletCredential};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::ClientError;
use crate::traits::ClientHandle;
use crate::types::{
    Amount, CreateIncomingPayment, CreateOutgoingPayment, GrantRequest, GrantResponse,
    OutgoingPayment,
};

/// Progress points of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    ResolvingReceiver,
    RequestingIncomingPaymentGrant,
    CreatingIncomingPayment,
    ResolvingSender,
    CreatingOutgoingPayment,
    RotatingToken,
}

impl TransferStep {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ResolvingReceiver => "Getting receiver information...",
            Self::RequestingIncomingPaymentGrant => "Creating incoming payment grant...",
            Self::CreatingIncomingPayment => "Creating incoming payment...",
            Self::ResolvingSender => "Getting sender information...",
            Self::CreatingOutgoingPayment => "Creating outgoing payment...",
            Self::RotatingToken => "Token expired, rotating...",
        }
    }
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Receives transfer progress.
///
/// Returning an error aborts the transfer with that error.
#[async_trait]
pub trait TransferObserver: Send + Sync {
    async fn on_step(&self, step: TransferStep) -> Result<(), ClientError>;
}

/// Observer that ignores progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

#[async_trait]
impl TransferObserver for NoopObserver {
    async fn on_step(&self, _step: TransferStep) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Executes transfers and history reads for a connected wallet, rotating
/// its access token whenever the resource server reports it expired.
pub struct PaymentExecutor {
    store: Arc<dyn Store>,
    config: PaymentsConfig,
}

impl PaymentExecutor {
    pub fn new(store: Arc<dyn Store>, config: PaymentsConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &PaymentsConfig {
        &self.config
    }

    /// Pay `amount` (in the sender's asset, decimal) from `sender` to the
    /// wallet at `receiver_url`.
    ///
    /// Creates a receiver-side incoming payment with a short expiry, then an
    /// outgoing payment against it. Only the outgoing payment call is retried
    /// on token expiry; a rotated token is persisted before `sender` is
    /// updated and the call replayed.
    pub async fn transfer(
        &self,
        client: &ClientHandle,
        sender: &mut WalletCredential,
        receiver_url: &str,
        amount: f64,
        observer: &dyn TransferObserver,
    ) -> Result<OutgoingPayment, ClientError> {
        observer.on_step(TransferStep::ResolvingReceiver).await?;
        let receiver = client.get_wallet_address(receiver_url).await?;

        observer
            .on_step(TransferStep::RequestingIncomingPaymentGrant)
            .await?;
        let grant_request = GrantRequest::incoming_payment(&receiver.id, client.wallet_address_url());
        let incoming_grant = match client.request_grant(&receiver.auth_server, &grant_request).await? {
            GrantResponse::Finalized(grant) => grant,
            GrantResponse::Pending(_) | GrantResponse::Continuing(_) => {
                return Err(ClientError::PendingIncomingPaymentGrant)
            }
        };

        observer.on_step(TransferStep::CreatingIncomingPayment).await?;
        let expires_at = Utc::now()
            + ChronoDuration::seconds(self.config.incoming_payment_expiry_secs as i64);
        let incoming = client
            .create_incoming_payment(
                &receiver.resource_server,
                &incoming_grant.access_token.value,
                &CreateIncomingPayment {
                    wallet_address: receiver.id.clone(),
                    incoming_amount: None,
                    expires_at: expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                },
            )
            .await?;

        observer.on_step(TransferStep::ResolvingSender).await?;
        let sender_wallet = client.get_wallet_address(&sender.url).await?;
        let request = CreateOutgoingPayment {
            wallet_address: sender_wallet.id.clone(),
            incoming_payment: incoming.id.clone(),
            debit_amount: Amount::from_decimal(
                amount,
                &sender_wallet.asset_code,
                sender_wallet.asset_scale,
            )?,
        };

        observer.on_step(TransferStep::CreatingOutgoingPayment).await?;
        let resource_server = sender_wallet.resource_server.as_str();
        let request = &request;
        let payment = self
            .with_token_rotation(client, sender, observer, move |token| async move {
                client
                    .create_outgoing_payment(resource_server, &token, request)
                    .await
            })
            .await?;

        tracing::info!(
            sender = %sender.url,
            receiver = %receiver.id,
            payment = %payment.id,
            value = %request.debit_amount.value,
            "outgoing payment created"
        );
        Ok(payment)
    }

    /// Most recent outgoing payments of `wallet`, rotating its token if needed.
    pub async fn list_outgoing_payments(
        &self,
        client: &ClientHandle,
        wallet: &mut WalletCredential,
        observer: &dyn TransferObserver,
    ) -> Result<Vec<OutgoingPayment>, ClientError> {
        let info = client.get_wallet_address(&wallet.url).await?;
        let resource_server = info.resource_server.as_str();
        let wallet_id = info.id.as_str();
        let first = self.config.history_page_size;
        self.with_token_rotation(client, wallet, observer, move |token| async move {
            client
                .list_outgoing_payments(resource_server, &token, wallet_id, first)
                .await
        })
        .await
    }

    /// Run `call` with the wallet's current access token, rotating and
    /// replaying it for as long as the token is reported expired.
    ///
    /// The rotation count is bounded only by `max_token_rotations`.
    async fn with_token_rotation<T, F, Fut>(
        &self,
        client: &ClientHandle,
        wallet: &mut WalletCredential,
        observer: &dyn TransferObserver,
        mut call: F,
    ) -> Result<T, ClientError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut rotations = 0u32;
        loop {
            let err = match call(wallet.access_token.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_token_expired() => err,
                Err(err) => return Err(err),
            };

            if let Some(max) = self.config.max_token_rotations {
                if rotations >= max {
                    tracing::warn!(wallet = %wallet.url, rotations, "token rotation limit reached");
                    return Err(ClientError::RotationLimitExceeded(max));
                }
            }

            tracing::info!(wallet = %wallet.url, error = %err, "access token expired, rotating");
            observer.on_step(TransferStep::RotatingToken).await?;
            let rotated = client
                .rotate_token(&wallet.token_management_url, &wallet.access_token)
                .await?;

            self.store
                .update_wallet_token(&wallet.url, &rotated.value, &rotated.manage)?;
            wallet.apply_rotation(&rotated.value, &rotated.manage);
            rotations += 1;
        }
    }
}
