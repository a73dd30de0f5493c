use opflow_core::GrantConfig;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ClientError;
use crate::interact::InteractionHandler;
use crate::poll::poll_until;
use crate::traits::ClientHandle;
use crate::types::{AccessToken, GrantContinuation, GrantRequest, GrantResponse, WalletAddress};

/// Outcome of a successful wallet connection.
#[derive(Debug, Clone)]
pub struct ConnectedGrant {
    pub wallet: WalletAddress,
    pub access_token: AccessToken,
    pub continuation: GrantContinuation,
}

/// Runs the interactive GNAP grant for connecting a wallet.
pub struct GrantOrchestrator {
    config: GrantConfig,
    interaction: Arc<dyn InteractionHandler>,
}

impl GrantOrchestrator {
    pub fn new(config: GrantConfig, interaction: Arc<dyn InteractionHandler>) -> Self {
        Self {
            config,
            interaction,
        }
    }

    /// Request an interactive grant for `wallet_url`, send the user to the
    /// authorization page and poll the continuation until the grant is
    /// finalized.
    pub async fn connect(
        &self,
        client: &ClientHandle,
        wallet_url: &str,
    ) -> Result<ConnectedGrant, ClientError> {
        let wallet = client.get_wallet_address(wallet_url).await?;
        let request = GrantRequest::wallet_connection(&wallet, client.wallet_address_url());

        let pending = match client.request_grant(&wallet.auth_server, &request).await? {
            GrantResponse::Finalized(_) => return Err(ClientError::GrantAlreadyFinalized),
            GrantResponse::Pending(pending) => pending,
            GrantResponse::Continuing(_) => {
                return Err(ClientError::InvalidResponse {
                    url: wallet.auth_server.clone(),
                    reason: "interactive grant request answered without interaction".into(),
                })
            }
        };

        let redirect = &pending.interact.redirect;
        tracing::info!(wallet = %wallet.id, %redirect, "waiting for grant authorization");
        if let Err(e) = self.interaction.open(redirect).await {
            tracing::warn!(error = %e, %redirect, "could not open authorization URL");
        }
        tokio::time::sleep(self.config.settle_delay()).await;

        let interval = pending
            .continuation
            .wait
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.config.poll_interval());
        let uri = pending.continuation.uri.as_str();
        let token = pending.continuation.access_token.value.as_str();

        let finalized = poll_until(interval, self.config.poll_timeout(), move || async move {
            client
                .continue_grant(uri, token)
                .await
                .map(GrantResponse::into_finalized)
        })
        .await?;

        tracing::info!(wallet = %wallet.id, "grant finalized");
        let continuation = finalized
            .continuation
            .unwrap_or_else(|| pending.continuation.clone());
        Ok(ConnectedGrant {
            wallet,
            access_token: finalized.access_token,
            continuation,
        })
    }
}
