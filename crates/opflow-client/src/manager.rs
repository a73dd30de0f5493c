use opflow_core::{GrantConfig, NewWallet, PaymentsConfig, Store, StoreError, WalletCredential};
use std::sync::Arc;

use crate::cache::ClientCache;
use crate::error::ClientError;
use crate::executor::{NoopObserver, PaymentExecutor, TransferObserver};
use crate::grant::GrantOrchestrator;
use crate::interact::InteractionHandler;
use crate::traits::{ClientFactory, ClientHandle};
use crate::types::{normalize_wallet_url, OutgoingPayment};

/// Entry point for wallet and payment operations.
///
/// Owns the client cache and dispatches to the grant orchestrator and the
/// payment executor, loading and persisting wallet credentials through the
/// configured [`Store`].
pub struct OpenPayments {
    store: Arc<dyn Store>,
    cache: ClientCache,
    grants: GrantOrchestrator,
    executor: PaymentExecutor,
}

impl OpenPayments {
    pub fn new(
        store: Arc<dyn Store>,
        factory: Arc<dyn ClientFactory>,
        interaction: Arc<dyn InteractionHandler>,
        grant_config: GrantConfig,
        payments_config: PaymentsConfig,
    ) -> Self {
        Self {
            cache: ClientCache::new(factory),
            grants: GrantOrchestrator::new(grant_config, interaction),
            executor: PaymentExecutor::new(store.clone(), payments_config),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn cache(&self) -> &ClientCache {
        &self.cache
    }

    pub fn executor(&self) -> &PaymentExecutor {
        &self.executor
    }

    /// Stored credential for a wallet URL.
    pub fn wallet(&self, url: &str) -> Result<WalletCredential, ClientError> {
        let url = normalize_wallet_url(url);
        self.store
            .get_wallet_by_url(&url)?
            .ok_or(ClientError::Store(StoreError::WalletNotFound(url)))
    }

    /// Cached client for a stored wallet, created on first use.
    pub fn client_for(&self, wallet: &WalletCredential) -> Result<ClientHandle, ClientError> {
        self.cache.get_or_create(wallet)
    }

    /// Connect a wallet and persist its credentials.
    ///
    /// Failures are logged and reported as `None`; use
    /// [`try_connect_wallet`](Self::try_connect_wallet) for the cause.
    pub async fn connect_wallet(
        &self,
        url: &str,
        key_id: &str,
        private_key: &str,
        public_key: &str,
    ) -> Option<WalletCredential> {
        match self
            .try_connect_wallet(url, key_id, private_key, public_key)
            .await
        {
            Ok(wallet) => Some(wallet),
            Err(e) => {
                tracing::error!(wallet = %url, error = %e, "failed to connect wallet");
                None
            }
        }
    }

    pub async fn try_connect_wallet(
        &self,
        url: &str,
        key_id: &str,
        private_key: &str,
        public_key: &str,
    ) -> Result<WalletCredential, ClientError> {
        let url = normalize_wallet_url(url);
        if self.store.get_wallet_by_url(&url)?.is_some() {
            return Err(StoreError::Duplicate(url).into());
        }

        let client = self.cache.create(&url, private_key, key_id)?;
        let grant = self.grants.connect(&client, &url).await?;

        let wallet = self.store.insert_wallet(NewWallet {
            id: None,
            url,
            key_id: key_id.to_string(),
            private_key: private_key.to_string(),
            public_key: public_key.to_string(),
            access_token: grant.access_token.value,
            token_management_url: grant.access_token.manage,
            grant_continuation_token: grant.continuation.access_token.value,
            grant_continuation_uri: grant.continuation.uri,
        })?;
        tracing::info!(wallet = %wallet.url, id = %wallet.id, "wallet connected");
        Ok(wallet)
    }

    /// Revoke the wallet's grant through its continuation handle.
    ///
    /// The stored credential is kept; later calls with it fail at the server.
    pub async fn revoke_grant(&self, wallet_url: &str) -> Result<(), ClientError> {
        let wallet = self.wallet(wallet_url)?;
        let client = self.client_for(&wallet)?;
        client
            .cancel_grant(&wallet.grant_continuation_uri, &wallet.grant_continuation_token)
            .await?;
        tracing::info!(wallet = %wallet.url, "grant revoked");
        Ok(())
    }

    /// One transfer from a stored wallet.
    pub async fn send(
        &self,
        wallet_url: &str,
        receiver_url: &str,
        amount: f64,
        observer: &dyn TransferObserver,
    ) -> Result<OutgoingPayment, ClientError> {
        let mut wallet = self.wallet(wallet_url)?;
        let client = self.client_for(&wallet)?;
        let receiver_url = normalize_wallet_url(receiver_url);
        self.executor
            .transfer(&client, &mut wallet, &receiver_url, amount, observer)
            .await
    }

    /// Latest outgoing payments of a stored wallet.
    pub async fn list_outgoing_payments(
        &self,
        wallet_url: &str,
    ) -> Result<Vec<OutgoingPayment>, ClientError> {
        let mut wallet = self.wallet(wallet_url)?;
        let client = self.client_for(&wallet)?;
        self.executor
            .list_outgoing_payments(&client, &mut wallet, &NoopObserver)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sandbox::{SandboxCall, SandboxNetwork};
    use async_trait::async_trait;
    use opflow_core::MemoryStore;

    struct NoBrowser;

    #[async_trait]
    impl InteractionHandler for NoBrowser {
        async fn open(&self, _url: &str) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn payments(network: &SandboxNetwork) -> (OpenPayments, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let payments = OpenPayments::new(
            store.clone(),
            network.factory(),
            Arc::new(NoBrowser),
            GrantConfig::default(),
            PaymentsConfig::default(),
        );
        (payments, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_wallet_persists_credentials() {
        let network = SandboxNetwork::new();
        let (payments, store) = payments(&network);

        let wallet = payments
            .connect_wallet("$ilp.sandbox/alice", "optuikid_k", "priv", "pub")
            .await
            .unwrap();
        assert_eq!(wallet.url, "https://ilp.sandbox/alice");
        assert!(wallet.id.starts_with("wal_"));
        assert!(wallet.access_token.starts_with("token-"));

        let stored = store.get_wallet_by_url(&wallet.url).unwrap().unwrap();
        assert_eq!(stored, wallet);
        assert!(payments.cache().contains(&wallet.url));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_wallet_failure_returns_none() {
        let network = SandboxNetwork::new();
        network.set_connect_finalized(true);
        let (payments, store) = payments(&network);

        let wallet = payments
            .connect_wallet("https://ilp.sandbox/alice", "k", "priv", "pub")
            .await;
        assert!(wallet.is_none());
        assert_eq!(store.wallet_count(), 0);

        let err = payments
            .try_connect_wallet("https://ilp.sandbox/alice", "k", "priv", "pub")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::GrantAlreadyFinalized));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_twice_is_duplicate() {
        let network = SandboxNetwork::new();
        let (payments, _store) = payments(&network);
        payments
            .try_connect_wallet("https://ilp.sandbox/alice", "k", "priv", "pub")
            .await
            .unwrap();

        let err = payments
            .try_connect_wallet("https://ilp.sandbox/alice", "k", "priv", "pub")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Store(StoreError::Duplicate(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_and_history() {
        let network = SandboxNetwork::new();
        let (payments, _store) = payments(&network);
        payments
            .try_connect_wallet("https://ilp.sandbox/alice", "k", "priv", "pub")
            .await
            .unwrap();

        payments
            .send("https://ilp.sandbox/alice", "$ilp.sandbox/bob", 2.5, &NoopObserver)
            .await
            .unwrap();
        let history = payments
            .list_outgoing_payments("https://ilp.sandbox/alice")
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].debit_amount.as_ref().unwrap().value, "250");
        // client reused from the connect step
        assert_eq!(network.call_count(SandboxCall::ClientCreated), 1);
    }

    #[tokio::test]
    async fn test_send_from_unknown_wallet() {
        let network = SandboxNetwork::new();
        let (payments, _store) = payments(&network);
        let err = payments
            .send("https://ilp.sandbox/nobody", "https://ilp.sandbox/bob", 1.0, &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Store(StoreError::WalletNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_revoke_grant() {
        let network = SandboxNetwork::new();
        let (payments, _store) = payments(&network);
        payments
            .try_connect_wallet("https://ilp.sandbox/alice", "k", "priv", "pub")
            .await
            .unwrap();

        payments.revoke_grant("https://ilp.sandbox/alice").await.unwrap();
        assert_eq!(network.call_count(SandboxCall::GrantCancel), 1);
    }
}
