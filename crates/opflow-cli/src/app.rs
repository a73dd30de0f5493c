//! Wiring shared by the subcommands: configuration, store and the payments facade.

use opflow_client::{
    ClientFactory, HttpClientFactory, OpenPayments, SandboxNetwork, SystemBrowser,
};
use opflow_core::{MemoryStore, NewWallet, OpflowConfig, Store};
use std::sync::Arc;

use crate::storage::RocksStore;

pub struct App {
    pub config: OpflowConfig,
    store: Arc<RocksStore>,
}

impl App {
    /// Open the store under the configured data directory.
    pub fn open(config: OpflowConfig) -> anyhow::Result<Self> {
        let path = config.storage.data_dir.join("db");
        let store = RocksStore::open(&path)?;
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    /// Payments facade talking to the real wallets.
    pub fn payments(&self) -> Arc<OpenPayments> {
        let factory: Arc<dyn ClientFactory> =
            Arc::new(HttpClientFactory::new(self.config.http.clone()));
        self.build(self.store(), factory)
    }

    /// Payments facade bound to an in-process sandbox.
    ///
    /// Works on a throw-away copy of the stored wallets so that sandbox tokens
    /// never replace real credentials.
    pub fn sandbox_payments(&self) -> anyhow::Result<Arc<OpenPayments>> {
        let scratch = MemoryStore::new();
        for wallet in self.store.list_wallets()? {
            scratch.insert_wallet(NewWallet {
                id: Some(wallet.id),
                url: wallet.url,
                key_id: wallet.key_id,
                private_key: wallet.private_key,
                public_key: wallet.public_key,
                access_token: wallet.access_token,
                token_management_url: wallet.token_management_url,
                grant_continuation_token: wallet.grant_continuation_token,
                grant_continuation_uri: wallet.grant_continuation_uri,
            })?;
        }
        tracing::info!(wallets = scratch.wallet_count(), "using sandbox network");
        Ok(self.build(Arc::new(scratch), SandboxNetwork::new().factory()))
    }

    /// Pick the sandbox or the real network.
    pub fn payments_for(&self, sandbox: bool) -> anyhow::Result<Arc<OpenPayments>> {
        if sandbox {
            self.sandbox_payments()
        } else {
            Ok(self.payments())
        }
    }

    fn build(&self, store: Arc<dyn Store>, factory: Arc<dyn ClientFactory>) -> Arc<OpenPayments> {
        Arc::new(OpenPayments::new(
            store,
            factory,
            Arc::new(SystemBrowser),
            self.config.grant.clone(),
            self.config.payments.clone(),
        ))
    }
}
