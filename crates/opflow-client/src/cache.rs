use dashmap::DashMap;
use opflow_core::WalletCredential;
use std::sync::Arc;

use crate::error::ClientError;
use crate::traits::{ClientFactory, ClientHandle};
use crate::types::normalize_wallet_url;

/// Process-wide cache of authenticated clients keyed by wallet URL.
///
/// Entries are never evicted; a client lives as long as the cache.
pub struct ClientCache {
    factory: Arc<dyn ClientFactory>,
    clients: DashMap<String, ClientHandle>,
}

impl ClientCache {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            clients: DashMap::new(),
        }
    }

    /// Cached client for a wallet URL, if any.
    pub fn get(&self, wallet_url: &str) -> Option<ClientHandle> {
        self.clients
            .get(&normalize_wallet_url(wallet_url))
            .map(|c| c.value().clone())
    }

    /// Build a client and cache it, replacing any existing entry.
    pub fn create(
        &self,
        wallet_url: &str,
        private_key: &str,
        key_id: &str,
    ) -> Result<ClientHandle, ClientError> {
        let url = normalize_wallet_url(wallet_url);
        let client = self.factory.create(&url, private_key, key_id)?;
        self.clients.insert(url.clone(), client.clone());
        tracing::debug!(wallet = %url, cached = self.clients.len(), "cached client");
        Ok(client)
    }

    /// Cached client for the wallet, created from its stored keys on a miss.
    pub fn get_or_create(&self, wallet: &WalletCredential) -> Result<ClientHandle, ClientError> {
        match self.get(&wallet.url) {
            Some(client) => Ok(client),
            None => self.create(&wallet.url, &wallet.private_key, &wallet.key_id),
        }
    }

    pub fn contains(&self, wallet_url: &str) -> bool {
        self.clients.contains_key(&normalize_wallet_url(wallet_url))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
