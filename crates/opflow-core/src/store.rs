//! Persistence interface consumed by the payment and flow layers.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::identifier::{IdPrefix, Identifier};
use crate::types::{Flow, NewWallet, WalletCredential};

/// Key-value style store of wallet credentials and flows.
///
/// Wallets are keyed by their URL, flows by their id.
pub trait Store: Send + Sync {
    /// Look up a wallet credential by wallet address URL.
    fn get_wallet_by_url(&self, url: &str) -> Result<Option<WalletCredential>, StoreError>;

    /// List every stored wallet credential.
    fn list_wallets(&self) -> Result<Vec<WalletCredential>, StoreError>;

    /// Insert a freshly connected wallet. Fails if the URL is already stored.
    fn insert_wallet(&self, wallet: NewWallet) -> Result<WalletCredential, StoreError>;

    /// Persist a rotated access token and management URL.
    fn update_wallet_token(
        &self,
        url: &str,
        access_token: &str,
        management_url: &str,
    ) -> Result<(), StoreError>;

    /// List every stored flow.
    fn list_flows(&self) -> Result<Vec<Flow>, StoreError>;

    /// Insert a flow under the given id.
    fn insert_flow(&self, id: &str, name: &str, steps: &str) -> Result<Flow, StoreError>;

    /// Look up a flow by id.
    fn get_flow(&self, id: &str) -> Result<Option<Flow>, StoreError>;
}

/// Build a new flow record, generating an id when none is given.
pub fn new_flow(id: Option<&str>, name: &str, steps: &str) -> Flow {
    Flow {
        id: id
            .map(str::to_string)
            .unwrap_or_else(|| Identifier::create(IdPrefix::Flow)),
        name: name.to_string(),
        steps: steps.to_string(),
    }
}

/// In-memory [`Store`] used by tests and throw-away sessions.
#[derive(Default)]
pub struct MemoryStore {
    wallets: DashMap<String, WalletCredential>,
    flows: DashMap<String, Flow>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored wallets.
    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }
}

impl Store for MemoryStore {
    fn get_wallet_by_url(&self, url: &str) -> Result<Option<WalletCredential>, StoreError> {
        Ok(self.wallets.get(url).map(|w| w.clone()))
    }

    fn list_wallets(&self) -> Result<Vec<WalletCredential>, StoreError> {
        let mut wallets: Vec<_> = self.wallets.iter().map(|w| w.value().clone()).collect();
        wallets.sort_by_key(|w| w.created_at);
        Ok(wallets)
    }

    fn insert_wallet(&self, wallet: NewWallet) -> Result<WalletCredential, StoreError> {
        // check and insert under one shard lock
        let slot = match self.wallets.entry(wallet.url.clone()) {
            Entry::Occupied(_) => return Err(StoreError::Duplicate(wallet.url)),
            Entry::Vacant(slot) => slot,
        };
        let credential = wallet.into_credential();
        slot.insert(credential.clone());
        tracing::debug!(wallet = %credential.url, id = %credential.id, "stored wallet");
        Ok(credential)
    }

    fn update_wallet_token(
        &self,
        url: &str,
        access_token: &str,
        management_url: &str,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .wallets
            .get_mut(url)
            .ok_or_else(|| StoreError::WalletNotFound(url.to_string()))?;
        entry.access_token = access_token.to_string();
        entry.token_management_url = management_url.to_string();
        entry.updated_at = Utc::now().timestamp_millis();
        Ok(())
    }

    fn list_flows(&self) -> Result<Vec<Flow>, StoreError> {
        let mut flows: Vec<_> = self.flows.iter().map(|f| f.value().clone()).collect();
        flows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(flows)
    }

    fn insert_flow(&self, id: &str, name: &str, steps: &str) -> Result<Flow, StoreError> {
        match self.flows.entry(id.to_string()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(id.to_string())),
            Entry::Vacant(slot) => {
                let flow = new_flow(Some(id), name, steps);
                slot.insert(flow.clone());
                Ok(flow)
            }
        }
    }

    fn get_flow(&self, id: &str) -> Result<Option<Flow>, StoreError> {
        Ok(self.flows.get(id).map(|f| f.clone()))
    }
}
