//! Fixtures shared by the integration tests: a sandboxed payments stack over
//! an in-memory store.

use async_trait::async_trait;
use opflow_client::{ClientError, InteractionHandler, OpenPayments, SandboxNetwork};
use opflow_core::{
    GrantConfig, MemoryStore, NewWallet, PaymentsConfig, Store, WalletCredential,
};
use opflow_flow::{FlowEngine, LogLevel, StepEvent};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const ALICE: &str = "https://ilp.sandbox/alice";
pub const BOB: &str = "https://ilp.sandbox/bob";
pub const CAROL: &str = "https://ilp.sandbox/carol";

/// Records authorization URLs instead of opening a browser.
#[derive(Default)]
pub struct RecordingBrowser {
    opened: Mutex<Vec<String>>,
    count: AtomicU32,
}

impl RecordingBrowser {
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InteractionHandler for RecordingBrowser {
    async fn open(&self, url: &str) -> Result<(), ClientError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(url.to_string());
        }
        Ok(())
    }
}

/// A payments stack wired to a [`SandboxNetwork`].
pub struct Harness {
    pub network: SandboxNetwork,
    pub store: Arc<dyn Store>,
    pub browser: Arc<RecordingBrowser>,
    pub payments: Arc<OpenPayments>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), PaymentsConfig::default())
    }

    pub fn with_config(payments: PaymentsConfig) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), payments)
    }

    pub fn with_store(store: Arc<dyn Store>, payments: PaymentsConfig) -> Self {
        let network = SandboxNetwork::new();
        let browser = Arc::new(RecordingBrowser::default());
        let facade = OpenPayments::new(
            store.clone(),
            network.factory(),
            browser.clone(),
            GrantConfig::default(),
            payments,
        );
        Self {
            network,
            store,
            browser,
            payments: Arc::new(facade),
        }
    }

    pub fn engine(&self) -> FlowEngine {
        FlowEngine::new(self.payments.clone())
    }

    /// Store a wallet as if it had been connected earlier.
    pub fn seed_wallet(&self, url: &str) -> WalletCredential {
        self.store
            .insert_wallet(seeded_wallet(url))
            .expect("seed wallet")
    }

    pub fn wallet(&self, url: &str) -> WalletCredential {
        self.store
            .get_wallet_by_url(url)
            .expect("store")
            .expect("wallet stored")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn seeded_wallet(url: &str) -> NewWallet {
    NewWallet {
        id: None,
        url: url.to_string(),
        key_id: "optuikid_seed".into(),
        private_key: "seed-private".into(),
        public_key: "seed-public".into(),
        access_token: "token-seed".into(),
        token_management_url: "https://auth.sandbox/token/seed".into(),
        grant_continuation_token: "continue-seed".into(),
        grant_continuation_uri: "https://auth.sandbox/continue/seed".into(),
    }
}

/// Messages logged at `level`, in order.
pub fn messages(events: &[StepEvent], level: LogLevel) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.level() == Some(level))
        .filter_map(|e| e.message().map(str::to_string))
        .collect()
}
