//! RocksDB storage backend for wallets and flows.

use opflow_core::{new_flow, Flow, NewWallet, Store, StoreError, WalletCredential};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Column family names for different data types.
const CF_WALLETS: &str = "wallets";
const CF_FLOWS: &str = "flows";

/// RocksDB-backed [`Store`]. Wallets are keyed by URL, flows by id, values
/// are JSON.
pub struct RocksStore {
    db: DB,
    // serializes read-then-write sequences
    writes: Mutex<()>,
}

fn backend(e: rocksdb::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path).map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_WALLETS, Options::default()),
            ColumnFamilyDescriptor::new(CF_FLOWS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors).map_err(backend)?;
        tracing::debug!(path = %path.display(), "opened store");
        Ok(Self {
            db,
            writes: Mutex::new(()),
        })
    }

    fn write_lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.writes
            .lock()
            .map_err(|_| StoreError::Backend("store write lock poisoned".into()))
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Backend(format!("column family '{}' not found", name)))
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.db
            .put_cf(self.cf(cf_name)?, key.as_bytes(), bytes)
            .map_err(backend)
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>, StoreError> {
        match self
            .db
            .get_cf(self.cf(cf_name)?, key.as_bytes())
            .map_err(backend)?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>, StoreError> {
        let mut records = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf_name)?, IteratorMode::Start) {
            let (_, value) = item.map_err(backend)?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}

impl Store for RocksStore {
    fn get_wallet_by_url(&self, url: &str) -> Result<Option<WalletCredential>, StoreError> {
        self.get(CF_WALLETS, url)
    }

    fn list_wallets(&self) -> Result<Vec<WalletCredential>, StoreError> {
        let mut wallets: Vec<WalletCredential> = self.scan(CF_WALLETS)?;
        wallets.sort_by_key(|w| w.created_at);
        Ok(wallets)
    }

    fn insert_wallet(&self, wallet: NewWallet) -> Result<WalletCredential, StoreError> {
        let _guard = self.write_lock()?;
        if self.get_wallet_by_url(&wallet.url)?.is_some() {
            return Err(StoreError::Duplicate(wallet.url));
        }
        let credential = wallet.into_credential();
        self.put(CF_WALLETS, &credential.url, &credential)?;
        tracing::debug!(wallet = %credential.url, id = %credential.id, "stored wallet");
        Ok(credential)
    }

    fn update_wallet_token(
        &self,
        url: &str,
        access_token: &str,
        management_url: &str,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock()?;
        let mut wallet = self
            .get_wallet_by_url(url)?
            .ok_or_else(|| StoreError::WalletNotFound(url.to_string()))?;
        wallet.apply_rotation(access_token, management_url);
        self.put(CF_WALLETS, url, &wallet)
    }

    fn list_flows(&self) -> Result<Vec<Flow>, StoreError> {
        self.scan(CF_FLOWS)
    }

    fn insert_flow(&self, id: &str, name: &str, steps: &str) -> Result<Flow, StoreError> {
        let _guard = self.write_lock()?;
        if self.get::<Flow>(CF_FLOWS, id)?.is_some() {
            return Err(StoreError::Duplicate(id.to_string()));
        }
        let flow = new_flow(Some(id), name, steps);
        self.put(CF_FLOWS, id, &flow)?;
        Ok(flow)
    }

    fn get_flow(&self, id: &str) -> Result<Option<Flow>, StoreError> {
        self.get(CF_FLOWS, id)
    }
}
