//! opflow core
//!
//! Shared vocabulary for the opflow workspace: persisted wallet credentials
//! and flow records, the store interface the payment layer consumes, prefixed
//! identifiers and the TOML configuration.

pub mod config;
pub mod error;
pub mod identifier;
pub mod store;
pub mod types;

pub use config::{ConfigError, GrantConfig, HttpConfig, LoggingConfig, OpflowConfig, PaymentsConfig, StorageConfig};
pub use error::StoreError;
pub use identifier::{IdPrefix, Identifier};
pub use store::{new_flow, MemoryStore, Store};
pub use types::{Flow, NewWallet, WalletCredential};
