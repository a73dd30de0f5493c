//! opflow Open Payments client
//!
//! Provides the protocol abstraction, the signed HTTP adapter and an
//! in-process sandbox, plus the client cache, GNAP grant negotiation and the
//! payment executor with its token-rotation retry policy. [`OpenPayments`]
//! ties them together for callers.

pub mod error;
pub mod types;
pub mod traits;
pub mod cache;
pub mod poll;
pub mod interact;
pub mod grant;
pub mod executor;
pub mod manager;
pub mod adapters;

pub use error::{ClientError, INACTIVE_TOKEN, INVALID_TOKEN};
pub use types::{
    normalize_wallet_url, AccessToken, Amount, ContinuingGrant, GrantContinuation, GrantRequest,
    GrantResponse, IncomingPayment, OutgoingPayment, WalletAddress,
};
pub use traits::{ClientFactory, ClientHandle, OpenPaymentsApi};
pub use cache::ClientCache;
pub use interact::{InteractionHandler, SystemBrowser};
pub use grant::{ConnectedGrant, GrantOrchestrator};
pub use executor::{NoopObserver, PaymentExecutor, TransferObserver, TransferStep};
pub use manager::OpenPayments;
pub use adapters::http::{HttpClient, HttpClientFactory};
pub use adapters::sandbox::{SandboxCall, SandboxFactory, SandboxNetwork};
