use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{ClientError, INVALID_TOKEN};
use crate::traits::{ClientFactory, ClientHandle, OpenPaymentsApi};
use crate::types::{
    normalize_wallet_url, AccessToken, ContinueToken, CreateIncomingPayment,
    ContinuingGrant, CreateOutgoingPayment, FinalizedGrant, GrantContinuation, GrantRequest, GrantResponse,
    IncomingPayment, InteractResponse, OutgoingPayment, PendingGrant, WalletAddress,
};

pub const SANDBOX_AUTH_SERVER: &str = "https://auth.sandbox";
pub const SANDBOX_RESOURCE_SERVER: &str = "https://rs.sandbox";

/// Operations counted by the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxCall {
    ClientCreated,
    WalletLookup,
    GrantRequest,
    GrantContinue,
    GrantCancel,
    TokenRotation,
    IncomingPayment,
    OutgoingPayment,
    OutgoingPaymentList,
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    status: u16,
    description: String,
}

#[derive(Default)]
struct NetworkState {
    wallets: DashMap<String, WalletAddress>,
    unreachable: DashSet<String>,
    calls: DashMap<SandboxCall, u32>,
    /// Continuations answered with a pending grant before one finalizes.
    pending_rounds: AtomicU32,
    connect_finalized: AtomicBool,
    /// Pending polls carry only the `continue` block.
    continue_only_polls: AtomicBool,
    /// `(uri, token)` presented to grant continuation.
    continuations: Mutex<Vec<(String, String)>>,
    /// `(access token, management url)` presented to token rotation.
    rotations: Mutex<Vec<(String, String)>>,
    incoming_grant_pending: AtomicBool,
    rotation_failure: Mutex<Option<ScriptedFailure>>,
    /// Consumed in order by outgoing payment create and list calls.
    resource_failures: Mutex<VecDeque<ScriptedFailure>>,
    payments: Mutex<Vec<OutgoingPayment>>,
    tokens_used: Mutex<Vec<String>>,
    sequence: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process Open Payments network.
///
/// Serves wallet metadata, grants, tokens and payments from memory so flows
/// can be dry-run without touching real wallets. Unknown wallet URLs are
/// registered on first lookup as USD wallets with scale 2. Failures can be
/// scripted per operation, and every call is counted.
#[derive(Clone, Default)]
pub struct SandboxNetwork {
    state: Arc<NetworkState>,
}

impl SandboxNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client factory bound to this network.
    pub fn factory(&self) -> Arc<dyn ClientFactory> {
        Arc::new(SandboxFactory {
            network: self.clone(),
        })
    }

    /// Client acting for `wallet_url`, bypassing the factory.
    pub fn client(&self, wallet_url: &str) -> ClientHandle {
        Arc::new(SandboxClient {
            network: self.clone(),
            wallet_address_url: normalize_wallet_url(wallet_url),
        })
    }

    /// Register a wallet with an explicit asset.
    pub fn register_wallet(&self, url: &str, asset_code: &str, asset_scale: u8) -> WalletAddress {
        let url = normalize_wallet_url(url);
        let wallet = WalletAddress {
            id: url.clone(),
            public_name: None,
            asset_code: asset_code.to_string(),
            asset_scale,
            auth_server: SANDBOX_AUTH_SERVER.to_string(),
            resource_server: SANDBOX_RESOURCE_SERVER.to_string(),
        };
        self.state.wallets.insert(url, wallet.clone());
        wallet
    }

    /// Make lookups of `url` fail with 404.
    pub fn set_unreachable(&self, url: &str) {
        self.state.unreachable.insert(normalize_wallet_url(url));
    }

    /// Number of grant continuations answered as still pending.
    pub fn set_pending_rounds(&self, rounds: u32) {
        self.state.pending_rounds.store(rounds, Ordering::SeqCst);
    }

    /// Answer interactive grant requests with an already finalized grant.
    pub fn set_connect_finalized(&self, finalized: bool) {
        self.state.connect_finalized.store(finalized, Ordering::SeqCst);
    }

    /// Answer pending continuation polls with a body holding only `continue`,
    /// the way authorization servers do while the user has not decided yet.
    pub fn set_continue_only_polls(&self, continue_only: bool) {
        self.state
            .continue_only_polls
            .store(continue_only, Ordering::SeqCst);
    }

    /// Answer incoming payment grant requests with a pending grant.
    pub fn set_incoming_grant_pending(&self, pending: bool) {
        self.state
            .incoming_grant_pending
            .store(pending, Ordering::SeqCst);
    }

    /// Fail every token rotation with the given status.
    pub fn fail_rotation(&self, status: u16, description: &str) {
        *lock(&self.state.rotation_failure) = Some(ScriptedFailure {
            status,
            description: description.to_string(),
        });
    }

    /// Fail the next outgoing payment call (create or list).
    pub fn fail_next_outgoing(&self, status: u16, description: &str) {
        lock(&self.state.resource_failures).push_back(ScriptedFailure {
            status,
            description: description.to_string(),
        });
    }

    /// Reject the next `times` outgoing payment calls as token-expired.
    pub fn expire_token(&self, times: u32) {
        for _ in 0..times {
            self.fail_next_outgoing(401, INVALID_TOKEN);
        }
    }

    pub fn call_count(&self, call: SandboxCall) -> u32 {
        self.state.calls.get(&call).map(|c| *c).unwrap_or(0)
    }

    /// Outgoing payments created so far, in creation order.
    pub fn outgoing_payments(&self) -> Vec<OutgoingPayment> {
        lock(&self.state.payments).clone()
    }

    /// Access tokens presented to the outgoing payment endpoints, in order.
    pub fn tokens_used(&self) -> Vec<String> {
        lock(&self.state.tokens_used).clone()
    }

    /// Continuation `(uri, token)` pairs presented to the grant endpoint, in order.
    pub fn continuations_presented(&self) -> Vec<(String, String)> {
        lock(&self.state.continuations).clone()
    }

    /// `(access token, management url)` pairs presented for rotation, in order.
    pub fn rotations_presented(&self) -> Vec<(String, String)> {
        lock(&self.state.rotations).clone()
    }

    fn record(&self, call: SandboxCall) -> u32 {
        let mut count = self.state.calls.entry(call).or_insert(0);
        *count += 1;
        *count
    }

    fn next_id(&self) -> u64 {
        self.state.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn lookup(&self, url: &str) -> Result<WalletAddress, ClientError> {
        let url = normalize_wallet_url(url);
        if self.state.unreachable.contains(&url) {
            return Err(ClientError::api("GET", &url, 404, "Not Found"));
        }
        if let Some(wallet) = self.state.wallets.get(&url) {
            return Ok(wallet.clone());
        }
        Ok(self.register_wallet(&url, "USD", 2))
    }

    fn pending_grant(&self, continue_uri: &str, continue_token: &str) -> GrantResponse {
        let id = self.next_id();
        GrantResponse::Pending(PendingGrant {
            interact: InteractResponse {
                redirect: format!("{}/interact/{}", SANDBOX_AUTH_SERVER, id),
                finish: None,
            },
            continuation: GrantContinuation {
                access_token: ContinueToken {
                    value: continue_token.to_string(),
                },
                uri: continue_uri.to_string(),
                wait: None,
            },
        })
    }

    fn finalized_grant(&self) -> GrantResponse {
        let id = self.next_id();
        GrantResponse::Finalized(FinalizedGrant {
            access_token: AccessToken {
                value: format!("token-{}", id),
                manage: format!("{}/token/{}", SANDBOX_AUTH_SERVER, id),
                expires_in: Some(600),
            },
            continuation: Some(GrantContinuation {
                access_token: ContinueToken {
                    value: format!("continue-{}", id),
                },
                uri: format!("{}/continue/{}", SANDBOX_AUTH_SERVER, id),
                wait: None,
            }),
        })
    }

    fn take_resource_failure(&self, method: &str, url: &str) -> Result<(), ClientError> {
        match lock(&self.state.resource_failures).pop_front() {
            Some(failure) => Err(ClientError::api(
                method,
                url,
                failure.status,
                failure.description,
            )),
            None => Ok(()),
        }
    }
}

/// [`ClientFactory`] handing out sandbox clients. Key material is not checked.
pub struct SandboxFactory {
    network: SandboxNetwork,
}

impl ClientFactory for SandboxFactory {
    fn create(
        &self,
        wallet_url: &str,
        _private_key: &str,
        _key_id: &str,
    ) -> Result<ClientHandle, ClientError> {
        self.network.record(SandboxCall::ClientCreated);
        Ok(self.network.client(wallet_url))
    }
}

struct SandboxClient {
    network: SandboxNetwork,
    wallet_address_url: String,
}

#[async_trait]
impl OpenPaymentsApi for SandboxClient {
    fn wallet_address_url(&self) -> &str {
        &self.wallet_address_url
    }

    async fn get_wallet_address(&self, url: &str) -> Result<WalletAddress, ClientError> {
        self.network.record(SandboxCall::WalletLookup);
        self.network.lookup(url)
    }

    async fn request_grant(
        &self,
        auth_server: &str,
        request: &GrantRequest,
    ) -> Result<GrantResponse, ClientError> {
        let id = self.network.record(SandboxCall::GrantRequest);
        let state = &self.network.state;
        let pending = if request.is_interactive() {
            !state.connect_finalized.load(Ordering::SeqCst)
        } else {
            state.incoming_grant_pending.load(Ordering::SeqCst)
        };
        tracing::debug!(%auth_server, client = %request.client, pending, "sandbox grant request");
        if pending {
            let uri = format!("{}/continue/pending-{}", SANDBOX_AUTH_SERVER, id);
            Ok(self.network.pending_grant(&uri, &format!("continue-pending-{}", id)))
        } else {
            Ok(self.network.finalized_grant())
        }
    }

    async fn continue_grant(
        &self,
        continue_uri: &str,
        continue_token: &str,
    ) -> Result<GrantResponse, ClientError> {
        let round = self.network.record(SandboxCall::GrantContinue);
        lock(&self.network.state.continuations)
            .push((continue_uri.to_string(), continue_token.to_string()));
        let state = &self.network.state;
        if round <= state.pending_rounds.load(Ordering::SeqCst) {
            if state.continue_only_polls.load(Ordering::SeqCst) {
                return Ok(GrantResponse::Continuing(ContinuingGrant {
                    continuation: GrantContinuation {
                        access_token: ContinueToken {
                            value: continue_token.to_string(),
                        },
                        uri: continue_uri.to_string(),
                        wait: None,
                    },
                }));
            }
            return Ok(self.network.pending_grant(continue_uri, continue_token));
        }
        Ok(self.network.finalized_grant())
    }

    async fn cancel_grant(
        &self,
        _continue_uri: &str,
        _continue_token: &str,
    ) -> Result<(), ClientError> {
        self.network.record(SandboxCall::GrantCancel);
        Ok(())
    }

    async fn rotate_token(
        &self,
        management_url: &str,
        access_token: &str,
    ) -> Result<AccessToken, ClientError> {
        self.network.record(SandboxCall::TokenRotation);
        lock(&self.network.state.rotations)
            .push((access_token.to_string(), management_url.to_string()));
        if let Some(failure) = lock(&self.network.state.rotation_failure).clone() {
            return Err(ClientError::api(
                "POST",
                management_url,
                failure.status,
                failure.description,
            ));
        }
        let id = self.network.next_id();
        Ok(AccessToken {
            value: format!("rotated-{}", id),
            manage: format!("{}/token/rotated-{}", SANDBOX_AUTH_SERVER, id),
            expires_in: Some(600),
        })
    }

    async fn create_incoming_payment(
        &self,
        resource_server: &str,
        _access_token: &str,
        request: &CreateIncomingPayment,
    ) -> Result<IncomingPayment, ClientError> {
        self.network.record(SandboxCall::IncomingPayment);
        let id = self.network.next_id();
        Ok(IncomingPayment {
            id: format!("{}/incoming-payments/{}", resource_server, id),
            wallet_address: request.wallet_address.clone(),
            completed: false,
            incoming_amount: request.incoming_amount.clone(),
            received_amount: None,
            expires_at: Some(request.expires_at.clone()),
        })
    }

    async fn create_outgoing_payment(
        &self,
        resource_server: &str,
        access_token: &str,
        request: &CreateOutgoingPayment,
    ) -> Result<OutgoingPayment, ClientError> {
        self.network.record(SandboxCall::OutgoingPayment);
        lock(&self.network.state.tokens_used).push(access_token.to_string());
        let url = format!("{}/outgoing-payments", resource_server);
        self.network.take_resource_failure("POST", &url)?;

        let id = self.network.next_id();
        let payment = OutgoingPayment {
            id: format!("{}/{}", url, id),
            wallet_address: request.wallet_address.clone(),
            receiver: request.incoming_payment.clone(),
            debit_amount: Some(request.debit_amount.clone()),
            sent_amount: Some(request.debit_amount.clone()),
            failed: false,
            created_at: Some(Utc::now().to_rfc3339()),
        };
        lock(&self.network.state.payments).push(payment.clone());
        Ok(payment)
    }

    async fn list_outgoing_payments(
        &self,
        resource_server: &str,
        access_token: &str,
        wallet_address: &str,
        first: u32,
    ) -> Result<Vec<OutgoingPayment>, ClientError> {
        self.network.record(SandboxCall::OutgoingPaymentList);
        lock(&self.network.state.tokens_used).push(access_token.to_string());
        self.network
            .take_resource_failure("GET", &format!("{}/outgoing-payments", resource_server))?;

        Ok(lock(&self.network.state.payments)
            .iter()
            .filter(|p| p.wallet_address == wallet_address)
            .take(first as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_wallet_is_registered() {
        let network = SandboxNetwork::new();
        let client = network.client("https://ilp.sandbox/alice");
        let wallet = client.get_wallet_address("$ilp.sandbox/bob").await.unwrap();
        assert_eq!(wallet.id, "https://ilp.sandbox/bob");
        assert_eq!(wallet.asset_scale, 2);
        assert_eq!(network.call_count(SandboxCall::WalletLookup), 1);
    }

    #[tokio::test]
    async fn test_unreachable_wallet() {
        let network = SandboxNetwork::new();
        network.set_unreachable("https://ilp.sandbox/ghost");
        let client = network.client("https://ilp.sandbox/alice");
        let err = client
            .get_wallet_address("https://ilp.sandbox/ghost")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_pending_rounds_then_finalized() {
        let network = SandboxNetwork::new();
        network.set_pending_rounds(2);
        let client = network.client("https://ilp.sandbox/alice");
        assert!(!client.continue_grant("u", "t").await.unwrap().is_finalized());
        assert!(!client.continue_grant("u", "t").await.unwrap().is_finalized());
        assert!(client.continue_grant("u", "t").await.unwrap().is_finalized());
    }

    #[tokio::test]
    async fn test_continue_only_polls() {
        let network = SandboxNetwork::new();
        network.set_pending_rounds(1);
        network.set_continue_only_polls(true);
        let client = network.client("https://ilp.sandbox/alice");

        let first = client.continue_grant("https://auth.sandbox/continue/1", "c1").await.unwrap();
        assert!(matches!(first, GrantResponse::Continuing(_)));
        let body = serde_json::to_value(&first).unwrap();
        assert!(body.get("interact").is_none());
        assert!(body.get("access_token").is_none());

        assert!(client
            .continue_grant("https://auth.sandbox/continue/1", "c1")
            .await
            .unwrap()
            .is_finalized());
        assert_eq!(
            network.continuations_presented(),
            vec![
                ("https://auth.sandbox/continue/1".to_string(), "c1".to_string()),
                ("https://auth.sandbox/continue/1".to_string(), "c1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_scripted_outgoing_failures_are_consumed_in_order() {
        let network = SandboxNetwork::new();
        network.expire_token(1);
        network.fail_next_outgoing(500, "boom");
        let client = network.client("https://ilp.sandbox/alice");

        let first = client
            .list_outgoing_payments(SANDBOX_RESOURCE_SERVER, "t", "https://ilp.sandbox/alice", 10)
            .await
            .unwrap_err();
        assert!(first.is_token_expired());
        let second = client
            .list_outgoing_payments(SANDBOX_RESOURCE_SERVER, "t", "https://ilp.sandbox/alice", 10)
            .await
            .unwrap_err();
        assert_eq!(second.status(), Some(500));
        assert!(client
            .list_outgoing_payments(SANDBOX_RESOURCE_SERVER, "t", "https://ilp.sandbox/alice", 10)
            .await
            .unwrap()
            .is_empty());
    }
}
