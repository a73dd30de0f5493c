//! Integration test: wallet connection, payments and revocation.
//!
//! Drives the `OpenPayments` facade over the sandbox network with paused
//! tokio time so grant polling runs instantly.

use opflow_client::{NoopObserver, SandboxCall};
use opflow_core::Store;
use opflow_crypto::{
    generate_key_material, sign_request, verify_request, Jwk, KeyPair, PublicKey, RequestParts,
};
use opflow_flow::{LogLevel, StepEvent};
use opflow_integration_tests::{messages, Harness, ALICE, BOB};

// =========================================================================
// Key material
// =========================================================================

#[test]
fn test_generated_keys_sign_and_verify() {
    let material = generate_key_material().unwrap();
    assert!(material.key_id.starts_with("optuikid_"));

    let keypair = KeyPair::from_encoded_private_key(&material.private_key).unwrap();
    let jwk = Jwk::decode(&material.public_key).unwrap();
    let public = PublicKey::from_jwk(&jwk).unwrap();
    assert_eq!(public, keypair.public_key());

    let body = br#"{"walletAddress":"https://ilp.sandbox/alice"}"#;
    let parts = RequestParts {
        method: "POST",
        target_uri: "https://rs.sandbox/outgoing-payments",
        authorization: Some("GNAP token-1"),
        body: Some(body),
    };
    let headers = sign_request(&parts, &material.key_id, &keypair, 1_700_000_000);
    assert!(verify_request(&parts, &headers, &public).is_ok());
}

// =========================================================================
// Connect → pay → history → revoke
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_then_run_flow() {
    let harness = Harness::new();
    harness.network.set_pending_rounds(2);
    let material = generate_key_material().unwrap();

    let wallet = harness
        .payments
        .connect_wallet(
            "$ilp.sandbox/alice",
            &material.key_id,
            &material.private_key,
            &material.public_key,
        )
        .await
        .expect("wallet should connect");

    assert_eq!(wallet.url, ALICE);
    assert_eq!(wallet.key_id, material.key_id);
    assert_eq!(harness.browser.count(), 1);
    assert!(harness.browser.opened()[0].starts_with("https://auth.sandbox/interact/"));
    assert_eq!(harness.network.call_count(SandboxCall::GrantContinue), 3);
    assert_eq!(harness.wallet(ALICE), wallet);

    let script = format!("select {}\nsend 4.25 {}", ALICE, BOB);
    let (events, outcome) = harness.engine().start(&script).collect().await;
    outcome.unwrap();
    assert_eq!(events.last(), Some(&StepEvent::Done));
    assert!(messages(&events, LogLevel::Error).is_empty());

    // the client created while connecting is reused by the flow
    assert_eq!(harness.network.call_count(SandboxCall::ClientCreated), 1);
    let tokens = harness.network.tokens_used();
    assert_eq!(tokens, vec![wallet.access_token.clone()]);
}

#[tokio::test(start_paused = true)]
async fn test_connect_with_continue_only_polls() {
    let harness = Harness::new();
    harness.network.set_pending_rounds(2);
    harness.network.set_continue_only_polls(true);

    let wallet = harness
        .payments
        .connect_wallet(ALICE, "optuikid_k", "priv", "pub")
        .await
        .expect("pending polls without interact should keep polling");

    assert_eq!(harness.network.call_count(SandboxCall::GrantContinue), 3);
    assert_eq!(harness.wallet(ALICE), wallet);
    let continuations = harness.network.continuations_presented();
    assert_eq!(continuations.len(), 3);
    assert!(continuations.iter().all(|c| *c == continuations[0]));
}

#[tokio::test(start_paused = true)]
async fn test_unapproved_grant_stores_nothing() {
    let harness = Harness::new();
    harness.network.set_pending_rounds(u32::MAX);

    let wallet = harness
        .payments
        .connect_wallet(ALICE, "optuikid_k", "priv", "pub")
        .await;
    assert!(wallet.is_none());
    assert!(harness.store.list_wallets().unwrap().is_empty());
    // polled at 0, 3, 6, 9 and 12 s, then past the 10 s budget
    assert_eq!(harness.network.call_count(SandboxCall::GrantContinue), 5);
}

#[tokio::test(start_paused = true)]
async fn test_send_history_and_revoke() {
    let harness = Harness::new();
    harness
        .payments
        .try_connect_wallet(ALICE, "optuikid_k", "priv", "pub")
        .await
        .unwrap();

    harness
        .payments
        .send(ALICE, BOB, 1.0, &NoopObserver)
        .await
        .unwrap();
    harness
        .payments
        .send(ALICE, BOB, 2.0, &NoopObserver)
        .await
        .unwrap();

    harness.network.expire_token(1);
    let history = harness.payments.list_outgoing_payments(ALICE).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(harness.network.call_count(SandboxCall::TokenRotation), 1);
    assert!(harness.wallet(ALICE).access_token.starts_with("rotated-"));

    harness.payments.revoke_grant(ALICE).await.unwrap();
    assert_eq!(harness.network.call_count(SandboxCall::GrantCancel), 1);
}
