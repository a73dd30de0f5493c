//! Integration test: flow scripts end to end.
//!
//! Parses and runs scripts through opflow-flow against the sandbox network
//! served by opflow-client, with credentials in an opflow-core store.

use futures::StreamExt;
use opflow_client::{SandboxCall, INVALID_TOKEN};
use opflow_core::{MemoryStore, PaymentsConfig, Store};
use opflow_flow::{parse, Command, FlowError, LogLevel, StepEvent};
use opflow_integration_tests::{messages, Harness, ALICE, BOB, CAROL};
use std::sync::Arc;

// =========================================================================
// Happy path
// =========================================================================

#[tokio::test]
async fn test_two_payments_from_selected_wallet() {
    let harness = Harness::new();
    harness.seed_wallet(ALICE);
    harness.network.register_wallet(CAROL, "EUR", 2);

    let script = format!("select {}\nsend 10.5 {}\n\nsend 2 {}\n", ALICE, BOB, CAROL);
    let (events, outcome) = harness.engine().start(&script).collect().await;
    outcome.expect("run should succeed");

    assert_eq!(events.first(), Some(&StepEvent::Start));
    assert_eq!(events.last(), Some(&StepEvent::Done));
    assert!(messages(&events, LogLevel::Error).is_empty());

    let payments = harness.network.outgoing_payments();
    assert_eq!(payments.len(), 2);
    let debit: Vec<(String, String)> = payments
        .iter()
        .map(|p| {
            let amount = p.debit_amount.clone().expect("debit amount");
            (amount.value, amount.asset_code)
        })
        .collect();
    // debited in the sender's asset, whatever the receiver holds
    assert_eq!(
        debit,
        vec![("1050".to_string(), "USD".to_string()), ("200".to_string(), "USD".to_string())]
    );
    assert!(payments.iter().all(|p| p.wallet_address == ALICE));
}

#[tokio::test]
async fn test_progress_lines_follow_commands() {
    let harness = Harness::new();
    harness.seed_wallet(ALICE);

    let script = "select $ilp.sandbox/alice\nsend 1 $ilp.sandbox/bob 2";
    let (events, outcome) = harness.engine().start(&script).collect().await;
    outcome.unwrap();

    let lines: Vec<String> = events.iter().map(|e| e.to_string()).collect();
    let position = |needle: &str| {
        lines
            .iter()
            .position(|l| l == needle)
            .unwrap_or_else(|| panic!("missing {:?} in {:#?}", needle, lines))
    };

    let parsed = position("[ok] Parsed 2 command(s)");
    let selecting = position("[info] Selecting \"$ilp.sandbox/alice\"...");
    let selected = position(&format!("[ok] Selected \"{}\"", ALICE));
    let sending = position(&format!("[info] Sending 1 to \"{}\" x2", BOB));
    let first = position("[ok]   - [1/2] Transfer complete");
    let second = position("[ok]   - [2/2] Transfer complete");
    let done = position("[ok] Done");
    assert!(parsed < selecting);
    assert!(selecting < selected);
    assert!(selected < sending);
    assert!(sending < first);
    assert!(first < second);
    assert!(second < done);
}

#[tokio::test]
async fn test_stored_flow_runs_from_store() {
    let harness = Harness::new();
    harness.seed_wallet(ALICE);
    let steps = format!("select {}\nsend 3 {}", ALICE, BOB);
    harness
        .store
        .insert_flow("flow_payday", "payday", &steps)
        .unwrap();

    let flow = harness.store.get_flow("flow_payday").unwrap().unwrap();
    let outcome = harness.engine().start(&flow.steps).finish().await;
    assert!(outcome.is_ok());
    assert_eq!(harness.network.outgoing_payments().len(), 1);
}

#[tokio::test]
async fn test_run_parsed_commands_as_stream() {
    let harness = Harness::new();
    harness.seed_wallet(ALICE);

    let commands = parse(&format!("select {}\nsend 1 {}", ALICE, BOB)).unwrap();
    assert!(matches!(commands[1], Command::Send { repeat: 1, line: 2, .. }));

    let events: Vec<StepEvent> = StreamExt::collect(harness.engine().run(commands)).await;
    assert_eq!(events.first(), Some(&StepEvent::Start));
    assert_eq!(events.last(), Some(&StepEvent::Done));
    // `run` skips the parse notice
    assert_eq!(events[1], StepEvent::ok("Starting flow..."));
}

// =========================================================================
// Script errors
// =========================================================================

#[tokio::test]
async fn test_parse_error_runs_nothing() {
    let harness = Harness::new();
    harness.seed_wallet(ALICE);

    let script = format!("select {}\nsend 1 {}\nsend -1 {}", ALICE, BOB, BOB);
    let (events, outcome) = harness.engine().start(&script).collect().await;
    assert!(outcome.is_ok());
    assert_eq!(
        events,
        vec![StepEvent::error("Parse error: Line 3: amount must be > 0")]
    );
    assert_eq!(harness.network.call_count(SandboxCall::WalletLookup), 0);
    assert_eq!(harness.network.call_count(SandboxCall::ClientCreated), 0);
}

#[tokio::test]
async fn test_send_before_select_is_reported() {
    let harness = Harness::new();
    harness.seed_wallet(ALICE);

    let script = format!("send 1 {}\nselect {}\nsend 1 {}", BOB, ALICE, BOB);
    let (events, outcome) = harness.engine().start(&script).collect().await;
    outcome.unwrap();

    assert_eq!(
        messages(&events, LogLevel::Error),
        vec!["Line 1: run \"select <wallet_address>\" first".to_string()]
    );
    // the later lines still run
    assert_eq!(harness.network.outgoing_payments().len(), 1);
}

#[tokio::test]
async fn test_unreachable_receiver_skips_command_only() {
    let harness = Harness::new();
    harness.seed_wallet(ALICE);
    harness.network.set_unreachable(BOB);

    let script = format!("select {}\nsend 1 {} 3\nsend 1 {}", ALICE, BOB, CAROL);
    let (events, outcome) = harness.engine().start(&script).collect().await;
    outcome.unwrap();

    let errors = messages(&events, LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Line 2: [1/3] transfer failed:"));
    let payments = harness.network.outgoing_payments();
    assert_eq!(payments.len(), 1);
    assert_eq!(events.last(), Some(&StepEvent::Done));
}

// =========================================================================
// Token rotation
// =========================================================================

#[tokio::test]
async fn test_rotations_are_persisted_between_commands() {
    let harness = Harness::new();
    harness.seed_wallet(ALICE);
    harness.network.expire_token(3);

    let script = format!("select {}\nsend 1 {}\nsend 1 {}", ALICE, BOB, BOB);
    let (events, outcome) = harness.engine().start(&script).collect().await;
    outcome.unwrap();

    let rotating = messages(&events, LogLevel::Info)
        .into_iter()
        .filter(|m| m.ends_with("Token expired, rotating..."))
        .count();
    assert_eq!(rotating, 3);
    assert_eq!(harness.network.call_count(SandboxCall::TokenRotation), 3);
    assert_eq!(harness.network.outgoing_payments().len(), 2);

    let stored = harness.wallet(ALICE);
    assert!(stored.access_token.starts_with("rotated-"));
    // the second command reuses the rotated token
    let tokens = harness.network.tokens_used();
    assert_eq!(tokens.first().map(String::as_str), Some("token-seed"));
    assert_eq!(tokens[tokens.len() - 1], stored.access_token);
    assert_eq!(tokens[tokens.len() - 2], stored.access_token);
}

#[tokio::test]
async fn test_rotation_cap_fails_the_transfer() {
    let harness = Harness::with_config(PaymentsConfig {
        max_token_rotations: Some(2),
        ..PaymentsConfig::default()
    });
    harness.seed_wallet(ALICE);
    harness.network.expire_token(5);

    let script = format!("select {}\nsend 1 {}", ALICE, BOB);
    let (events, outcome) = harness.engine().start(&script).collect().await;
    outcome.unwrap();

    let errors = messages(&events, LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Line 2: [1/1] transfer failed:"));
    assert_eq!(harness.network.call_count(SandboxCall::TokenRotation), 2);
    assert!(harness.network.outgoing_payments().is_empty());
}

#[tokio::test]
async fn test_missing_credential_after_rotation_stops_run() {
    // Rotation succeeds at the server but the store no longer has the wallet.
    struct ForgetfulStore(MemoryStore);

    impl Store for ForgetfulStore {
        fn get_wallet_by_url(
            &self,
            url: &str,
        ) -> Result<Option<opflow_core::WalletCredential>, opflow_core::StoreError> {
            self.0.get_wallet_by_url(url)
        }
        fn list_wallets(
            &self,
        ) -> Result<Vec<opflow_core::WalletCredential>, opflow_core::StoreError> {
            self.0.list_wallets()
        }
        fn insert_wallet(
            &self,
            wallet: opflow_core::NewWallet,
        ) -> Result<opflow_core::WalletCredential, opflow_core::StoreError> {
            self.0.insert_wallet(wallet)
        }
        fn update_wallet_token(
            &self,
            url: &str,
            _: &str,
            _: &str,
        ) -> Result<(), opflow_core::StoreError> {
            Err(opflow_core::StoreError::WalletNotFound(url.to_string()))
        }
        fn list_flows(&self) -> Result<Vec<opflow_core::Flow>, opflow_core::StoreError> {
            self.0.list_flows()
        }
        fn insert_flow(
            &self,
            id: &str,
            name: &str,
            steps: &str,
        ) -> Result<opflow_core::Flow, opflow_core::StoreError> {
            self.0.insert_flow(id, name, steps)
        }
        fn get_flow(&self, id: &str) -> Result<Option<opflow_core::Flow>, opflow_core::StoreError> {
            self.0.get_flow(id)
        }
    }

    let harness = Harness::with_store(
        Arc::new(ForgetfulStore(MemoryStore::new())),
        PaymentsConfig::default(),
    );
    harness.seed_wallet(ALICE);
    harness.network.expire_token(1);

    let script = format!("select {}\nsend 1 {}\nsend 1 {}", ALICE, BOB, CAROL);
    let (events, outcome) = harness.engine().start(&script).collect().await;

    assert!(matches!(outcome, Err(FlowError::Persistence(_))));
    assert!(!events.contains(&StepEvent::Done));
    assert!(!events.contains(&StepEvent::ok("Done")));
    assert!(harness.network.outgoing_payments().is_empty());
}

#[tokio::test]
async fn test_non_token_rejection_is_not_rotated() {
    let harness = Harness::new();
    harness.seed_wallet(ALICE);
    // 401 with a different description is a plain failure
    harness.network.fail_next_outgoing(401, "Unauthorized");
    harness.network.fail_next_outgoing(403, INVALID_TOKEN);

    let script = format!("select {}\nsend 1 {}\nsend 1 {}", ALICE, BOB, BOB);
    let (events, outcome) = harness.engine().start(&script).collect().await;
    outcome.unwrap();

    let errors = messages(&events, LogLevel::Error);
    assert_eq!(errors.len(), 2);
    assert!(errors[0].contains("Unauthorized"));
    assert!(errors[1].contains(INVALID_TOKEN));
    assert_eq!(harness.network.call_count(SandboxCall::TokenRotation), 0);
}
