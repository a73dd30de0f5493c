use async_trait::async_trait;
use opflow_client::{
    normalize_wallet_url, ClientError, ClientHandle, OpenPayments, TransferObserver, TransferStep,
};
use opflow_core::{StoreError, WalletCredential};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::command::Command;
use crate::error::FlowError;
use crate::event::{LogLevel, StepEvent};

/// Mutable state of one run.
#[derive(Default)]
pub(crate) struct RunState {
    pub selected_wallet: Option<WalletCredential>,
    pub client: Option<ClientHandle>,
}

/// Executes commands in order, reporting progress on `events`.
pub(crate) struct Interpreter {
    payments: Arc<OpenPayments>,
    events: mpsc::Sender<StepEvent>,
    state: RunState,
}

impl Interpreter {
    pub fn new(payments: Arc<OpenPayments>, events: mpsc::Sender<StepEvent>) -> Self {
        Self {
            payments,
            events,
            state: RunState::default(),
        }
    }

    async fn emit(&self, event: StepEvent) -> Result<(), FlowError> {
        self.events
            .send(event)
            .await
            .map_err(|_| FlowError::Abandoned)
    }

    async fn log(&self, level: LogLevel, message: impl Into<String>) -> Result<(), FlowError> {
        self.emit(StepEvent::log(level, message)).await
    }

    /// Run every command. `preamble` is emitted right after `Start`.
    pub async fn run(
        mut self,
        commands: Vec<Command>,
        preamble: Option<StepEvent>,
    ) -> Result<(), FlowError> {
        self.emit(StepEvent::Start).await?;
        if let Some(event) = preamble {
            self.emit(event).await?;
        }
        self.log(LogLevel::Ok, "Starting flow...").await?;

        for command in &commands {
            let result = match command {
                Command::Select {
                    wallet_address,
                    line,
                } => self.select(wallet_address, *line).await,
                Command::Send {
                    amount,
                    receiver,
                    repeat,
                    line,
                } => self.send(*amount, receiver, *repeat, *line).await,
            };

            if let Err(err) = result {
                if let FlowError::Persistence(_) = err {
                    tracing::error!(line = command.line(), error = %err, "flow stopped");
                    // best effort; the consumer may already be gone
                    let _ = self
                        .log(LogLevel::Error, format!("Line {}: {}", command.line(), err))
                        .await;
                }
                return Err(err);
            }
        }

        self.log(LogLevel::Ok, "Done").await?;
        self.emit(StepEvent::Done).await
    }

    async fn select(&mut self, wallet_address: &str, line: usize) -> Result<(), FlowError> {
        self.log(LogLevel::Info, format!("Selecting \"{}\"...", wallet_address))
            .await?;

        let url = normalize_wallet_url(wallet_address);
        let lookup = self
            .payments
            .store()
            .get_wallet_by_url(&url)
            .and_then(|found| found.ok_or_else(|| StoreError::WalletNotFound(url.clone())));
        // a failed select never leaves a previous wallet selected
        self.state.selected_wallet = None;
        self.state.client = None;

        match lookup {
            Ok(wallet) => {
                tracing::debug!(line, wallet = %wallet.url, "wallet selected");
                self.state.selected_wallet = Some(wallet);
                self.log(LogLevel::Ok, format!("Selected \"{}\"", url)).await
            }
            Err(e) => {
                tracing::warn!(line, wallet = %url, error = %e, "select failed");
                self.log(
                    LogLevel::Error,
                    format!("Line {}: Could not select wallet: {}", line, e),
                )
                .await
            }
        }
    }

    async fn send(
        &mut self,
        amount: f64,
        receiver: &str,
        repeat: u32,
        line: usize,
    ) -> Result<(), FlowError> {
        let Some(mut wallet) = self.state.selected_wallet.take() else {
            return self
                .log(
                    LogLevel::Error,
                    format!("Line {}: run \"select <wallet_address>\" first", line),
                )
                .await;
        };
        let result = self.send_from(&mut wallet, amount, receiver, repeat, line).await;
        self.state.selected_wallet = Some(wallet);
        result
    }

    async fn send_from(
        &mut self,
        wallet: &mut WalletCredential,
        amount: f64,
        receiver: &str,
        repeat: u32,
        line: usize,
    ) -> Result<(), FlowError> {
        // logged on every send, the cached client is reused when present
        self.log(
            LogLevel::Info,
            format!("Getting Open Payments client for \"{}\"...", wallet.url),
        )
        .await?;
        let client = match self.state.client.clone() {
            Some(client) => client,
            None => match self.payments.client_for(wallet) {
                Ok(client) => client,
                Err(e) => {
                    return self
                        .log(
                            LogLevel::Error,
                            format!("Line {}: could not create client: {}", line, e),
                        )
                        .await;
                }
            },
        };
        self.state.client = Some(client.clone());

        let receiver = normalize_wallet_url(receiver);
        self.log(
            LogLevel::Info,
            format!("Sending {} to \"{}\" x{}", amount, receiver, repeat),
        )
        .await?;

        for index in 1..=repeat {
            let progress = RepeatProgress {
                events: &self.events,
                index,
                repeat,
            };
            let result = self
                .payments
                .executor()
                .transfer(&client, wallet, &receiver, amount, &progress)
                .await;

            match result {
                Ok(payment) => {
                    tracing::info!(line, index, repeat, payment = %payment.id, "transfer complete");
                    self.log(
                        LogLevel::Ok,
                        format!("  - [{}/{}] Transfer complete", index, repeat),
                    )
                    .await?;
                }
                Err(ClientError::Cancelled) => return Err(FlowError::Abandoned),
                Err(ClientError::Store(e)) => return Err(FlowError::Persistence(e)),
                Err(e) => {
                    tracing::warn!(line, index, repeat, error = %e, "transfer failed");
                    self.log(
                        LogLevel::Error,
                        format!("Line {}: [{}/{}] transfer failed: {}", line, index, repeat, e),
                    )
                    .await?;
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Forwards transfer steps as `  - [i/n] ...` progress logs.
struct RepeatProgress<'a> {
    events: &'a mpsc::Sender<StepEvent>,
    index: u32,
    repeat: u32,
}

#[async_trait]
impl<'a> TransferObserver for RepeatProgress<'a> {
    async fn on_step(&self, step: TransferStep) -> Result<(), ClientError> {
        let message = format!("  - [{}/{}] {}", self.index, self.repeat, step);
        self.events
            .send(StepEvent::info(message))
            .await
            .map_err(|_| ClientError::Cancelled)
    }
}
