use futures::Stream;
use opflow_client::OpenPayments;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::command::Command;
use crate::error::FlowError;
use crate::event::StepEvent;
use crate::interpreter::Interpreter;
use crate::parser::parse;

/// Events buffered between the worker and the consumer.
///
/// With a buffer of one the worker is at most one event ahead, so a run
/// only progresses while someone is reading it.
pub const EVENT_BUFFER: usize = 1;

/// Starts flow runs against a shared [`OpenPayments`] facade.
#[derive(Clone)]
pub struct FlowEngine {
    payments: Arc<OpenPayments>,
}

impl FlowEngine {
    pub fn new(payments: Arc<OpenPayments>) -> Self {
        Self { payments }
    }

    pub fn payments(&self) -> &Arc<OpenPayments> {
        &self.payments
    }

    /// Run already parsed commands on a worker task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(&self, commands: Vec<Command>) -> FlowRun {
        self.spawn(commands, None)
    }

    /// Parse `script` and run it.
    ///
    /// A parse error becomes a single `Parse error: ...` error event and the
    /// run ends without `Start` or `Done`.
    pub fn start(&self, script: &str) -> FlowRun {
        match parse(script) {
            Ok(commands) => {
                let notice = StepEvent::ok(format!("Parsed {} command(s)", commands.len()));
                self.spawn(commands, Some(notice))
            }
            Err(err) => {
                tracing::warn!(error = %err, "flow script rejected");
                let (tx, rx) = mpsc::channel(EVENT_BUFFER);
                let event = StepEvent::error(format!("Parse error: {}", err));
                let task = tokio::spawn(async move {
                    tx.send(event).await.map_err(|_| FlowError::Abandoned)
                });
                FlowRun { events: rx, task }
            }
        }
    }

    fn spawn(&self, commands: Vec<Command>, preamble: Option<StepEvent>) -> FlowRun {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let interpreter = Interpreter::new(self.payments.clone(), tx);
        tracing::debug!(commands = commands.len(), "starting flow run");
        let task = tokio::spawn(interpreter.run(commands, preamble));
        FlowRun { events: rx, task }
    }
}

/// A running flow: a finite, non-restartable sequence of [`StepEvent`]s.
///
/// Events are produced lazily as they are read. Dropping the run (or calling
/// [`cancel`](Self::cancel)) stops the worker at its next emission.
pub struct FlowRun {
    events: mpsc::Receiver<StepEvent>,
    task: JoinHandle<Result<(), FlowError>>,
}

impl FlowRun {
    /// Next event, or `None` once the run has ended.
    pub async fn next_event(&mut self) -> Option<StepEvent> {
        self.events.recv().await
    }

    /// Read every remaining event and the run's outcome.
    pub async fn collect(mut self) -> (Vec<StepEvent>, Result<(), FlowError>) {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let outcome = join(self.task).await;
        (events, outcome)
    }

    /// Discard remaining events and wait for the outcome.
    pub async fn finish(self) -> Result<(), FlowError> {
        self.collect().await.1
    }

    /// Stop listening and wait for the worker to wind down.
    ///
    /// A run that notices the closed channel ends with
    /// [`FlowError::Abandoned`], which is reported here as success.
    pub async fn cancel(self) -> Result<(), FlowError> {
        let FlowRun { events, task } = self;
        drop(events);
        match join(task).await {
            Err(FlowError::Abandoned) => Ok(()),
            other => other,
        }
    }
}

async fn join(task: JoinHandle<Result<(), FlowError>>) -> Result<(), FlowError> {
    match task.await {
        Ok(outcome) => outcome,
        Err(e) => Err(FlowError::Aborted(e.to_string())),
    }
}

impl Stream for FlowRun {
    type Item = StepEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StepEvent>> {
        self.events.poll_recv(cx)
    }
}
