//! opflow flow language
//!
//! A flow is a newline-separated script of `select` and `send` commands.
//! [`parse`] turns the text into [`Command`]s and [`FlowEngine`] runs them,
//! streaming [`StepEvent`]s to the caller as it goes.

pub mod command;
pub mod engine;
pub mod error;
pub mod event;
mod interpreter;
pub mod parser;

pub use command::Command;
pub use engine::{FlowEngine, FlowRun, EVENT_BUFFER};
pub use error::FlowError;
pub use event::{LogLevel, StepEvent};
pub use parser::{parse, ParseError, ParseErrorKind};
