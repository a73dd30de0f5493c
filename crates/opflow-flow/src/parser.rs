//! Flow script parser.
//!
//! ```text
//! select <wallet_address>
//! send <amount> <receiver> [repeat_times]
//! ```
//!
//! One command per non-blank line. Tokens are separated by whitespace and
//! surplus tokens are ignored.

use crate::command::Command;

/// Why a line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("unknown command \"{0}\"")]
    UnknownCommand(String),

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{0} must be a number")]
    NotANumber(&'static str),

    #[error("{0} must be > 0")]
    NotPositive(&'static str),

    #[error("{0} must be a positive integer")]
    NotPositiveInteger(&'static str),
}

/// First invalid line of a script.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    fn new(line: usize, kind: ParseErrorKind) -> Self {
        Self { line, kind }
    }
}

/// Parse a whole script, stopping at the first invalid line.
pub fn parse(text: &str) -> Result<Vec<Command>, ParseError> {
    let mut commands = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let mut tokens = raw.split_whitespace();
        let Some(verb) = tokens.next() else {
            continue;
        };
        let args: Vec<&str> = tokens.collect();
        let command = match verb {
            "select" => parse_select(&args, line)?,
            "send" => parse_send(&args, line)?,
            other => {
                return Err(ParseError::new(
                    line,
                    ParseErrorKind::UnknownCommand(other.to_string()),
                ))
            }
        };
        commands.push(command);
    }
    Ok(commands)
}

fn parse_select(args: &[&str], line: usize) -> Result<Command, ParseError> {
    let wallet_address = args
        .first()
        .ok_or_else(|| ParseError::new(line, ParseErrorKind::Missing("wallet address")))?;
    Ok(Command::Select {
        wallet_address: wallet_address.to_string(),
        line,
    })
}

fn parse_send(args: &[&str], line: usize) -> Result<Command, ParseError> {
    let amount = args
        .first()
        .ok_or_else(|| ParseError::new(line, ParseErrorKind::Missing("amount")))?;
    let amount = parse_amount(amount).map_err(|kind| ParseError::new(line, kind))?;

    let receiver = args
        .get(1)
        .ok_or_else(|| ParseError::new(line, ParseErrorKind::Missing("receiver")))?;

    let repeat = match args.get(2) {
        Some(raw) => parse_repeat(raw).map_err(|kind| ParseError::new(line, kind))?,
        None => 1,
    };

    Ok(Command::Send {
        amount,
        receiver: receiver.to_string(),
        repeat,
        line,
    })
}

fn parse_amount(raw: &str) -> Result<f64, ParseErrorKind> {
    let value: f64 = raw
        .parse()
        .map_err(|_| ParseErrorKind::NotANumber("amount"))?;
    if !value.is_finite() {
        return Err(ParseErrorKind::NotANumber("amount"));
    }
    if value <= 0.0 {
        return Err(ParseErrorKind::NotPositive("amount"));
    }
    Ok(value)
}

fn parse_repeat(raw: &str) -> Result<u32, ParseErrorKind> {
    let invalid = ParseErrorKind::NotPositiveInteger("repeat_times");
    let value: f64 = raw.parse().map_err(|_| invalid.clone())?;
    if !value.is_finite() || value.fract() != 0.0 || value < 1.0 || value > f64::from(u32::MAX) {
        return Err(invalid);
    }
    Ok(value as u32)
}
