use std::fmt;

/// One parsed flow command. `line` is the 1-based source line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `select <wallet_address>`
    Select { wallet_address: String, line: usize },
    /// `send <amount> <receiver> [repeat_times]`
    Send {
        amount: f64,
        receiver: String,
        repeat: u32,
        line: usize,
    },
}

impl Command {
    pub fn line(&self) -> usize {
        match self {
            Self::Select { line, .. } | Self::Send { line, .. } => *line,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Select { .. } => "select",
            Self::Send { .. } => "send",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select { wallet_address, .. } => write!(f, "select {}", wallet_address),
            Self::Send {
                amount,
                receiver,
                repeat,
                ..
            } => write!(f, "send {} {} {}", amount, receiver, repeat),
        }
    }
}
