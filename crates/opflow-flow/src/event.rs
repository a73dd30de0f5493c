use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Ok,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Progress event emitted by a running flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    Start,
    Log { level: LogLevel, message: String },
    Done,
}

impl StepEvent {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Ok, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Error, message)
    }

    pub fn level(&self) -> Option<LogLevel> {
        match self {
            Self::Log { level, .. } => Some(*level),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Log { message, .. } => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for StepEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("[start]"),
            Self::Log { level, message } => write!(f, "[{}] {}", level, message),
            Self::Done => f.write_str("[done]"),
        }
    }
}
