//! Comparator error types.

use super::lifecycle::RunState;

/// Errors from configuring or driving the comparator.
#[derive(Debug)]
pub enum ComparatorError {
    InvalidConfig(String),
    InvalidState {
        op: &'static str,
        state: RunState,
    },
}

impl std::fmt::Display for ComparatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig(reason) => write!(f, "invalid comparator config: {}", reason),
            Self::InvalidState { op, state } => {
                write!(f, "cannot {} while comparator is {:?}", op, state)
            }
        }
    }
}

impl std::error::Error for ComparatorError {}

/// Errors from persisting a report artifact.
#[derive(Debug)]
pub enum ReportError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "report I/O error: {}", e),
            Self::Serialization(e) => write!(f, "report serialization error: {}", e),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialization(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ReportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e)
    }
}
