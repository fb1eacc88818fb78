//! Error types for the virtual clock

use thiserror::Error;

use crate::job::TimerId;

/// Errors that can occur while driving a virtual clock
#[derive(Error, Debug)]
pub enum ClockError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid tick amount {input:?}: {reason}")]
    Format { input: String, reason: String },

    #[error("Callback for timer {id} failed: {source}")]
    Callback {
        id: TimerId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Binding {name} is not available on the host")]
    UnknownBinding { name: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClockError {
    pub(crate) fn format(input: &str, reason: impl Into<String>) -> Self {
        ClockError::Format { input: input.to_string(), reason: reason.into() }
    }

    /// The error raised by a failing callback, if this is one
    pub fn callback_source(&self) -> Option<&anyhow::Error> {
        match self {
            ClockError::Callback { source, .. } => Some(source),
            _ => None,
        }
    }
}
