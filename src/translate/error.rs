//! Error definitions for the translation layer

use thiserror::Error;
use tracing::Level;

/// Reasons a single message is dropped instead of being forwarded
///
/// None of these are fatal. Each one ends processing of exactly one MQTT
/// message or one serial line.
#[derive(Debug, Error, PartialEq)]
pub enum TranslateError {
    /// The topic is outside the subscribe namespace
    #[error("Unknown topic: {0}")]
    ForeignTopic(String),

    /// The MQTT body is not valid JSON for the command it targets
    #[error("Malformed payload for '{command}': {reason}")]
    MalformedPayload { command: String, reason: String },

    /// The topic suffix is not a known command
    #[error("Unknown MQTT command: {0}")]
    UnknownCommand(String),

    /// The device reported an error line
    #[error("Device error: {0:?}")]
    DeviceError(Vec<String>),

    /// The device sent a token we have no mapping for
    #[error("Unknown command: {token} {args:?}")]
    UnknownEvent { token: String, args: Vec<String> },

    /// The event could not be serialized
    #[error("Failed to encode payload: {0}")]
    Encode(String),
}

impl TranslateError {
    /// Severity the bridge loop logs this error with
    pub fn level(&self) -> Level {
        match self {
            TranslateError::ForeignTopic(_) => Level::WARN,
            _ => Level::ERROR,
        }
    }
}
