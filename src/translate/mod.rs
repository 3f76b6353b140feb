//! # Translation Layer
//!
//! Pure mapping between the two protocols the bridge speaks. Nothing in here
//! touches a transport or keeps state between calls; every call either
//! produces exactly one outbound message or a [`TranslateError`] describing
//! why the input was dropped.
//!
//! ```text
//! MQTT <sub>send|setreceive|ping ──► CommandTranslator ──► "SEND 1 24 5592371\n"
//! "receive 1 24 5592371 184\r\n" ──► EventTranslator   ──► <pub>receive {"ts":..}
//! ```
//!
//! The error carries its own log level, so callers decide where diagnostics
//! go and the translators stay free of I/O.

pub mod command;
pub mod error;
pub mod event;
pub mod topics;

pub use command::{CommandTranslator, SerialCommand};
pub use error::TranslateError;
pub use event::{DeviceEvent, EventTranslator};
pub use topics::TopicNamespace;
