//! # Serial Transport
//!
//! Device side of the bridge: opens the RF transceiver's serial port and
//! turns it into two channels, lines in and commands out.
//!
//! ```text
//! serial/
//! ├── config.rs  - Device path and line settings
//! ├── codec.rs   - `\r\n` framing in, `\n` framing out
//! └── link.rs    - Reader/writer threads around the blocking port
//! ```

pub mod codec;
pub mod config;
pub mod link;

pub use config::SerialConfig;
pub use link::SerialLink;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerialError {
    #[error("Failed to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Failed to clone serial port handle: {0}")]
    Clone(#[source] serialport::Error),

    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line exceeds maximum length ({0} bytes)")]
    LineTooLong(usize),
}
