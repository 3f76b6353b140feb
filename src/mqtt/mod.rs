//! # MQTT Transport
//!
//! Broker side of the bridge. The handler keeps one rumqttc connection open
//! for the lifetime of the process and talks to the rest of the program only
//! through channels:
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker, credential and topic settings
//! ├── message_manager.rs  - Message representation shared by both directions
//! └── mqtt_handler.rs     - Event loop, subscriptions and publishing
//! ```
//!
//! Subscriptions are (re)issued on every ConnAck, so they survive broker
//! restarts. Reconnecting is left to rumqttc: after an error the event loop
//! is simply polled again once `reconnect_delay_ms` has passed.

pub mod config;
pub mod message_manager;
pub mod mqtt_handler;
