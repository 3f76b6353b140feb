//! Serial → MQTT: turns device lines into JSON publications

use serde_json::{json, Value};

use super::{TopicNamespace, TranslateError};
use crate::mqtt::message_manager::MqttMessage;

/// Source of the `ts` field, milliseconds since the Unix epoch
pub type Clock = fn() -> i64;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A device line that is forwarded to MQTT
///
/// `Receive` fields are `None` when the device sent something that is not a
/// decimal number. They are published as `null` rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Init,
    Ready,
    Sent,
    Pong,
    SetReceive {
        state: bool,
    },
    Receive {
        protocol: Option<i64>,
        num_bits: Option<i64>,
        value: Option<i64>,
        pulse_length: Option<i64>,
    },
}

impl DeviceEvent {
    /// Parses an already lower-cased token and its arguments
    pub fn parse(token: &str, args: &[&str]) -> Result<Self, TranslateError> {
        match token {
            "init" => Ok(DeviceEvent::Init),
            "ready" => Ok(DeviceEvent::Ready),
            "sent" => Ok(DeviceEvent::Sent),
            "pong" => Ok(DeviceEvent::Pong),
            "setreceive" => Ok(DeviceEvent::SetReceive {
                state: args.first() == Some(&"ON"),
            }),
            "receive" => Ok(DeviceEvent::Receive {
                protocol: parse_int(args.first().copied()),
                num_bits: parse_int(args.get(1).copied()),
                value: parse_int(args.get(2).copied()),
                pulse_length: parse_int(args.get(3).copied()),
            }),
            "error" => Err(TranslateError::DeviceError(owned(args))),
            _ => Err(TranslateError::UnknownEvent {
                token: token.to_string(),
                args: owned(args),
            }),
        }
    }

    /// JSON body with the translation timestamp
    pub fn to_json(&self, ts: i64) -> Value {
        let mut body = json!({ "ts": ts });
        match self {
            DeviceEvent::Init | DeviceEvent::Ready | DeviceEvent::Sent | DeviceEvent::Pong => {}
            DeviceEvent::SetReceive { state } => {
                body["state"] = json!(state);
            }
            DeviceEvent::Receive {
                protocol,
                num_bits,
                value,
                pulse_length,
            } => {
                body["protocol"] = json!(protocol);
                body["numBits"] = json!(num_bits);
                body["value"] = json!(value);
                body["pulseLength"] = json!(pulse_length);
            }
        }
        body
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// Leading-integer decimal parse
///
/// Skips leading whitespace, accepts one sign and reads digits up to the first
/// non-digit, so `"184abc"` is 184. No digits or an i64 overflow gives `None`.
pub fn parse_int(arg: Option<&str>) -> Option<i64> {
    let s = arg?.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    let magnitude: i64 = rest[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Maps device lines onto MQTT publications under `publish_prefix`
#[derive(Debug, Clone)]
pub struct EventTranslator {
    topics: TopicNamespace,
    clock: Clock,
}

impl EventTranslator {
    pub fn new(topics: TopicNamespace) -> Self {
        Self::with_clock(topics, now_millis)
    }

    pub fn with_clock(topics: TopicNamespace, clock: Clock) -> Self {
        Self { topics, clock }
    }

    pub fn translate(&self, line: &str) -> Result<MqttMessage, TranslateError> {
        let mut parts = line.split(' ');
        let token = parts.next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = parts.collect();

        let ts = (self.clock)();
        let event = DeviceEvent::parse(&token, &args)?;
        let payload = serde_json::to_string(&event.to_json(ts))
            .map_err(|e| TranslateError::Encode(e.to_string()))?;

        Ok(MqttMessage::new(self.topics.event_topic(&token), payload))
    }
}
