//! MQTT → serial: turns command messages into device command lines

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

use super::{TopicNamespace, TranslateError};

/// A command line the RF firmware understands
///
/// `Display` renders the line without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialCommand {
    /// Transmit a code. The firmware expects fixed argument positions, so
    /// `num_repeats` without `pulse_length` is written with a `0` placeholder.
    Send {
        protocol: u32,
        num_bits: u32,
        value: u64,
        pulse_length: Option<u32>,
        num_repeats: Option<u32>,
    },
    SetReceive {
        enabled: bool,
    },
    Ping,
}

impl fmt::Display for SerialCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerialCommand::Send {
                protocol,
                num_bits,
                value,
                pulse_length,
                num_repeats,
            } => {
                write!(f, "SEND {} {} {}", protocol, num_bits, value)?;
                match (pulse_length, num_repeats) {
                    (Some(pulse), Some(repeats)) => write!(f, " {} {}", pulse, repeats),
                    (Some(pulse), None) => write!(f, " {}", pulse),
                    (None, Some(repeats)) => write!(f, " 0 {}", repeats),
                    (None, None) => Ok(()),
                }
            }
            SerialCommand::SetReceive { enabled } => {
                write!(f, "SETRECEIVE {}", if *enabled { '1' } else { '0' })
            }
            SerialCommand::Ping => write!(f, "PING"),
        }
    }
}

/// Body of `<prefix>send`
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SendPayload {
    protocol: u32,
    num_bits: u32,
    value: u64,
    #[serde(default)]
    pulse_length: Option<u32>,
    #[serde(default)]
    num_repeats: Option<u32>,
}

/// Body of `<prefix>setreceive`
#[derive(Deserialize, Debug)]
struct SetReceivePayload {
    #[serde(default, deserialize_with = "truthy")]
    state: bool,
}

/// Accepts any JSON value for a flag: false, 0, "" and null are off
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Zero means "firmware default", same as leaving the field out
fn non_zero(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v != 0)
}

/// Maps subscribed topics and their JSON bodies onto [`SerialCommand`]s
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    topics: TopicNamespace,
}

impl CommandTranslator {
    pub fn new(topics: TopicNamespace) -> Self {
        Self { topics }
    }

    pub fn translate(&self, topic: &str, payload: &[u8]) -> Result<SerialCommand, TranslateError> {
        let command = self
            .topics
            .command_name(topic)
            .ok_or_else(|| TranslateError::ForeignTopic(topic.to_string()))?;

        match command {
            "send" => {
                let msg: SendPayload = parse_payload(command, payload)?;
                Ok(SerialCommand::Send {
                    protocol: msg.protocol,
                    num_bits: msg.num_bits,
                    value: msg.value,
                    pulse_length: non_zero(msg.pulse_length),
                    num_repeats: non_zero(msg.num_repeats),
                })
            }
            "setreceive" => {
                let msg: SetReceivePayload = parse_payload(command, payload)?;
                Ok(SerialCommand::SetReceive { enabled: msg.state })
            }
            "ping" => Ok(SerialCommand::Ping),
            other => Err(TranslateError::UnknownCommand(other.to_string())),
        }
    }
}

fn parse_payload<'a, T: Deserialize<'a>>(
    command: &str,
    payload: &'a [u8],
) -> Result<T, TranslateError> {
    serde_json::from_slice(payload).map_err(|e| TranslateError::MalformedPayload {
        command: command.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator() -> CommandTranslator {
        CommandTranslator::new(TopicNamespace::new("rf/cmd/", "rf/evt/"))
    }

    fn line(topic: &str, payload: &str) -> String {
        translator()
            .translate(topic, payload.as_bytes())
            .map(|cmd| cmd.to_string())
            .unwrap()
    }

    #[test]
    fn send_with_required_fields_has_three_arguments() {
        let out = line("rf/cmd/send", r#"{"protocol":1,"numBits":24,"value":5592371}"#);
        assert_eq!(out, "SEND 1 24 5592371");
        assert_eq!(out.split(' ').count(), 4);
    }

    #[test]
    fn send_with_pulse_length() {
        assert_eq!(
            line(
                "rf/cmd/send",
                r#"{"protocol":1,"numBits":24,"value":5592371,"pulseLength":184}"#
            ),
            "SEND 1 24 5592371 184"
        );
    }

    #[test]
    fn send_with_repeats_only_keeps_pulse_slot() {
        assert_eq!(
            line(
                "rf/cmd/send",
                r#"{"protocol":2,"numBits":32,"value":7,"numRepeats":10}"#
            ),
            "SEND 2 32 7 0 10"
        );
    }

    #[test]
    fn send_with_all_fields() {
        assert_eq!(
            line(
                "rf/cmd/send",
                r#"{"protocol":1,"numBits":24,"value":5592371,"pulseLength":350,"numRepeats":5}"#
            ),
            "SEND 1 24 5592371 350 5"
        );
    }

    #[test]
    fn send_treats_zero_and_null_as_absent() {
        assert_eq!(
            line(
                "rf/cmd/send",
                r#"{"protocol":1,"numBits":24,"value":3,"pulseLength":0,"numRepeats":null}"#
            ),
            "SEND 1 24 3"
        );
        assert_eq!(
            line(
                "rf/cmd/send",
                r#"{"protocol":1,"numBits":24,"value":3,"pulseLength":0,"numRepeats":4}"#
            ),
            "SEND 1 24 3 0 4"
        );
    }

    #[test]
    fn send_fields_must_be_non_negative_integers() {
        for body in [
            r#"{"protocol":1,"numBits":24,"value":5592371.0}"#,
            r#"{"protocol":1,"numBits":24,"value":5592371.5}"#,
            r#"{"protocol":-1,"numBits":24,"value":5592371}"#,
            r#"{"protocol":1,"numBits":24,"value":5592371,"pulseLength":184.0}"#,
        ] {
            let err = translator()
                .translate("rf/cmd/send", body.as_bytes())
                .unwrap_err();
            assert!(
                matches!(err, TranslateError::MalformedPayload { ref command, .. } if command == "send"),
                "{body}"
            );
        }
    }

    #[test]
    fn send_without_value_is_malformed() {
        let err = translator()
            .translate("rf/cmd/send", br#"{"protocol":1,"numBits":24}"#)
            .unwrap_err();
        assert!(matches!(err, TranslateError::MalformedPayload { ref command, .. } if command == "send"));
    }

    #[test]
    fn unparsable_json_is_rejected() {
        let err = translator()
            .translate("rf/cmd/send", b"{protocol: 1")
            .unwrap_err();
        assert!(matches!(err, TranslateError::MalformedPayload { .. }));

        let err = translator()
            .translate("rf/cmd/setreceive", b"")
            .unwrap_err();
        assert!(matches!(err, TranslateError::MalformedPayload { .. }));
    }

    #[test]
    fn setreceive_maps_state_to_flag() {
        assert_eq!(line("rf/cmd/setreceive", r#"{"state":true}"#), "SETRECEIVE 1");
        assert_eq!(line("rf/cmd/setreceive", r#"{"state":false}"#), "SETRECEIVE 0");
    }

    #[test]
    fn setreceive_uses_truthiness() {
        assert_eq!(line("rf/cmd/setreceive", r#"{"state":1}"#), "SETRECEIVE 1");
        assert_eq!(line("rf/cmd/setreceive", r#"{"state":"on"}"#), "SETRECEIVE 1");
        assert_eq!(line("rf/cmd/setreceive", r#"{"state":0}"#), "SETRECEIVE 0");
        assert_eq!(line("rf/cmd/setreceive", r#"{"state":""}"#), "SETRECEIVE 0");
        assert_eq!(line("rf/cmd/setreceive", r#"{"state":null}"#), "SETRECEIVE 0");
        assert_eq!(line("rf/cmd/setreceive", r#"{}"#), "SETRECEIVE 0");
    }

    #[test]
    fn ping_ignores_body() {
        assert_eq!(line("rf/cmd/ping", ""), "PING");
        assert_eq!(line("rf/cmd/ping", "not json at all"), "PING");
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = translator().translate("rf/cmd/reboot", b"{}").unwrap_err();
        assert_eq!(err, TranslateError::UnknownCommand("reboot".into()));
    }

    #[test]
    fn foreign_topic_is_rejected() {
        let err = translator()
            .translate("other/send", br#"{"protocol":1,"numBits":24,"value":1}"#)
            .unwrap_err();
        assert_eq!(err, TranslateError::ForeignTopic("other/send".into()));
    }

    #[test]
    fn translation_is_repeatable() {
        let t = translator();
        let body = br#"{"protocol":1,"numBits":24,"value":42,"numRepeats":3}"#;
        assert_eq!(
            t.translate("rf/cmd/send", body).unwrap(),
            t.translate("rf/cmd/send", body).unwrap()
        );
    }
}
