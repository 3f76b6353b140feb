use bytes::Bytes;
use std::fmt;

/// A single MQTT publish, inbound from the broker or outbound to it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl fmt::Display for MqttMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.topic, String::from_utf8_lossy(&self.payload))
    }
}

impl MqttMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        MqttMessage {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}
