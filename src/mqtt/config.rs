use rumqttc::{MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::translate::TopicNamespace;

/// Broker connection and topic settings
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// Falls back to `rfbridge-<pid>` when unset
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub clean_session: bool,
    /// Used for both subscriptions and publications
    pub qos: u8,
    /// Pause before polling the event loop again after a connection error
    pub reconnect_delay_ms: u64,
    pub channel_capacity: usize,
    pub topics: TopicNamespace,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: 60,
            clean_session: true,
            qos: 0,
            reconnect_delay_ms: 1000,
            channel_capacity: 100,
            topics: TopicNamespace::default(),
        }
    }
}

impl MqttConfig {
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("rfbridge-{}", std::process::id()))
    }

    pub fn qos(&self) -> QoS {
        match self.qos {
            2 => QoS::ExactlyOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::AtMostOnce,
        }
    }

    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id(), self.host.clone(), self.port);
        options
            .set_keep_alive(Duration::from_secs(self.keep_alive_secs))
            .set_clean_session(self.clean_session);
        if let Some(user) = &self.username {
            options.set_credentials(user.clone(), self.password.clone().unwrap_or_default());
        }
        options
    }
}
