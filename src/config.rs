use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::mqtt::config::MqttConfig;
use crate::serial::SerialConfig;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const CONFIG_ENV: &str = "RFBRIDGE_CONFIG";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("serial.path must not be empty")]
    MissingSerialPath,
    #[error("serial.{field} has invalid value {value}")]
    InvalidSerialSetting { field: &'static str, value: u64 },
    #[error("mqtt.host must not be empty")]
    MissingHost,
    #[error("mqtt.qos must be 0, 1 or 2, got {0}")]
    InvalidQos(u8),
    #[error("mqtt.topics.subscribe_prefix must not be empty")]
    EmptySubscribePrefix,
    #[error("topic prefix '{0}' must not contain MQTT wildcards")]
    WildcardPrefix(String),
}

/// Everything the bridge needs, read once at startup
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct BridgeConfig {
    pub serial: SerialConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
}

impl BridgeConfig {
    /// Config path from the first CLI argument, then the environment, then the default
    pub fn locate() -> PathBuf {
        std::env::args()
            .nth(1)
            .or_else(|| std::env::var(CONFIG_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string())
            .into()
    }

    /// Loads and validates a `.json` or TOML file
    pub async fn load(path: &Path) -> Result<Self> {
        debug!("Reading configuration from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config = Self::parse(path, &content)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(content)
                .map_err(|e| eyre!("Failed to parse JSON config {}: {}", path.display(), e))
        } else {
            toml::from_str(content)
                .map_err(|e| eyre!("Failed to parse TOML config {}: {}", path.display(), e))
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let serial = &self.serial;
        if serial.path.trim().is_empty() {
            return Err(ConfigError::MissingSerialPath);
        }
        if serial.baud_rate == 0 {
            return Err(ConfigError::InvalidSerialSetting {
                field: "baud_rate",
                value: 0,
            });
        }
        if !(5..=8).contains(&serial.data_bits) {
            return Err(ConfigError::InvalidSerialSetting {
                field: "data_bits",
                value: serial.data_bits.into(),
            });
        }
        if !(1..=2).contains(&serial.stop_bits) {
            return Err(ConfigError::InvalidSerialSetting {
                field: "stop_bits",
                value: serial.stop_bits.into(),
            });
        }

        let mqtt = &self.mqtt;
        if mqtt.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if mqtt.qos > 2 {
            return Err(ConfigError::InvalidQos(mqtt.qos));
        }
        if mqtt.topics.subscribe_prefix.is_empty() {
            return Err(ConfigError::EmptySubscribePrefix);
        }
        for prefix in [&mqtt.topics.subscribe_prefix, &mqtt.topics.publish_prefix] {
            if prefix.contains(['+', '#']) {
                return Err(ConfigError::WildcardPrefix(prefix.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::config::Parity;
    use crate::translate::TopicNamespace;
    use std::io::Write;

    fn valid() -> BridgeConfig {
        BridgeConfig {
            serial: SerialConfig {
                path: "/dev/ttyUSB0".into(),
                ..SerialConfig::default()
            },
            mqtt: MqttConfig::default(),
        }
    }

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn loads_toml_with_defaults() {
        let file = write_config(
            ".toml",
            r#"
            [serial]
            path = "/dev/ttyACM0"
            baud_rate = 115200
            parity = "even"

            [mqtt]
            host = "broker.local"
            username = "bridge"
            password = "secret"

            [mqtt.topics]
            subscribe_prefix = "home/rf/in/"
            publish_prefix = "home/rf/out/"
            "#,
        );

        let config = BridgeConfig::load(file.path()).await.unwrap();
        assert_eq!(config.serial.path, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.parity, Parity::Even);
        assert_eq!(config.serial.data_bits, 8);
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.username.as_deref(), Some("bridge"));
        assert_eq!(
            config.mqtt.topics,
            TopicNamespace::new("home/rf/in/", "home/rf/out/")
        );
    }

    #[tokio::test]
    async fn loads_json_by_extension() {
        let file = write_config(
            ".json",
            r#"{
                "serial": { "path": "COM3", "baud_rate": 57600 },
                "mqtt": {
                    "host": "10.0.0.2",
                    "port": 1884,
                    "qos": 1,
                    "topics": { "subscribe_prefix": "rf/cmd/", "publish_prefix": "rf/evt/" }
                }
            }"#,
        );

        let config = BridgeConfig::load(file.path()).await.unwrap();
        assert_eq!(config.serial.path, "COM3");
        assert_eq!(config.serial.baud_rate, 57600);
        assert_eq!(config.mqtt.port, 1884);
        assert_eq!(config.mqtt.qos, 1);
        assert_eq!(config.mqtt.topics.publish_prefix, "rf/evt/");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = BridgeConfig::load(&dir.path().join("absent.toml")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_on_load() {
        let file = write_config(".toml", "[serial]\npath = \"\"\n");
        assert!(BridgeConfig::load(file.path()).await.is_err());
    }

    #[test]
    fn validation_rules() {
        assert_eq!(valid().validate(), Ok(()));

        let mut config = valid();
        config.serial.path = " ".into();
        assert_eq!(config.validate(), Err(ConfigError::MissingSerialPath));

        let mut config = valid();
        config.serial.data_bits = 9;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidSerialSetting {
                field: "data_bits",
                value: 9
            })
        );

        let mut config = valid();
        config.mqtt.qos = 3;
        assert_eq!(config.validate(), Err(ConfigError::InvalidQos(3)));

        let mut config = valid();
        config.mqtt.topics.subscribe_prefix = String::new();
        assert_eq!(config.validate(), Err(ConfigError::EmptySubscribePrefix));

        let mut config = valid();
        config.mqtt.topics.publish_prefix = "rf/#".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::WildcardPrefix("rf/#".into()))
        );
    }
}
