//! Bridge loop between the MQTT and serial transports
//!
//! A single task owns both translators and handles one message at a time,
//! so neither direction needs locking. Order is preserved within each stream,
//! not across them.
//!
//! ```text
//! MqttHandle ──[MqttMessage]──► CommandTranslator ──[SerialCommand]──► SerialLink
//! SerialLink ──[line]─────────► EventTranslator   ──[MqttMessage]────► MqttHandle
//! ```

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn, Level};

use crate::mqtt::message_manager::MqttMessage;
use crate::translate::{
    CommandTranslator, EventTranslator, SerialCommand, TopicNamespace, TranslateError,
};

pub struct Bridge {
    commands: CommandTranslator,
    events: EventTranslator,
    serial: mpsc::Sender<SerialCommand>,
    mqtt: mpsc::Sender<MqttMessage>,
}

impl Bridge {
    pub fn new(
        topics: TopicNamespace,
        serial: mpsc::Sender<SerialCommand>,
        mqtt: mpsc::Sender<MqttMessage>,
    ) -> Self {
        Self::with_translators(
            CommandTranslator::new(topics.clone()),
            EventTranslator::new(topics),
            serial,
            mqtt,
        )
    }

    pub fn with_translators(
        commands: CommandTranslator,
        events: EventTranslator,
        serial: mpsc::Sender<SerialCommand>,
        mqtt: mpsc::Sender<MqttMessage>,
    ) -> Self {
        Self {
            commands,
            events,
            serial,
            mqtt,
        }
    }

    /// Translates one broker message and queues the resulting device command
    pub async fn handle_mqtt(&self, msg: MqttMessage) {
        let translated = self.commands.translate(&msg.topic, &msg.payload);
        if !matches!(translated, Err(TranslateError::ForeignTopic(_))) {
            info!("MQTT receive: {}", msg);
        }
        let command = match translated {
            Ok(command) => command,
            Err(e) => return report(&e),
        };
        info!("Serial send: {}", command);
        if self.serial.send(command).await.is_err() {
            error!("Serial link closed, dropping command");
        }
    }

    /// Translates one device line and queues the resulting publication
    pub async fn handle_serial_line(&self, line: String) {
        info!("Serial receive: {}", line);
        match self.events.translate(&line) {
            Ok(publication) => {
                if self.mqtt.send(publication).await.is_err() {
                    error!("MQTT publisher closed, dropping event");
                }
            }
            Err(e) => report(&e),
        }
    }

    /// Runs until shutdown is signalled or either transport stream ends
    pub async fn run_until_shutdown(
        self,
        mut mqtt_rx: mpsc::Receiver<MqttMessage>,
        mut serial_rx: mpsc::Receiver<String>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        info!("Bridge running");
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }
                msg = mqtt_rx.recv() => match msg {
                    Some(msg) => self.handle_mqtt(msg).await,
                    None => {
                        warn!("MQTT message stream ended");
                        break;
                    }
                },
                line = serial_rx.recv() => match line {
                    Some(line) => self.handle_serial_line(line).await,
                    None => {
                        warn!("Serial line stream ended");
                        break;
                    }
                },
            }
        }
        debug!("Bridge loop finished");
    }
}

fn report(e: &TranslateError) {
    if e.level() == Level::WARN {
        warn!("{}", e);
    } else {
        error!("{}", e);
    }
}
