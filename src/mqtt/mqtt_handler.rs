use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, QoS};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::MqttConfig;
use super::message_manager::MqttMessage;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Owns the broker connection for the lifetime of the process
///
/// Two tasks run behind the handle: the event loop, which subscribes on every
/// ConnAck and forwards incoming publishes, and the publisher, which drains
/// outgoing messages into the client.
pub struct MqttHandle {
    client: AsyncClient,
    state: watch::Receiver<ConnectionState>,
    outgoing: mpsc::Sender<MqttMessage>,
    event_task: Option<JoinHandle<()>>,
    publish_task: Option<JoinHandle<()>>,
}

impl MqttHandle {
    /// Starts connecting and returns the handle plus the incoming message stream
    pub fn spawn(config: &MqttConfig) -> (Self, mpsc::Receiver<MqttMessage>) {
        let capacity = config.channel_capacity.max(1);
        let (client, eventloop) = AsyncClient::new(config.mqtt_options(), capacity);
        let (incoming_tx, incoming_rx) = mpsc::channel(capacity);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        info!(
            "Connecting to MQTT broker {}:{} as {}",
            config.host,
            config.port,
            config.client_id()
        );

        let event_task = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            config.topics.subscriptions(),
            config.qos(),
            Duration::from_millis(config.reconnect_delay_ms),
            incoming_tx,
            state_tx,
        ));
        let publish_task = tokio::spawn(run_publisher(client.clone(), config.qos(), outgoing_rx));

        let handle = Self {
            client,
            state: state_rx,
            outgoing: outgoing_tx,
            event_task: Some(event_task),
            publish_task: Some(publish_task),
        };
        (handle, incoming_rx)
    }

    pub fn publisher(&self) -> mpsc::Sender<MqttMessage> {
        self.outgoing.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Resolves on the first ConnAck, or returns false when the event loop stopped first
    pub async fn wait_connected(&mut self) -> bool {
        self.state
            .wait_for(|state| *state == ConnectionState::Connected)
            .await
            .is_ok()
    }

    /// Flushes queued publications, sends DISCONNECT and waits for both tasks
    ///
    /// Every sender obtained from [`MqttHandle::publisher`] must be dropped
    /// before calling this, otherwise the publisher is aborted after a grace period.
    pub async fn shutdown(mut self) {
        drop(self.outgoing);
        if let Some(mut task) = self.publish_task.take() {
            match tokio::time::timeout(Duration::from_secs(2), &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("MQTT publisher task panicked: {}", e),
                Err(_) => {
                    warn!("MQTT publisher still has open senders, aborting");
                    task.abort();
                }
            }
        }

        debug!("Disconnecting from MQTT broker");
        if let Err(e) = self.client.try_disconnect() {
            warn!("MQTT disconnect request failed: {}", e);
        }
        if let Some(mut task) = self.event_task.take() {
            match tokio::time::timeout(Duration::from_secs(2), &mut task).await {
                Ok(Ok(())) => debug!("MQTT event loop finished"),
                Ok(Err(e)) => error!("MQTT event loop panicked: {}", e),
                Err(_) => {
                    warn!("MQTT event loop did not stop in time, aborting");
                    task.abort();
                }
            }
        }
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    subscriptions: Vec<String>,
    qos: QoS,
    reconnect_delay: Duration,
    incoming: mpsc::Sender<MqttMessage>,
    state: watch::Sender<ConnectionState>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("MQTT connected (session present: {})", ack.session_present);
                for topic in &subscriptions {
                    match client.try_subscribe(topic.as_str(), qos) {
                        Ok(()) => debug!("Subscribed to {}", topic),
                        Err(e) => error!("Failed to subscribe to {}: {}", topic, e),
                    }
                }
                state.send_replace(ConnectionState::Connected);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                // Never block here, the same poll drives keep-alives and our own publishes
                let msg = MqttMessage::new(publish.topic, publish.payload);
                match incoming.try_send(msg) {
                    Ok(()) => {}
                    Err(TrySendError::Full(msg)) => {
                        warn!("Incoming MQTT queue full, dropping message on {}", msg.topic);
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("Incoming MQTT channel closed, stopping event loop");
                        break;
                    }
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("MQTT disconnected");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {}", e);
                state.send_replace(ConnectionState::Reconnecting);
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
    state.send_replace(ConnectionState::Disconnected);
}

async fn run_publisher(client: AsyncClient, qos: QoS, mut outgoing: mpsc::Receiver<MqttMessage>) {
    while let Some(msg) = outgoing.recv().await {
        info!("MQTT send: {}", msg);
        if let Err(e) = client.publish_bytes(msg.topic, qos, false, msg.payload).await {
            error!("Failed to publish: {}", e);
        }
    }
    debug!("MQTT publisher stopped");
}
