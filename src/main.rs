pub mod bridge;
pub mod config;
pub mod mqtt;
pub mod serial;
pub mod translate;

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::mqtt::mqtt_handler::MqttHandle;
use crate::serial::SerialLink;
use color_eyre::{eyre::eyre, Result};
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = BridgeConfig::locate();
    let config = BridgeConfig::load(&config_path).await?;

    // MQTT first, the device is only opened once the broker accepted us
    let (mut mqtt_handle, mqtt_rx) = MqttHandle::spawn(&config.mqtt);
    let connected = tokio::select! {
        connected = mqtt_handle.wait_connected() => Some(connected),
        _ = tokio::signal::ctrl_c() => None,
    };
    match connected {
        Some(true) => {}
        Some(false) => {
            return Err(eyre!(
                "MQTT event loop stopped before connecting (state: {:?})",
                mqtt_handle.state()
            ))
        }
        None => {
            info!("Interrupted while waiting for the MQTT broker");
            mqtt_handle.shutdown().await;
            return Ok(());
        }
    }

    let (serial_link, serial_rx) = SerialLink::open(&config.serial)?;

    let bridge = Bridge::new(
        config.mqtt.topics.clone(),
        serial_link.commands(),
        mqtt_handle.publisher(),
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(());
            }
            Err(e) => error!("Unable to listen for Ctrl-C: {}", e),
        }
    });

    bridge
        .run_until_shutdown(mqtt_rx, serial_rx, shutdown_rx)
        .await;

    serial_link.shutdown().await;
    mqtt_handle.shutdown().await;
    info!("Bridge stopped");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}
