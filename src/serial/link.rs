use bytes::BytesMut;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, info, warn};

use super::codec::SerialLineCodec;
use super::config::SerialConfig;
use super::SerialError;
use crate::translate::SerialCommand;

/// Handle for the reader and writer threads of an open device
///
/// serialport is a blocking API, so each direction gets a dedicated thread.
/// Lines read from the device arrive on the receiver returned by
/// [`SerialLink::open`]; commands go out through [`SerialLink::commands`].
pub struct SerialLink {
    name: String,
    commands: mpsc::Sender<SerialCommand>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl SerialLink {
    /// Opens the configured device and starts both threads
    pub fn open(config: &SerialConfig) -> Result<(Self, mpsc::Receiver<String>), SerialError> {
        let port = serialport::new(config.path.as_str(), config.baud_rate)
            .data_bits(config.data_bits())
            .parity(config.parity())
            .stop_bits(config.stop_bits())
            .flow_control(config.flow_control())
            .timeout(config.read_timeout())
            .open()
            .map_err(|source| SerialError::Open {
                path: config.path.clone(),
                source,
            })?;
        let writer = port.try_clone().map_err(SerialError::Clone)?;

        info!("Serial port open: {} at {} baud", config.path, config.baud_rate);
        Ok(Self::spawn(config.path.clone(), port, writer, config))
    }

    /// Starts the threads over arbitrary byte streams
    ///
    /// `reader` should time out periodically (as a serial port with a read
    /// timeout does) so the thread can notice [`SerialLink::shutdown`].
    pub fn spawn<R, W>(
        name: String,
        reader: R,
        writer: W,
        config: &SerialConfig,
    ) -> (Self, mpsc::Receiver<String>)
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let capacity = config.channel_capacity.max(1);
        let (lines_tx, lines_rx) = mpsc::channel(capacity);
        let (commands_tx, commands_rx) = mpsc::channel(capacity);
        let stop = Arc::new(AtomicBool::new(false));

        let reader_stop = stop.clone();
        let max_line_length = config.max_line_length;
        let reader = std::thread::spawn(move || {
            read_lines(reader, SerialLineCodec::new(max_line_length), lines_tx, reader_stop)
        });
        let writer = std::thread::spawn(move || {
            write_commands(writer, SerialLineCodec::new(max_line_length), commands_rx)
        });

        let link = Self {
            name,
            commands: commands_tx,
            stop,
            reader: Some(reader),
            writer: Some(writer),
        };
        (link, lines_rx)
    }

    pub fn commands(&self) -> mpsc::Sender<SerialCommand> {
        self.commands.clone()
    }

    /// Stops the reader and waits for both threads
    ///
    /// The writer finishes once every sender from [`SerialLink::commands`] is
    /// dropped, after draining what is still queued.
    pub async fn shutdown(mut self) {
        debug!("Closing serial link {}", self.name);
        self.stop.store(true, Ordering::Relaxed);
        drop(self.commands);

        let threads: Vec<JoinHandle<()>> =
            [self.reader.take(), self.writer.take()].into_iter().flatten().collect();
        let joined = tokio::task::spawn_blocking(move || {
            threads.into_iter().all(|thread| thread.join().is_ok())
        })
        .await;
        match joined {
            Ok(true) => info!("Serial link {} closed", self.name),
            Ok(false) => error!("Serial thread for {} panicked", self.name),
            Err(e) => error!("Failed to join serial threads for {}: {}", self.name, e),
        }
    }
}

fn read_lines<R: Read>(
    mut reader: R,
    mut codec: SerialLineCodec,
    lines: mpsc::Sender<String>,
    stop: Arc<AtomicBool>,
) {
    let mut buffer = BytesMut::with_capacity(1024);
    let mut chunk = [0u8; 256];

    while !stop.load(Ordering::Relaxed) {
        match reader.read(&mut chunk) {
            Ok(0) => {
                info!("Serial device closed the connection");
                break;
            }
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                loop {
                    match codec.decode(&mut buffer) {
                        Ok(Some(line)) => {
                            if lines.blocking_send(line).is_err() {
                                debug!("Serial line receiver dropped, stopping reader");
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => warn!("Discarding serial input: {}", e),
                    }
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                error!("Serial read error: {}", e);
                break;
            }
        }
    }
    debug!("Serial reader stopped");
}

fn write_commands<W: Write>(
    mut writer: W,
    mut codec: SerialLineCodec,
    mut commands: mpsc::Receiver<SerialCommand>,
) {
    let mut buffer = BytesMut::new();
    while let Some(command) = commands.blocking_recv() {
        buffer.clear();
        let written = codec
            .encode(&command, &mut buffer)
            .and_then(|()| writer.write_all(&buffer).map_err(SerialError::from))
            .and_then(|()| writer.flush().map_err(SerialError::from));
        if let Err(e) = written {
            error!("Failed to write '{}' to serial port: {}", command, e);
        }
    }
    debug!("Serial writer stopped");
}
