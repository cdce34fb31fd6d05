use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use linux_embedded_hal::I2cdev;
use log::{debug, error, info, warn};

use mfrc522_i2c::cancellation_token::CancellationToken;
use mfrc522_i2c::error::Error;
use mfrc522_i2c::session::{CardSession, SessionOptions};
use mfrc522_i2c::Mfrc522;

use crate::config::setup::DeviceConfiguration;

/// Commands accepted by the reader thread.
#[derive(Debug, Clone)]
pub enum RfidCommand {
    /// Write the text to the next card presented.
    WriteText(String),
}

/// Card interactions reported by the reader thread.
#[derive(Debug)]
pub enum CardEvent {
    CardRead { id: u64, text: String },
    CardWritten { id: u64 },
}

pub struct RfidManager {
    command_channel: Sender<RfidCommand>,
}

impl RfidManager {
    pub fn new(
        config: DeviceConfiguration,
        token: CancellationToken,
    ) -> (RfidManager, Receiver<CardEvent>) {
        let (command_tx, command_rx) = channel();
        let (event_tx, event_rx) = channel();

        start_reader_thread(config, token, command_rx, event_tx);

        (
            RfidManager {
                command_channel: command_tx,
            },
            event_rx,
        )
    }

    pub fn command_channel(&self) -> Sender<RfidCommand> {
        self.command_channel.clone()
    }
}

fn start_reader_thread(
    config: DeviceConfiguration,
    token: CancellationToken,
    commands_rx: Receiver<RfidCommand>,
    events_tx: Sender<CardEvent>,
) {
    if !Path::new(&config.i2c_bus).exists() {
        error!(
            "No i2c bus at {}, not starting the rfid reader",
            config.i2c_bus
        );
        return;
    }

    thread::spawn(move || {
        let retrys = config.rfid_retrys;
        for i in 0..retrys {
            info!("Starting rfid reader ({} of {})", i + 1, retrys);
            match run_reader(&config, &token, &commands_rx, &events_tx) {
                Ok(()) => return,
                Err(err) => error!("Rfid reader failed: {:?}", err),
            }
            if token.is_canceled() {
                return;
            }
            info!("Restarting the rfid reader in 5 seconds");
            thread::sleep(Duration::from_secs(5));
        }
        error!("Giving up on the rfid reader after {} starts", retrys);
    });
}

/// One life of the reader: bring the chip up, then poll for cards and
/// service write commands until cancellation or a bus failure.
fn run_reader(
    config: &DeviceConfiguration,
    token: &CancellationToken,
    commands_rx: &Receiver<RfidCommand>,
    events_tx: &Sender<CardEvent>,
) -> Result<()> {
    let i2c = I2cdev::new(&config.i2c_bus)
        .with_context(|| format!("Failed to open i2c bus {}", config.i2c_bus))?;
    let mut mfrc522 = Mfrc522::new(i2c, config.chip_address)
        .init()
        .context("Failed to initialize the reader chip")?;

    let version = mfrc522
        .version()
        .context("Failed to read the chip version")?;
    info!("Reader chip version: 0x{:x}", version);
    if version != 0x91 && version != 0x92 {
        warn!("Unexpected chip version 0x{:x}, continuing anyway", version);
    }

    let mut session = CardSession::new(mfrc522, session_options(config), token.clone());

    loop {
        if token.is_canceled() {
            info!("Rfid reader stopping");
            return Ok(());
        }

        match commands_rx.try_recv() {
            Ok(RfidCommand::WriteText(text)) => match session.write_text(&text) {
                Ok(id) => {
                    info!("Data written to card {}", id);
                    events_tx.send(CardEvent::CardWritten { id }).ok();
                }
                Err(err @ Error::I2c(_)) => {
                    return Err(err).context("Lost the reader while writing")
                }
                Err(err) => error!("Error while writing: {}", err),
            },
            Err(TryRecvError::Disconnected) => return Ok(()),
            Err(TryRecvError::Empty) => match session.read_id() {
                Ok(id) => match session.read_text() {
                    Ok(text) => {
                        info!("Card {} read", id);
                        events_tx.send(CardEvent::CardRead { id, text }).ok();
                        // linger so one tap does not fire twice
                        thread::sleep(Duration::from_secs(1));
                    }
                    Err(err @ Error::I2c(_)) => {
                        return Err(err).context("Lost the reader while reading")
                    }
                    Err(err) => warn!("Error while reading: {}", err),
                },
                Err(Error::NoCard) | Err(Error::Timeout) => debug!("No card presented"),
                Err(Error::Cancelled) => return Ok(()),
                Err(err @ Error::I2c(_)) => return Err(err).context("Lost the reader"),
                Err(err) => warn!("Card discovery failed: {}", err),
            },
        }

        thread::sleep(Duration::from_millis(250));
    }
}

fn session_options(config: &DeviceConfiguration) -> SessionOptions {
    SessionOptions {
        key: config.auth_key,
        auth_block: config.auth_block,
        data_blocks: config.data_blocks,
        attempts: config.card_attempts,
        poll_interval: Duration::from_millis(config.poll_interval_ms),
    }
}
