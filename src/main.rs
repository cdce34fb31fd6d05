mod config;
mod logging;
mod rfid;

use std::env;
use std::env::current_dir;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use mfrc522_i2c::cancellation_token::CancellationToken;

use crate::config::setup::DeviceConfiguration;
use crate::logging::logging_util::setup_logging;
use crate::rfid::rfid_manager::{CardEvent, RfidCommand, RfidManager};

fn main() -> Result<()> {
    let token = CancellationToken::new();

    // Ctrl-C cancels the same token the reader thread polls
    let handler_token = token.clone();
    ctrlc::set_handler(move || handler_token.cancel()).context("Error setting Ctrl-C handler")?;

    let project_dir = current_dir().context("No working directory")?;
    let dev_config = DeviceConfiguration::load(project_dir.join("config/Config.yaml"));
    dev_config.validate()?;

    setup_logging(&dev_config)?;
    info!("Starting tag station!");

    let (manager, events) = RfidManager::new(dev_config, token.clone());

    // An argument on the command line is text for the next presented card,
    // otherwise the station just reads and reports.
    if let Some(text) = env::args().nth(1) {
        info!("Waiting for a card to write to");
        manager
            .command_channel()
            .send(RfidCommand::WriteText(text))
            .ok();
    }

    while !token.is_canceled() {
        match events.recv_timeout(Duration::from_millis(500)) {
            Ok(CardEvent::CardRead { id, text }) => {
                info!("Card {}: {:?}", id, text.trim_end());
            }
            Ok(CardEvent::CardWritten { id }) => info!("Card {} written", id),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("Tag station stopped");
    Ok(())
}
