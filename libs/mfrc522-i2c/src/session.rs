//! Whole-card operations on top of the raw driver.
//!
//! A [CardSession] owns the initialized driver plus everything the reference
//! interaction needs: the sector key, the block set used for text storage,
//! and the retry policy. Each operation runs the full discovery sequence per
//! attempt and leaves the chip de-authenticated, so no state carries over
//! between interactions.

use std::thread;
use std::time::Duration;

use embedded_hal::blocking::i2c;
use log::{debug, warn};

use crate::cancellation_token::CancellationToken;
use crate::error::Error;
use crate::{Initialized, Mfrc522, MifareKey};

/// Bytes of card text storage covered by the configured data blocks.
pub const TEXT_LEN: usize = 48;

/// Session configuration, owned by the caller instead of living in module
/// state so repeated interactions cannot observe a previous card.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Key A for the target sector.
    pub key: MifareKey,
    /// Block authenticated before text I/O, conventionally the sector
    /// trailer of the data blocks below.
    pub auth_block: u8,
    /// The three data blocks holding the 48 byte text area, in order.
    pub data_blocks: [u8; 3],
    /// Attempt cap for every operation; each attempt restarts discovery.
    pub attempts: u32,
    /// Pause between attempts.
    pub poll_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> SessionOptions {
        SessionOptions {
            // transport key of factory-fresh cards
            key: [0xFF; 6],
            auth_block: 11,
            data_blocks: [8, 9, 10],
            attempts: 20,
            poll_interval: Duration::from_millis(250),
        }
    }
}

pub struct CardSession<I2C> {
    mfrc522: Mfrc522<I2C, Initialized>,
    options: SessionOptions,
    token: CancellationToken,
}

impl<E, I2C> CardSession<I2C>
where
    I2C: i2c::Write<Error = E> + i2c::WriteRead<Error = E>,
    E: core::fmt::Debug,
{
    pub fn new(
        mfrc522: Mfrc522<I2C, Initialized>,
        options: SessionOptions,
        token: CancellationToken,
    ) -> CardSession<I2C> {
        CardSession {
            mfrc522,
            options,
            token,
        }
    }

    /// Numeric id of the next card presented: discovery only, no
    /// authentication involved.
    pub fn read_id(&mut self) -> Result<u64, Error<E>> {
        self.with_retries(|mfrc522, _| {
            mfrc522.reqa()?;
            let uid = mfrc522.anticollision()?;
            Ok(uid.value())
        })
    }

    /// Reads the text area of the next card presented.
    ///
    /// Returns the raw 48 characters, trailing padding included.
    pub fn read_text(&mut self) -> Result<String, Error<E>> {
        let data = self.with_retries(|mfrc522, options| {
            mfrc522.reqa()?;
            let uid = mfrc522.anticollision()?;
            mfrc522.select(&uid)?;
            let outcome = mfrc522
                .mf_authenticate(&uid, options.auth_block, &options.key)
                .and_then(|()| {
                    let mut data = [0u8; TEXT_LEN];
                    for (chunk, &block) in data.chunks_exact_mut(16).zip(&options.data_blocks) {
                        chunk.copy_from_slice(&mfrc522.mf_read(block)?);
                    }
                    Ok(data)
                });
            // the chip stays authenticated until told otherwise, drop the
            // crypto session whether the reads worked or not
            if let Err(err) = mfrc522.stop_crypto1() {
                warn!("failed to stop the crypto1 unit: {}", err);
            }
            outcome
        })?;
        Ok(decode_text(&data))
    }

    /// Writes `text` to the card's text area, space-padded or truncated to
    /// exactly 48 bytes. Returns the card's numeric id.
    pub fn write_text(&mut self, text: &str) -> Result<u64, Error<E>> {
        let payload = encode_text(text);
        self.with_retries(|mfrc522, options| {
            mfrc522.reqa()?;
            let uid = mfrc522.anticollision()?;
            let id = uid.value();
            mfrc522.select(&uid)?;
            let outcome = mfrc522
                .mf_authenticate(&uid, options.auth_block, &options.key)
                .and_then(|()| {
                    for (chunk, &block) in payload.chunks_exact(16).zip(&options.data_blocks) {
                        let mut data = [0u8; 16];
                        data.copy_from_slice(chunk);
                        mfrc522.mf_write(block, data)?;
                    }
                    Ok(())
                });
            if let Err(err) = mfrc522.stop_crypto1() {
                warn!("failed to stop the crypto1 unit: {}", err);
            }
            outcome.map(|()| id)
        })
    }

    /// Bounded retry loop shared by all operations.
    ///
    /// A quiet field is the normal idle case and only logged at debug level;
    /// protocol failures are logged and retried from the top; bus errors and
    /// cancellation abort immediately.
    fn with_retries<T, F>(&mut self, mut attempt: F) -> Result<T, Error<E>>
    where
        F: FnMut(&mut Mfrc522<I2C, Initialized>, &SessionOptions) -> Result<T, Error<E>>,
    {
        let mut last_err = Error::NoCard;
        for round in 0..self.options.attempts {
            if self.token.is_canceled() {
                return Err(Error::Cancelled);
            }
            if round > 0 {
                thread::sleep(self.options.poll_interval);
            }
            match attempt(&mut self.mfrc522, &self.options) {
                Ok(value) => return Ok(value),
                Err(err @ (Error::NoCard | Error::Timeout)) => {
                    debug!(
                        "no card in the field (attempt {} of {})",
                        round + 1,
                        self.options.attempts
                    );
                    last_err = err;
                }
                Err(err @ Error::I2c(_)) => return Err(err),
                Err(err) => {
                    warn!(
                        "card exchange failed: {} (attempt {} of {})",
                        err,
                        round + 1,
                        self.options.attempts
                    );
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }
}

/// Space-pads or truncates `text` to the fixed 48 byte card area.
fn encode_text(text: &str) -> [u8; TEXT_LEN] {
    let mut data = [b' '; TEXT_LEN];
    for (slot, byte) in data.iter_mut().zip(text.bytes()) {
        *slot = byte;
    }
    data
}

/// Decodes the card area byte-per-character.
fn decode_text(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}
