//! Driver library for MFRC522-compatible contactless communication ICs
//! attached over I2C, based on the
//! [embedded-hal](https://docs.rs/embedded-hal/0.2/embedded_hal/) traits.
//!
//! The chip is a *Proximity Coupling Device* (PCD) and communicates with a
//! *Proximity Integrated Circuit Card* (PICC). The driver speaks to the chip
//! exclusively through single-byte register reads and writes and orchestrates
//! its FIFO, IRQ status registers and CRC coprocessor to run the ISO14443A
//! command sequence: discover a card, select it, authenticate a sector, and
//! read or write 16 byte data blocks.
//!
//! # Quickstart
//! ```no_run
//! let i2c = linux_embedded_hal::I2cdev::new("/dev/i2c-1").unwrap();
//! let mut mfrc522 = mfrc522_i2c::Mfrc522::new(i2c, mfrc522_i2c::DEFAULT_ADDRESS)
//!     .init()
//!     .unwrap();
//!
//! // The reported version is expected to be 0x91 or 0x92
//! let version = mfrc522.version().unwrap();
//!
//! let atqa = mfrc522.reqa().unwrap();
//! let uid = mfrc522.anticollision().unwrap();
//! println!("card {:x}", uid.value());
//! ```
//!
//! Higher level whole-card operations (identify, read/write a fixed text
//! area) live in the [session] module.

pub mod cancellation_token;
pub mod error;
pub mod session;

mod picc;
mod register;
mod util;

use std::time::{Duration, Instant};

use embedded_hal as hal;
use hal::blocking::i2c;

use error::Error;
use register::*;
use util::Sealed;

/// Low nibble of the card's 4-bit acknowledge reply.
const MIFARE_ACK: u8 = 0x0A;
const MIFARE_KEYSIZE: usize = 6;
pub type MifareKey = [u8; MIFARE_KEYSIZE];

/// I2C address the chip answers on when its address pins are strapped low.
pub const DEFAULT_ADDRESS: u8 = 0x28;

/// Longest reply any exchange in this protocol produces. The FIFO drain is
/// clamped to this, which also discards the CRC tail of block reads.
const MAX_LEN: usize = 16;

/// The chip timer is armed for 25ms per exchange; the host-side deadline
/// leaves room for it to fire before we give up on the chip itself.
const TRANSCEIVE_TIMEOUT: Duration = Duration::from_millis(50);
/// CRC coprocessor completion deadline.
const CRC_TIMEOUT: Duration = Duration::from_millis(5);
/// Deadline for the soft-reset power-up loop.
const RESET_TIMEOUT: Duration = Duration::from_millis(50);

/// IRQ sources enabled while an MFAuthent command runs.
const AUTH_IRQ_EN: u8 = ERR_IRQ | IDLE_IRQ;
/// IRQ sources enabled while a Transceive command runs, timer included.
const TRANSCEIVE_IRQ_EN: u8 = 0x77;

/// Card UID as produced by the anticollision step: 4 identity bytes followed
/// by their XOR checksum (BCC).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uid {
    bytes: [u8; 5],
}

impl Uid {
    /// Builds a UID from a 5-byte anticollision reply, verifying that the
    /// last byte is the XOR of the first four. Returns `None` on mismatch.
    pub fn from_anticollision(bytes: [u8; 5]) -> Option<Self> {
        let bcc = bytes[0] ^ bytes[1] ^ bytes[2] ^ bytes[3];
        if bcc == bytes[4] {
            Some(Uid { bytes })
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> &[u8; 5] {
        &self.bytes
    }

    /// The 4 identity bytes, without the checksum.
    pub fn identity(&self) -> &[u8] {
        &self.bytes[..4]
    }

    /// Numeric card id: all 5 bytes read as a big-endian radix-256 number.
    pub fn value(&self) -> u64 {
        self.bytes.iter().fold(0u64, |id, &b| (id << 8) | u64::from(b))
    }
}

/// Answer To reQuest type A
pub struct AtqA {
    bytes: [u8; 2],
}

impl AtqA {
    pub fn bytes(&self) -> &[u8; 2] {
        &self.bytes
    }
}

/// Implemented by the different states of the driver.
///
/// This trait cannot be implemented outside of this crate.
pub trait State: Sealed {}

/// The driver starts in this state and needs to be initialized before it can
/// be used.
pub enum Uninitialized {}
/// The driver is ready for use.
pub enum Initialized {}

impl State for Uninitialized {}
impl State for Initialized {}
impl Sealed for Uninitialized {}
impl Sealed for Initialized {}

/// MFRC522 driver
pub struct Mfrc522<I2C, S: State> {
    i2c: I2C,
    addr: u8,
    state: core::marker::PhantomData<S>,
}

impl<E, I2C> Mfrc522<I2C, Uninitialized>
where
    I2C: i2c::Write<Error = E> + i2c::WriteRead<Error = E>,
    E: core::fmt::Debug,
{
    /// Create a new driver from an I2C bus and the chip's 7-bit address.
    pub fn new(i2c: I2C, addr: u8) -> Mfrc522<I2C, Uninitialized> {
        Mfrc522 {
            i2c,
            addr,
            state: core::marker::PhantomData,
        }
    }

    /// Initialize the chip.
    ///
    /// This needs to be called before you can do any other operation.
    pub fn init(mut self) -> Result<Mfrc522<I2C, Initialized>, Error<E>> {
        self.reset()?;
        self.write(Register::TxModeReg, 0x00)?;
        self.write(Register::RxModeReg, 0x00)?;
        // Reset ModWidthReg to default value
        self.write(Register::ModWidthReg, 0x26)?;

        // Configure the timer, so we get a timeout if something goes wrong
        // when communicating with a PICC:
        // - Set timer to start automatically at the end of the transmission
        self.write(Register::TModeReg, 0x80)?;
        // - Configure the prescaler to determine the timer frequency:
        //   f_timer = 13.56 MHz / (2 * TPreScaler + 1)
        //   so for 40kHz frequency (25μs period), TPreScaler = 0x0A9
        self.write(Register::TPrescalerReg, 0xA9)?;
        // - Set the reload value to determine the timeout
        //   for a 25ms timeout, we need a value of 1000 = 0x3E8
        self.write(Register::TReloadRegHigh, 0x03)?;
        self.write(Register::TReloadRegLow, 0xE8)?;

        self.write(Register::TxASKReg, FORCE_100_ASK)?;
        // Set preset value of CRC coprocessor according to ISO 14443-3 part 6.2.4
        self.write(Register::ModeReg, (0x3f & (!0b11)) | 0b01)?;
        // Enable antenna
        self.set_bits(Register::TxControlReg, 0b11)?;

        Ok(Mfrc522 {
            i2c: self.i2c,
            addr: self.addr,
            state: core::marker::PhantomData,
        })
    }

    /// Perform a software reset and wait for the chip to wake up again.
    fn reset(&mut self) -> Result<(), Error<E>> {
        self.command(Command::SoftReset)?;
        let deadline = Instant::now() + RESET_TIMEOUT;
        while self.read(Register::CommandReg)? & POWER_DOWN != 0 {
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
        }
        Ok(())
    }
}

// The public functions can only be used after initializing
impl<E, I2C> Mfrc522<I2C, Initialized>
where
    I2C: i2c::Write<Error = E> + i2c::WriteRead<Error = E>,
    E: core::fmt::Debug,
{
    /// Sends a REQuest type A to nearby PICCs
    pub fn reqa(&mut self) -> Result<AtqA, Error<E>> {
        self.request(picc::Command::ReqA)
    }

    /// Sends a Wake UP type A to nearby PICCs
    pub fn wupa(&mut self) -> Result<AtqA, Error<E>> {
        self.request(picc::Command::WupA)
    }

    fn request(&mut self, mode: picc::Command) -> Result<AtqA, Error<E>> {
        // NOTE REQA and WUPA are short frames (7 bits)
        let fifo_data = self.communicate::<2>(Command::Transceive, &[mode.into()], 7)?;
        // the ATQA is always a full 2 bytes
        if fifo_data.total_bits != 16 {
            return Err(Error::IncompleteFrame);
        }
        Ok(AtqA {
            bytes: fifo_data.buffer,
        })
    }

    /// Retrieves the UID of a card in the READY state.
    ///
    /// The 5th reply byte must be the XOR of the first four; a mismatch
    /// discards the candidate UID and fails the discovery attempt.
    pub fn anticollision(&mut self) -> Result<Uid, Error<E>> {
        let tx = [picc::Command::SelCl1.into(), picc::NVB_ANTICOLLISION];
        let fifo_data = self.communicate::<5>(Command::Transceive, &tx, 0)?;
        if fifo_data.valid_bytes != 5 {
            return Err(Error::IncompleteFrame);
        }
        Uid::from_anticollision(fifo_data.buffer).ok_or(Error::Bcc)
    }

    /// Commits to the given UID and returns the card's SAK byte, which
    /// encodes its storage capacity class.
    pub fn select(&mut self, uid: &Uid) -> Result<u8, Error<E>> {
        let mut tx = [0u8; 9];
        tx[0] = picc::Command::SelCl1.into();
        tx[1] = picc::NVB_SELECT;
        tx[2..7].copy_from_slice(uid.as_bytes());
        let crc = self.calculate_crc(&tx[..7])?;
        tx[7..].copy_from_slice(&crc);

        let fifo_data = self.communicate::<3>(Command::Transceive, &tx, 0)?;
        // SAK plus its CRC
        if fifo_data.total_bits != 24 {
            return Err(Error::IncompleteFrame);
        }
        Ok(fifo_data.buffer[0])
    }

    /// Authenticates the given block with Key A.
    ///
    /// The chip can accept the frame and still reject the key, so success
    /// additionally requires the crypto-active status bit.
    pub fn mf_authenticate(
        &mut self,
        uid: &Uid,
        block: u8,
        key: &MifareKey,
    ) -> Result<(), Error<E>> {
        let mut tx = [0u8; 12];
        tx[0] = picc::Command::MfAuthKeyA.into();
        tx[1] = block;
        tx[2..8].copy_from_slice(key);
        tx[8..12].copy_from_slice(uid.identity());
        self.communicate::<0>(Command::MFAuthent, &tx, 0)?;

        if self.read(Register::Status2Reg)? & MF_CRYPTO1_ON == 0 {
            return Err(Error::AuthRejected);
        }
        Ok(())
    }

    /// Reads one 16 byte block from the authenticated sector.
    pub fn mf_read(&mut self, block: u8) -> Result<[u8; 16], Error<E>> {
        let mut tx = [picc::Command::MfRead.into(), block, 0u8, 0u8];
        let crc = self.calculate_crc(&tx[..2])?;
        tx[2..].copy_from_slice(&crc);

        let fifo_data = self.communicate::<16>(Command::Transceive, &tx, 0)?;
        if fifo_data.valid_bytes != 16 {
            return Err(Error::IncompleteFrame);
        }
        Ok(fifo_data.buffer)
    }

    /// Writes one 16 byte block to the authenticated sector.
    ///
    /// Two round trips, each acknowledged with the card's 4-bit ACK pattern.
    /// Either phase failing aborts the write; no retry is attempted here.
    pub fn mf_write(&mut self, block: u8, data: [u8; 16]) -> Result<(), Error<E>> {
        let mut cmd = [picc::Command::MfWrite.into(), block, 0u8, 0u8];
        let crc = self.calculate_crc(&cmd[..2])?;
        cmd[2..].copy_from_slice(&crc);
        let ack = self.communicate::<1>(Command::Transceive, &cmd, 0)?;
        if ack.total_bits != 4 || ack.buffer[0] & 0x0F != MIFARE_ACK {
            return Err(Error::Nak);
        }

        let mut tx = [0u8; 18];
        tx[..16].copy_from_slice(&data);
        let crc = self.calculate_crc(&data)?;
        tx[16..].copy_from_slice(&crc);
        let ack = self.communicate::<1>(Command::Transceive, &tx, 0)?;
        if ack.total_bits != 4 || ack.buffer[0] & 0x0F != MIFARE_ACK {
            return Err(Error::Nak);
        }

        Ok(())
    }

    /// Switch off the MIFARE Crypto1 unit.
    /// Must be done after communication with an authenticated PICC, the chip
    /// stays authenticated until told otherwise.
    pub fn stop_crypto1(&mut self) -> Result<(), Error<E>> {
        self.clear_bits(Register::Status2Reg, MF_CRYPTO1_ON)
    }

    /// Returns the version reported by the chip
    pub fn version(&mut self) -> Result<u8, Error<E>> {
        self.read(Register::VersionReg)
    }
}

// The private functions are implemented for all states.
impl<E, I2C, S: State> Mfrc522<I2C, S>
where
    I2C: i2c::Write<Error = E> + i2c::WriteRead<Error = E>,
    E: core::fmt::Debug,
{
    /// Feeds `data` through the chip's CRC coprocessor and returns the
    /// 2 byte result, low register first.
    fn calculate_crc(&mut self, data: &[u8]) -> Result<[u8; 2], Error<E>> {
        // stop any ongoing command
        self.command(Command::Idle)?;

        // clear the CRC_IRQ interrupt flag
        self.write(Register::DivIrqReg, CRC_IRQ)?;

        self.fifo_flush()?;
        for &byte in data {
            self.write(Register::FIFODataReg, byte)?;
        }

        self.command(Command::CalcCRC)?;

        // Wait for the CRC calculation to complete. A result read after the
        // deadline could be stale, so the whole operation fails instead.
        let deadline = Instant::now() + CRC_TIMEOUT;
        loop {
            let irq = self.read(Register::DivIrqReg)?;
            if irq & CRC_IRQ != 0 {
                self.command(Command::Idle)?;
                let crc = [
                    self.read(Register::CRCResultRegLow)?,
                    self.read(Register::CRCResultRegHigh)?,
                ];
                return Ok(crc);
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
        }
    }

    /// The single synchronization point every card exchange funnels through:
    /// loads the FIFO, issues `command`, polls the IRQ status register and
    /// drains the reply.
    ///
    /// `tx_last_bits` is the number of bits of the last byte to transmit,
    /// 0 meaning the whole byte (short frames use 7).
    fn communicate<const RX: usize>(
        &mut self,
        command: Command,
        tx_buffer: &[u8],
        tx_last_bits: u8,
    ) -> Result<FifoData<RX>, Error<E>> {
        let (irq_en, wait_irq) = if command == Command::MFAuthent {
            (AUTH_IRQ_EN, IDLE_IRQ)
        } else {
            (TRANSCEIVE_IRQ_EN, RX_IRQ | IDLE_IRQ)
        };

        self.write(Register::ComlEnReg, irq_en | IRQ_INV)?;

        // clear all interrupt flags
        self.write(Register::ComIrqReg, CLEAR_COM_IRQ)?;

        self.fifo_flush()?;

        // stop any ongoing command
        self.command(Command::Idle)?;

        self.write(Register::BitFramingReg, tx_last_bits & 0b111)?;

        for &byte in tx_buffer {
            self.write(Register::FIFODataReg, byte)?;
        }

        // signal command
        self.command(command)?;

        if command == Command::Transceive {
            self.set_bits(Register::BitFramingReg, START_SEND)?;
        }

        // wait for transmission + reception to complete
        let deadline = Instant::now() + TRANSCEIVE_TIMEOUT;
        let mut timed_out = false;
        let irq = loop {
            let irq = self.read(Register::ComIrqReg)?;
            if irq & (wait_irq | TIMER_IRQ) != 0 {
                break irq;
            }
            if Instant::now() >= deadline {
                timed_out = true;
                break irq;
            }
        };

        self.clear_bits(Register::BitFramingReg, START_SEND)?;

        if timed_out {
            return Err(Error::Timeout);
        }

        self.check_error_register()?;

        // The chip timer counting down with a clean error register means
        // nothing in the field answered. Only commands that enabled the
        // timer IRQ treat it as such.
        if irq & irq_en & TIMER_IRQ != 0 {
            return Err(Error::NoCard);
        }

        self.fifo_data()
    }

    /// Get the data from the internal FIFO buffer
    fn fifo_data<const RX: usize>(&mut self) -> Result<FifoData<RX>, Error<E>> {
        let mut buffer = [0u8; RX];
        let mut valid_bytes = 0;
        let mut total_bits = 0;

        if RX > 0 {
            let level = self.read(Register::FIFOLevelReg)? as usize;
            let last_bits = (self.read(Register::ControlReg)? & RX_LAST_BITS) as usize;
            // last_bits == 0 means the whole last byte is valid
            total_bits = if last_bits != 0 {
                level.saturating_sub(1) * 8 + last_bits
            } else {
                level * 8
            };
            valid_bytes = level.min(MAX_LEN).min(RX);
            for slot in buffer.iter_mut().take(valid_bytes) {
                *slot = self.read(Register::FIFODataReg)?;
            }
        }

        Ok(FifoData {
            buffer,
            valid_bytes,
            total_bits,
        })
    }

    fn check_error_register(&mut self) -> Result<(), Error<E>> {
        let err = self.read(Register::ErrorReg)?;

        if err & PROTOCOL_ERR != 0 {
            Err(Error::Protocol)
        } else if err & PARITY_ERR != 0 {
            Err(Error::Parity)
        } else if err & CRC_ERR != 0 {
            Err(Error::Crc)
        } else if err & COLL_ERR != 0 {
            Err(Error::Collision)
        } else if err & BUFFER_OVFL != 0 {
            Err(Error::BufferOverflow)
        } else if err & TEMP_ERR != 0 {
            Err(Error::Overheating)
        } else if err & WR_ERR != 0 {
            Err(Error::Wr)
        } else {
            Ok(())
        }
    }

    /// Flush the internal FIFO buffer
    fn fifo_flush(&mut self) -> Result<(), Error<E>> {
        self.write(Register::FIFOLevelReg, FLUSH_BUFFER)
    }

    /// Request to execute the given command
    fn command(&mut self, command: Command) -> Result<(), Error<E>> {
        self.write(Register::CommandReg, command.into())
    }

    fn set_bits(&mut self, reg: Register, mask: u8) -> Result<(), Error<E>> {
        self.rmw(reg, |b| b | mask)
    }

    fn clear_bits(&mut self, reg: Register, mask: u8) -> Result<(), Error<E>> {
        self.rmw(reg, |b| b & !mask)
    }

    fn rmw<F>(&mut self, reg: Register, f: F) -> Result<(), Error<E>>
    where
        F: FnOnce(u8) -> u8,
    {
        let byte = self.read(reg)?;
        self.write(reg, f(byte))?;
        Ok(())
    }

    // lowest level API

    fn read(&mut self, reg: Register) -> Result<u8, Error<E>> {
        let mut buffer = [0u8];
        self.i2c
            .write_read(self.addr, &[reg.into()], &mut buffer)
            .map_err(Error::I2c)?;
        Ok(buffer[0])
    }

    fn write(&mut self, reg: Register, val: u8) -> Result<(), Error<E>> {
        self.i2c
            .write(self.addr, &[reg.into(), val])
            .map_err(Error::I2c)
    }
}

impl<I2C, S: State> Mfrc522<I2C, S> {
    /// Release the underlying I2C bus
    pub fn release(self) -> I2C {
        self.i2c
    }
}

/// Outcome of one FIFO drain.
struct FifoData<const L: usize> {
    /// The drained bytes, clamped to the protocol maximum of 16
    buffer: [u8; L],
    /// The number of valid bytes in the buffer
    valid_bytes: usize,
    /// Total valid bit count as reported by the chip, computed before
    /// clamping
    total_bits: usize,
}
