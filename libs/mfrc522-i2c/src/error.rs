use thiserror::Error;

/// Errors
#[derive(Debug, Error)]
pub enum Error<E: core::fmt::Debug> {
    /// No card in the field answered within the chip timer window
    #[error("no card answered")]
    NoCard,
    /// Wrong Block Character Check (BCC) on the anticollision reply
    #[error("UID failed its checksum byte")]
    Bcc,
    /// FIFO buffer overflow
    #[error("FIFO buffer overflow")]
    BufferOverflow,
    /// Collision
    #[error("bit collision during reception")]
    Collision,
    /// Wrong CRC
    #[error("CRC check failed")]
    Crc,
    /// Incomplete RX frame
    #[error("reply length differs from the protocol expectation")]
    IncompleteFrame,
    /// Internal temperature sensor detects overheating
    #[error("chip overheating")]
    Overheating,
    /// Parity check failed
    #[error("parity check failed")]
    Parity,
    /// Protocol error during transmission or MFAuthent
    #[error("protocol error")]
    Protocol,
    /// The card accepted the authentication frame but the crypto unit never
    /// came up, typically a wrong key
    #[error("authentication rejected by the card")]
    AuthRejected,
    /// Not acknowledge from the card
    #[error("card did not acknowledge")]
    Nak,
    /// Write error: FIFO buffer was written at invalid time
    #[error("FIFO written at invalid time")]
    Wr,
    /// Poll deadline expired before the chip signalled completion
    #[error("timed out waiting for the chip")]
    Timeout,
    /// The session operation was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,
    /// I2C bus error
    #[error("i2c bus error: {0:?}")]
    I2c(E),
}
