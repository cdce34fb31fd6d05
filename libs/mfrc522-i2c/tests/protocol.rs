//! Register-level protocol tests against a transaction-scripted I2C bus.
//!
//! Every expectation list pins the exact register traffic of one operation,
//! so a change in the command sequence fails loudly here.

use embedded_hal::blocking::i2c::{Write, WriteRead};
use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

use mfrc522_i2c::error::Error;
use mfrc522_i2c::{Initialized, Mfrc522, Uid, DEFAULT_ADDRESS};

const ADDR: u8 = DEFAULT_ADDRESS;

/// Chip bring-up traffic, shared by every test that needs an initialized
/// driver.
fn init_script() -> Vec<I2cTransaction> {
    vec![
        // soft reset, then wait for the power-down bit to clear
        I2cTransaction::write(ADDR, vec![0x01, 0x0F]),
        I2cTransaction::write_read(ADDR, vec![0x01], vec![0x20]),
        I2cTransaction::write_read(ADDR, vec![0x01], vec![0x00]),
        // TX/RX at 106 kBd, default modulation width
        I2cTransaction::write(ADDR, vec![0x12, 0x00]),
        I2cTransaction::write(ADDR, vec![0x13, 0x00]),
        I2cTransaction::write(ADDR, vec![0x24, 0x26]),
        // 25ms countdown timer armed on every transmission
        I2cTransaction::write(ADDR, vec![0x2A, 0x80]),
        I2cTransaction::write(ADDR, vec![0x2B, 0xA9]),
        I2cTransaction::write(ADDR, vec![0x2C, 0x03]),
        I2cTransaction::write(ADDR, vec![0x2D, 0xE8]),
        // 100% ASK, CRC preset 0x6363
        I2cTransaction::write(ADDR, vec![0x15, 0x40]),
        I2cTransaction::write(ADDR, vec![0x11, 0x3D]),
        // antenna on
        I2cTransaction::write_read(ADDR, vec![0x14], vec![0x10]),
        I2cTransaction::write(ADDR, vec![0x14, 0x13]),
    ]
}

/// Engine traffic up to and including the start-send bit.
fn transceive_start(tx: &[u8], framing: u8) -> Vec<I2cTransaction> {
    let mut script = vec![
        I2cTransaction::write(ADDR, vec![0x02, 0xF7]),
        I2cTransaction::write(ADDR, vec![0x04, 0x7F]),
        I2cTransaction::write(ADDR, vec![0x0A, 0x80]),
        I2cTransaction::write(ADDR, vec![0x01, 0x00]),
        I2cTransaction::write(ADDR, vec![0x0D, framing]),
    ];
    for &byte in tx {
        script.push(I2cTransaction::write(ADDR, vec![0x09, byte]));
    }
    script.push(I2cTransaction::write(ADDR, vec![0x01, 0x0C]));
    script.push(I2cTransaction::write_read(ADDR, vec![0x0D], vec![framing]));
    script.push(I2cTransaction::write(ADDR, vec![0x0D, 0x80 | framing]));
    script
}

/// IRQ poll outcome, start-send teardown and error register check.
fn transceive_finish(irq: u8, framing: u8, err: u8) -> Vec<I2cTransaction> {
    vec![
        I2cTransaction::write_read(ADDR, vec![0x04], vec![irq]),
        I2cTransaction::write_read(ADDR, vec![0x0D], vec![0x80 | framing]),
        I2cTransaction::write(ADDR, vec![0x0D, framing]),
        I2cTransaction::write_read(ADDR, vec![0x06], vec![err]),
    ]
}

fn fifo_script(level: u8, last_bits: u8, drained: &[u8]) -> Vec<I2cTransaction> {
    let mut script = vec![
        I2cTransaction::write_read(ADDR, vec![0x0A], vec![level]),
        I2cTransaction::write_read(ADDR, vec![0x0C], vec![last_bits]),
    ];
    for &byte in drained {
        script.push(I2cTransaction::write_read(ADDR, vec![0x09], vec![byte]));
    }
    script
}

/// CRC coprocessor traffic: the chip is scripted to answer `crc`.
fn crc_script(data: &[u8], crc: [u8; 2]) -> Vec<I2cTransaction> {
    let mut script = vec![
        I2cTransaction::write(ADDR, vec![0x01, 0x00]),
        I2cTransaction::write(ADDR, vec![0x05, 0x04]),
        I2cTransaction::write(ADDR, vec![0x0A, 0x80]),
    ];
    for &byte in data {
        script.push(I2cTransaction::write(ADDR, vec![0x09, byte]));
    }
    script.push(I2cTransaction::write(ADDR, vec![0x01, 0x03]));
    script.push(I2cTransaction::write_read(ADDR, vec![0x05], vec![0x04]));
    script.push(I2cTransaction::write(ADDR, vec![0x01, 0x00]));
    script.push(I2cTransaction::write_read(ADDR, vec![0x22], vec![crc[0]]));
    script.push(I2cTransaction::write_read(ADDR, vec![0x21], vec![crc[1]]));
    script
}

fn initialized(script: Vec<I2cTransaction>) -> Mfrc522<I2cMock, Initialized> {
    let mut expectations = init_script();
    expectations.extend(script);
    Mfrc522::new(I2cMock::new(&expectations), ADDR)
        .init()
        .unwrap()
}

fn finish(mfrc522: Mfrc522<I2cMock, Initialized>) {
    mfrc522.release().done();
}

#[test]
fn init_configures_timer_modulation_and_antenna() {
    let mfrc522 = initialized(Vec::new());
    finish(mfrc522);
}

#[test]
fn reqa_accepts_a_full_atqa() {
    let mut script = transceive_start(&[0x26], 7);
    script.extend(transceive_finish(0x30, 7, 0x00));
    script.extend(fifo_script(2, 0, &[0x04, 0x00]));
    let mut mfrc522 = initialized(script);

    let atqa = mfrc522.reqa().unwrap();
    assert_eq!(atqa.bytes(), &[0x04, 0x00]);
    finish(mfrc522);
}

#[test]
fn reqa_reports_a_quiet_field_as_no_card() {
    // the chip timer fires with a clean error register
    let mut script = transceive_start(&[0x26], 7);
    script.extend(transceive_finish(0x01, 7, 0x00));
    let mut mfrc522 = initialized(script);

    assert!(matches!(mfrc522.reqa(), Err(Error::NoCard)));
    finish(mfrc522);
}

#[test]
fn reqa_rejects_a_short_atqa() {
    // a single reply byte is not a valid ATQA
    let mut script = transceive_start(&[0x26], 7);
    script.extend(transceive_finish(0x30, 7, 0x00));
    script.extend(fifo_script(1, 0, &[0x04]));
    let mut mfrc522 = initialized(script);

    assert!(matches!(mfrc522.reqa(), Err(Error::IncompleteFrame)));
    finish(mfrc522);
}

#[test]
fn anticollision_returns_a_verified_uid() {
    let mut script = transceive_start(&[0x93, 0x20], 0);
    script.extend(transceive_finish(0x30, 0, 0x00));
    script.extend(fifo_script(5, 0, &[0x12, 0x34, 0x56, 0x78, 0x5C]));
    let mut mfrc522 = initialized(script);

    let uid = mfrc522.anticollision().unwrap();
    assert_eq!(uid.as_bytes(), &[0x12, 0x34, 0x56, 0x78, 0x5C]);
    assert_eq!(uid.value(), 0x12_34_56_78_5C);
    finish(mfrc522);
}

#[test]
fn anticollision_discards_a_uid_with_a_bad_checksum() {
    let mut script = transceive_start(&[0x93, 0x20], 0);
    script.extend(transceive_finish(0x30, 0, 0x00));
    script.extend(fifo_script(5, 0, &[0x12, 0x34, 0x56, 0x78, 0x00]));
    let mut mfrc522 = initialized(script);

    assert!(matches!(mfrc522.anticollision(), Err(Error::Bcc)));
    finish(mfrc522);
}

#[test]
fn select_returns_the_sak_byte() {
    let uid = Uid::from_anticollision([0x12, 0x34, 0x56, 0x78, 0x5C]).unwrap();
    // CRC_A over the 7 byte select frame
    let mut script = crc_script(&[0x93, 0x70, 0x12, 0x34, 0x56, 0x78, 0x5C], [0x9D, 0xB6]);
    script.extend(transceive_start(
        &[0x93, 0x70, 0x12, 0x34, 0x56, 0x78, 0x5C, 0x9D, 0xB6],
        0,
    ));
    script.extend(transceive_finish(0x30, 0, 0x00));
    script.extend(fifo_script(3, 0, &[0x08, 0xB6, 0xDD]));
    let mut mfrc522 = initialized(script);

    assert_eq!(mfrc522.select(&uid).unwrap(), 0x08);
    finish(mfrc522);
}

#[test]
fn authenticate_without_crypto_bit_is_rejected() {
    let uid = Uid::from_anticollision([0x12, 0x34, 0x56, 0x78, 0x5C]).unwrap();
    let key = [0xFF; 6];
    let tx = [
        0x60, 0x0B, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x12, 0x34, 0x56, 0x78,
    ];

    let mut script = vec![
        I2cTransaction::write(ADDR, vec![0x02, 0x92]),
        I2cTransaction::write(ADDR, vec![0x04, 0x7F]),
        I2cTransaction::write(ADDR, vec![0x0A, 0x80]),
        I2cTransaction::write(ADDR, vec![0x01, 0x00]),
        I2cTransaction::write(ADDR, vec![0x0D, 0x00]),
    ];
    for &byte in &tx {
        script.push(I2cTransaction::write(ADDR, vec![0x09, byte]));
    }
    script.push(I2cTransaction::write(ADDR, vec![0x01, 0x0E]));
    // idle IRQ: the chip accepted the frame
    script.push(I2cTransaction::write_read(ADDR, vec![0x04], vec![0x10]));
    script.push(I2cTransaction::write_read(ADDR, vec![0x0D], vec![0x00]));
    script.push(I2cTransaction::write(ADDR, vec![0x0D, 0x00]));
    script.push(I2cTransaction::write_read(ADDR, vec![0x06], vec![0x00]));
    // ... but the crypto unit never came up
    script.push(I2cTransaction::write_read(ADDR, vec![0x08], vec![0x00]));
    let mut mfrc522 = initialized(script);

    assert!(matches!(
        mfrc522.mf_authenticate(&uid, 11, &key),
        Err(Error::AuthRejected)
    ));
    finish(mfrc522);
}

#[test]
fn read_drains_exactly_one_block_and_drops_the_crc_tail() {
    let block = *b"some secret text";
    let mut script = crc_script(&[0x30, 0x08], [0x4A, 0x24]);
    script.extend(transceive_start(&[0x30, 0x08, 0x4A, 0x24], 0));
    script.extend(transceive_finish(0x30, 0, 0x00));
    // 18 bytes in the FIFO (block + CRC), only 16 are drained
    script.extend(fifo_script(18, 0, &block));
    let mut mfrc522 = initialized(script);

    assert_eq!(mfrc522.mf_read(8).unwrap(), block);
    finish(mfrc522);
}

#[test]
fn write_aborts_on_a_nak_nibble() {
    let mut script = crc_script(&[0xA0, 0x08], [0x17, 0x3D]);
    script.extend(transceive_start(&[0xA0, 0x08, 0x17, 0x3D], 0));
    script.extend(transceive_finish(0x30, 0, 0x00));
    // 4 bit reply that is not the 0x0A acknowledge pattern
    script.extend(fifo_script(1, 4, &[0x05]));
    let mut mfrc522 = initialized(script);

    assert!(matches!(mfrc522.mf_write(8, [0u8; 16]), Err(Error::Nak)));
    finish(mfrc522);
}

#[test]
fn transceive_surfaces_chip_errors() {
    // parity error flagged in the error register
    let mut script = transceive_start(&[0x26], 7);
    script.extend(transceive_finish(0x30, 7, 0x02));
    let mut mfrc522 = initialized(script);

    assert!(matches!(mfrc522.reqa(), Err(Error::Parity)));
    finish(mfrc522);
}

#[test]
fn stop_crypto1_clears_only_the_crypto_bit() {
    let script = vec![
        I2cTransaction::write_read(ADDR, vec![0x08], vec![0x0B]),
        I2cTransaction::write(ADDR, vec![0x08, 0x03]),
    ];
    let mut mfrc522 = initialized(script);

    mfrc522.stop_crypto1().unwrap();
    finish(mfrc522);
}

/// A bus whose chip never raises an IRQ: every read answers zero.
struct StuckBus;

impl Write for StuckBus {
    type Error = std::convert::Infallible;

    fn write(&mut self, _addr: u8, _bytes: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl WriteRead for StuckBus {
    type Error = std::convert::Infallible;

    fn write_read(
        &mut self,
        _addr: u8,
        _bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        buffer.fill(0);
        Ok(())
    }
}

#[test]
fn a_dead_chip_times_out_instead_of_reporting_ok() {
    let mut mfrc522 = Mfrc522::new(StuckBus, ADDR).init().unwrap();
    assert!(matches!(mfrc522.reqa(), Err(Error::Timeout)));
}
