use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Result};
use log::error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfiguration {
    pub device_uuid: String,
    /// I2C bus device the reader chip hangs off.
    pub i2c_bus: String,
    /// 7-bit chip address on that bus.
    pub chip_address: u8,
    /// Key A for the text sector.
    pub auth_key: [u8; 6],
    /// Block authenticated before text I/O.
    pub auth_block: u8,
    /// The three data blocks backing the 48 byte text area.
    pub data_blocks: [u8; 3],
    /// How often the reader thread is restarted after a bus failure.
    pub rfid_retrys: u32,
    /// Attempt cap for a single card operation.
    pub card_attempts: u32,
    pub poll_interval_ms: u64,
}

impl DeviceConfiguration {
    pub fn new() -> DeviceConfiguration {
        DeviceConfiguration {
            device_uuid: Uuid::new_v4().to_string(),
            i2c_bus: "/dev/i2c-1".to_owned(),
            chip_address: 0x28,
            // transport key of factory-fresh cards
            auth_key: [0xFF; 6],
            auth_block: 11,
            data_blocks: [8, 9, 10],
            rfid_retrys: 5,
            card_attempts: 20,
            poll_interval_ms: 250,
        }
    }

    pub fn load(path: PathBuf) -> DeviceConfiguration {
        let device_config: DeviceConfiguration;
        if !path.is_file() {
            // If the YAML file doesn't exist, create it and save the struct as YAML
            device_config = DeviceConfiguration::new();
            device_config.save(path);
        } else {
            // If the YAML file exists, read and parse it into the struct
            let mut file = OpenOptions::new()
                .read(true)
                .open(path)
                .expect("Unable to open config");
            let mut contents = String::new();
            file.read_to_string(&mut contents).expect("Unable to read file");
            device_config = serde_yaml::from_str(&contents).expect("Failed to parse config file");
            println!("Config file read: {:?}", device_config);
        }

        device_config
    }

    pub fn save(&self, path: PathBuf) {
        let mut parent_dir = path.clone();
        parent_dir.pop();
        if !parent_dir.is_dir() {
            fs::create_dir_all(parent_dir).unwrap_or_else(|err| {
                error!("Failed to create config dir: {:?}", err);
                panic!()
            })
        }

        let serialized_yaml = serde_yaml::to_string(self).unwrap();
        let mut file = File::create(path.clone()).expect("Unable to create file");
        file.write_all(serialized_yaml.as_bytes())
            .expect("Unable to write data to file");
        println!("Config file created: {}", path.display());
    }

    /// The session layer trusts these values, so reject configurations that
    /// would address blocks off the card or clobber a sector trailer.
    pub fn validate(&self) -> Result<()> {
        for &block in self.data_blocks.iter() {
            if block > 63 {
                bail!("data block {} is outside the card's 0..=63 range", block);
            }
            if block % 4 == 3 {
                bail!("data block {} is a sector trailer", block);
            }
        }
        if self.auth_block > 63 {
            bail!(
                "auth block {} is outside the card's 0..=63 range",
                self.auth_block
            );
        }
        if self.card_attempts == 0 {
            bail!("card_attempts must be at least 1");
        }
        Ok(())
    }
}
