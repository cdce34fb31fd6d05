use anyhow::{Context, Result};
use log4rs::config::RawConfig;

use crate::config::setup::DeviceConfiguration;

/// Initializes log4rs from the embedded YAML, stamping the device id into
/// every appender pattern so fleet logs stay attributable.
pub fn setup_logging(device_config: &DeviceConfiguration) -> Result<()> {
    let device_id = device_config.device_uuid.clone();
    let binding =
        include_str!("../../config/log4rs.yaml").replace("{device_id}", device_id.as_str());
    let config: RawConfig =
        serde_yaml::from_str(binding.as_str()).context("Failed to parse the logging config")?;

    log4rs::init_raw_config(config).context("Failed to initialize logging")?;

    Ok(())
}
