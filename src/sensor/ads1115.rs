//! ADS1115 16-bit ADC over Linux i2c-dev.
//!
//! The converter runs in continuous-conversion mode on one single-ended
//! input. After configuration the register pointer is left on the conversion
//! register, so each `sample()` is a plain two-byte read.

use std::fs::File;
use std::path::PathBuf;

use tracing::{debug, info};

use super::SensorChannel;
use crate::config::{AdsGain, SensorConfig, ADS1115_DATA_RATES};
use crate::error::SensorError;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

// Config register fields
const MUX_SINGLE_ENDED_BASE: u16 = 0b100;
const MODE_CONTINUOUS: u16 = 0;
const COMPARATOR_DISABLED: u16 = 0b11;

/// Build the 16-bit config register value for a single-ended continuous read.
pub fn config_word(input: u8, gain: AdsGain, data_rate: u16) -> Result<u16, SensorError> {
    if input > 3 {
        return Err(SensorError::BusInitialization {
            details: format!("ADS1115 has inputs 0..=3, got {}", input),
        });
    }
    let rate_bits = ADS1115_DATA_RATES
        .iter()
        .position(|&rate| rate == data_rate)
        .ok_or_else(|| SensorError::BusInitialization {
            details: format!("unsupported ADS1115 data rate {}", data_rate),
        })? as u16;
    let pga_bits: u16 = match gain {
        AdsGain::TwoThirds => 0b000,
        AdsGain::One => 0b001,
        AdsGain::Two => 0b010,
        AdsGain::Four => 0b011,
        AdsGain::Eight => 0b100,
        AdsGain::Sixteen => 0b101,
    };
    let mux = MUX_SINGLE_ENDED_BASE | u16::from(input);

    Ok((mux << 12)
        | (pga_bits << 9)
        | (MODE_CONTINUOUS << 8)
        | (rate_bits << 5)
        | COMPARATOR_DISABLED)
}

/// Continuous-mode ADS1115 channel.
#[derive(Debug)]
pub struct Ads1115Channel {
    device: File,
    path: PathBuf,
    address: u16,
    full_scale_volts: f64,
}

impl Ads1115Channel {
    /// Open `/dev/i2c-<bus>`, bind the device address and start conversions.
    ///
    /// # Errors
    /// - `DriverUnavailable` if the bus device node is missing or the target is not Linux
    /// - `BusInitialization` if the node cannot be opened, bound or configured
    pub fn open(config: &SensorConfig) -> Result<Self, SensorError> {
        let word = config_word(config.input, config.gain, config.data_rate)?;
        let path = PathBuf::from(format!("/dev/i2c-{}", config.i2c_bus));

        cfg_if::cfg_if! {
            if #[cfg(target_os = "linux")] {
                let device = linux::open_bus(&path, config.address)?;
                let mut channel = Self {
                    device,
                    path,
                    address: config.address,
                    full_scale_volts: config.gain.full_scale_volts(),
                };
                channel.write_config(word)?;
                // Let the first conversion complete before the first read
                std::thread::sleep(std::time::Duration::from_micros(
                    1_000_000 / u64::from(config.data_rate) + 100,
                ));
                info!(
                    "[ADS1115] Opened {} addr={:#04x} input=A{} rate={} SPS config={:#06x}",
                    channel.path.display(),
                    channel.address,
                    config.input,
                    config.data_rate,
                    word
                );
                Ok(channel)
            } else {
                let _ = word;
                Err(SensorError::DriverUnavailable {
                    details: format!(
                        "i2c-dev is only available on Linux; cannot open {}",
                        path.display()
                    ),
                })
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn write_config(&mut self, word: u16) -> Result<(), SensorError> {
        use std::io::Write;

        let [hi, lo] = word.to_be_bytes();
        self.device
            .write_all(&[REG_CONFIG, hi, lo])
            .and_then(|_| self.device.write_all(&[REG_CONVERSION]))
            .map_err(|err| SensorError::BusInitialization {
                details: format!("writing config to {:#04x}: {}", self.address, err),
            })?;
        debug!("[ADS1115] Config register set to {:#06x}", word);
        Ok(())
    }
}

impl SensorChannel for Ads1115Channel {
    fn sample(&mut self) -> Result<f64, SensorError> {
        use std::io::Read;

        let mut buf = [0u8; 2];
        self.device
            .read_exact(&mut buf)
            .map_err(|err| SensorError::ReadFailed {
                details: format!("{} addr={:#04x}: {}", self.path.display(), self.address, err),
            })?;
        Ok(f64::from(i16::from_be_bytes(buf)))
    }

    fn to_volts(&self, raw: f64) -> Option<f64> {
        Some(raw * self.full_scale_volts / 32_768.0)
    }

    fn describe(&self) -> String {
        format!("ADS1115 at {} addr {:#04x}", self.path.display(), self.address)
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::os::unix::io::AsRawFd;
    use std::path::Path;

    use crate::error::SensorError;

    /// linux/i2c-dev.h
    const I2C_SLAVE: libc::c_ulong = 0x0703;

    pub(super) fn open_bus(path: &Path, address: u16) -> Result<File, SensorError> {
        if !path.exists() {
            return Err(SensorError::DriverUnavailable {
                details: format!(
                    "{} not found; enable the I2C interface and load i2c-dev",
                    path.display()
                ),
            });
        }

        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|err| SensorError::BusInitialization {
                details: format!("opening {}: {}", path.display(), err),
            })?;

        // SAFETY: the descriptor is owned by `device` and stays open for the
        // call; I2C_SLAVE takes the address by value.
        let rc = unsafe {
            libc::ioctl(
                device.as_raw_fd(),
                I2C_SLAVE as _,
                libc::c_ulong::from(address),
            )
        };
        if rc < 0 {
            return Err(SensorError::BusInitialization {
                details: format!(
                    "binding address {:#04x} on {}: {}",
                    address,
                    path.display(),
                    io::Error::last_os_error()
                ),
            });
        }

        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_word_defaults() {
        // A0 single-ended, ±4.096 V, continuous, 860 SPS, comparator off
        assert_eq!(config_word(0, AdsGain::One, 860).unwrap(), 0x42E3);
        // 128 SPS
        assert_eq!(config_word(0, AdsGain::One, 128).unwrap(), 0x4283);
    }

    #[test]
    fn test_config_word_input_and_gain() {
        let word = config_word(3, AdsGain::Sixteen, 8).unwrap();
        assert_eq!(word >> 12, 0b111);
        assert_eq!((word >> 9) & 0b111, 0b101);
        assert_eq!((word >> 5) & 0b111, 0);
    }

    #[test]
    fn test_config_word_rejects_bad_input() {
        assert!(matches!(
            config_word(4, AdsGain::One, 860),
            Err(SensorError::BusInitialization { .. })
        ));
        assert!(config_word(0, AdsGain::One, 1000).is_err());
    }

    #[test]
    fn test_missing_bus_is_driver_unavailable() {
        let config = SensorConfig {
            i2c_bus: 250,
            ..SensorConfig::default()
        };
        match Ads1115Channel::open(&config) {
            Err(SensorError::DriverUnavailable { details }) => {
                assert!(details.contains("i2c"));
            }
            other => panic!("Expected DriverUnavailable, got {:?}", other),
        }
    }
}
