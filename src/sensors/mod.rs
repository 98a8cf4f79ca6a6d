//! Sensor subsystem — individual drivers and the aggregating [`SensorHub`].
//!
//! The hub owns the I2C bus (through the BMP280 driver) and the light ADC
//! channel, and produces one immutable [`SensorReading`] per call to
//! [`SensorHub::collect`].  Faults never escape: a missing or failing part
//! shows up as `null` values plus a status tag in the reading.

pub mod bmp280;
pub mod light;

use serde::{Serialize, Serializer};

use crate::adapters::device_id::DeviceIdString;
use crate::config::SystemConfig;
use crate::error::SensorError;
use bmp280::Bmp280;
use light::{LightAdc, LightFilter};

pub use light::LightReading;

// ───────────────────────────────────────────────────────────────
// Reading model (wire shape of uploads and BLE notifications)
// ───────────────────────────────────────────────────────────────

/// Health of the BMP280 path for one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bmp280Status {
    Ok,
    Unavailable,
    Error(SensorError),
}

impl Bmp280Status {
    /// Status string as published: `ok`, `unavailable` or `error: <detail>`.
    pub fn as_tag(&self) -> heapless::String<48> {
        use core::fmt::Write;
        let mut s = heapless::String::new();
        match self {
            Self::Ok => {
                let _ = s.push_str("ok");
            }
            Self::Unavailable => {
                let _ = s.push_str("unavailable");
            }
            Self::Error(e) => {
                let _ = write!(s, "error: {}", e);
            }
        }
        s
    }
}

impl Serialize for Bmp280Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag().as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bmp280Reading {
    /// °C
    pub temp: Option<f32>,
    /// hPa
    pub pressure: Option<f32>,
    pub status: Bmp280Status,
}

impl Bmp280Reading {
    pub fn unavailable() -> Self {
        Self {
            temp: None,
            pressure: None,
            status: Bmp280Status::Unavailable,
        }
    }

    pub fn failed(e: SensorError) -> Self {
        Self {
            temp: None,
            pressure: None,
            status: Bmp280Status::Error(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Environment {
    pub bmp280: Bmp280Reading,
    pub light: LightReading,
}

/// One snapshot of every sensor, as uploaded over HTTP or notified over BLE.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub device_id: DeviceIdString,
    /// Wall-clock seconds (epoch once SNTP has synced, seconds since boot before).
    pub timestamp: u64,
    pub environment: Environment,
}

impl SensorReading {
    pub fn temperature_c(&self) -> Option<f32> {
        self.environment.bmp280.temp
    }
}

// ───────────────────────────────────────────────────────────────
// SensorHub
// ───────────────────────────────────────────────────────────────

/// Aggregates the sensor drivers and produces a unified reading.
pub struct SensorHub<I2C, ADC> {
    device_id: DeviceIdString,
    bmp280: Option<Bmp280<I2C>>,
    light_adc: Option<ADC>,
    light: LightFilter,
}

impl<I2C, ADC> SensorHub<I2C, ADC>
where
    I2C: embedded_hal::i2c::I2c,
    ADC: LightAdc,
{
    /// Construct a hub from already-probed parts.  Pass `None` for a part
    /// that is absent or disabled; it is then reported as such every call.
    pub fn new(
        device_id: DeviceIdString,
        bmp280: Option<Bmp280<I2C>>,
        light_adc: Option<ADC>,
        config: &SystemConfig,
    ) -> Self {
        Self {
            device_id,
            bmp280,
            light_adc,
            light: LightFilter::new(config.adc_samples, config.adc_sample_interval_ms),
        }
    }

    /// Bring-up helper: probe the BMP280 on `i2c` and build the hub.
    pub fn bring_up(
        device_id: DeviceIdString,
        i2c: I2C,
        light_adc: Option<ADC>,
        config: &SystemConfig,
    ) -> Self {
        let bmp280 = match Bmp280::probe(i2c) {
            Ok(dev) => Some(dev),
            Err(e) => {
                log::warn!("SensorHub: BMP280 disabled ({})", e);
                None
            }
        };
        Self::new(device_id, bmp280, light_adc, config)
    }

    /// Take one snapshot.  Never blocks longer than one bus transaction
    /// plus at most one ADC conversion.
    pub fn collect(&mut self, now_ms: u32, unix_secs: u64) -> SensorReading {
        let bmp280 = match self.bmp280.as_mut() {
            None => Bmp280Reading::unavailable(),
            Some(dev) => match dev.read() {
                Ok(m) => Bmp280Reading {
                    temp: Some(m.temperature_c()),
                    pressure: Some(m.pressure_hpa()),
                    status: Bmp280Status::Ok,
                },
                Err(e) => Bmp280Reading::failed(e),
            },
        };

        let light = match self.light_adc.as_mut() {
            Some(adc) => self.light.poll(now_ms, adc),
            None => LightReading::default(),
        };

        SensorReading {
            device_id: self.device_id.clone(),
            timestamp: unix_secs,
            environment: Environment { bmp280, light },
        }
    }

    pub fn has_bmp280(&self) -> bool {
        self.bmp280.is_some()
    }
}
