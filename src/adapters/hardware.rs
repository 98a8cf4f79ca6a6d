//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and the task [`Watchdog`], and exposes them
//! through [`SensorPort`], [`ButtonPort`] and [`DiagnosticsPort`].  On
//! non-espidf targets the underlying drivers use cfg-gated simulation
//! stubs.

use crate::app::ports::{ButtonPort, DiagnosticsPort, SensorPort};
use crate::diagnostics::{self, HeapStats};
use crate::drivers::hw_init;
use crate::drivers::watchdog::Watchdog;
use crate::pins;
use crate::sensors::light::LightAdc;
use crate::sensors::{SensorHub, SensorReading};

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<I2C, ADC> {
    sensor_hub: SensorHub<I2C, ADC>,
    watchdog: Watchdog,
}

impl<I2C, ADC> HardwareAdapter<I2C, ADC>
where
    I2C: embedded_hal::i2c::I2c,
    ADC: LightAdc,
{
    pub fn new(sensor_hub: SensorHub<I2C, ADC>, watchdog: Watchdog) -> Self {
        Self {
            sensor_hub,
            watchdog,
        }
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<I2C, ADC> SensorPort for HardwareAdapter<I2C, ADC>
where
    I2C: embedded_hal::i2c::I2c,
    ADC: LightAdc,
{
    fn collect(&mut self, now_ms: u32, unix_secs: u64) -> SensorReading {
        self.sensor_hub.collect(now_ms, unix_secs)
    }

    fn feed_watchdog(&mut self) {
        self.watchdog.feed();
    }
}

// ── ButtonPort implementation ─────────────────────────────────

impl<I2C, ADC> ButtonPort for HardwareAdapter<I2C, ADC> {
    fn mode_key_high(&mut self) -> bool {
        hw_init::gpio_read(pins::MODE_KEY_GPIO)
    }
}

// ── DiagnosticsPort implementation ────────────────────────────

impl<I2C, ADC> DiagnosticsPort for HardwareAdapter<I2C, ADC> {
    fn heap_free(&self) -> u32 {
        HeapStats::read().free
    }

    fn heap_min_free(&self) -> u32 {
        HeapStats::read().min_free
    }

    fn heap_intact(&mut self) -> bool {
        diagnostics::heap_integrity_ok()
    }
}
