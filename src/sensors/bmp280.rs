//! Bosch BMP280 barometric pressure / temperature sensor over I2C.
//!
//! Register-level driver generic over [`embedded_hal::i2c::I2c`], so the
//! same code talks to `esp_idf_hal::i2c::I2cDriver` on the device and to a
//! scripted mock bus on the host.
//!
//! ## Bring-up
//!
//! | Step | Transaction                        | Notes                          |
//! |------|------------------------------------|--------------------------------|
//! | 1    | read `0xD0` at 0x76, then 0x77     | first ACK wins                 |
//! | 2    | burst read 24 B at `0x88`          | `dig_T1..dig_P9`, little-endian|
//! | 3    | write `0xF4 = 0x27`                | osrs_t x1, osrs_p x1, normal   |
//! | 4    | write `0xF5 = 0xA0`                | t_sb 1000 ms, IIR x4           |
//!
//! Each measurement is one 6-byte burst read at `0xF7`.  Compensation uses
//! the vendor's integer formulas (`t_fine` in 32 bits, pressure in 64 bits).

use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::error::{Error, SensorError};

/// Candidate 7-bit addresses (SDO low, SDO high).
pub const ADDRESSES: [u8; 2] = [0x76, 0x77];

const REG_CALIB_START: u8 = 0x88;
const CALIB_LEN: usize = 24;
const REG_CHIP_ID: u8 = 0xD0;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_PRESS_MSB: u8 = 0xF7;

/// osrs_t = x1, osrs_p = x1, mode = normal.
const CTRL_MEAS_VALUE: u8 = 0x27;
/// t_sb = 1000 ms, filter = x4.
const CONFIG_VALUE: u8 = 0xA0;

/// Chip ids seen in the wild for pin-compatible parts (BMP280 samples,
/// BMP280 production, BME280).
const KNOWN_CHIP_IDS: [u8; 4] = [0x56, 0x57, 0x58, 0x60];

// ───────────────────────────────────────────────────────────────
// Calibration
// ───────────────────────────────────────────────────────────────

/// Factory trimming constants, read once per bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
}

impl Calibration {
    /// Decode the `0x88..=0x9F` register block.
    pub fn from_registers(raw: &[u8; CALIB_LEN]) -> Self {
        let u = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]);
        Self {
            dig_t1: u(0),
            dig_t2: s(2),
            dig_t3: s(4),
            dig_p1: u(6),
            dig_p2: s(8),
            dig_p3: s(10),
            dig_p4: s(12),
            dig_p5: s(14),
            dig_p6: s(16),
            dig_p7: s(18),
            dig_p8: s(20),
            dig_p9: s(22),
        }
    }

    /// Temperature compensation.
    ///
    /// Returns `(temperature in 0.01 °C, t_fine)`.  Intermediates are held
    /// in 64 bits so a garbage raw word cannot overflow; for every raw value
    /// the sensor can physically produce the result equals the 32-bit
    /// reference.
    pub fn compensate_temperature(&self, adc_t: i32) -> (i32, i32) {
        let adc_t = adc_t as i64;
        let t1 = self.dig_t1 as i64;
        let t2 = self.dig_t2 as i64;
        let t3 = self.dig_t3 as i64;

        let var1 = (((adc_t >> 3) - (t1 << 1)) * t2) >> 11;
        let d = (adc_t >> 4) - t1;
        let var2 = (((d * d) >> 12) * t3) >> 14;
        let t_fine = (var1 + var2) as i32;
        let centi = (t_fine * 5 + 128) >> 8;
        (centi, t_fine)
    }

    /// Pressure compensation.
    ///
    /// Returns pressure in Pa as unsigned Q24.8 (divide by 256 for Pa,
    /// by 25600 for hPa).  Returns 0 when the divisor collapses to zero.
    pub fn compensate_pressure(&self, adc_p: i32, t_fine: i32) -> u32 {
        let p1 = self.dig_p1 as i64;
        let p2 = self.dig_p2 as i64;
        let p3 = self.dig_p3 as i64;
        let p4 = self.dig_p4 as i64;
        let p5 = self.dig_p5 as i64;
        let p6 = self.dig_p6 as i64;
        let p7 = self.dig_p7 as i64;
        let p8 = self.dig_p8 as i64;
        let p9 = self.dig_p9 as i64;

        // Same arithmetic as the C reference, which wraps rather than traps.
        // Only implausible raw words or trimming values get near the edge.
        let mut var1 = t_fine as i64 - 128_000;
        let mut var2 = var1.wrapping_mul(var1).wrapping_mul(p6);
        var2 = var2.wrapping_add(var1.wrapping_mul(p5) << 17);
        var2 = var2.wrapping_add(p4 << 35);
        var1 = (var1.wrapping_mul(var1).wrapping_mul(p3) >> 8)
            .wrapping_add(var1.wrapping_mul(p2) << 12);
        var1 = ((1i64 << 47).wrapping_add(var1)).wrapping_mul(p1) >> 33;
        if var1 == 0 {
            return 0;
        }

        let mut p = 1_048_576 - adc_p as i64;
        p = (p << 31).wrapping_sub(var2).wrapping_mul(3125).wrapping_div(var1);
        var1 = p9.wrapping_mul(p >> 13).wrapping_mul(p >> 13) >> 25;
        var2 = p8.wrapping_mul(p) >> 19;
        p = (p.wrapping_add(var1).wrapping_add(var2) >> 8).wrapping_add(p7 << 4);
        p as u32
    }
}

// ───────────────────────────────────────────────────────────────
// Measurement
// ───────────────────────────────────────────────────────────────

/// One compensated sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Temperature in 0.01 °C.
    pub centi_celsius: i32,
    /// Pressure in Pa, Q24.8.
    pub pressure_q24_8: u32,
}

impl Measurement {
    pub fn temperature_c(&self) -> f32 {
        self.centi_celsius as f32 / 100.0
    }

    pub fn pressure_hpa(&self) -> f32 {
        (self.pressure_q24_8 as f64 / 25_600.0) as f32
    }
}

/// Split the `0xF7..=0xFC` burst into 20-bit `(adc_p, adc_t)`.
pub fn decode_raw(data: &[u8; 6]) -> (i32, i32) {
    let adc_p = ((data[0] as i32) << 12) | ((data[1] as i32) << 4) | ((data[2] as i32) >> 4);
    let adc_t = ((data[3] as i32) << 12) | ((data[4] as i32) << 4) | ((data[5] as i32) >> 4);
    (adc_p, adc_t)
}

// ───────────────────────────────────────────────────────────────
// Driver
// ───────────────────────────────────────────────────────────────

pub struct Bmp280<I2C> {
    i2c: I2C,
    address: u8,
    calibration: Calibration,
}

impl<I2C: I2c> Bmp280<I2C> {
    /// Probe both addresses, load calibration and start normal mode.
    ///
    /// [`Error::SensorUnavailable`] if nothing ACKs; [`Error::SensorRead`]
    /// if the device answered but a later bring-up transaction failed.
    pub fn probe(mut i2c: I2C) -> crate::error::Result<Self> {
        let mut found = None;
        for addr in ADDRESSES {
            let mut id = [0u8; 1];
            if i2c.write_read(addr, &[REG_CHIP_ID], &mut id).is_ok() {
                found = Some((addr, id[0]));
                break;
            }
        }
        let Some((address, chip_id)) = found else {
            warn!("BMP280: no device at 0x76/0x77");
            return Err(Error::SensorUnavailable);
        };
        if !KNOWN_CHIP_IDS.contains(&chip_id) {
            warn!("BMP280: unexpected chip id 0x{:02X} at 0x{:02X}", chip_id, address);
        }

        let mut raw = [0u8; CALIB_LEN];
        i2c.write_read(address, &[REG_CALIB_START], &mut raw)
            .map_err(|e| Error::from(SensorError::from_i2c(&e)))?;
        let calibration = Calibration::from_registers(&raw);

        i2c.write(address, &[REG_CTRL_MEAS, CTRL_MEAS_VALUE])
            .map_err(|e| Error::from(SensorError::from_i2c(&e)))?;
        i2c.write(address, &[REG_CONFIG, CONFIG_VALUE])
            .map_err(|e| Error::from(SensorError::from_i2c(&e)))?;

        info!("BMP280: ready at 0x{:02X} (chip id 0x{:02X})", address, chip_id);
        Ok(Self {
            i2c,
            address,
            calibration,
        })
    }

    /// One burst read plus compensation.
    pub fn read(&mut self) -> Result<Measurement, SensorError> {
        let mut data = [0u8; 6];
        self.i2c
            .write_read(self.address, &[REG_PRESS_MSB], &mut data)
            .map_err(|e| SensorError::from_i2c(&e))?;
        let (adc_p, adc_t) = decode_raw(&data);
        let (centi_celsius, t_fine) = self.calibration.compensate_temperature(adc_t);
        let pressure_q24_8 = self.calibration.compensate_pressure(adc_p, t_fine);
        Ok(Measurement {
            centi_celsius,
            pressure_q24_8,
        })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }
}
