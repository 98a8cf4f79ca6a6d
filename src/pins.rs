//! GPIO / peripheral pin assignments for the Lab Sentinel board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// I2C bus (BMP280)
// ---------------------------------------------------------------------------

/// I2C controller index.
pub const I2C_PORT: i32 = 0;
/// I2C data line.
pub const I2C_SDA_GPIO: i32 = 21;
/// I2C clock line.
pub const I2C_SCL_GPIO: i32 = 22;
/// Bus clock in Hz.
pub const I2C_FREQ_HZ: u32 = 400_000;

// ---------------------------------------------------------------------------
// Analog (ADC1 only, ADC2 is unusable while WiFi is up)
// ---------------------------------------------------------------------------

/// Photoresistor divider output.
pub const LIGHT_ADC_GPIO: i32 = 34;
/// ADC1 channel wired to GPIO 34 on the ESP32.
pub const LIGHT_ADC1_CHANNEL: u32 = 6;

// ---------------------------------------------------------------------------
// User input
// ---------------------------------------------------------------------------

/// KEY1: active-low momentary switch, internal pull-up.  Toggles WiFi/BLE.
pub const MODE_KEY_GPIO: i32 = 14;
