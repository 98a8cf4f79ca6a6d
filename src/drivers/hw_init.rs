//! Boot-time setup of the light ADC and the mode key.
//!
//! Configures the ADC1 oneshot unit for the light channel and the mode key
//! input using raw ESP-IDF sys calls.  Called once from `main()` before the
//! control loop starts.  The I2C bus is owned by `esp-idf-hal` and is not
//! touched here.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::error::SensorError;
use crate::sensors::light::LightAdc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "light ADC setup failed ({})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "mode key setup failed ({})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

/// Bring up the ADC and the key input.  An ADC failure is returned so the
/// caller can run without the light channel; GPIO failure is fatal.
#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<bool, HwInitError> {
    // SAFETY: once, from main, before the loop.
    unsafe {
        init_gpio_inputs()?;
        let adc_ok = match init_adc() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("hw_init: {} (light channel disabled)", e);
                false
            }
        };
        info!("hw_init: peripherals configured");
        Ok(adc_ok)
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<bool, HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(true)
}

// ── Light ADC ─────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// # Safety
/// Loop context only, after [`init_peripherals`] returned.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: sole writer, runs before the loop.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    // 12 dB attenuation covers the full 0..3.3 V divider swing.
    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };

    let ret = unsafe {
        adc_oneshot_config_channel(adc1_handle(), pins::LIGHT_ADC1_CHANNEL, &chan_cfg)
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    info!(
        "hw_init: ADC1 configured (CH{}=light on GPIO{})",
        pins::LIGHT_ADC1_CHANNEL,
        pins::LIGHT_ADC_GPIO
    );
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Result<u16, SensorError> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract, single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return Err(SensorError::AdcReadFailed);
    }
    Ok(raw.clamp(0, 4095) as u16)
}

/// Simulation: a mid-scale reading with a little deterministic jitter.
#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(_channel: u32) -> Result<u16, SensorError> {
    use core::sync::atomic::{AtomicU16, Ordering};
    static STEP: AtomicU16 = AtomicU16::new(0);
    let step = STEP.fetch_add(1, Ordering::Relaxed) % 8;
    Ok(2000 + step * 4)
}

/// [`LightAdc`] over the ADC1 oneshot unit configured by
/// [`init_peripherals`].
#[derive(Debug, Clone, Copy)]
pub struct OneshotLightAdc {
    channel: u32,
}

impl OneshotLightAdc {
    pub fn new(channel: u32) -> Self {
        Self { channel }
    }
}

impl LightAdc for OneshotLightAdc {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        adc1_read(self.channel)
    }
}

// ── Mode key ──────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    // Polled from the loop; no edge interrupt.
    let key_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::MODE_KEY_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&key_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    info!("hw_init: KEY1 on GPIO{} (pull-up)", pins::MODE_KEY_GPIO);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: register read of a configured input.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Simulation: inputs idle high (pull-up, key released).
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}
