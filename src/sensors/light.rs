//! Photoresistor light sensor on ADC1 with a non-blocking trimmed mean.
//!
//! Every call to [`LightFilter::poll`] takes at most one ADC sample, and only
//! once `sample_interval_ms` has elapsed since the previous one.  When the
//! window is full the samples are sorted, the two lowest and two highest are
//! dropped (windows of more than four samples), the rest are averaged with
//! integer floor division, and the window restarts empty.  Between windows
//! the last computed value is returned unchanged.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: [`LightAdc`] is implemented over the ADC1 oneshot handle
//! initialised by `hw_init`.  On host/test: any scripted `LightAdc`.

use serde::Serialize;

use crate::error::SensorError;
use crate::scheduler::deadline_reached;

/// Upper bound on the configurable window length.
pub const MAX_WINDOW: usize = 32;

/// Full-scale count of the 12-bit ADC.
pub const ADC_FULL_SCALE: u16 = 4095;
/// Reference voltage at 11 dB attenuation, as used by the conversion.
pub const ADC_VREF: f32 = 3.3;

/// Source of raw 12-bit light samples.
pub trait LightAdc {
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

/// Filtered light value.  All fields are `null` until the first window
/// completes or when no light channel is fitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LightReading {
    pub raw: Option<u16>,
    pub voltage: Option<f32>,
    pub percent: Option<u8>,
}

impl LightReading {
    /// Convert a filtered raw count to the published triple.
    pub fn from_raw(raw: u16) -> Self {
        let raw = raw.min(ADC_FULL_SCALE);
        let volts = raw as f32 * ADC_VREF / ADC_FULL_SCALE as f32;
        Self {
            raw: Some(raw),
            voltage: Some((volts * 100.0).round() / 100.0),
            percent: Some((raw as u32 * 100 / ADC_FULL_SCALE as u32) as u8),
        }
    }
}

/// Sort `samples` in place and return the outlier-trimmed integer mean.
///
/// Windows longer than four samples lose their two lowest and two highest
/// values; shorter windows are averaged as-is.  Empty input yields 0.
pub fn trimmed_mean(samples: &mut [u16]) -> u16 {
    if samples.is_empty() {
        return 0;
    }
    samples.sort_unstable();
    let kept = if samples.len() > 4 {
        &samples[2..samples.len() - 2]
    } else {
        &samples[..]
    };
    let sum: u32 = kept.iter().map(|&s| s as u32).sum();
    (sum / kept.len() as u32) as u16
}

pub struct LightFilter {
    window: heapless::Vec<u16, MAX_WINDOW>,
    window_len: usize,
    sample_interval_ms: u32,
    next_sample_ms: Option<u32>,
    cached: LightReading,
}

impl LightFilter {
    /// `window_len` is clamped to `1..=MAX_WINDOW`.
    pub fn new(window_len: usize, sample_interval_ms: u32) -> Self {
        Self {
            window: heapless::Vec::new(),
            window_len: window_len.clamp(1, MAX_WINDOW),
            sample_interval_ms,
            next_sample_ms: None,
            cached: LightReading::default(),
        }
    }

    /// Advance the filter and return the current (possibly cached) value.
    pub fn poll(&mut self, now_ms: u32, adc: &mut impl LightAdc) -> LightReading {
        let due = self
            .next_sample_ms
            .is_none_or(|deadline| deadline_reached(now_ms, deadline));
        if due {
            // A failed conversion is simply not counted.
            if let Ok(raw) = adc.read_raw() {
                let _ = self.window.push(raw);
            }
            self.next_sample_ms = Some(now_ms.wrapping_add(self.sample_interval_ms));
        }

        if self.window.len() >= self.window_len {
            let avg = trimmed_mean(&mut self.window);
            self.window.clear();
            self.cached = LightReading::from_raw(avg);
        }

        self.cached
    }

    /// Samples collected towards the current window.
    pub fn pending_samples(&self) -> usize {
        self.window.len()
    }
}
