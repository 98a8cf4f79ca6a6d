//! System configuration parameters
//!
//! Compile-time tunables for the Lab Sentinel firmware.  Values that a peer
//! may change at runtime (WiFi credentials, alert thresholds) live in
//! [`RuntimeConfig`](crate::app::runtime_config::RuntimeConfig) instead.

use serde::{Deserialize, Serialize};

/// Capacity of the failed-upload retry queue.
pub const RETRY_QUEUE_MAX: usize = 20;

/// Main loop sleep slice between ticks.
pub const LOOP_SLEEP_MS: u32 = 10;

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Identity / endpoints ---
    /// Upload endpoint for JSON readings.
    pub server_url: heapless::String<96>,
    /// Complete local name put into the BLE advertising payload.
    pub ble_device_name: heapless::String<24>,
    /// BLE advertising interval (milliseconds)
    pub ble_adv_interval_ms: u16,

    // --- Scheduling ---
    /// Period between send cycles (milliseconds, floor 500)
    pub send_interval_ms: u32,
    /// Period between non-blocking WiFi association attempts
    pub connect_retry_ms: u32,
    /// Minimum spacing of "wifi-disconnected" enqueues
    pub enqueue_cooldown_ms: u32,
    /// Mode-button debounce window
    pub key_debounce_ms: u32,
    /// Free-heap log period
    pub mem_log_interval_ms: u32,
    /// Heap housekeeping period
    pub housekeeping_interval_ms: u32,

    // --- WiFi ---
    /// First association backoff (doubles per attempt)
    pub wifi_backoff_initial_ms: u32,
    /// Association backoff cap
    pub wifi_backoff_max_ms: u32,
    /// HTTP POST socket timeout
    pub http_timeout_ms: u32,
    /// Blocking bring-up self-test budget
    pub wifi_selftest_timeout_ms: u32,

    // --- Sensors ---
    /// Samples per light-sensor window
    pub adc_samples: usize,
    /// Spacing of individual ADC samples
    pub adc_sample_interval_ms: u32,
    /// Task watchdog timeout
    pub watchdog_timeout_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut server_url = heapless::String::new();
        let _ = server_url.push_str("http://httpbin.org/post");
        let mut ble_device_name = heapless::String::new();
        let _ = ble_device_name.push_str("SLS_ESP32");

        Self {
            server_url,
            ble_device_name,
            ble_adv_interval_ms: 300,

            // Scheduling
            send_interval_ms: 1000, // 1 s sample period
            connect_retry_ms: 5000,
            enqueue_cooldown_ms: 3000,
            key_debounce_ms: 200,
            mem_log_interval_ms: 10_000,
            housekeeping_interval_ms: 30_000,

            // WiFi
            wifi_backoff_initial_ms: 3000,
            wifi_backoff_max_ms: 20_000,
            http_timeout_ms: 5000,
            wifi_selftest_timeout_ms: 8000,

            // Sensors
            adc_samples: 10,
            adc_sample_interval_ms: 5,
            watchdog_timeout_ms: 10_000,
        }
    }
}

impl SystemConfig {
    /// Send period after applying the 500 ms floor.
    pub fn effective_send_interval_ms(&self) -> u32 {
        self.send_interval_ms.max(500)
    }
}
