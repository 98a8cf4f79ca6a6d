//! Task Watchdog Timer (TWDT) driver.
//!
//! Subscribes the main task to the ESP-IDF TWDT so the board resets if the
//! control loop stalls for longer than the configured timeout.  The loop
//! calls [`Watchdog::feed`] once per tick, on every path.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub struct Watchdog {
    timeout_ms: u32,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    #[cfg(not(target_os = "espidf"))]
    feeds: u32,
}

impl Watchdog {
    /// Initialise and subscribe the current task.  Failure to subscribe is
    /// logged and leaves a watchdog whose `feed` is a no-op.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: plain FFI calls on the current task; the config struct
            // outlives the call.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    log::info!("Watchdog: subscribed ({} ms timeout, panic on trigger)", timeout_ms);
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self {
                    timeout_ms,
                    subscribed,
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): {} ms, no-op", timeout_ms);
            Self {
                timeout_ms,
                feeds: 0,
            }
        }
    }

    /// Feed the watchdog.  Must be called at least once per timeout window.
    pub fn feed(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: resets the TWDT entry of the calling task.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.feeds = self.feeds.wrapping_add(1);
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Simulation: number of feeds so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn feeds(&self) -> u32 {
        self.feeds
    }
}
