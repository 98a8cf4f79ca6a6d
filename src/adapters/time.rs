//! ESP32 time adapter.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for the monotonic
//!   clock and `gettimeofday` for wall time.
//! - **`not(target_os = "espidf")`**: `std::time` for host-side simulation.

/// Time source for the control loop.
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Seconds since boot.
    pub fn uptime_secs(&self) -> u64 {
        self.uptime_us() / 1_000_000
    }

    /// Milliseconds since boot, wrapping at `u32::MAX` (about 49.7 days).
    /// Compare with [`ticks_diff`](crate::scheduler::ticks_diff).
    pub fn uptime_ms(&self) -> u32 {
        (self.uptime_us() / 1_000) as u32
    }

    /// Wall-clock seconds since the Unix epoch.  Without SNTP this counts
    /// from boot, which is what the reading timestamp then carries.
    #[cfg(target_os = "espidf")]
    pub fn unix_secs(&self) -> u64 {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return self.uptime_secs();
        }
        tv.tv_sec.max(0) as u64
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn unix_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    }
}
