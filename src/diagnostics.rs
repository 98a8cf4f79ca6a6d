//! Heap diagnostics and the panic hook.
//!
//! The control loop reports free / minimum-ever free heap every
//! `mem_log_interval_ms` and runs a housekeeping pass every
//! `housekeeping_interval_ms`: heap integrity walk plus a low-watermark
//! check.  Readings and queue entries are fixed-capacity, so a falling
//! watermark points at the ESP-IDF side (sockets, BLE buffers).

/// Free heap below this is flagged by housekeeping.
pub const HEAP_LOW_WATERMARK: u32 = 32 * 1024;

/// Point-in-time heap numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub free: u32,
    pub min_free: u32,
}

impl HeapStats {
    #[cfg(target_os = "espidf")]
    pub fn read() -> Self {
        // SAFETY: read-only allocator statistics.
        unsafe {
            Self {
                free: esp_idf_svc::sys::esp_get_free_heap_size(),
                min_free: esp_idf_svc::sys::esp_get_minimum_free_heap_size(),
            }
        }
    }

    /// Simulation: a fixed, plausible ESP32 heap.
    #[cfg(not(target_os = "espidf"))]
    pub fn read() -> Self {
        Self {
            free: 180_000,
            min_free: 150_000,
        }
    }

    pub fn is_low(&self) -> bool {
        self.free < HEAP_LOW_WATERMARK
    }
}

/// Walk every heap region and verify block headers.  Logs and returns
/// `false` on corruption.
#[cfg(target_os = "espidf")]
pub fn heap_integrity_ok() -> bool {
    // SAFETY: the checker only reads allocator metadata.
    let ok = unsafe { esp_idf_svc::sys::heap_caps_check_integrity_all(true) };
    if !ok {
        log::error!("Heap integrity check failed");
    }
    ok
}

#[cfg(not(target_os = "espidf"))]
pub fn heap_integrity_ok() -> bool {
    true
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Install a panic hook that logs the reason and location before the
/// default ESP-IDF handler prints the backtrace and resets.
///
/// Must be called once during init, after the logger.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };

        match info.location() {
            Some(loc) => log::error!("PANIC: {} at {}:{}", reason, loc.file(), loc.line()),
            None => log::error!("PANIC: {}", reason),
        }

        #[cfg(target_os = "espidf")]
        {
            let stats = HeapStats::read();
            log::error!(
                "PANIC: heap free={} min={} uptime={}s",
                stats.free,
                stats.min_free,
                crate::adapters::time::Esp32TimeAdapter::new().uptime_secs()
            );
        }
    }));
}
