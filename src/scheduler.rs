//! Cooperative timing primitives for the main loop.
//!
//! The firmware has one thread of control.  Every periodic job (send cycle,
//! WiFi retry, memory log, heap housekeeping, ADC sampling) is expressed as
//! an [`Interval`] polled from [`AppService::tick`](crate::app::service::AppService::tick).
//!
//! ```text
//!  now_ms (u32, wraps every ~49.7 days)
//!     │
//!     ├──▶ send        ──▶ RetryQueue / HTTP upload or BLE notify
//!     ├──▶ connect     ──▶ WifiTransport::connect_step
//!     ├──▶ mem_log     ──▶ AppEvent::MemoryReport
//!     └──▶ housekeeping──▶ heap watermark check
//! ```
//!
//! All comparisons go through [`ticks_diff`], so a counter wrap never
//! stalls a timer or fires it early.

// ═══════════════════════════════════════════════════════════════
//  Wraparound-safe arithmetic
// ═══════════════════════════════════════════════════════════════

/// Signed distance `a - b` on a wrapping 32-bit millisecond counter.
///
/// Valid while the true distance is within ±2^31 ms (~24.8 days).
pub const fn ticks_diff(a: u32, b: u32) -> i32 {
    a.wrapping_sub(b) as i32
}

/// `true` once `now` has reached or passed `deadline`.
pub const fn deadline_reached(now: u32, deadline: u32) -> bool {
    ticks_diff(now, deadline) >= 0
}

// ═══════════════════════════════════════════════════════════════
//  Interval timer
// ═══════════════════════════════════════════════════════════════

/// A periodic timer anchored to the last time it fired.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    period_ms: u32,
    last_ms: u32,
}

impl Interval {
    /// Start counting from `now_ms`; the first fire is one period later.
    pub const fn new(period_ms: u32, now_ms: u32) -> Self {
        Self {
            period_ms,
            last_ms: now_ms,
        }
    }

    /// Returns `true` (and re-anchors at `now_ms`) if a full period elapsed.
    pub fn poll(&mut self, now_ms: u32) -> bool {
        if ticks_diff(now_ms, self.last_ms) >= self.period_ms as i32 {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }

    /// Re-anchor without firing (e.g. after an out-of-band attempt).
    pub fn reset(&mut self, now_ms: u32) {
        self.last_ms = now_ms;
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }
}

// ═══════════════════════════════════════════════════════════════
//  Loop schedule
// ═══════════════════════════════════════════════════════════════

/// Which periodic jobs are due on this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DueJobs {
    pub send: bool,
    pub connect: bool,
    pub mem_log: bool,
    pub housekeeping: bool,
}

/// The set of interval timers driven by the controller.
#[derive(Debug, Clone)]
pub struct LoopSchedule {
    send: Interval,
    connect: Interval,
    mem_log: Interval,
    housekeeping: Interval,
}

impl LoopSchedule {
    pub fn new(config: &crate::config::SystemConfig, now_ms: u32) -> Self {
        Self {
            send: Interval::new(config.effective_send_interval_ms(), now_ms),
            connect: Interval::new(config.connect_retry_ms, now_ms),
            mem_log: Interval::new(config.mem_log_interval_ms, now_ms),
            housekeeping: Interval::new(config.housekeeping_interval_ms, now_ms),
        }
    }

    /// Poll every timer once.  `connect` is only evaluated when `wifi_active`,
    /// so the retry clock does not build up a backlog while in BLE mode.
    pub fn poll(&mut self, now_ms: u32, wifi_active: bool) -> DueJobs {
        DueJobs {
            send: self.send.poll(now_ms),
            connect: wifi_active && self.connect.poll(now_ms),
            mem_log: self.mem_log.poll(now_ms),
            housekeeping: self.housekeeping.poll(now_ms),
        }
    }

    /// Restart the retry clock after a transport was (re)built.
    pub fn connect_attempted(&mut self, now_ms: u32) {
        self.connect.reset(now_ms);
    }
}
