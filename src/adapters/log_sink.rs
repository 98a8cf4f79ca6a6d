//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART in production).  Every line starts with a
//! short tag so the serial stream can be grepped.

use log::{error, info, warn};

use crate::app::alerts::TempBand;
use crate::app::events::{AppEvent, HousekeepingData, Summary};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

struct Opt<T>(Option<T>);

impl<T: core::fmt::Display> core::fmt::Display for Opt<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.0 {
            Some(v) => write!(f, "{v}"),
            None => f.write_str("n/a"),
        }
    }
}

fn log_summary(s: &Summary) {
    info!(
        "BLE   | no peer, T={}\u{00b0}C P={}hPa light={}%",
        Opt(s.temp_c.map(|t| format!("{t:.2}"))),
        Opt(s.pressure_hpa.map(|p| format!("{p:.2}"))),
        Opt(s.light_percent),
    );
}

fn log_housekeeping(h: &HousekeepingData) {
    info!(
        "HOUSE | heap={} min={} queue={} dropped={} rx_overflows={} rejected={}",
        h.heap_free,
        h.heap_min_free,
        h.queue_depth,
        h.queue_dropped,
        h.ble_rx_overflows,
        h.ble_rejected_connections,
    );
    if h.heap_low {
        warn!("HOUSE | free heap below watermark ({} bytes)", h.heap_free);
    }
    if !h.heap_intact {
        error!("HOUSE | heap integrity check failed");
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(channel) => {
                info!("START | channel={}", channel);
            }
            AppEvent::ChannelSwitched { from, to } => {
                info!("CHAN  | {} -> {}", from, to);
            }
            AppEvent::UploadOk { status, from_queue } => {
                info!(
                    "SEND  | ok status={}{}",
                    status,
                    if *from_queue { " (queued)" } else { "" }
                );
            }
            AppEvent::UploadFailed(e) => {
                warn!("SEND  | failed: {}", e);
            }
            AppEvent::Enqueued(depth) => {
                info!("SEND  | queued for retry (depth={})", depth);
            }
            AppEvent::Notified(peers) => {
                info!("BLE   | notified {} peer(s)", peers);
            }
            AppEvent::BleSummary(s) => log_summary(s),
            AppEvent::CommandApplied(what) => {
                info!("CMD   | {} updated and saved", what);
            }
            AppEvent::CommandRejected(e) => {
                warn!("CMD   | discarded: {}", e);
            }
            AppEvent::ThresholdAlert {
                band,
                temp_c,
                limit_c,
            } => match band {
                TempBand::High => warn!("ALERT | temperature {:.2} above {:.2}", temp_c, limit_c),
                TempBand::Low => warn!("ALERT | temperature {:.2} below {:.2}", temp_c, limit_c),
                TempBand::Normal => info!("ALERT | temperature back in range ({:.2})", temp_c),
            },
            AppEvent::MemoryReport { free, min_free } => {
                info!("MEM   | free={} min_free={}", free, min_free);
            }
            AppEvent::Housekeeping(h) => log_housekeeping(h),
            AppEvent::Fault(e) => {
                error!("FAULT | {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_values_render_as_na() {
        assert_eq!(Opt::<u8>(None).to_string(), "n/a");
        assert_eq!(Opt(Some(42u8)).to_string(), "42");
    }
}
