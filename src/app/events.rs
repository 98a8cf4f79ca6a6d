//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them; on the device they become
//! prefix-tagged serial log lines.

use super::alerts::TempBand;
use crate::error::Error;
use crate::transport::{Channel, TransportError};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started on the given channel.
    Started(Channel),

    /// The active channel changed (button or peer command).
    ChannelSwitched { from: Channel, to: Channel },

    /// A reading was accepted by the server.
    UploadOk { status: u16, from_queue: bool },

    /// An upload attempt failed.
    UploadFailed(TransportError),

    /// A failed reading was parked; carries the new queue depth.
    Enqueued(usize),

    /// A reading was notified to this many BLE peers.
    Notified(usize),

    /// BLE mode with no peer or no stack: the reading is only logged.
    BleSummary(Summary),

    /// A peer command changed and persisted the runtime config.
    CommandApplied(&'static str),

    /// A peer frame was discarded.
    CommandRejected(Error),

    /// The temperature crossed into a different band.
    ThresholdAlert {
        band: TempBand,
        temp_c: f32,
        limit_c: f32,
    },

    /// Periodic heap report.
    MemoryReport { free: u32, min_free: u32 },

    /// Periodic housekeeping summary.
    Housekeeping(HousekeepingData),

    /// A recoverable fault on some boundary.
    Fault(Error),
}

/// The one-line fallback printed in BLE mode without a peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub temp_c: Option<f32>,
    pub pressure_hpa: Option<f32>,
    pub light_percent: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HousekeepingData {
    pub heap_free: u32,
    pub heap_min_free: u32,
    /// `true` if the free heap is below the warning watermark.
    pub heap_low: bool,
    pub heap_intact: bool,
    pub queue_depth: usize,
    pub queue_dropped: u32,
    pub ble_rx_overflows: u32,
    pub ble_rejected_connections: u32,
}
