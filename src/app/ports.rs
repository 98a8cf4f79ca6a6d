//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (sensors, radios, event sinks, storage) implement these
//! traits.  The [`AppService`](super::service::AppService) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! ## Context rules
//!
//! - Every method here is called from the main loop only.
//! - Radio callbacks never see a port; they write into
//!   [`BleLink`](crate::transport::ble_link::BleLink), which the loop drains.

use crate::sensors::SensorReading;
use crate::transport::ble_link::BleLink;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain sensor data.
pub trait SensorPort {
    /// Take one snapshot of every sensor.  Never fails; faults show up as
    /// `null` values and status tags inside the reading.
    fn collect(&mut self, now_ms: u32, unix_secs: u64) -> SensorReading;

    /// Reset the task watchdog.  A board without one treats this as a no-op.
    fn feed_watchdog(&mut self);
}

/// Level of the channel-select key (active-low, pulled up).
pub trait ButtonPort {
    fn mode_key_high(&mut self) -> bool;
}

/// Heap statistics for periodic memory logging and housekeeping.
pub trait DiagnosticsPort {
    fn heap_free(&self) -> u32;
    fn heap_min_free(&self) -> u32;

    /// Walk the allocator's block headers.  `false` means corruption.
    fn heap_intact(&mut self) -> bool {
        true
    }
}

// ───────────────────────────────────────────────────────────────
// Radio ports
// ───────────────────────────────────────────────────────────────

/// Station-mode WiFi plus a one-shot HTTP client.
pub trait WifiPort {
    /// Power the WiFi radio up or down.
    fn set_radio_enabled(&mut self, enabled: bool);

    /// `true` once the station is associated and has an IP.
    fn is_associated(&self) -> bool;

    /// Fire-and-forget association request.  Must return immediately.
    fn begin_association(&mut self, ssid: &str, password: &str) -> Result<(), RadioError>;

    /// One blocking `POST` with `Content-Type: application/json`.
    /// Returns the HTTP status code; status interpretation is the caller's.
    fn post_json(&mut self, url: &str, body: &[u8]) -> Result<u16, HttpError>;
}

/// Peripheral-role BLE stack exposing the UART-style GATT service.
pub trait BlePort {
    /// Register the service and start advertising `adv_data`.
    fn start(&mut self, name: &str, adv_interval_ms: u16, adv_data: &[u8])
        -> Result<(), RadioError>;

    /// Re-enter advertising after a peer dropped.
    fn restart_advertising(&mut self) -> Result<(), RadioError>;

    /// Notify one connected peer on the TX characteristic.
    fn notify(&mut self, conn_handle: u16, data: &[u8]) -> Result<(), RadioError>;

    /// Stop advertising, drop peers and power the BLE controller down.
    fn shutdown(&mut self);

    /// Callback-side state shared with the radio task.
    fn link(&self) -> &BleLink;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Raw byte store behind the persisted runtime configuration.
///
/// JSON encoding and default-merging live in
/// [`runtime_config`](super::runtime_config); the port only moves bytes.
/// Implementations MUST make `write_raw` atomic: a reader never sees a
/// half-written document.
pub trait ConfigPort {
    /// `Ok(None)` when nothing has been stored yet.
    fn read_raw(&self) -> Result<Option<Vec<u8>>, ConfigError>;

    fn write_raw(&mut self, data: &[u8]) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Generic I/O error from the storage backend.
    IoError,
    /// The in-memory value could not be encoded.
    Encode,
}

/// Errors from radio bring-up and control calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// The controller or stack refused to start.
    Unavailable,
    /// The driver returned an error code.
    Driver(i32),
    /// The referenced peer is gone.
    NotConnected,
    /// The payload does not fit one notification at the peer's MTU.
    PayloadTooLarge(usize),
}

/// Errors from [`WifiPort::post_json`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// The HTTP client could not be created.
    ClientMissing,
    /// Connect, write or read failed; carries the driver's description.
    Io(heapless::String<64>),
}

impl HttpError {
    /// Build an [`HttpError::Io`] from any displayable error, truncating
    /// the detail to the inline capacity.
    pub fn io(detail: impl core::fmt::Display) -> Self {
        let mut s = heapless::String::new();
        let _ = core::fmt::write(&mut TruncatingWriter(&mut s), format_args!("{detail}"));
        Self::Io(s)
    }
}

struct TruncatingWriter<'a, const N: usize>(&'a mut heapless::String<N>);

impl<const N: usize> core::fmt::Write for TruncatingWriter<'_, N> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::IoError => write!(f, "I/O error"),
            Self::Encode => write!(f, "config encode failed"),
        }
    }
}

impl core::fmt::Display for RadioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "radio unavailable"),
            Self::Driver(code) => write!(f, "driver error {code}"),
            Self::NotConnected => write!(f, "peer not connected"),
            Self::PayloadTooLarge(len) => write!(f, "{len} byte payload exceeds MTU"),
        }
    }
}

impl core::fmt::Display for HttpError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ClientMissing => write!(f, "client-missing"),
            Self::Io(detail) => write!(f, "{detail}"),
        }
    }
}
