//! Outbound data channels.
//!
//! Exactly one transport is alive at a time.  The controller owns it as a
//! [`Transport`] and swaps it when the channel changes: the old one is torn
//! down completely before the new one is built.
//!
//! Transports hold only their own state (backoff, frame assembly, pending
//! command); the radios themselves are reached through the
//! [`WifiPort`] / [`BlePort`] passed in at each call.

pub mod ble;
pub mod ble_link;
pub mod wifi;

use core::fmt;

use crate::app::commands::PeerCommand;
use crate::app::ports::{BlePort, WifiPort};
use crate::app::runtime_config::WifiCredentials;
use crate::config::SystemConfig;
use crate::error::Error;

pub use ble::BleTransport;
pub use wifi::WifiTransport;

/// Which radio carries readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Wifi,
    Ble,
}

impl Channel {
    pub fn toggled(self) -> Self {
        match self {
            Self::Wifi => Self::Ble,
            Self::Ble => Self::Wifi,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wifi => write!(f, "WIFI"),
            Self::Ble => write!(f, "BLE"),
        }
    }
}

/// Why a send did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Station not associated; no I/O was attempted.
    Disconnected,
    /// The HTTP client could not be created.
    ClientMissing,
    /// Socket-level failure with the driver's detail.
    Io(heapless::String<64>),
    /// The server answered with a non-2xx status.
    HttpStatus(u16),
    /// BLE is up but nobody is connected.
    NoPeers,
    /// The BLE stack failed to start.
    NotReady,
    /// The reading could not be encoded.
    Serialize,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "wifi-disconnected"),
            Self::ClientMissing => write!(f, "client-missing"),
            Self::Io(detail) => write!(f, "{detail}"),
            Self::HttpStatus(code) => write!(f, "http status {code}"),
            Self::NoPeers => write!(f, "no-peers"),
            Self::NotReady => write!(f, "ble-not-ready"),
            Self::Serialize => write!(f, "serialize"),
        }
    }
}

impl From<&TransportError> for Error {
    fn from(e: &TransportError) -> Self {
        match e {
            TransportError::Disconnected => Self::TransportDisconnected,
            _ => Self::TransportSend,
        }
    }
}

/// The single live transport.
pub enum Transport {
    Wifi(WifiTransport),
    Ble(BleTransport),
}

impl Transport {
    /// Build the transport for `channel`.  For WiFi this powers the radio
    /// up; for BLE it powers WiFi down and starts the GATT service.
    pub fn open(
        channel: Channel,
        credentials: &WifiCredentials,
        config: &SystemConfig,
        wifi: &mut impl WifiPort,
        ble: &mut impl BlePort,
    ) -> Self {
        match channel {
            Channel::Wifi => {
                wifi.set_radio_enabled(true);
                Self::Wifi(WifiTransport::new(credentials, config))
            }
            Channel::Ble => {
                wifi.set_radio_enabled(false);
                Self::Ble(BleTransport::start(config, ble))
            }
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            Self::Wifi(_) => Channel::Wifi,
            Self::Ble(_) => Channel::Ble,
        }
    }

    /// Non-blocking link maintenance.  WiFi: one association attempt if the
    /// backoff allows.  BLE: pending advertising restart plus RX draining,
    /// cheap enough to run every tick.  Returns whether the link is usable.
    pub fn connect_step(
        &mut self,
        now_ms: u32,
        wifi: &mut impl WifiPort,
        ble: &mut impl BlePort,
    ) -> bool {
        match self {
            Self::Wifi(t) => t.connect_step(now_ms, wifi),
            Self::Ble(t) => {
                t.poll(ble);
                t.is_ready()
            }
        }
    }

    /// Most recent peer command gathered by
    /// [`connect_step`](Self::connect_step).  WiFi never has one.
    pub fn drain_commands(&mut self) -> Option<PeerCommand> {
        match self {
            Self::Wifi(_) => None,
            Self::Ble(t) => t.pop_last_command(),
        }
    }

    /// Release whatever this transport holds.  The instance is dead
    /// afterwards and must be replaced.
    pub fn teardown(&mut self, ble: &mut impl BlePort) {
        match self {
            Self::Wifi(_) => {}
            Self::Ble(t) => t.teardown(ble),
        }
    }
}
