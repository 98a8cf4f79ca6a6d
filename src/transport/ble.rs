//! BLE UART-style transport (Nordic UART Service layout).
//!
//! ```text
//!  Idle ──start──▶ Advertising ──connect──▶ Connected(n)
//!                      ▲                        │
//!                      └──────disconnect────────┘
//! ```
//!
//! Readings go out as one JSON notification per connected peer on TX.
//! Peer writes on RX are reassembled into frames and parsed into
//! [`PeerCommand`]s; only the latest unconsumed command is kept.

use log::{debug, info, warn};

use super::TransportError;
use crate::app::commands::{FrameAssembler, PeerCommand};
use crate::app::ports::BlePort;
use crate::config::SystemConfig;

/// `6E400001-B5A3-F393-E0A9-E50E24DCCA9E`
pub const NUS_SERVICE_UUID: u128 = 0x6E40_0001_B5A3_F393_E0A9_E50E_24DC_CA9E;
/// Peer → device, write.
pub const NUS_RX_UUID: u128 = 0x6E40_0002_B5A3_F393_E0A9_E50E_24DC_CA9E;
/// Device → peer, notify.
pub const NUS_TX_UUID: u128 = 0x6E40_0003_B5A3_F393_E0A9_E50E_24DC_CA9E;

/// Legacy advertising PDUs carry at most 31 bytes of payload.
pub const ADV_PAYLOAD_MAX: usize = 31;

pub type AdvPayload = heapless::Vec<u8, ADV_PAYLOAD_MAX>;

/// Flags (LE general discoverable, BR/EDR not supported) followed by the
/// complete local name, cut to fit the PDU.
pub fn advertising_payload(name: &str) -> AdvPayload {
    let mut p = AdvPayload::new();
    let _ = p.extend_from_slice(&[0x02, 0x01, 0x06]);
    let room = ADV_PAYLOAD_MAX - p.len() - 2;
    let name = &name.as_bytes()[..name.len().min(room)];
    let _ = p.push(name.len() as u8 + 1);
    let _ = p.push(0x09);
    let _ = p.extend_from_slice(name);
    p
}

pub struct BleTransport {
    ready: bool,
    assembler: FrameAssembler,
    pending: Option<PeerCommand>,
}

impl BleTransport {
    /// Register the service and start advertising.  A stack that fails to
    /// start still yields a transport; it just reports not-ready.
    pub fn start(config: &SystemConfig, port: &mut impl BlePort) -> Self {
        port.link().reset();
        let payload = advertising_payload(&config.ble_device_name);
        let ready = match port.start(&config.ble_device_name, config.ble_adv_interval_ms, &payload)
        {
            Ok(()) => {
                info!(
                    "BLE: advertising '{}' every {} ms",
                    config.ble_device_name, config.ble_adv_interval_ms
                );
                true
            }
            Err(e) => {
                warn!("BLE: stack unavailable ({}), running without peers", e);
                false
            }
        };
        Self {
            ready,
            assembler: FrameAssembler::new(),
            pending: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Main-context housekeeping: restart advertising if a peer dropped and
    /// fold buffered RX chunks into the pending command.  A disconnect
    /// marker in the RX stream discards the frame that peer left open.
    pub fn poll(&mut self, port: &mut impl BlePort) {
        if !self.ready {
            return;
        }
        if port.link().take_readvertise() {
            match port.restart_advertising() {
                Ok(()) => debug!("BLE: advertising restarted"),
                Err(e) => warn!("BLE: advertising restart failed: {}", e),
            }
        }
        while let Some(chunk) = port.link().take_chunk() {
            if chunk.is_empty() {
                if self.assembler.pending_len() > 0 {
                    debug!(
                        "BLE: peer left mid-frame, {} bytes dropped",
                        self.assembler.pending_len()
                    );
                }
                self.assembler.clear();
                continue;
            }
            if let Some(frame) = self.assembler.push(&chunk) {
                if self.pending.is_some() {
                    debug!("BLE: unconsumed command superseded");
                }
                self.pending = Some(PeerCommand::parse(&frame));
            }
        }
    }

    /// Return and clear the pending command.
    pub fn pop_last_command(&mut self) -> Option<PeerCommand> {
        self.pending.take()
    }

    /// Serialise once and notify every connected peer.  Per-peer failures
    /// are ignored; returns how many peers accepted the notification.
    pub fn send_json<T: serde::Serialize>(
        &mut self,
        payload: &T,
        port: &mut impl BlePort,
    ) -> Result<usize, TransportError> {
        if !self.ready {
            return Err(TransportError::NotReady);
        }
        let peers = port.link().connections();
        if peers.is_empty() {
            return Err(TransportError::NoPeers);
        }
        let body = serde_json::to_vec(payload).map_err(|_| TransportError::Serialize)?;
        let delivered = peers
            .iter()
            .filter(|&&h| port.notify(h, &body).is_ok())
            .count();
        Ok(delivered)
    }

    /// Stop advertising, drop peers and shut the stack down.
    pub fn teardown(&mut self, port: &mut impl BlePort) {
        if self.ready {
            port.shutdown();
        }
        self.ready = false;
        self.pending = None;
        self.assembler.clear();
        port.link().reset();
        info!("BLE: transport closed");
    }
}
