//! Callback-side BLE state.
//!
//! Bluedroid invokes GATT callbacks on its own task.  Everything they touch
//! lives here: connection slots as atomics, RX chunks in a lock-free MPMC
//! queue, and a re-advertise flag.  No locks, no allocation, no blocking.
//! The main loop drains it through [`BleTransport`](super::ble::BleTransport).

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use heapless::mpmc::MpMcQueue;

/// Concurrent links the controller is configured for.
pub const MAX_CONNECTIONS: usize = 4;
/// Longest single RX write kept; peers send at most 20 bytes per write.
pub const RX_CHUNK_CAPACITY: usize = 128;
/// RX chunks buffered between two loop ticks.  Power of two.
pub const RX_QUEUE_DEPTH: usize = 8;

pub type RxChunk = heapless::Vec<u8, RX_CHUNK_CAPACITY>;
pub type Connections = heapless::Vec<u16, MAX_CONNECTIONS>;

const EMPTY: u32 = u32::MAX;

pub struct BleLink {
    slots: [AtomicU32; MAX_CONNECTIONS],
    rx: MpMcQueue<RxChunk, RX_QUEUE_DEPTH>,
    readvertise: AtomicBool,
    rx_overflows: AtomicU32,
    rejected_connections: AtomicU32,
}

impl Default for BleLink {
    fn default() -> Self {
        Self::new()
    }
}

impl BleLink {
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicU32::new(EMPTY) }; MAX_CONNECTIONS],
            rx: MpMcQueue::new(),
            readvertise: AtomicBool::new(false),
            rx_overflows: AtomicU32::new(0),
            rejected_connections: AtomicU32::new(0),
        }
    }

    // ── Callback side ─────────────────────────────────────────

    /// Record a new peer.  Returns `false` if every slot is taken.
    pub fn on_connect(&self, conn_handle: u16) -> bool {
        let h = u32::from(conn_handle);
        for slot in &self.slots {
            if slot
                .compare_exchange(EMPTY, h, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
        false
    }

    /// Forget a peer and request an advertising restart.  An empty chunk
    /// is queued behind the peer's last write so the loop can drop a frame
    /// it left unfinished.
    pub fn on_disconnect(&self, conn_handle: u16) {
        let h = u32::from(conn_handle);
        for slot in &self.slots {
            let _ = slot.compare_exchange(h, EMPTY, Ordering::AcqRel, Ordering::Relaxed);
        }
        if self.rx.enqueue(RxChunk::new()).is_err() {
            self.rx_overflows.fetch_add(1, Ordering::Relaxed);
        }
        self.readvertise.store(true, Ordering::Release);
    }

    /// Ask the loop to resume advertising while slots remain free.
    pub fn request_readvertise(&self) {
        self.readvertise.store(true, Ordering::Release);
    }

    /// Buffer one RX write.  Oversized writes are cut to
    /// [`RX_CHUNK_CAPACITY`]; a full queue drops the chunk.  Empty writes
    /// are ignored, the empty chunk is the disconnect marker.
    pub fn on_rx_write(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let take = data.len().min(RX_CHUNK_CAPACITY);
        let mut chunk = RxChunk::new();
        let _ = chunk.extend_from_slice(&data[..take]);
        if take < data.len() || self.rx.enqueue(chunk).is_err() {
            self.rx_overflows.fetch_add(1, Ordering::Relaxed);
        }
    }

    // ── Loop side ─────────────────────────────────────────────

    /// Next buffered write, oldest first.  An empty chunk means a peer
    /// disconnected at that point of the stream.
    pub fn take_chunk(&self) -> Option<RxChunk> {
        self.rx.dequeue()
    }

    /// Returns and clears the pending advertising-restart request.
    pub fn take_readvertise(&self) -> bool {
        self.readvertise.swap(false, Ordering::AcqRel)
    }

    /// Snapshot of the live connection handles.
    pub fn connections(&self) -> Connections {
        let mut out = Connections::new();
        for slot in &self.slots {
            let h = slot.load(Ordering::Acquire);
            if h != EMPTY {
                let _ = out.push(h as u16);
            }
        }
        out
    }

    pub fn is_connected(&self) -> bool {
        self.slots
            .iter()
            .any(|s| s.load(Ordering::Acquire) != EMPTY)
    }

    pub fn rx_overflows(&self) -> u32 {
        self.rx_overflows.load(Ordering::Relaxed)
    }

    pub fn rejected_connections(&self) -> u32 {
        self.rejected_connections.load(Ordering::Relaxed)
    }

    /// Drop every connection, pending chunk and flag.  Counters survive.
    pub fn reset(&self) {
        for slot in &self.slots {
            slot.store(EMPTY, Ordering::Release);
        }
        while self.rx.dequeue().is_some() {}
        self.readvertise.store(false, Ordering::Release);
    }
}
