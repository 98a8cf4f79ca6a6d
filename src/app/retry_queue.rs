//! Bounded backlog of readings whose upload failed.
//!
//! Drop-oldest when full.  Enqueues caused by a disconnected station are
//! throttled so an offline device does not churn the whole backlog every
//! send cycle; any other failure always enqueues.

use heapless::Deque;

use crate::config::RETRY_QUEUE_MAX;
use crate::scheduler::ticks_diff;
use crate::sensors::SensorReading;
use crate::transport::TransportError;

pub struct RetryQueue {
    entries: Deque<SensorReading, RETRY_QUEUE_MAX>,
    cooldown_ms: u32,
    last_enqueue_ms: u32,
    dropped: u32,
}

impl RetryQueue {
    /// The cooldown clock starts at `now_ms`.
    pub fn new(cooldown_ms: u32, now_ms: u32) -> Self {
        Self {
            entries: Deque::new(),
            cooldown_ms,
            last_enqueue_ms: now_ms,
            dropped: 0,
        }
    }

    /// Append, evicting the oldest entry when full.
    pub fn push(&mut self, reading: SensorReading, now_ms: u32) {
        if self.entries.is_full() {
            self.entries.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        // Cannot fail: a slot was just freed.
        let _ = self.entries.push_back(reading);
        self.last_enqueue_ms = now_ms;
    }

    /// Apply the enqueue policy for a failed send.  Returns `true` if the
    /// reading was queued.
    pub fn offer(&mut self, reading: SensorReading, cause: &TransportError, now_ms: u32) -> bool {
        let cooled = ticks_diff(now_ms, self.last_enqueue_ms) >= self.cooldown_ms as i32;
        if *cause != TransportError::Disconnected || cooled {
            self.push(reading, now_ms);
            true
        } else {
            false
        }
    }

    pub fn front(&self) -> Option<&SensorReading> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<SensorReading> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries evicted by drop-oldest since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SensorReading> {
        self.entries.iter()
    }
}
