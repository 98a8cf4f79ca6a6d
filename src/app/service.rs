//! Application service — the hexagonal core.
//!
//! [`AppService`] owns every piece of loop state: the active transport, the
//! retry queue, the interval timers, the mode-key debouncer, the threshold
//! monitor and the in-memory runtime config.  All I/O flows through port
//! traits injected at call sites, so the whole controller runs on the host
//! against mock adapters.
//!
//! ```text
//!  SensorPort ─┐                          ┌──▶ EventSink
//!  ButtonPort ─┼─▶ ┌──────────────────┐ ──┤
//!  WifiPort ◀──┼── │    AppService    │   └──▶ ConfigPort
//!  BlePort  ◀──┘   │ transport · queue│
//!                  └──────────────────┘
//! ```
//!
//! One [`tick`](AppService::tick) runs, in order: key handling, transport
//! step and peer commands, sensor collection, threshold check, the send
//! decision, periodic diagnostics, and finally the watchdog feed.

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::diagnostics::HEAP_LOW_WATERMARK;
use crate::drivers::button::{KeyEvent, ModeKey};
use crate::error::{CommandError, Error};
use crate::scheduler::LoopSchedule;
use crate::sensors::SensorReading;
use crate::transport::{Channel, Transport, TransportError};

use super::alerts::{TempBand, ThresholdMonitor};
use super::commands::PeerCommand;
use super::events::{AppEvent, HousekeepingData, Summary};
use super::ports::{
    BlePort, ButtonPort, ConfigPort, DiagnosticsPort, EventSink, SensorPort, WifiPort,
};
use super::retry_queue::RetryQueue;
use super::runtime_config::{RuntimeConfig, WifiCredentials};

/// Clock values for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTime {
    /// Monotonic milliseconds, wrapping.
    pub now_ms: u32,
    /// Wall-clock seconds stamped into readings.
    pub unix_secs: u64,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService {
    config: SystemConfig,
    runtime: RuntimeConfig,
    transport: Transport,
    queue: RetryQueue,
    schedule: LoopSchedule,
    mode_key: ModeKey,
    monitor: ThresholdMonitor,
    tick_count: u64,
}

impl AppService {
    /// Build the controller on the WiFi channel and issue the first
    /// non-blocking association attempt.
    pub fn new(
        config: SystemConfig,
        runtime: RuntimeConfig,
        now_ms: u32,
        key_high: bool,
        wifi: &mut impl WifiPort,
        ble: &mut impl BlePort,
    ) -> Self {
        let mut transport = Transport::open(Channel::Wifi, &runtime.wifi, &config, wifi, ble);
        transport.connect_step(now_ms, wifi, ble);

        Self {
            queue: RetryQueue::new(config.enqueue_cooldown_ms, now_ms),
            schedule: LoopSchedule::new(&config, now_ms),
            mode_key: ModeKey::new(config.key_debounce_ms, key_high, now_ms),
            monitor: ThresholdMonitor::new(),
            tick_count: 0,
            config,
            runtime,
            transport,
        }
    }

    /// Blocking bring-up check: wait up to `wifi_selftest_timeout_ms` for
    /// the station to associate, calling `feed` between polls.  Returns
    /// `false` on timeout, without credentials, or when the active channel
    /// is not WiFi.  Must not be called from the loop.
    pub fn wifi_selftest(
        &mut self,
        now_ms: u32,
        wifi: &mut impl WifiPort,
        delay: &mut impl DelayNs,
        feed: &mut impl FnMut(),
    ) -> bool {
        if !self.runtime.has_credentials() {
            info!("WiFi self-test: no credentials, skipped");
            return false;
        }
        let Transport::Wifi(station) = &mut self.transport else {
            return false;
        };
        let timeout_ms = self.config.wifi_selftest_timeout_ms;
        let ok = station.ensure_connected(now_ms, timeout_ms, wifi, delay, feed);
        if ok {
            info!("WiFi self-test: associated");
        } else {
            warn!(
                "WiFi self-test: not associated after {} ms, continuing",
                self.config.wifi_selftest_timeout_ms
            );
        }
        ok
    }

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(self.channel()));
        info!(
            "AppService started on {} (send every {} ms)",
            self.channel(),
            self.config.effective_send_interval_ms()
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one loop iteration.  Never blocks longer than one HTTP POST and
    /// always ends with exactly one watchdog feed.
    pub fn tick(
        &mut self,
        t: TickTime,
        hw: &mut (impl SensorPort + ButtonPort + DiagnosticsPort),
        wifi: &mut impl WifiPort,
        ble: &mut impl BlePort,
        store: &mut impl ConfigPort,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        let now = t.now_ms;

        // 1. Mode key
        let level = hw.mode_key_high();
        if self.mode_key.poll(now, level) == Some(KeyEvent::Pressed) {
            let to = self.channel().toggled();
            self.switch_channel(to, now, wifi, ble, sink);
        }

        // 2. Transport step and peer commands
        let due = self.schedule.poll(now, self.channel() == Channel::Wifi);
        match self.channel() {
            Channel::Wifi if due.connect => {
                self.transport.connect_step(now, wifi, ble);
            }
            Channel::Wifi => {}
            Channel::Ble => {
                self.transport.connect_step(now, wifi, ble);
            }
        }
        if let Some(cmd) = self.transport.drain_commands() {
            self.handle_command(cmd, now, wifi, ble, store, sink);
        }

        // 3. Collection
        let reading = hw.collect(now, t.unix_secs);

        // 4. Threshold alerts
        self.check_thresholds(&reading, sink);

        // 5. Send decision
        if due.send {
            self.send_cycle(reading, now, wifi, ble, sink);
        }

        // 6. Diagnostics
        if due.mem_log {
            sink.emit(&AppEvent::MemoryReport {
                free: hw.heap_free(),
                min_free: hw.heap_min_free(),
            });
        }
        if due.housekeeping {
            let free = hw.heap_free();
            sink.emit(&AppEvent::Housekeeping(HousekeepingData {
                heap_free: free,
                heap_min_free: hw.heap_min_free(),
                heap_low: free < HEAP_LOW_WATERMARK,
                heap_intact: hw.heap_intact(),
                queue_depth: self.queue.len(),
                queue_dropped: self.queue.dropped(),
                ble_rx_overflows: ble.link().rx_overflows(),
                ble_rejected_connections: ble.link().rejected_connections(),
            }));
        }

        // 7. Watchdog
        hw.feed_watchdog();
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply one peer command.  Changes are persisted before they take
    /// effect; a failed write is logged and the in-memory value still wins.
    pub fn handle_command(
        &mut self,
        cmd: PeerCommand,
        now_ms: u32,
        wifi: &mut impl WifiPort,
        ble: &mut impl BlePort,
        store: &mut impl ConfigPort,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            PeerCommand::Wifi { ssid, password } => {
                info!("Command: new WiFi credentials for '{}'", ssid);
                self.runtime.wifi = WifiCredentials { ssid, password };
                self.persist(store);
                sink.emit(&AppEvent::CommandApplied("wifi"));
                self.switch_channel(Channel::Wifi, now_ms, wifi, ble, sink);
            }
            PeerCommand::Threshold {
                temp_high,
                temp_low,
            } => {
                self.runtime.threshold.temp_high = temp_high;
                self.runtime.threshold.temp_low = temp_low;
                self.persist(store);
                sink.emit(&AppEvent::CommandApplied("threshold"));
            }
            PeerCommand::Raw(bytes) => {
                debug!("Command: raw frame ({} bytes) ignored", bytes.len());
                sink.emit(&AppEvent::CommandRejected(CommandError::InvalidJson.into()));
            }
            PeerCommand::Rejected(e) => {
                sink.emit(&AppEvent::CommandRejected(e.into()));
            }
            PeerCommand::Unrecognized(kind) => {
                debug!("Command: unknown type '{}'", kind);
                sink.emit(&AppEvent::CommandRejected(CommandError::UnknownType.into()));
            }
        }
    }

    /// Tear the current transport down and build the one for `to`.  Always
    /// rebuilds, so new credentials get a fresh backoff.
    pub fn switch_channel(
        &mut self,
        to: Channel,
        now_ms: u32,
        wifi: &mut impl WifiPort,
        ble: &mut impl BlePort,
        sink: &mut impl EventSink,
    ) {
        let from = self.channel();
        self.transport.teardown(ble);
        self.transport = Transport::open(to, &self.runtime.wifi, &self.config, wifi, ble);
        if to == Channel::Wifi {
            self.transport.connect_step(now_ms, wifi, ble);
            self.schedule.connect_attempted(now_ms);
        }
        if from != to {
            sink.emit(&AppEvent::ChannelSwitched { from, to });
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn channel(&self) -> Channel {
        self.transport.channel()
    }

    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn queue(&self) -> &RetryQueue {
        &self.queue
    }

    pub fn temp_band(&self) -> TempBand {
        self.monitor.band()
    }

    /// Total loop ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn send_cycle(
        &mut self,
        reading: SensorReading,
        now_ms: u32,
        wifi: &mut impl WifiPort,
        ble: &mut impl BlePort,
        sink: &mut impl EventSink,
    ) {
        let url = self.config.server_url.as_str();
        match &mut self.transport {
            Transport::Wifi(station) => {
                // Backlog first: the fresh reading is only sent when the
                // queue is empty.
                let from_queue = !self.queue.is_empty();
                let result = match self.queue.front() {
                    Some(oldest) => station.post_json(oldest, url, wifi),
                    None => station.post_json(&reading, url, wifi),
                };
                match result {
                    Ok(status) => {
                        if from_queue {
                            self.queue.pop_front();
                        }
                        sink.emit(&AppEvent::UploadOk { status, from_queue });
                    }
                    Err(e) => {
                        sink.emit(&AppEvent::UploadFailed(e.clone()));
                        if self.queue.offer(reading, &e, now_ms) {
                            sink.emit(&AppEvent::Enqueued(self.queue.len()));
                        }
                    }
                }
            }
            Transport::Ble(link) => match link.send_json(&reading, ble) {
                Ok(peers) => sink.emit(&AppEvent::Notified(peers)),
                Err(TransportError::NoPeers | TransportError::NotReady) => {
                    sink.emit(&AppEvent::BleSummary(Summary {
                        temp_c: reading.environment.bmp280.temp,
                        pressure_hpa: reading.environment.bmp280.pressure,
                        light_percent: reading.environment.light.percent,
                    }));
                }
                Err(e) => sink.emit(&AppEvent::Fault(Error::from(&e))),
            },
        }
    }

    fn check_thresholds(&mut self, reading: &SensorReading, sink: &mut impl EventSink) {
        let temp = reading.temperature_c();
        let limits = self.runtime.threshold;
        if let (Some(band), Some(temp_c)) = (self.monitor.update(temp, &limits), temp) {
            let limit_c = match band {
                TempBand::High => limits.temp_high,
                TempBand::Low => limits.temp_low,
                TempBand::Normal => temp_c,
            };
            sink.emit(&AppEvent::ThresholdAlert {
                band,
                temp_c,
                limit_c,
            });
        }
    }

    fn persist(&self, store: &mut impl ConfigPort) {
        if let Err(e) = self.runtime.save_to(store) {
            warn!("Runtime config save failed: {}", e);
        }
    }
}
