//! Controller scenarios: retry queue, mode key, watchdog, diagnostics.

use embedded_hal::delay::DelayNs;
use labsentinel::adapters::wifi::WifiAdapter;
use labsentinel::app::alerts::TempBand;
use labsentinel::app::events::AppEvent;
use labsentinel::app::ports::{BlePort, SensorPort};
use labsentinel::app::runtime_config::{RuntimeConfig, WifiCredentials};
use labsentinel::config::{RETRY_QUEUE_MAX, SystemConfig};
use labsentinel::transport::{Channel, TransportError};

use super::mock_hw::Rig;

fn lab_credentials() -> RuntimeConfig {
    RuntimeConfig {
        wifi: WifiCredentials {
            ssid: "LabNet".try_into().unwrap(),
            password: "password1".try_into().unwrap(),
        },
        ..RuntimeConfig::default()
    }
}

// ── Retry queue ───────────────────────────────────────────────

#[test]
fn offline_backlog_keeps_most_recent_readings_in_order() {
    let config = SystemConfig {
        send_interval_ms: 3000,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(config, RuntimeConfig::default());

    let cycles = RETRY_QUEUE_MAX as u32 + 5;
    for k in 1..=cycles {
        rig.tick(3000 * k);
    }

    let queue = rig.app.queue();
    assert_eq!(queue.len(), RETRY_QUEUE_MAX);
    assert_eq!(queue.dropped(), 5);
    let stamps: Vec<u64> = queue.iter().map(|r| r.timestamp).collect();
    let expected: Vec<u64> = (6..=cycles).map(|k| u64::from(3 * k)).collect();
    assert_eq!(stamps, expected);

    assert_eq!(
        rig.sink.count(|e| *e == AppEvent::UploadFailed(TransportError::Disconnected)),
        cycles as usize
    );
}

#[test]
fn disconnected_failures_inside_cooldown_enqueue_once() {
    let mut rig = Rig::new(SystemConfig::default(), RuntimeConfig::default());

    // Cooldown (3 s) starts at boot; sends every second.
    for t in (1000..=5000).step_by(1000) {
        rig.tick(t);
    }

    assert_eq!(rig.app.queue().len(), 1);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::Enqueued(_))), 1);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::UploadFailed(_))), 5);
}

#[test]
fn backlog_drains_before_fresh_readings() {
    let mut rig = Rig::new(SystemConfig::default(), lab_credentials());

    for t in (1000..=9000).step_by(1000) {
        rig.tick(t);
    }
    assert!(!rig.app.queue().is_empty());

    rig.wifi.set_sim_reachable(true);
    for t in (10_000..=30_000).step_by(1000) {
        rig.tick(t);
    }

    assert!(rig.app.queue().is_empty());
    let uploads: Vec<bool> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::UploadOk { from_queue, .. } => Some(*from_queue),
            _ => None,
        })
        .collect();
    assert!(uploads.first() == Some(&true));
    let first_fresh = uploads.iter().position(|q| !q).unwrap();
    assert!(uploads[first_fresh..].iter().all(|q| !q));
    assert_eq!(rig.wifi.sim_posts() as usize, uploads.len());
}

#[test]
fn reachable_network_uploads_fresh_readings() {
    let mut wifi = WifiAdapter::new(5000);
    wifi.set_sim_reachable(true);
    let mut rig = Rig::with_wifi(SystemConfig::default(), lab_credentials(), wifi);

    rig.tick(1000);
    rig.tick(2000);

    assert_eq!(
        rig.sink.count(|e| *e == AppEvent::UploadOk { status: 200, from_queue: false }),
        2
    );
    assert!(rig.app.queue().is_empty());
}

#[test]
fn ble_channel_never_touches_http() {
    let mut wifi = WifiAdapter::new(5000);
    wifi.set_sim_reachable(true);
    let mut rig = Rig::with_wifi(SystemConfig::default(), lab_credentials(), wifi);
    rig.tick(1000);
    let posts = rig.wifi.sim_posts();

    rig.press_key(1500);
    let uploads_before = rig.sink.count(|e| matches!(e, AppEvent::UploadOk { .. }));
    rig.tick(3000);
    rig.tick(4000);

    assert_eq!(rig.app.channel(), Channel::Ble);
    assert_eq!(rig.wifi.sim_posts(), posts);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::UploadOk { .. })),
        uploads_before
    );
    assert!(rig.sink.count(|e| matches!(e, AppEvent::BleSummary(_))) >= 2);
}

// ── Mode key ──────────────────────────────────────────────────

#[test]
fn double_edge_inside_debounce_keeps_channel() {
    let mut rig = Rig::new(SystemConfig::default(), RuntimeConfig::default());

    rig.hw.key_high = false;
    rig.tick(50);
    rig.hw.key_high = true;
    rig.tick(100);

    assert_eq!(rig.app.channel(), Channel::Wifi);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::ChannelSwitched { .. })), 0);

    // Outside the window the same press is honoured.
    rig.hw.key_high = false;
    rig.tick(250);
    assert_eq!(rig.app.channel(), Channel::Ble);
}

#[test]
fn key_toggles_between_channels() {
    let mut rig = Rig::new(SystemConfig::default(), RuntimeConfig::default());
    assert!(rig.wifi.radio_on());

    rig.press_key(1000);
    assert_eq!(rig.app.channel(), Channel::Ble);
    assert!(!rig.wifi.radio_on());
    assert!(rig.ble.is_running());

    rig.press_key(2000);
    assert_eq!(rig.app.channel(), Channel::Wifi);
    assert!(rig.wifi.radio_on());
    assert!(!rig.ble.is_running());
    assert!(!rig.ble.link().is_connected());

    assert!(rig.sink.events.contains(&AppEvent::ChannelSwitched {
        from: Channel::Wifi,
        to: Channel::Ble
    }));
    assert!(rig.sink.events.contains(&AppEvent::ChannelSwitched {
        from: Channel::Ble,
        to: Channel::Wifi
    }));
}

// ── Watchdog ──────────────────────────────────────────────────

#[test]
fn watchdog_fed_once_per_tick_when_everything_fails() {
    let mut rig = Rig::new(SystemConfig::default(), RuntimeConfig::default());
    rig.hw.bus_error = true;

    for t in (10..=5000).step_by(10) {
        rig.tick(t);
    }

    assert_eq!(rig.hw.feeds, 500);
    assert_eq!(rig.hw.collects, 500);
    assert_eq!(rig.app.tick_count(), 500);
    assert!(rig.sink.count(|e| matches!(e, AppEvent::UploadFailed(_))) > 0);
}

/// Blocking delay that only adds up how long it would have slept.
struct SleepLedger(u32);

impl DelayNs for SleepLedger {
    fn delay_ns(&mut self, ns: u32) {
        self.0 += ns / 1_000_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0 += ms;
    }
}

#[test]
fn selftest_without_credentials_returns_immediately() {
    let mut rig = Rig::new(SystemConfig::default(), RuntimeConfig::default());
    let mut slept = SleepLedger(0);

    let ok = rig
        .app
        .wifi_selftest(0, &mut rig.wifi, &mut slept, &mut || rig.hw.feed_watchdog());

    assert!(!ok);
    assert_eq!(slept.0, 0);
}

#[test]
fn selftest_feeds_watchdog_while_waiting() {
    let config = SystemConfig::default();
    let window = config.watchdog_timeout_ms;
    let mut rig = Rig::new(config, lab_credentials());
    let mut slept = SleepLedger(0);

    let ok = rig
        .app
        .wifi_selftest(0, &mut rig.wifi, &mut slept, &mut || rig.hw.feed_watchdog());

    assert!(!ok);
    assert_eq!(slept.0, 8000);
    // Fed before every poll: gaps stay far below the watchdog window.
    assert_eq!(rig.hw.feeds, 41);
    assert!(slept.0 / rig.hw.feeds < window);
}

// ── Diagnostics and alerts ────────────────────────────────────

#[test]
fn periodic_memory_and_housekeeping_reports() {
    let mut rig = Rig::new(SystemConfig::default(), RuntimeConfig::default());
    for t in (1000..=30_000).step_by(1000) {
        rig.tick(t);
    }

    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::MemoryReport { .. })), 3);
    let house: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Housekeeping(h) => Some(*h),
            _ => None,
        })
        .collect();
    assert_eq!(house.len(), 1);
    assert!(house[0].heap_intact);
    assert!(!house[0].heap_low);
    assert_eq!(house[0].queue_depth, rig.app.queue().len());
}

#[test]
fn threshold_alerts_fire_on_band_changes_only() {
    let mut rig = Rig::new(SystemConfig::default(), RuntimeConfig::default());

    rig.tick(10);
    rig.hw.temp_c = Some(31.0);
    rig.tick(20);
    rig.tick(30);
    rig.hw.bus_error = true;
    rig.tick(40);
    rig.hw.bus_error = false;
    rig.hw.temp_c = Some(12.0);
    rig.tick(50);

    let bands: Vec<TempBand> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::ThresholdAlert { band, .. } => Some(*band),
            _ => None,
        })
        .collect();
    assert_eq!(bands, vec![TempBand::High, TempBand::Low]);
    assert_eq!(rig.app.temp_band(), TempBand::Low);
}
