//! Peer commands over the BLE channel, end to end through the simulated
//! GATT server.

use labsentinel::app::alerts::TempBand;
use labsentinel::app::events::AppEvent;
use labsentinel::app::ports::BlePort;
use labsentinel::app::runtime_config::{RuntimeConfig, Thresholds};
use labsentinel::config::SystemConfig;
use labsentinel::error::{CommandError, Error};
use labsentinel::transport::Channel;

use super::mock_hw::Rig;

/// Boot, press the key at 1000 ms and return a rig sitting in BLE mode.
fn ble_rig() -> Rig {
    let mut rig = Rig::new(SystemConfig::default(), RuntimeConfig::default());
    rig.press_key(1000);
    assert_eq!(rig.app.channel(), Channel::Ble);
    rig
}

/// Write `msg` the way a phone does: 20-byte chunks on RX.
fn write_chunked(rig: &Rig, msg: &[u8]) {
    for chunk in msg.chunks(20) {
        rig.ble.sim_write(chunk);
    }
}

#[test]
fn wifi_command_persists_and_switches_channel() {
    let mut rig = ble_rig();
    assert!(rig.ble.sim_connect(1));

    write_chunked(
        &rig,
        b"{\"type\":\"wifi\",\"ssid\":\"LabNet\",\"password\":\"secret123\"}\n",
    );
    rig.tick(1400);

    let stored = rig.store.json().expect("config written");
    assert_eq!(stored["wifi"]["ssid"], "LabNet");
    assert_eq!(stored["wifi"]["password"], "secret123");
    assert_eq!(stored["threshold"]["temp_high"], 30.0);

    assert_eq!(rig.app.channel(), Channel::Wifi);
    assert_eq!(rig.app.runtime_config().wifi.ssid.as_str(), "LabNet");
    assert!(rig.wifi.radio_on());
    assert!(!rig.ble.is_running());
    assert!(rig.sink.events.contains(&AppEvent::CommandApplied("wifi")));
    assert!(rig.sink.events.contains(&AppEvent::ChannelSwitched {
        from: Channel::Ble,
        to: Channel::Wifi
    }));
}

#[test]
fn invalid_threshold_changes_nothing() {
    let mut rig = ble_rig();
    rig.ble.sim_connect(1);

    write_chunked(&rig, b"{\"type\":\"threshold\",\"temp_high\":\"bad\",\"temp_low\":10}\n");
    rig.tick(1400);

    assert_eq!(rig.store.writes, 0);
    assert_eq!(rig.app.runtime_config().threshold, Thresholds::default());
    assert_eq!(rig.app.channel(), Channel::Ble);
    assert!(rig.sink.events.contains(&AppEvent::CommandRejected(
        Error::CommandParse(CommandError::InvalidThreshold)
    )));
}

#[test]
fn numeric_string_threshold_is_applied() {
    let mut rig = ble_rig();
    rig.ble.sim_connect(1);

    write_chunked(&rig, b"{\"type\":\"threshold\",\"temp_high\":\"28.5\",\"temp_low\":12}\n");
    rig.tick(1400);

    let th = rig.app.runtime_config().threshold;
    assert_eq!(th.temp_high, 28.5);
    assert_eq!(th.temp_low, 12.0);
    assert_eq!(rig.store.writes, 1);
    assert_eq!(rig.store.json().unwrap()["threshold"]["temp_high"], 28.5);
    assert!(rig.sink.events.contains(&AppEvent::CommandApplied("threshold")));

    // 22.5 °C is inside the old band; 29 °C is above the new limit.
    rig.hw.temp_c = Some(29.0);
    rig.tick(1500);
    assert_eq!(rig.app.temp_band(), TempBand::High);
}

#[test]
fn command_without_newline_is_accepted() {
    let mut rig = ble_rig();
    rig.ble.sim_connect(1);

    write_chunked(&rig, b"{\"type\":\"threshold\",\"temp_high\":35,\"temp_low\":5}");
    rig.tick(1400);

    assert_eq!(rig.app.runtime_config().threshold.temp_high, 35.0);
}

#[test]
fn garbage_frame_is_rejected() {
    let mut rig = ble_rig();
    rig.ble.sim_connect(1);

    rig.ble.sim_write(b"hello there\n");
    rig.tick(1400);

    assert_eq!(rig.store.writes, 0);
    assert!(rig.sink.events.contains(&AppEvent::CommandRejected(
        Error::CommandParse(CommandError::InvalidJson)
    )));
}

#[test]
fn unfinished_frame_from_departed_peer_is_discarded() {
    let mut rig = ble_rig();
    assert!(rig.ble.sim_connect(1));
    rig.ble.sim_write(b"{\"type\":\"thr");
    rig.ble.sim_disconnect(1);

    assert!(rig.ble.sim_connect(2));
    write_chunked(&rig, b"{\"type\":\"threshold\",\"temp_high\":35,\"temp_low\":5}\n");
    rig.tick(1400);

    let th = rig.app.runtime_config().threshold;
    assert_eq!((th.temp_high, th.temp_low), (35.0, 5.0));
    assert_eq!(rig.store.writes, 1);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::CommandRejected(_))), 0);
}

#[test]
fn restarted_command_from_same_peer_wins_over_abandoned_one() {
    let mut rig = ble_rig();
    rig.ble.sim_connect(1);
    rig.ble.sim_write(b"{\"type\":\"thr");
    rig.tick(1400);
    assert_eq!(rig.store.writes, 0);

    write_chunked(&rig, b"{\"type\":\"threshold\",\"temp_high\":35,\"temp_low\":5}\n");
    rig.tick(1500);

    assert_eq!(rig.app.runtime_config().threshold.temp_high, 35.0);
    assert!(rig.sink.events.contains(&AppEvent::CommandApplied("threshold")));
}

#[test]
fn oversized_frame_is_rejected_as_too_long() {
    let mut rig = ble_rig();
    rig.ble.sim_connect(1);

    let msg = format!(
        "{{\"type\":\"threshold\",\"temp_high\":35,\"temp_low\":5,\"note\":\"{}\"}}\n",
        "x".repeat(300)
    );
    for chunk in msg.as_bytes().chunks(100) {
        rig.ble.sim_write(chunk);
    }
    rig.tick(1400);

    assert_eq!(rig.store.writes, 0);
    assert_eq!(rig.app.runtime_config().threshold, Thresholds::default());
    assert!(rig.sink.events.contains(&AppEvent::CommandRejected(
        Error::CommandParse(CommandError::FrameTooLong)
    )));
}

#[test]
fn readings_notify_connected_peer() {
    let mut rig = ble_rig();
    assert!(rig.ble.sim_connect(1));
    rig.ble.set_sim_mtu(247);

    rig.tick(2000);

    assert!(rig.sink.events.contains(&AppEvent::Notified(1)));
    let notes = rig.ble.sim_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].0, 1);
    let body: serde_json::Value = serde_json::from_slice(&notes[0].1).unwrap();
    assert_eq!(body["device_id"], "SLS-TEST01");
    assert_eq!(body["timestamp"], 2);
}

#[test]
fn reading_too_large_for_default_mtu_is_not_split() {
    let mut rig = ble_rig();
    assert!(rig.ble.sim_connect(1));

    rig.tick(2000);

    assert!(rig.ble.sim_notifications().is_empty());
    assert!(rig.sink.events.contains(&AppEvent::Notified(0)));

    rig.ble.set_sim_mtu(247);
    rig.tick(3000);
    let notes = rig.ble.sim_notifications();
    assert_eq!(notes.len(), 1);
    assert!(serde_json::from_slice::<serde_json::Value>(&notes[0].1).is_ok());
}

#[test]
fn no_peer_falls_back_to_summary() {
    let mut rig = ble_rig();
    rig.tick(2000);

    assert!(rig.ble.sim_notifications().is_empty());
    assert!(
        rig.sink
            .count(|e| matches!(e, AppEvent::BleSummary(s) if s.temp_c == Some(22.5)))
            >= 1
    );
}

#[test]
fn disconnect_restarts_advertising() {
    let mut rig = ble_rig();
    rig.ble.sim_connect(1);
    rig.ble.sim_disconnect(1);
    rig.tick(1400);

    assert_eq!(rig.ble.sim_adv_restarts(), 1);
    assert!(!rig.ble.link().is_connected());
}

#[test]
fn missing_stack_still_runs_the_loop() {
    let mut rig = Rig::new(SystemConfig::default(), RuntimeConfig::default());
    rig.ble.set_sim_fail_start(true);
    rig.press_key(1000);

    assert_eq!(rig.app.channel(), Channel::Ble);
    assert!(!rig.ble.is_running());
    assert!(!rig.ble.sim_connect(1));

    rig.tick(2000);
    assert!(rig.sink.count(|e| matches!(e, AppEvent::BleSummary(_))) >= 2);
    assert_eq!(rig.hw.feeds, 3);
}
