//! Runtime configuration against the file-backed store.

use std::fs;
use std::path::PathBuf;

use serde_json::json;

use labsentinel::adapters::config_file::FileConfigStore;
use labsentinel::app::runtime_config::{RuntimeConfig, Thresholds};
use labsentinel::config::SystemConfig;

use super::mock_hw::Rig;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("labsentinel-it-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn missing_file_yields_defaults() {
    let dir = scratch_dir("defaults");
    let store = FileConfigStore::new(&dir);

    let cfg = RuntimeConfig::load_from(&store);
    assert_eq!(cfg, RuntimeConfig::default());
    assert!(!cfg.has_credentials());
    assert_eq!(cfg.threshold.temp_high, 30.0);
    assert_eq!(cfg.threshold.temp_low, 15.0);
}

#[test]
fn corrupt_file_yields_defaults() {
    let dir = scratch_dir("corrupt");
    let store = FileConfigStore::new(&dir);
    fs::write(store.path(), b"{\"wifi\":{\"ssid\":").unwrap();

    assert_eq!(RuntimeConfig::load_from(&store), RuntimeConfig::default());

    fs::write(store.path(), b"[1,2,3]").unwrap();
    assert_eq!(RuntimeConfig::load_from(&store), RuntimeConfig::default());
}

#[test]
fn partial_document_is_merged_and_written_whole() {
    let dir = scratch_dir("partial");
    let mut store = FileConfigStore::new(&dir);

    let written =
        RuntimeConfig::save_value_to(&json!({"wifi": {"ssid": "LabNet"}}), &mut store).unwrap();
    assert_eq!(written.wifi.ssid.as_str(), "LabNet");
    assert_eq!(written.wifi.password.as_str(), "");
    assert_eq!(written.threshold, Thresholds::default());

    let on_disk: serde_json::Value = serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
    assert_eq!(
        on_disk,
        json!({
            "wifi": {"ssid": "LabNet", "password": ""},
            "threshold": {"temp_high": 30.0, "temp_low": 15.0}
        })
    );

    assert_eq!(RuntimeConfig::load_from(&store), written);
}

#[test]
fn wrong_types_and_unknown_keys_fall_back_per_leaf() {
    let cfg = RuntimeConfig::merge_defaults(&json!({
        "wifi": {"ssid": 42, "password": "password1"},
        "threshold": {"temp_high": "hot", "temp_low": 5},
        "extra": true
    }));

    assert_eq!(cfg.wifi.ssid.as_str(), "");
    assert_eq!(cfg.wifi.password.as_str(), "password1");
    assert_eq!(cfg.threshold.temp_high, 30.0);
    assert_eq!(cfg.threshold.temp_low, 5.0);
}

#[test]
fn stored_credentials_drive_the_first_association() {
    let dir = scratch_dir("boot");
    let mut store = FileConfigStore::new(&dir);
    RuntimeConfig::save_value_to(
        &json!({"wifi": {"ssid": "LabNet", "password": "password1"}}),
        &mut store,
    )
    .unwrap();

    let runtime = RuntimeConfig::load_from(&store);
    assert!(runtime.has_credentials());

    let mut wifi = labsentinel::adapters::wifi::WifiAdapter::new(5000);
    wifi.set_sim_reachable(true);
    let mut rig = Rig::with_wifi(SystemConfig::default(), runtime, wifi);
    rig.tick(1000);

    assert_eq!(rig.wifi.sim_posts(), 1);
    assert!(rig.app.queue().is_empty());
}
