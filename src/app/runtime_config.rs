//! Persisted, peer-editable configuration.
//!
//! Stored as one JSON document:
//!
//! ```json
//! {"wifi":{"ssid":"","password":""},"threshold":{"temp_high":30,"temp_low":15}}
//! ```
//!
//! Every read goes through [`RuntimeConfig::merge_defaults`], so a partial or
//! hand-edited file still yields a complete structure, and every write stores
//! the complete structure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ports::{ConfigError, ConfigPort};
use crate::error::Error;

/// Fixed file name under the storage base path.
pub const RUNTIME_CONFIG_FILE: &str = "runtime_config.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub temp_high: f32,
    pub temp_low: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temp_high: 30.0,
            temp_low: 15.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub wifi: WifiCredentials,
    pub threshold: Thresholds,
}

impl RuntimeConfig {
    /// Start from defaults and take each known leaf from `value` when it is
    /// present and of the right type.  Unknown keys are ignored.
    pub fn merge_defaults(value: &Value) -> Self {
        let mut cfg = Self::default();

        if let Some(wifi) = value.get("wifi") {
            if let Some(s) = wifi.get("ssid").and_then(Value::as_str) {
                if let Ok(ssid) = heapless::String::try_from(s) {
                    cfg.wifi.ssid = ssid;
                }
            }
            if let Some(s) = wifi.get("password").and_then(Value::as_str) {
                if let Ok(pw) = heapless::String::try_from(s) {
                    cfg.wifi.password = pw;
                }
            }
        }

        if let Some(th) = value.get("threshold") {
            if let Some(v) = th.get("temp_high").and_then(Value::as_f64) {
                cfg.threshold.temp_high = v as f32;
            }
            if let Some(v) = th.get("temp_low").and_then(Value::as_f64) {
                cfg.threshold.temp_low = v as f32;
            }
        }

        cfg
    }

    /// Load from `store`.  Never fails: a missing, unreadable or corrupt
    /// document yields defaults.
    pub fn load_from(store: &impl ConfigPort) -> Self {
        match store.read_raw() {
            Ok(None) => {
                log::info!("Runtime config: none stored, using defaults");
                Self::default()
            }
            Ok(Some(bytes)) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(v) if v.is_object() => Self::merge_defaults(&v),
                _ => {
                    log::error!("Runtime config: {}, using defaults", Error::ConfigCorrupt);
                    Self::default()
                }
            },
            Err(e) => {
                log::error!("Runtime config: read failed ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Persist the complete structure.
    pub fn save_to(&self, store: &mut impl ConfigPort) -> Result<(), ConfigError> {
        let bytes = serde_json::to_vec(self).map_err(|_| ConfigError::Encode)?;
        store.write_raw(&bytes)
    }

    /// Merge an arbitrary (possibly partial) document against defaults and
    /// persist the result.  Returns what was written.
    pub fn save_value_to(value: &Value, store: &mut impl ConfigPort) -> Result<Self, ConfigError> {
        let cfg = Self::merge_defaults(value);
        cfg.save_to(store)?;
        Ok(cfg)
    }

    pub fn has_credentials(&self) -> bool {
        !self.wifi.ssid.is_empty()
    }
}
