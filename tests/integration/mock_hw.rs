//! Mock ports for integration tests.
//!
//! The radios use the library's own host simulations
//! ([`WifiAdapter`](labsentinel::adapters::wifi::WifiAdapter),
//! [`BleAdapter`](labsentinel::adapters::ble::BleAdapter)); everything
//! else is recorded here so tests can assert on the full history.

use labsentinel::adapters::ble::BleAdapter;
use labsentinel::adapters::device_id::DeviceIdString;
use labsentinel::adapters::wifi::WifiAdapter;
use labsentinel::app::events::AppEvent;
use labsentinel::app::ports::{
    ButtonPort, ConfigError, ConfigPort, DiagnosticsPort, EventSink, SensorPort,
};
use labsentinel::app::runtime_config::RuntimeConfig;
use labsentinel::app::service::{AppService, TickTime};
use labsentinel::config::SystemConfig;
use labsentinel::error::SensorError;
use labsentinel::sensors::{
    Bmp280Reading, Bmp280Status, Environment, LightReading, SensorReading,
};

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    /// Level returned by the mode key (pull-up: `true` = released).
    pub key_high: bool,
    /// Temperature reported by the BMP280; `None` with `bus_error` unset
    /// means the part is absent.
    pub temp_c: Option<f32>,
    pub bus_error: bool,
    pub heap_free: u32,
    pub feeds: u32,
    pub collects: u32,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            key_high: true,
            temp_c: Some(22.5),
            bus_error: false,
            heap_free: 150_000,
            feeds: 0,
            collects: 0,
        }
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHardware {
    fn collect(&mut self, _now_ms: u32, unix_secs: u64) -> SensorReading {
        self.collects += 1;
        let bmp280 = if self.bus_error {
            Bmp280Reading::failed(SensorError::I2cBus)
        } else {
            match self.temp_c {
                Some(t) => Bmp280Reading {
                    temp: Some(t),
                    pressure: Some(1013.25),
                    status: Bmp280Status::Ok,
                },
                None => Bmp280Reading::unavailable(),
            }
        };
        SensorReading {
            device_id: DeviceIdString::try_from("SLS-TEST01").unwrap(),
            timestamp: unix_secs,
            environment: Environment {
                bmp280,
                light: LightReading::from_raw(2048),
            },
        }
    }

    fn feed_watchdog(&mut self) {
        self.feeds += 1;
    }
}

impl ButtonPort for MockHardware {
    fn mode_key_high(&mut self) -> bool {
        self.key_high
    }
}

impl DiagnosticsPort for MockHardware {
    fn heap_free(&self) -> u32 {
        self.heap_free
    }

    fn heap_min_free(&self) -> u32 {
        self.heap_free - 10_000
    }
}

// ── MemStore ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MemStore {
    pub data: Option<Vec<u8>>,
    pub writes: u32,
}

#[allow(dead_code)]
impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(&self) -> Option<serde_json::Value> {
        self.data
            .as_deref()
            .and_then(|d| serde_json::from_slice(d).ok())
    }
}

impl ConfigPort for MemStore {
    fn read_raw(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.data.clone())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), ConfigError> {
        self.data = Some(data.to_vec());
        self.writes += 1;
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// An [`AppService`] wired to mocks, booted at `t = 0`.
pub struct Rig {
    pub app: AppService,
    pub hw: MockHardware,
    pub wifi: WifiAdapter,
    pub ble: BleAdapter,
    pub store: MemStore,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(config: SystemConfig, runtime: RuntimeConfig) -> Self {
        Self::with_wifi(config, runtime, WifiAdapter::new(5000))
    }

    pub fn with_wifi(config: SystemConfig, runtime: RuntimeConfig, mut wifi: WifiAdapter) -> Self {
        let mut ble = BleAdapter::new();
        let hw = MockHardware::new();
        let mut sink = RecordingSink::new();
        let mut app = AppService::new(config, runtime, 0, hw.key_high, &mut wifi, &mut ble);
        app.start(&mut sink);
        Self {
            app,
            hw,
            wifi,
            ble,
            store: MemStore::new(),
            sink,
        }
    }

    /// One loop iteration at `now_ms`; the reading timestamp is `now_ms / 1000`.
    pub fn tick(&mut self, now_ms: u32) {
        let t = TickTime {
            now_ms,
            unix_secs: u64::from(now_ms / 1000),
        };
        self.app.tick(
            t,
            &mut self.hw,
            &mut self.wifi,
            &mut self.ble,
            &mut self.store,
            &mut self.sink,
        );
    }

    /// Press and release the mode key around `at_ms`, outside any
    /// debounce window.
    pub fn press_key(&mut self, at_ms: u32) {
        self.hw.key_high = false;
        self.tick(at_ms);
        self.hw.key_high = true;
        self.tick(at_ms + 300);
    }
}
