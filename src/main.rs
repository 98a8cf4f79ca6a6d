//! Lab Sentinel Firmware — Main Entry Point
//!
//! Hexagonal architecture with a cooperative single-task loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        LogEventSink     FileConfigStore       │
//! │  (Sensor+Button+Diag)   (EventSink)      (ConfigPort)          │
//! │  WifiAdapter            BleAdapter       Esp32TimeAdapter      │
//! │  (WifiPort)             (BlePort)        (loop clock)          │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Transport{Wifi|Ble} · RetryQueue · ModeKey · Alerts   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;

use labsentinel::adapters::ble::BleAdapter;
use labsentinel::adapters::config_file::{self, FileConfigStore, STORAGE_BASE_PATH};
use labsentinel::adapters::device_id;
use labsentinel::adapters::hardware::HardwareAdapter;
use labsentinel::adapters::log_sink::LogEventSink;
use labsentinel::adapters::time::Esp32TimeAdapter;
use labsentinel::adapters::wifi::WifiAdapter;
use labsentinel::app::ports::{ButtonPort, SensorPort};
use labsentinel::app::runtime_config::RuntimeConfig;
use labsentinel::app::service::{AppService, TickTime};
use labsentinel::config::{LOOP_SLEEP_MS, SystemConfig};
use labsentinel::diagnostics;
use labsentinel::drivers::hw_init::{self, OneshotLightAdc};
use labsentinel::drivers::watchdog::Watchdog;
use labsentinel::pins;
use labsentinel::sensors::SensorHub;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Lab Sentinel v{}                 ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    diagnostics::install_panic_handler();

    let config = SystemConfig::default();
    let time = Esp32TimeAdapter::new();

    // ── 2. Peripherals ────────────────────────────────────────
    let adc_ok = match hw_init::init_peripherals() {
        Ok(adc_ok) => adc_ok,
        Err(e) => {
            error!("HAL init failed: {} (continuing without light/key)", e);
            false
        }
    };

    let peripherals = Peripherals::take()?;
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )?;

    let mac = device_id::read_mac();
    let dev_id = device_id::device_id(&mac);
    info!("Device ID: {}", dev_id);

    let light_adc = adc_ok.then(|| OneshotLightAdc::new(pins::LIGHT_ADC1_CHANNEL));
    let sensor_hub = SensorHub::bring_up(dev_id, i2c, light_adc, &config);

    // ── 3. Runtime configuration ──────────────────────────────
    if let Err(e) = config_file::mount_storage() {
        warn!("Storage unavailable ({}), runtime config will not persist", e);
    }
    let mut store = FileConfigStore::new(STORAGE_BASE_PATH);
    let runtime = RuntimeConfig::load_from(&store);
    if !runtime.has_credentials() {
        info!("No WiFi credentials stored; send them over BLE");
    }

    // ── 4. Radios ─────────────────────────────────────────────
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let station = EspWifi::new(peripherals.modem, sysloop, Some(nvs))?;
    let mut wifi = WifiAdapter::new(station, config.http_timeout_ms);
    let mut ble = BleAdapter::new();
    let mut sink = LogEventSink::new();

    // ── 5. Watchdog ───────────────────────────────────────────
    // Subscribed only now: the first format of the storage partition and
    // the radio driver bring-up above run unfed.
    let watchdog = Watchdog::new(config.watchdog_timeout_ms);
    let mut hw = HardwareAdapter::new(sensor_hub, watchdog);

    // ── 6. App service + WiFi self-test ───────────────────────
    let key_high = hw.mode_key_high();
    let mut app = AppService::new(
        config.clone(),
        runtime,
        time.uptime_ms(),
        key_high,
        &mut wifi,
        &mut ble,
    );
    app.wifi_selftest(time.uptime_ms(), &mut wifi, &mut FreeRtos, &mut || {
        hw.feed_watchdog()
    });
    app.start(&mut sink);

    info!("System ready. Entering control loop.");

    // ── 7. Control loop ───────────────────────────────────────
    loop {
        let t = TickTime {
            now_ms: time.uptime_ms(),
            unix_secs: time.unix_secs(),
        };
        app.tick(t, &mut hw, &mut wifi, &mut ble, &mut store, &mut sink);
        FreeRtos::delay_ms(LOOP_SLEEP_MS);
    }
}
