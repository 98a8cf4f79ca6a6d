//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements                  | Connects to                 |
//! |---------------|-----------------------------|-----------------------------|
//! | `ble`         | BlePort                     | Bluedroid GATT server (NUS) |
//! | `config_file` | ConfigPort                  | SPIFFS / host filesystem    |
//! | `device_id`   | —                           | eFuse factory MAC           |
//! | `hardware`    | SensorPort, ButtonPort,     | BMP280, ADC1, GPIO, TWDT    |
//! |               | DiagnosticsPort             | heap allocator              |
//! | `log_sink`    | EventSink                   | Serial log output           |
//! | `time`        | —                           | ESP32 system timer          |
//! | `wifi`        | WifiPort                    | ESP-IDF WiFi STA + HTTP     |

pub mod ble;
pub mod config_file;
pub mod device_id;
pub mod hardware;
pub mod log_sink;
pub mod time;
pub mod wifi;
