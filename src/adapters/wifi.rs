//! WiFi station-mode adapter.
//!
//! Implements [`WifiPort`]: radio power, a non-blocking association
//! request and a one-shot JSON `POST`.  Backoff and the self-test live in
//! [`transport::wifi`](crate::transport::wifi); this adapter only moves
//! bytes.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` plus the
//!   `embedded-svc` HTTP client over `EspHttpConnection`.
//! - **all other targets**: an in-memory station whose reachability is
//!   set by the caller.

use log::{debug, info, warn};

use crate::app::ports::{HttpError, RadioError, WifiPort};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    http_timeout_ms: u32,
    radio_on: bool,
    /// Simulation: whether an access point answers association requests.
    #[cfg(not(target_os = "espidf"))]
    sim_reachable: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_associated: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_posts: u32,
}

impl WifiAdapter {
    /// Wrap an already-created station driver.  The radio stays off until
    /// [`WifiPort::set_radio_enabled`].
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: EspWifi<'static>, http_timeout_ms: u32) -> Self {
        Self {
            wifi,
            http_timeout_ms,
            radio_on: false,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(http_timeout_ms: u32) -> Self {
        Self {
            http_timeout_ms,
            radio_on: false,
            sim_reachable: false,
            sim_associated: false,
            sim_posts: 0,
        }
    }

    pub fn radio_on(&self) -> bool {
        self.radio_on
    }

    /// Simulation: make the access point appear or vanish.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_reachable(&mut self, reachable: bool) {
        self.sim_reachable = reachable;
        if !reachable {
            self.sim_associated = false;
        }
    }

    /// Simulation: number of POSTs that reached the "server".
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_posts(&self) -> u32 {
        self.sim_posts
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_set_radio(&mut self, enabled: bool) -> Result<(), RadioError> {
        let res = if enabled {
            self.wifi.start()
        } else {
            let _ = self.wifi.disconnect();
            self.wifi.stop()
        };
        res.map_err(|e| RadioError::Driver(e.code()))
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_set_radio(&mut self, enabled: bool) -> Result<(), RadioError> {
        if !enabled {
            self.sim_associated = false;
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_associate(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| RadioError::Unavailable)?,
            password: password.try_into().map_err(|_| RadioError::Unavailable)?,
            auth_method,
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Client(client))
            .map_err(|e| RadioError::Driver(e.code()))?;
        // esp_wifi_connect only queues the request; completion arrives
        // as an event and is observed through `is_associated`.
        self.wifi.connect().map_err(|e| RadioError::Driver(e.code()))
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_associate(&mut self, ssid: &str, _password: &str) -> Result<(), RadioError> {
        if self.sim_reachable {
            self.sim_associated = true;
            info!("WiFi(sim): associated with '{}'", ssid);
        } else {
            debug!("WiFi(sim): '{}' not in range", ssid);
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_associated(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_associated(&self) -> bool {
        self.sim_associated
    }

    #[cfg(target_os = "espidf")]
    fn platform_post(&mut self, url: &str, body: &[u8]) -> Result<u16, HttpError> {
        use embedded_svc::http::client::Client;
        use embedded_svc::io::Write;
        use esp_idf_svc::http::client::{Configuration as HttpConfiguration, EspHttpConnection};

        let config = HttpConfiguration {
            timeout: Some(core::time::Duration::from_millis(u64::from(self.http_timeout_ms))),
            ..Default::default()
        };
        let connection = EspHttpConnection::new(&config).map_err(|e| {
            warn!("HTTP: client init failed ({})", e);
            HttpError::ClientMissing
        })?;
        let mut client = Client::wrap(connection);

        let content_length = body.len().to_string();
        let headers = [
            ("Content-Type", "application/json"),
            ("Content-Length", content_length.as_str()),
        ];
        let mut request = client.post(url, &headers).map_err(HttpError::io)?;
        request.write_all(body).map_err(HttpError::io)?;
        request.flush().map_err(HttpError::io)?;
        let response = request.submit().map_err(HttpError::io)?;
        Ok(response.status())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_post(&mut self, url: &str, body: &[u8]) -> Result<u16, HttpError> {
        if !self.sim_associated {
            return Err(HttpError::io("connection refused"));
        }
        self.sim_posts += 1;
        debug!("WiFi(sim): POST {} ({} bytes, timeout {} ms)", url, body.len(), self.http_timeout_ms);
        Ok(200)
    }
}

// ───────────────────────────────────────────────────────────────
// WifiPort
// ───────────────────────────────────────────────────────────────

impl WifiPort for WifiAdapter {
    fn set_radio_enabled(&mut self, enabled: bool) {
        if self.radio_on == enabled {
            return;
        }
        match self.platform_set_radio(enabled) {
            Ok(()) => {
                self.radio_on = enabled;
                info!("WiFi: radio {}", if enabled { "on" } else { "off" });
            }
            Err(e) => warn!("WiFi: radio {} failed ({})", if enabled { "on" } else { "off" }, e),
        }
    }

    fn is_associated(&self) -> bool {
        self.radio_on && self.platform_is_associated()
    }

    fn begin_association(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        if !self.radio_on {
            return Err(RadioError::Unavailable);
        }
        info!("WiFi: associating with '{}'", ssid);
        self.platform_associate(ssid, password)
    }

    fn post_json(&mut self, url: &str, body: &[u8]) -> Result<u16, HttpError> {
        self.platform_post(url, body)
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
