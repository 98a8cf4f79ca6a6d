//! WiFi station uploader.
//!
//! Association is fire-and-forget with an exponential backoff that starts at
//! `wifi_backoff_initial_ms` and doubles up to `wifi_backoff_max_ms`.  The
//! backoff is never reset inside one instance; switching channel or
//! receiving new credentials builds a fresh instance.

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use super::TransportError;
use crate::app::ports::{HttpError, WifiPort};
use crate::app::runtime_config::WifiCredentials;
use crate::config::SystemConfig;
use crate::scheduler::deadline_reached;

/// Poll spacing of [`WifiTransport::ensure_connected`].
pub const SELFTEST_POLL_MS: u32 = 200;

pub struct WifiTransport {
    credentials: WifiCredentials,
    retry_interval_ms: u32,
    max_interval_ms: u32,
    next_attempt_ms: Option<u32>,
    attempts: u32,
}

impl WifiTransport {
    pub fn new(credentials: &WifiCredentials, config: &SystemConfig) -> Self {
        Self {
            credentials: credentials.clone(),
            retry_interval_ms: config.wifi_backoff_initial_ms,
            max_interval_ms: config.wifi_backoff_max_ms,
            next_attempt_ms: None,
            attempts: 0,
        }
    }

    /// Returns `true` if associated.  Otherwise issues at most one
    /// association request, and only once the backoff deadline has passed.
    pub fn connect_step(&mut self, now_ms: u32, port: &mut impl WifiPort) -> bool {
        if port.is_associated() {
            return true;
        }
        if self.credentials.ssid.is_empty() {
            debug!("WiFi: no credentials, not associating");
            return false;
        }
        if let Some(deadline) = self.next_attempt_ms {
            if !deadline_reached(now_ms, deadline) {
                return false;
            }
        }

        self.attempts += 1;
        match port.begin_association(&self.credentials.ssid, &self.credentials.password) {
            Ok(()) => info!(
                "WiFi: associating with '{}' (attempt {}, next in {} ms)",
                self.credentials.ssid, self.attempts, self.retry_interval_ms
            ),
            Err(e) => warn!("WiFi: association request failed: {}", e),
        }

        self.next_attempt_ms = Some(now_ms.wrapping_add(self.retry_interval_ms));
        self.retry_interval_ms = self
            .retry_interval_ms
            .saturating_mul(2)
            .min(self.max_interval_ms);
        false
    }

    /// Blocking bring-up self-test: poll [`connect_step`](Self::connect_step)
    /// every [`SELFTEST_POLL_MS`] until associated or `timeout_ms` elapsed.
    /// `feed` runs before every poll so a subscribed watchdog stays quiet.
    /// Returns at once when there is no SSID to associate with.  Never
    /// called from the control loop.
    pub fn ensure_connected(
        &mut self,
        start_ms: u32,
        timeout_ms: u32,
        port: &mut impl WifiPort,
        delay: &mut impl DelayNs,
        feed: &mut impl FnMut(),
    ) -> bool {
        if self.credentials.ssid.is_empty() {
            debug!("WiFi: no credentials, self-test skipped");
            return false;
        }
        let mut elapsed = 0u32;
        loop {
            feed();
            if self.connect_step(start_ms.wrapping_add(elapsed), port) {
                return true;
            }
            if elapsed >= timeout_ms {
                return false;
            }
            delay.delay_ms(SELFTEST_POLL_MS);
            elapsed = elapsed.saturating_add(SELFTEST_POLL_MS);
        }
    }

    /// One JSON upload.  A 2xx status is success.
    pub fn post_json<T: serde::Serialize>(
        &mut self,
        payload: &T,
        url: &str,
        port: &mut impl WifiPort,
    ) -> Result<u16, TransportError> {
        if !port.is_associated() {
            return Err(TransportError::Disconnected);
        }
        let body = serde_json::to_vec(payload).map_err(|_| TransportError::Serialize)?;
        match port.post_json(url, &body) {
            Ok(status) if (200..300).contains(&status) => Ok(status),
            Ok(status) => Err(TransportError::HttpStatus(status)),
            Err(HttpError::ClientMissing) => Err(TransportError::ClientMissing),
            Err(HttpError::Io(detail)) => Err(TransportError::Io(detail)),
        }
    }

    /// Current backoff step (the wait scheduled after the next attempt).
    pub fn retry_interval_ms(&self) -> u32 {
        self.retry_interval_ms
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
