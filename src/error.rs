//! Unified error taxonomy for the Lab Sentinel firmware.
//!
//! Every boundary (I2C transaction, ADC read, HTTP POST, JSON parse, file
//! I/O) returns an explicit `Result`.  Nothing here is fatal: the control
//! loop logs the error, degrades the affected value to `null`/a status tag,
//! and carries on.  The only hard stop is the task watchdog.
//!
//! All variants are `Copy` so they can be stored in readings and events
//! without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every degraded path in the firmware can be described by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The BMP280 was not found on the bus at bring-up.
    SensorUnavailable,
    /// A sensor transaction failed mid-flight.
    SensorRead(SensorError),
    /// Upload attempted while the station was not associated.
    TransportDisconnected,
    /// Upload or notify attempted and failed.
    TransportSend,
    /// A peer frame could not be turned into a command.
    CommandParse(CommandError),
    /// The persisted runtime configuration was unreadable.
    ConfigCorrupt,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorUnavailable => write!(f, "sensor unavailable"),
            Self::SensorRead(e) => write!(f, "sensor: {e}"),
            Self::TransportDisconnected => write!(f, "transport disconnected"),
            Self::TransportSend => write!(f, "transport send failed"),
            Self::CommandParse(e) => write!(f, "command: {e}"),
            Self::ConfigCorrupt => write!(f, "runtime config corrupt"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The addressed device did not ACK.
    I2cNoAcknowledge,
    /// Bus error or arbitration loss.
    I2cBus,
    /// Any other I2C driver failure.
    I2cOther,
    /// ADC oneshot read returned an error.
    AdcReadFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I2cNoAcknowledge => write!(f, "I2C no acknowledge"),
            Self::I2cBus => write!(f, "I2C bus error"),
            Self::I2cOther => write!(f, "I2C transaction failed"),
            Self::AdcReadFailed => write!(f, "ADC read failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::SensorRead(e)
    }
}

impl SensorError {
    /// Classify an `embedded-hal` I2C error.
    pub fn from_i2c<E: embedded_hal::i2c::Error>(e: &E) -> Self {
        use embedded_hal::i2c::ErrorKind;
        match e.kind() {
            ErrorKind::NoAcknowledge(_) => Self::I2cNoAcknowledge,
            ErrorKind::Bus | ErrorKind::ArbitrationLoss => Self::I2cBus,
            _ => Self::I2cOther,
        }
    }
}

// ---------------------------------------------------------------------------
// Peer command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Frame was not valid JSON (or not UTF-8).
    InvalidJson,
    /// Frame exceeded the assembly buffer.
    FrameTooLong,
    /// JSON was valid but not an object carrying a string `type`.
    MissingType,
    /// `type` named a command this firmware does not implement.
    UnknownType,
    /// SSID empty, longer than 32 bytes, or not printable ASCII.
    InvalidSsid,
    /// Password neither empty nor 8–64 bytes.
    InvalidPassword,
    /// A threshold value was missing, non-numeric or non-finite.
    InvalidThreshold,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "frame is not valid JSON"),
            Self::FrameTooLong => write!(f, "frame exceeds assembly buffer"),
            Self::MissingType => write!(f, "missing command type"),
            Self::UnknownType => write!(f, "unknown command type"),
            Self::InvalidSsid => write!(f, "SSID invalid (1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (8-64 bytes for WPA2, or empty)"),
            Self::InvalidThreshold => write!(f, "threshold values must be finite numbers"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::CommandParse(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_error_display_is_status_friendly() {
        let e = Error::from(SensorError::I2cNoAcknowledge);
        assert_eq!(format!("{e}"), "sensor: I2C no acknowledge");
        assert_eq!(format!("{}", SensorError::AdcReadFailed), "ADC read failed");
    }

    #[test]
    fn command_error_converts() {
        let e: Error = CommandError::InvalidThreshold.into();
        assert_eq!(e, Error::CommandParse(CommandError::InvalidThreshold));
        assert_eq!(
            Error::from(CommandError::FrameTooLong).to_string(),
            "command: frame exceeds assembly buffer"
        );
    }
}
