//! Board identity.
//!
//! Every [`SensorReading`](crate::sensors::SensorReading) carries
//! `device_id = "SLS-" + last three MAC bytes in uppercase hex`, so the
//! server can tell boards apart without provisioning.  The BLE name stays
//! the configured fixed string so the desktop bridge can find any board.

use core::fmt::Write;

/// `"SLS-XXYYZZ"`, ten characters.
pub type DeviceIdString = heapless::String<16>;

pub type MacAddress = [u8; 6];

/// Base MAC burned into eFuse at the factory.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the call fills exactly six bytes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0x24, 0x6F, 0x28, 0x5A, 0x1C, 0x03]
}

pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "SLS-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_last_three_bytes_uppercase() {
        let id = device_id(&[0x00, 0x11, 0x22, 0xab, 0x0c, 0xff]);
        assert_eq!(id.as_str(), "SLS-AB0CFF");
        assert_eq!(id.len(), 10);
    }

    #[test]
    fn host_mac_is_stable() {
        assert_eq!(device_id(&read_mac()), device_id(&read_mac()));
        assert_eq!(device_id(&read_mac()).as_str(), "SLS-5A1C03");
    }
}
