//! BLE Service and Characteristic UUIDs.
//!
//! Contains the default RFduino profile identifiers and helpers for turning
//! the short textual forms ("2220") into full 128-bit UUIDs.

use uuid::Uuid;

use crate::error::{Error, Result};

/// Bluetooth Base UUID (`00000000-0000-1000-8000-00805f9b34fb`).
pub const BLUETOOTH_BASE_UUID: Uuid = Uuid::from_u128(0x0000_0000_0000_1000_8000_00805f9b34fb);

/// Default RFduino service UUID, also used as the scan filter.
pub const DISCOVER_SERVICE_UUID: Uuid = from_short(0x2220);
/// Default disconnect-control characteristic UUID.
pub const DISCONNECT_CHARACTERISTIC_UUID: Uuid = from_short(0x2221);
/// Default receive characteristic UUID (notifications from the device).
pub const RECEIVE_CHARACTERISTIC_UUID: Uuid = from_short(0x2222);
/// Default send characteristic UUID (writes to the device).
pub const SEND_CHARACTERISTIC_UUID: Uuid = from_short(0x2223);

/// Expand a 16-bit assigned number onto the Bluetooth Base UUID.
pub const fn from_short(short: u16) -> Uuid {
    from_short_u32(short as u32)
}

/// Expand a 32-bit assigned number onto the Bluetooth Base UUID.
pub const fn from_short_u32(short: u32) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID.as_u128() | ((short as u128) << 96))
}

/// Parse a UUID in 16-bit ("2220"), 32-bit ("0000fe59") or full 128-bit form.
pub fn parse_uuid(value: &str) -> Result<Uuid> {
    let trimmed = value.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let invalid = || Error::InvalidUuid {
        value: value.to_string(),
    };

    let is_short = hex.len() == 4 || hex.len() == 8;
    if is_short && !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    match hex.len() {
        4 => u16::from_str_radix(hex, 16)
            .map(from_short)
            .map_err(|_| invalid()),
        8 => u32::from_str_radix(hex, 16)
            .map(from_short_u32)
            .map_err(|_| invalid()),
        _ => Uuid::parse_str(hex).map_err(|_| invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        let discover = DISCOVER_SERVICE_UUID.to_string();
        assert_eq!(discover, "00002220-0000-1000-8000-00805f9b34fb");

        let send = SEND_CHARACTERISTIC_UUID.to_string();
        assert!(send.starts_with("00002223"));
    }

    #[test]
    fn test_parse_short_forms() {
        assert_eq!(parse_uuid("2220").unwrap(), DISCOVER_SERVICE_UUID);
        assert_eq!(parse_uuid("0x2221").unwrap(), DISCONNECT_CHARACTERISTIC_UUID);
        assert_eq!(parse_uuid("00002222").unwrap(), RECEIVE_CHARACTERISTIC_UUID);
        assert_eq!(
            parse_uuid("00002223-0000-1000-8000-00805f9b34fb").unwrap(),
            SEND_CHARACTERISTIC_UUID
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_uuid("22"), Err(Error::InvalidUuid { .. })));
        assert!(matches!(parse_uuid("zzzz"), Err(Error::InvalidUuid { .. })));
        assert!(matches!(parse_uuid(""), Err(Error::InvalidUuid { .. })));
        assert!(matches!(parse_uuid("+222"), Err(Error::InvalidUuid { .. })));
        assert!(matches!(parse_uuid("0x+2220"), Err(Error::InvalidUuid { .. })));
        assert!(matches!(parse_uuid("+0002220"), Err(Error::InvalidUuid { .. })));
    }
}
