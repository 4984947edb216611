//! Status-lamp accessory protocol
//!
//! Fixed identifiers and payloads for the RED/GREEN signalling handshake
//! understood by the accessory firmware.

use crate::error::{AddressError, BleError};
use anyhow::Context;
use uuid::Uuid;

/// Status service UUID exposed by the accessory.
pub const SERVICE_UUID: &str = "aab7643f-bd0c-4bfd-8547-4027364bd723";

/// Writable status characteristic inside the status service.
pub const CHARACTERISTIC_UUID: &str = "60ff3470-dab6-4890-910d-cac5911ed642";

/// Recognized status payloads, exact UTF-8, case sensitive.
pub const RED_STATUS: &str = "RED";
pub const GREEN_STATUS: &str = "GREEN";

/// Delay between the two handshake writes, and before the final disconnect.
pub const INTER_WRITE_DELAY_MS: u64 = 1_000;

/// Stops scanning after 10 seconds.
pub const SCAN_PERIOD_MS: u64 = 10_000;

/// Status code the hardware layer reports for a successful GATT operation.
pub const GATT_SUCCESS: i32 = 0;

/// The two states the handshake signals to the accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Red,
    Green,
}

impl StatusColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => RED_STATUS,
            Self::Green => GREEN_STATUS,
        }
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        self.as_str().as_bytes()
    }

    /// Decode an acknowledged characteristic value.
    ///
    /// Returns `Ok(None)` for a well-formed string that is neither payload;
    /// invalid UTF-8 is a decode error.
    pub fn from_value(value: &[u8]) -> Result<Option<Self>, BleError> {
        let text = std::str::from_utf8(value).map_err(|e| BleError::Decode(e.to_string()))?;
        Ok(match text {
            RED_STATUS => Some(Self::Red),
            GREEN_STATUS => Some(Self::Green),
            _ => None,
        })
    }
}

/// Parse one of the fixed 128-bit identifiers.
pub fn parse_uuid(uuid_str: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(uuid_str).with_context(|| format!("invalid UUID: {uuid_str}"))
}

/// Check a hardware address before it is handed to the radio.
///
/// Addresses are the usual six colon-separated hex octets.
pub fn validate_address(address: &str) -> Result<(), BleError> {
    if address.is_empty() {
        return Err(BleError::Address(AddressError::Empty));
    }
    let octets: Vec<&str> = address.split(':').collect();
    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    if !well_formed {
        return Err(BleError::Address(AddressError::Malformed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid() {
        let uuid = parse_uuid(SERVICE_UUID).unwrap();
        assert_eq!(uuid.hyphenated().to_string(), SERVICE_UUID);
        assert!(parse_uuid("not-a-uuid").is_err());
    }

    #[test]
    fn test_status_payload_bytes() {
        assert_eq!(StatusColor::Red.as_bytes(), b"RED");
        assert_eq!(StatusColor::Green.as_bytes(), b"GREEN");
    }

    #[test]
    fn test_decode_acknowledged_value() {
        assert_eq!(
            StatusColor::from_value(b"RED").unwrap(),
            Some(StatusColor::Red)
        );
        assert_eq!(
            StatusColor::from_value(b"GREEN").unwrap(),
            Some(StatusColor::Green)
        );
        // case sensitive, no trimming
        assert_eq!(StatusColor::from_value(b"red").unwrap(), None);
        assert_eq!(StatusColor::from_value(b"RED ").unwrap(), None);
        assert_eq!(StatusColor::from_value(b"AMBER").unwrap(), None);
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let err = StatusColor::from_value(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, BleError::Decode(_)));
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("AA:BB:CC:DD:EE:FF").is_ok());
        assert!(validate_address("aa:bb:cc:dd:ee:0f").is_ok());
        assert_eq!(
            validate_address(""),
            Err(BleError::Address(AddressError::Empty))
        );
        assert_eq!(
            validate_address("AA:BB:CC:DD:EE"),
            Err(BleError::Address(AddressError::Malformed))
        );
        assert_eq!(
            validate_address("AA:BB:CC:DD:EE:GG"),
            Err(BleError::Address(AddressError::Malformed))
        );
        assert_eq!(
            validate_address("AABBCCDDEEFF"),
            Err(BleError::Address(AddressError::Malformed))
        );
    }
}
