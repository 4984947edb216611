use thiserror::Error;

/// A scan precondition that must hold before the radio is asked to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The device has no BLE hardware at all.
    BleSupport,
    /// The Bluetooth adapter is present but switched off.
    AdapterEnabled,
    /// Location-data permission has not been granted.
    LocationPermission,
    /// Device location services are disabled.
    LocationService,
}

impl Precondition {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::BleSupport => "BLE is not supported on this device",
            Self::AdapterEnabled => "Bluetooth adapter is disabled",
            Self::LocationPermission => "location permission not granted",
            Self::LocationService => "location services are disabled",
        }
    }
}

/// Address problems caught before any hardware call is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressError {
    Empty,
    Malformed,
    DeviceNotFound,
}

/// Error type for scan and GATT session operations.
///
/// Every variant carries a human-readable description; errors are delivered
/// to the caller through the event channel, never thrown across the
/// asynchronous boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BleError {
    #[error("scan precondition not met: {}", .0.describe())]
    Precondition(Precondition),

    #[error("{0} not initialized")]
    NotInitialized(&'static str),

    #[error("invalid device address: {0:?}")]
    Address(AddressError),

    #[error("status service not found on connected device")]
    ServiceNotFound,

    #[error("status characteristic not found on connected device")]
    CharacteristicNotFound,

    #[error("failed to submit characteristic write")]
    WriteSubmission,

    #[error("failed to decode acknowledged value: {0}")]
    Decode(String),

    #[error("device disconnected unexpectedly")]
    UnexpectedDisconnect,

    #[error("{operation} failed with status {status}")]
    Remote { operation: &'static str, status: i32 },

    #[error("{operation} not valid in the current session state")]
    InvalidState { operation: &'static str },
}
