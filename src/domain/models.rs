use crate::error::BleError;

/// A peripheral reported by the radio during an active scan.
///
/// Immutable value; produced once per advertisement received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeripheral {
    /// Hardware address in `AA:BB:CC:DD:EE:FF` form.
    pub address: String,
    /// Signal strength in dBm.
    pub rssi: i16,
    /// Raw advertisement payload.
    pub advertisement: Vec<u8>,
}

/// Scan session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    AwaitingPreconditions,
    Scanning,
    Stopped,
}

/// Device session lifecycle, including the timed RED/GREEN write handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    DiscoveringServices,
    WritingRed,
    AwaitingRedAck,
    SleepingAfterRed,
    WritingGreen,
    AwaitingGreenAck,
    SleepingAfterGreen,
    Disconnecting,
}

/// Everything the library reports back to its caller.
///
/// One tagged enum instead of a many-method listener so consumers can match
/// exhaustively and tests can assert on a plain value stream.
#[derive(Debug, Clone, PartialEq)]
pub enum BleEvent {
    PeripheralFound(DiscoveredPeripheral),
    ScanStopped,
    ScanTimedOut,
    Connected,
    Disconnected,
    ServicesDiscovered,
    WriteSucceeded { value: Vec<u8> },
    Error(BleError),
}
