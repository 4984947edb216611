//! Radio stack boundary
//!
//! The platform BLE stack is consumed through [`RadioStack`]; everything it
//! reports back arrives as a [`RadioEvent`] pushed through a
//! [`RadioEventSink`]. The sink is the marshalling point: an implementation
//! may call it from whatever thread its callbacks run on, and the event is
//! queued onto the single task that owns all session state.

use crate::error::{BleError, Precondition};
use crate::infrastructure::bluetooth::service::Input;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque handle to one GATT connection, issued by the radio stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GattHandle(u64);

impl GattHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Opaque reference to a discovered GATT service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRef(pub u64);

/// Opaque reference to a characteristic within a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicRef(pub u64);

/// Physical link state reported by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
}

/// Asynchronous hardware outcomes, one variant per platform callback.
#[derive(Debug, Clone, PartialEq)]
pub enum RadioEvent {
    ScanResult {
        address: String,
        rssi: i16,
        advertisement: Vec<u8>,
    },
    ConnectionStateChanged {
        handle: GattHandle,
        state: LinkState,
    },
    ServicesDiscovered {
        handle: GattHandle,
        status: i32,
    },
    CharacteristicWritten {
        handle: GattHandle,
        status: i32,
        value: Vec<u8>,
    },
}

/// Thread-safe entry point for radio callbacks.
#[derive(Clone)]
pub struct RadioEventSink {
    inputs: mpsc::UnboundedSender<Input>,
}

impl RadioEventSink {
    pub(crate) fn new(inputs: mpsc::UnboundedSender<Input>) -> Self {
        Self { inputs }
    }

    /// Deliver a hardware event. Silently dropped once the owner task has
    /// shut down.
    pub fn send(&self, event: RadioEvent) {
        let _ = self.inputs.send(Input::Radio(event));
    }
}

/// The platform BLE radio and GATT transport.
///
/// All commands return immediately; outcomes arrive through the sink the
/// implementation was constructed with. Methods taking `&mut self` are only
/// ever called from the owner task.
pub trait RadioStack: Send + 'static {
    fn has_ble_support(&self) -> bool;
    fn is_adapter_enabled(&self) -> bool;
    fn request_enable_adapter(&mut self);
    fn is_location_permission_granted(&self) -> bool;
    fn request_location_permission(&mut self);
    fn is_location_service_enabled(&self) -> bool;
    fn request_enable_location_service(&mut self);

    fn start_radio_scan(&mut self) -> Result<(), BleError>;
    fn stop_radio_scan(&mut self);

    fn connect_gatt(&mut self, address: &str) -> Result<GattHandle, BleError>;
    fn disconnect_gatt(&mut self, handle: GattHandle);
    fn close_gatt(&mut self, handle: GattHandle);
    fn discover_services(&mut self, handle: GattHandle);
    fn get_service(&self, handle: GattHandle, service: Uuid) -> Option<ServiceRef>;
    fn get_characteristic(
        &self,
        service: ServiceRef,
        characteristic: Uuid,
    ) -> Option<CharacteristicRef>;
    fn write_characteristic(
        &mut self,
        handle: GattHandle,
        characteristic: CharacteristicRef,
        value: &[u8],
    ) -> bool;
}

/// Check the scan preconditions in order, firing the matching remediation
/// request for the first one that fails.
///
/// A failure here is synchronous and must not start any scan machinery.
pub fn ensure_scan_preconditions<R: RadioStack>(radio: &mut R) -> Result<(), BleError> {
    if !radio.has_ble_support() {
        return Err(BleError::Precondition(Precondition::BleSupport));
    }
    if !radio.is_adapter_enabled() {
        radio.request_enable_adapter();
        return Err(BleError::Precondition(Precondition::AdapterEnabled));
    }
    if !radio.is_location_permission_granted() {
        radio.request_location_permission();
        return Err(BleError::Precondition(Precondition::LocationPermission));
    }
    if !radio.is_location_service_enabled() {
        radio.request_enable_location_service();
        return Err(BleError::Precondition(Precondition::LocationService));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::mock::{MockCall, MockRadio};

    #[test]
    fn test_preconditions_pass_on_healthy_stack() {
        let mut radio = MockRadio::new();
        assert!(ensure_scan_preconditions(&mut radio).is_ok());
        assert!(radio.calls().is_empty());
    }

    #[test]
    fn test_first_failing_precondition_wins() {
        let mut radio = MockRadio::new();
        radio.adapter_enabled = false;
        radio.location_service = false;
        let err = ensure_scan_preconditions(&mut radio).unwrap_err();
        assert_eq!(err, BleError::Precondition(Precondition::AdapterEnabled));
        // only the adapter remediation fired
        assert_eq!(radio.calls(), vec![MockCall::RequestEnableAdapter]);
    }

    #[test]
    fn test_missing_capability_requests_nothing() {
        let mut radio = MockRadio::new();
        radio.ble_support = false;
        let err = ensure_scan_preconditions(&mut radio).unwrap_err();
        assert_eq!(err, BleError::Precondition(Precondition::BleSupport));
        assert!(radio.calls().is_empty());
    }

    #[test]
    fn test_location_service_checked_last() {
        let mut radio = MockRadio::new();
        radio.location_service = false;
        let err = ensure_scan_preconditions(&mut radio).unwrap_err();
        assert_eq!(err, BleError::Precondition(Precondition::LocationService));
        assert_eq!(radio.calls(), vec![MockCall::RequestEnableLocationService]);
    }
}
