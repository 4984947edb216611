//! Scriptable in-memory radio stack.
//!
//! Used by this crate's tests and available to downstream consumers that
//! want to exercise the session machinery without hardware. Preconditions,
//! lookup results and write acceptance are plain public fields; every
//! command is recorded in a shared call log.

use crate::error::BleError;
use crate::infrastructure::bluetooth::radio::{
    CharacteristicRef, GattHandle, RadioStack, ServiceRef,
};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    RequestEnableAdapter,
    RequestLocationPermission,
    RequestEnableLocationService,
    StartRadioScan,
    StopRadioScan,
    ConnectGatt(String),
    DisconnectGatt(GattHandle),
    CloseGatt(GattHandle),
    DiscoverServices(GattHandle),
    WriteCharacteristic {
        handle: GattHandle,
        value: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub struct MockRadio {
    pub ble_support: bool,
    pub adapter_enabled: bool,
    pub location_permission: bool,
    pub location_service: bool,
    pub service_present: bool,
    pub characteristic_present: bool,
    pub write_accepted: bool,
    /// Forced synchronous failure for `connect_gatt`.
    pub connect_error: Option<BleError>,
    next_handle: u64,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self {
            ble_support: true,
            adapter_enabled: true,
            location_permission: true,
            location_service: true,
            service_present: true,
            characteristic_present: true,
            write_accepted: true,
            connect_error: None,
            next_handle: 1,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of every command issued so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().expect("mock call log poisoned").clone()
    }

    /// Shared handle to the call log, for tests that move the radio away.
    pub fn call_log(&self) -> Arc<Mutex<Vec<MockCall>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().expect("mock call log poisoned").push(call);
    }
}

impl Default for MockRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioStack for MockRadio {
    fn has_ble_support(&self) -> bool {
        self.ble_support
    }

    fn is_adapter_enabled(&self) -> bool {
        self.adapter_enabled
    }

    fn request_enable_adapter(&mut self) {
        self.record(MockCall::RequestEnableAdapter);
    }

    fn is_location_permission_granted(&self) -> bool {
        self.location_permission
    }

    fn request_location_permission(&mut self) {
        self.record(MockCall::RequestLocationPermission);
    }

    fn is_location_service_enabled(&self) -> bool {
        self.location_service
    }

    fn request_enable_location_service(&mut self) {
        self.record(MockCall::RequestEnableLocationService);
    }

    fn start_radio_scan(&mut self) -> Result<(), BleError> {
        self.record(MockCall::StartRadioScan);
        Ok(())
    }

    fn stop_radio_scan(&mut self) {
        self.record(MockCall::StopRadioScan);
    }

    fn connect_gatt(&mut self, address: &str) -> Result<GattHandle, BleError> {
        if let Some(e) = self.connect_error.clone() {
            return Err(e);
        }
        self.record(MockCall::ConnectGatt(address.to_string()));
        let handle = GattHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        Ok(handle)
    }

    fn disconnect_gatt(&mut self, handle: GattHandle) {
        self.record(MockCall::DisconnectGatt(handle));
    }

    fn close_gatt(&mut self, handle: GattHandle) {
        self.record(MockCall::CloseGatt(handle));
    }

    fn discover_services(&mut self, handle: GattHandle) {
        self.record(MockCall::DiscoverServices(handle));
    }

    fn get_service(&self, _handle: GattHandle, _service: Uuid) -> Option<ServiceRef> {
        self.service_present.then_some(ServiceRef(1))
    }

    fn get_characteristic(
        &self,
        _service: ServiceRef,
        _characteristic: Uuid,
    ) -> Option<CharacteristicRef> {
        self.characteristic_present.then_some(CharacteristicRef(1))
    }

    fn write_characteristic(
        &mut self,
        handle: GattHandle,
        _characteristic: CharacteristicRef,
        value: &[u8],
    ) -> bool {
        if !self.write_accepted {
            return false;
        }
        self.record(MockCall::WriteCharacteristic {
            handle,
            value: value.to_vec(),
        });
        true
    }
}
