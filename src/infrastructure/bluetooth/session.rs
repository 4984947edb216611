//! GATT device session
//!
//! One connection's lifecycle as an explicit state machine: connect,
//! service discovery, the timed RED -> GREEN -> disconnect write handshake,
//! and teardown. Hardware outcomes enter through the `on_*` methods, always
//! from the single owner task.

use crate::domain::models::{BleEvent, SessionState};
use crate::error::BleError;
use crate::infrastructure::bluetooth::protocol::{self, StatusColor};
use crate::infrastructure::bluetooth::radio::{GattHandle, LinkState, RadioStack};
use crate::infrastructure::bluetooth::service::{schedule_delay, DelayAction, DelayFired, Input};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct DeviceSession {
    state: SessionState,
    handle: Option<GattHandle>,
    services_discovered: bool,
    // At most one write may be outstanding; acks clear this.
    write_in_flight: bool,
    // Bumped on close and on link loss so scheduled actions armed for an
    // earlier life of the session die quietly.
    generation: u64,
    service_uuid: Uuid,
    characteristic_uuid: Uuid,
    inter_write_delay: Duration,
    events: mpsc::UnboundedSender<BleEvent>,
    inputs: mpsc::UnboundedSender<Input>,
}

impl DeviceSession {
    pub(crate) fn new(
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        inter_write_delay: Duration,
        events: mpsc::UnboundedSender<BleEvent>,
        inputs: mpsc::UnboundedSender<Input>,
    ) -> Self {
        Self {
            state: SessionState::Disconnected,
            handle: None,
            services_discovered: false,
            write_in_flight: false,
            generation: 0,
            service_uuid,
            characteristic_uuid,
            inter_write_delay,
            events,
            inputs,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> Option<GattHandle> {
        self.handle
    }

    fn emit(&self, event: BleEvent) {
        let _ = self.events.send(event);
    }

    fn fail(&self, error: BleError) {
        tracing::warn!(error = %error, "session error");
        self.emit(BleEvent::Error(error));
    }

    fn owns(&self, handle: GattHandle) -> bool {
        self.handle == Some(handle)
    }

    /// Initiate a connection. The address is validated before any hardware
    /// call; the outcome arrives through the connection-state callback.
    pub fn connect<R: RadioStack>(&mut self, radio: &mut R, address: &str) {
        if let Err(e) = protocol::validate_address(address) {
            self.fail(e);
            return;
        }
        if self.handle.is_some() || self.state != SessionState::Disconnected {
            self.fail(BleError::InvalidState {
                operation: "connect",
            });
            return;
        }
        match radio.connect_gatt(address) {
            Ok(handle) => {
                tracing::info!(address, "connecting");
                self.handle = Some(handle);
                self.state = SessionState::Connecting;
            }
            Err(e) => self.fail(e),
        }
    }

    pub(crate) fn on_connection_state_changed<R: RadioStack>(
        &mut self,
        radio: &mut R,
        handle: GattHandle,
        link: LinkState,
    ) {
        if !self.owns(handle) {
            return;
        }
        match link {
            LinkState::Connected => {
                tracing::info!("connected");
                self.state = SessionState::Connected;
                self.emit(BleEvent::Connected);
                // Service discovery starts as soon as the link is up.
                self.state = SessionState::DiscoveringServices;
                radio.discover_services(handle);
            }
            LinkState::Disconnected => {
                let previous = self.state;
                self.generation += 1;
                self.state = SessionState::Disconnected;
                self.services_discovered = false;
                self.write_in_flight = false;
                if Self::mid_sequence(previous) {
                    self.fail(BleError::UnexpectedDisconnect);
                }
                tracing::info!("disconnected");
                self.emit(BleEvent::Disconnected);
            }
        }
    }

    fn mid_sequence(state: SessionState) -> bool {
        matches!(
            state,
            SessionState::WritingRed
                | SessionState::AwaitingRedAck
                | SessionState::SleepingAfterRed
                | SessionState::WritingGreen
                | SessionState::AwaitingGreenAck
                | SessionState::SleepingAfterGreen
        )
    }

    pub(crate) fn on_services_discovered(&mut self, handle: GattHandle, status: i32) {
        if !self.owns(handle) {
            return;
        }
        if status == protocol::GATT_SUCCESS {
            tracing::info!("services discovered");
            self.services_discovered = true;
            self.emit(BleEvent::ServicesDiscovered);
        } else {
            self.fail(BleError::Remote {
                operation: "service discovery",
                status,
            });
        }
    }

    /// Write `payload` to the status characteristic.
    ///
    /// RED and GREEN payloads move the handshake machine; any other payload
    /// is written without affecting it. A synchronous refusal from the
    /// radio leaves the machine where it was.
    pub fn write_characteristic<R: RadioStack>(&mut self, radio: &mut R, payload: &[u8]) {
        let Some(handle) = self.handle else {
            self.fail(BleError::NotInitialized("connection handle"));
            return;
        };
        if self.write_in_flight {
            self.fail(BleError::InvalidState {
                operation: "characteristic write",
            });
            return;
        }
        if !self.services_discovered {
            self.fail(BleError::ServiceNotFound);
            return;
        }
        let Some(service) = radio.get_service(handle, self.service_uuid) else {
            self.fail(BleError::ServiceNotFound);
            return;
        };
        let Some(characteristic) = radio.get_characteristic(service, self.characteristic_uuid)
        else {
            self.fail(BleError::CharacteristicNotFound);
            return;
        };

        let previous = self.state;
        match StatusColor::from_value(payload).ok().flatten() {
            Some(StatusColor::Red) => self.state = SessionState::WritingRed,
            Some(StatusColor::Green) => self.state = SessionState::WritingGreen,
            None => {}
        }

        if !radio.write_characteristic(handle, characteristic, payload) {
            self.state = previous;
            self.fail(BleError::WriteSubmission);
            return;
        }

        self.write_in_flight = true;
        self.state = match self.state {
            SessionState::WritingRed => SessionState::AwaitingRedAck,
            SessionState::WritingGreen => SessionState::AwaitingGreenAck,
            other => other,
        };
        tracing::debug!(len = payload.len(), "write submitted");
    }

    /// A write acknowledgement arrived from the hardware layer.
    ///
    /// Success is reported to the caller whatever the acknowledged value
    /// was; only a decoded RED or GREEN in the matching awaiting state
    /// advances the handshake and arms the next delay.
    pub(crate) fn on_characteristic_written(
        &mut self,
        handle: GattHandle,
        status: i32,
        value: &[u8],
    ) {
        if !self.owns(handle) {
            return;
        }
        self.write_in_flight = false;

        if status != protocol::GATT_SUCCESS {
            if Self::mid_sequence(self.state) {
                self.state = SessionState::DiscoveringServices;
            }
            self.fail(BleError::Remote {
                operation: "characteristic write",
                status,
            });
            return;
        }

        self.emit(BleEvent::WriteSucceeded {
            value: value.to_vec(),
        });

        match StatusColor::from_value(value) {
            Err(e) => {
                // Non-fatal: reported, machine does not advance.
                self.fail(e);
            }
            Ok(Some(StatusColor::Red)) if self.state == SessionState::AwaitingRedAck => {
                self.state = SessionState::SleepingAfterRed;
                schedule_delay(
                    &self.inputs,
                    self.inter_write_delay,
                    DelayFired {
                        generation: self.generation,
                        action: DelayAction::WriteGreen,
                    },
                );
            }
            Ok(Some(StatusColor::Green)) if self.state == SessionState::AwaitingGreenAck => {
                self.state = SessionState::SleepingAfterGreen;
                schedule_delay(
                    &self.inputs,
                    self.inter_write_delay,
                    DelayFired {
                        generation: self.generation,
                        action: DelayAction::Disconnect,
                    },
                );
            }
            // An acknowledged value that matches neither expectation was
            // still reported as a success above; the machine holds.
            Ok(_) => {}
        }
    }

    /// One of the inter-write delays fired.
    pub(crate) fn on_delay<R: RadioStack>(&mut self, radio: &mut R, fired: DelayFired) {
        if fired.generation != self.generation {
            return;
        }
        match fired.action {
            DelayAction::WriteGreen if self.state == SessionState::SleepingAfterRed => {
                self.write_characteristic(radio, StatusColor::Green.as_bytes());
            }
            DelayAction::Disconnect if self.state == SessionState::SleepingAfterGreen => {
                if let Some(handle) = self.handle {
                    self.state = SessionState::Disconnecting;
                    radio.disconnect_gatt(handle);
                }
            }
            _ => {}
        }
    }

    /// Ask the hardware to drop the link. Completion arrives through the
    /// connection-state callback; this does not release the handle.
    pub fn disconnect<R: RadioStack>(&mut self, radio: &mut R) {
        let Some(handle) = self.handle else {
            self.fail(BleError::NotInitialized("connection handle"));
            return;
        };
        // The handle survives a hardware disconnect until close(); do not
        // re-issue the command against a link that is already down.
        if self.state == SessionState::Disconnected {
            self.fail(BleError::InvalidState {
                operation: "disconnect",
            });
            return;
        }
        self.state = SessionState::Disconnecting;
        radio.disconnect_gatt(handle);
    }

    /// Release the connection handle. Safe from any state, idempotent, and
    /// cancels every pending scheduled action for this session.
    pub fn close<R: RadioStack>(&mut self, radio: &mut R) {
        self.generation += 1;
        self.write_in_flight = false;
        self.services_discovered = false;
        self.state = SessionState::Disconnected;
        if let Some(handle) = self.handle.take() {
            radio.close_gatt(handle);
            tracing::info!("connection handle released");
        }
    }
}
