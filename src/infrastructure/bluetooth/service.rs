//! Bluetooth service module
//!
//! The single logical owner of all BLE state. Commands from the caller,
//! hardware events from the radio, and timer firings all funnel into one
//! queue consumed by one task, so session state is only ever mutated from
//! one place.

use crate::domain::models::BleEvent;
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::protocol::{self, StatusColor};
use crate::infrastructure::bluetooth::radio::{RadioEvent, RadioEventSink, RadioStack};
use crate::infrastructure::bluetooth::scanner::ScanSession;
use crate::infrastructure::bluetooth::session::DeviceSession;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// What a scheduled delay should do when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DelayAction {
    ScanDeadline,
    WriteGreen,
    Disconnect,
}

/// A delay firing, tagged with the generation of the session that armed it.
/// Stale generations are dropped by the receiving session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DelayFired {
    pub generation: u64,
    pub action: DelayAction,
}

/// Caller requests, delivered through [`ServiceHandle`].
#[derive(Debug, Clone)]
pub(crate) enum Command {
    StartScan { duration: Option<Duration> },
    StopScan,
    Connect { address: String },
    WriteCharacteristic { payload: Vec<u8> },
    StartStatusSequence,
    Disconnect,
    Close,
    Shutdown,
}

/// Everything the owner task consumes.
#[derive(Debug, Clone)]
pub(crate) enum Input {
    Command(Command),
    Radio(RadioEvent),
    Delay(DelayFired),
}

/// Arm a cancellable delay. The sleep runs off the owner task; the firing
/// re-enters it as a queued input, so the generation check happens under
/// the same single-threaded ownership as every other mutation.
pub(crate) fn schedule_delay(
    inputs: &mpsc::UnboundedSender<Input>,
    after: Duration,
    fired: DelayFired,
) {
    let tx = inputs.clone();
    // The deadline is anchored here, not at the spawned task's first poll;
    // otherwise a paused test clock advanced before that poll is missed.
    let sleep = tokio::time::sleep(after);
    tokio::spawn(async move {
        sleep.await;
        let _ = tx.send(Input::Delay(fired));
    });
}

/// Coordinates the scan session and the device session over one radio.
pub struct BluetoothService<R: RadioStack> {
    radio: R,
    scanner: ScanSession,
    session: DeviceSession,
    scan_duration: Duration,
}

impl<R: RadioStack> BluetoothService<R> {
    /// Spawn the owner task.
    ///
    /// `make_radio` receives the sink the radio must deliver its callbacks
    /// through. Events for the caller are pushed on `events`; every method
    /// on the returned handle is fire-and-forget.
    pub fn spawn<F>(
        settings: &Settings,
        make_radio: F,
        events: mpsc::UnboundedSender<BleEvent>,
    ) -> anyhow::Result<ServiceHandle>
    where
        F: FnOnce(RadioEventSink) -> R,
    {
        let service_uuid = protocol::parse_uuid(&settings.ble_service_uuid)?;
        let characteristic_uuid = protocol::parse_uuid(&settings.ble_characteristic_uuid)?;

        let (inputs, mut rx) = mpsc::unbounded_channel();
        let radio = make_radio(RadioEventSink::new(inputs.clone()));

        let mut service = BluetoothService {
            radio,
            scanner: ScanSession::new(events.clone(), inputs.clone()),
            session: DeviceSession::new(
                service_uuid,
                characteristic_uuid,
                Duration::from_millis(settings.inter_write_delay_ms),
                events,
                inputs.clone(),
            ),
            scan_duration: Duration::from_millis(settings.scan_duration_ms),
        };

        tokio::spawn(async move {
            info!("bluetooth service started");
            while let Some(input) = rx.recv().await {
                if matches!(input, Input::Command(Command::Shutdown)) {
                    service.session.close(&mut service.radio);
                    service.scanner.stop(&mut service.radio);
                    break;
                }
                service.handle(input);
            }
            info!("bluetooth service stopped");
        });

        Ok(ServiceHandle { inputs })
    }

    /// Single mutation entry point for every kind of input.
    fn handle(&mut self, input: Input) {
        debug!(?input, "handling input");
        match input {
            Input::Command(cmd) => match cmd {
                Command::StartScan { duration } => self
                    .scanner
                    .start(&mut self.radio, duration.unwrap_or(self.scan_duration)),
                Command::StopScan => self.scanner.stop(&mut self.radio),
                Command::Connect { address } => self.session.connect(&mut self.radio, &address),
                Command::WriteCharacteristic { payload } => self
                    .session
                    .write_characteristic(&mut self.radio, &payload),
                Command::StartStatusSequence => self
                    .session
                    .write_characteristic(&mut self.radio, StatusColor::Red.as_bytes()),
                Command::Disconnect => self.session.disconnect(&mut self.radio),
                Command::Close => self.session.close(&mut self.radio),
                Command::Shutdown => unreachable!("handled by the run loop"),
            },
            Input::Radio(event) => match event {
                RadioEvent::ScanResult {
                    address,
                    rssi,
                    advertisement,
                } => self.scanner.on_scan_result(address, rssi, advertisement),
                RadioEvent::ConnectionStateChanged { handle, state } => self
                    .session
                    .on_connection_state_changed(&mut self.radio, handle, state),
                RadioEvent::ServicesDiscovered { handle, status } => {
                    self.session.on_services_discovered(handle, status)
                }
                RadioEvent::CharacteristicWritten {
                    handle,
                    status,
                    value,
                } => self
                    .session
                    .on_characteristic_written(handle, status, &value),
            },
            Input::Delay(fired) => match fired.action {
                DelayAction::ScanDeadline => {
                    self.scanner.on_deadline(&mut self.radio, fired.generation)
                }
                DelayAction::WriteGreen | DelayAction::Disconnect => {
                    self.session.on_delay(&mut self.radio, fired)
                }
            },
        }
    }
}

/// Cloneable, fire-and-forget front door to the owner task.
///
/// All outcomes, including every error, arrive on the event channel the
/// service was spawned with.
#[derive(Clone)]
pub struct ServiceHandle {
    inputs: mpsc::UnboundedSender<Input>,
}

impl ServiceHandle {
    fn send(&self, command: Command) {
        let _ = self.inputs.send(Input::Command(command));
    }

    /// Begin scanning with the configured duration.
    pub fn start_scan(&self) {
        self.send(Command::StartScan { duration: None });
    }

    /// Begin scanning with an explicit duration.
    pub fn start_scan_for(&self, duration: Duration) {
        self.send(Command::StartScan {
            duration: Some(duration),
        });
    }

    pub fn stop_scan(&self) {
        self.send(Command::StopScan);
    }

    /// Connect to a previously discovered address.
    pub fn connect(&self, address: impl Into<String>) {
        self.send(Command::Connect {
            address: address.into(),
        });
    }

    /// Write an arbitrary payload to the status characteristic.
    pub fn write_characteristic(&self, payload: Vec<u8>) {
        self.send(Command::WriteCharacteristic { payload });
    }

    /// Kick off the RED -> GREEN -> disconnect handshake. Call after
    /// services have been discovered.
    pub fn start_status_sequence(&self) {
        self.send(Command::StartStatusSequence);
    }

    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    /// Release the connection handle. Terminal call before discarding the
    /// session; safe to repeat.
    pub fn close(&self) {
        self.send(Command::Close);
    }

    /// Tear down the owner task, closing any live connection first.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }
}
