//! BLE scan session
//!
//! Owns the scan start/stop lifecycle, the precondition gate, and the fixed
//! scan-duration deadline. Discovered peripherals are forwarded on the
//! caller's event channel.

use crate::domain::models::{BleEvent, DiscoveredPeripheral, ScanState};
use crate::infrastructure::bluetooth::radio::{ensure_scan_preconditions, RadioStack};
use crate::infrastructure::bluetooth::service::{schedule_delay, DelayAction, DelayFired, Input};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct ScanSession {
    state: ScanState,
    // Bumped whenever the session stops or restarts; a deadline firing with
    // an older generation is stale and ignored.
    generation: u64,
    events: mpsc::UnboundedSender<BleEvent>,
    inputs: mpsc::UnboundedSender<Input>,
}

impl ScanSession {
    pub(crate) fn new(
        events: mpsc::UnboundedSender<BleEvent>,
        inputs: mpsc::UnboundedSender<Input>,
    ) -> Self {
        Self {
            state: ScanState::Idle,
            generation: 0,
            events,
            inputs,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    fn emit(&self, event: BleEvent) {
        let _ = self.events.send(event);
    }

    /// Start scanning for `duration`, restarting any scan already running.
    ///
    /// Precondition failures are reported synchronously and leave the
    /// deadline unarmed.
    pub fn start<R: RadioStack>(&mut self, radio: &mut R, duration: Duration) {
        if self.state == ScanState::Scanning {
            self.stop(radio);
        }

        self.state = ScanState::AwaitingPreconditions;
        if let Err(e) = ensure_scan_preconditions(radio) {
            warn!(error = %e, "scan preconditions not met");
            self.state = ScanState::Idle;
            self.emit(BleEvent::Error(e));
            return;
        }

        if let Err(e) = radio.start_radio_scan() {
            warn!(error = %e, "radio refused to start scanning");
            self.state = ScanState::Idle;
            self.emit(BleEvent::Error(e));
            return;
        }

        self.generation += 1;
        self.state = ScanState::Scanning;
        schedule_delay(
            &self.inputs,
            duration,
            DelayFired {
                generation: self.generation,
                action: DelayAction::ScanDeadline,
            },
        );
        info!(duration_ms = duration.as_millis() as u64, "scan started");
    }

    /// Stop scanning. Always safe to call; a no-op when nothing is running.
    pub fn stop<R: RadioStack>(&mut self, radio: &mut R) {
        // Invalidate any pending deadline even if the radio was never started.
        self.generation += 1;
        if self.state == ScanState::Scanning {
            radio.stop_radio_scan();
            info!("scan stopped");
            self.emit(BleEvent::ScanStopped);
        }
        self.state = ScanState::Stopped;
    }

    /// Scan deadline elapsed.
    pub fn on_deadline<R: RadioStack>(&mut self, radio: &mut R, generation: u64) {
        if generation != self.generation || self.state != ScanState::Scanning {
            return;
        }
        radio.stop_radio_scan();
        self.state = ScanState::Stopped;
        info!("scan period elapsed");
        self.emit(BleEvent::ScanTimedOut);
    }

    /// A peripheral was reported by the radio.
    pub fn on_scan_result(&mut self, address: String, rssi: i16, advertisement: Vec<u8>) {
        // Results may straggle in after a stop; drop them.
        if self.state != ScanState::Scanning {
            return;
        }
        self.emit(BleEvent::PeripheralFound(DiscoveredPeripheral {
            address,
            rssi,
            advertisement,
        }));
    }
}
