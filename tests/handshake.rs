//! End-to-end tests driving the owner task through a scripted radio.

use statuslink::infrastructure::bluetooth::mock::{MockCall, MockRadio};
use statuslink::infrastructure::bluetooth::BluetoothService;
use statuslink::{
    BleError, BleEvent, GattHandle, LinkState, Precondition, RadioEvent, RadioEventSink, Settings,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

struct Harness {
    handle: statuslink::ServiceHandle,
    sink: RadioEventSink,
    events: mpsc::UnboundedReceiver<BleEvent>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

fn harness(configure: impl FnOnce(&mut MockRadio)) -> Harness {
    let mut radio = MockRadio::new();
    configure(&mut radio);
    let calls = radio.call_log();
    let (events_tx, events) = mpsc::unbounded_channel();
    let mut sink_slot = None;
    let handle = BluetoothService::spawn(
        &Settings::default(),
        |sink| {
            sink_slot = Some(sink);
            radio
        },
        events_tx,
    )
    .expect("spawn");
    Harness {
        handle,
        sink: sink_slot.expect("sink handed to radio constructor"),
        events,
        calls,
    }
}

impl Harness {
    fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Spin the owner task until `pred` holds for the call log.
    async fn wait_for_call(&self, pred: impl Fn(&[MockCall]) -> bool) {
        for _ in 0..500 {
            if pred(&self.calls()) {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected call never issued; log: {:?}", self.calls());
    }

    async fn expect_event(&mut self, expected: BleEvent) {
        let event = self.events.recv().await.expect("event channel closed");
        assert_eq!(event, expected);
    }

    /// Let queued work drain, then assert no event is pending.
    async fn expect_silence(&mut self) {
        for _ in 0..200 {
            tokio::task::yield_now().await;
        }
        assert!(
            self.events.try_recv().is_err(),
            "unexpected event was delivered"
        );
    }

    fn writes(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::WriteCharacteristic { value, .. } => Some(value),
                _ => None,
            })
            .collect()
    }
}

#[tokio::test(start_paused = true)]
async fn full_handshake_red_green_disconnect() {
    let mut h = harness(|_| {});
    let gatt = GattHandle::from_raw(1);

    h.handle.connect(ADDRESS);
    h.wait_for_call(|c| c.contains(&MockCall::ConnectGatt(ADDRESS.into())))
        .await;

    h.sink.send(RadioEvent::ConnectionStateChanged {
        handle: gatt,
        state: LinkState::Connected,
    });
    h.expect_event(BleEvent::Connected).await;
    h.wait_for_call(|c| c.contains(&MockCall::DiscoverServices(gatt)))
        .await;

    h.sink.send(RadioEvent::ServicesDiscovered {
        handle: gatt,
        status: 0,
    });
    h.expect_event(BleEvent::ServicesDiscovered).await;

    h.handle.start_status_sequence();
    h.wait_for_call(|c| {
        c.contains(&MockCall::WriteCharacteristic {
            handle: gatt,
            value: b"RED".to_vec(),
        })
    })
    .await;

    h.sink.send(RadioEvent::CharacteristicWritten {
        handle: gatt,
        status: 0,
        value: b"RED".to_vec(),
    });
    h.expect_event(BleEvent::WriteSucceeded {
        value: b"RED".to_vec(),
    })
    .await;

    // GREEN must not go out before the full 1000 ms delay.
    tokio::time::advance(Duration::from_millis(999)).await;
    for _ in 0..200 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.writes(), vec![b"RED".to_vec()]);
    assert!(!h.calls().contains(&MockCall::DisconnectGatt(gatt)));

    tokio::time::advance(Duration::from_millis(2)).await;
    h.wait_for_call(|c| {
        c.contains(&MockCall::WriteCharacteristic {
            handle: gatt,
            value: b"GREEN".to_vec(),
        })
    })
    .await;

    h.sink.send(RadioEvent::CharacteristicWritten {
        handle: gatt,
        status: 0,
        value: b"GREEN".to_vec(),
    });
    h.expect_event(BleEvent::WriteSucceeded {
        value: b"GREEN".to_vec(),
    })
    .await;

    tokio::time::advance(Duration::from_millis(1_001)).await;
    h.wait_for_call(|c| c.contains(&MockCall::DisconnectGatt(gatt)))
        .await;

    h.sink.send(RadioEvent::ConnectionStateChanged {
        handle: gatt,
        state: LinkState::Disconnected,
    });
    h.expect_event(BleEvent::Disconnected).await;

    h.handle.close();
    h.wait_for_call(|c| c.contains(&MockCall::CloseGatt(gatt)))
        .await;

    assert_eq!(h.writes(), vec![b"RED".to_vec(), b"GREEN".to_vec()]);
}

#[tokio::test(start_paused = true)]
async fn discovery_failure_133_means_no_write_is_ever_attempted() {
    // Discovery never completes, so the status service is never visible.
    let mut h = harness(|radio| radio.service_present = false);
    let gatt = GattHandle::from_raw(1);

    h.handle.connect(ADDRESS);
    h.sink.send(RadioEvent::ConnectionStateChanged {
        handle: gatt,
        state: LinkState::Connected,
    });
    h.expect_event(BleEvent::Connected).await;

    h.sink.send(RadioEvent::ServicesDiscovered {
        handle: gatt,
        status: 133,
    });
    h.expect_event(BleEvent::Error(BleError::Remote {
        operation: "service discovery",
        status: 133,
    }))
    .await;

    h.handle.start_status_sequence();
    h.expect_event(BleEvent::Error(BleError::ServiceNotFound))
        .await;
    assert!(h.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn scan_delivers_results_then_times_out() {
    let mut h = harness(|_| {});

    h.handle.start_scan();
    h.wait_for_call(|c| c.contains(&MockCall::StartRadioScan))
        .await;

    h.sink.send(RadioEvent::ScanResult {
        address: ADDRESS.into(),
        rssi: -58,
        advertisement: vec![0x02, 0x01, 0x06],
    });
    match h.events.recv().await.unwrap() {
        BleEvent::PeripheralFound(p) => {
            assert_eq!(p.address, ADDRESS);
            assert_eq!(p.rssi, -58);
        }
        other => panic!("expected a discovery, got {other:?}"),
    }

    tokio::time::advance(Duration::from_millis(10_001)).await;
    h.expect_event(BleEvent::ScanTimedOut).await;
    h.wait_for_call(|c| c.contains(&MockCall::StopRadioScan))
        .await;
}

#[tokio::test(start_paused = true)]
async fn stopping_before_deadline_suppresses_timeout() {
    let mut h = harness(|_| {});

    h.handle.start_scan();
    h.wait_for_call(|c| c.contains(&MockCall::StartRadioScan))
        .await;

    h.handle.stop_scan();
    h.expect_event(BleEvent::ScanStopped).await;

    tokio::time::advance(Duration::from_millis(10_001)).await;
    h.expect_silence().await;
}

#[tokio::test(start_paused = true)]
async fn precondition_failure_is_reported_through_events() {
    let mut h = harness(|radio| radio.location_service = false);

    h.handle.start_scan();
    h.expect_event(BleEvent::Error(BleError::Precondition(
        Precondition::LocationService,
    )))
    .await;
    assert!(!h.calls().contains(&MockCall::StartRadioScan));
    assert!(h
        .calls()
        .contains(&MockCall::RequestEnableLocationService));
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_a_live_connection() {
    let mut h = harness(|_| {});
    let gatt = GattHandle::from_raw(1);

    h.handle.connect(ADDRESS);
    h.sink.send(RadioEvent::ConnectionStateChanged {
        handle: gatt,
        state: LinkState::Connected,
    });
    h.expect_event(BleEvent::Connected).await;

    h.handle.shutdown();
    h.wait_for_call(|c| c.contains(&MockCall::CloseGatt(gatt)))
        .await;
}
