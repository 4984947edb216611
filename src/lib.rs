//! statuslink
//!
//! Client library for a single-purpose BLE status-lamp accessory: discover
//! nearby peripherals, connect to one, and drive the fixed
//! RED -> GREEN -> disconnect characteristic-write handshake its firmware
//! expects.
//!
//! The platform BLE stack is abstracted behind
//! [`RadioStack`](infrastructure::bluetooth::radio::RadioStack); all state
//! lives on a single owner task and everything the library has to say comes
//! back as [`BleEvent`](domain::models::BleEvent) values on one channel.
//!
//! ```no_run
//! use statuslink::domain::settings::Settings;
//! use statuslink::infrastructure::bluetooth::mock::MockRadio;
//! use statuslink::infrastructure::bluetooth::BluetoothService;
//! use tokio::sync::mpsc;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let settings = Settings::default();
//! let (events_tx, mut events) = mpsc::unbounded_channel();
//! let handle = BluetoothService::spawn(&settings, |_sink| MockRadio::new(), events_tx)?;
//!
//! handle.start_scan();
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::models::{BleEvent, DiscoveredPeripheral, ScanState, SessionState};
pub use domain::settings::{LogSettings, Settings, SettingsService};
pub use error::{AddressError, BleError, Precondition};
pub use infrastructure::bluetooth::protocol::StatusColor;
pub use infrastructure::bluetooth::radio::{
    CharacteristicRef, GattHandle, LinkState, RadioEvent, RadioEventSink, RadioStack, ServiceRef,
};
pub use infrastructure::bluetooth::{BluetoothService, ServiceHandle};
