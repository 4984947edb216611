//! Bluetooth Module
//!
//! BLE discovery and the GATT session that drives the accessory's
//! RED -> GREEN -> disconnect status handshake.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    BluetoothService                      │
//! │   (owner task - every state mutation happens here)       │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ one input queue: commands,
//!                       │ radio events, delay firings
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Scanner  │  │  Session   │  │ Protocol │
//! │           │  │            │  │          │
//! │ - precond │  │ - connect  │  │ - UUIDs  │
//! │   gate    │  │ - handshake│  │ - RED/   │
//! │ - deadline│  │   machine  │  │   GREEN  │
//! └───────────┘  └────────────┘  └──────────┘
//!                       │
//!                       ▼
//!               ┌──────────────┐
//!               │  RadioStack  │  (platform BLE stack, abstract)
//!               └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - fixed identifiers, payloads, and timing constants
//! - [`radio`] - the abstract radio/GATT stack and its event surface
//! - [`scanner`] - scan session lifecycle and the scan deadline
//! - [`session`] - one connection's state machine and write sequencing
//! - [`service`] - the owner task tying it all together
//! - [`mock`] - scriptable radio for tests and downstream consumers

pub mod mock;
pub mod protocol;
pub mod radio;
pub mod scanner;
pub mod service;
pub mod session;

// Re-export main service for convenience
pub use service::{BluetoothService, ServiceHandle};
