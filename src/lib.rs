// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # rfduino-ble
//!
//! A cross-platform Rust library for talking to RFduino-profile peripherals
//! over Bluetooth Low Energy.
//!
//! The profile is one primary service (`2220`) with three characteristics:
//! disconnect (`2221`), receive (`2222`) and send (`2223`). A peripheral is
//! told to drop the link politely by writing `0x01` to the disconnect
//! characteristic before the central cancels the connection.
//!
//! ## Features
//!
//! - **Scanning**: Discover advertising peripherals, one session per device
//! - **Rescan**: Restart the scan whenever a new device shows up, or every few seconds
//! - **Session lifecycle**: Services, characteristics and notifications set up per device
//! - **Timeouts**: Devices that stay disconnected too long are reported as gone
//! - **Polite disconnect**: Disconnect handshake before tearing down the link
//! - **Observer hooks**: Callbacks for every lifecycle and data event
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rfduino_ble::{ManagerConfig, Result, ScanManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (mut manager, events) = ScanManager::with_btleplug(ManagerConfig::default()).await?;
//!
//!     manager
//!         .observer_mut()
//!         .on_discovered(|session| println!("Found {}", session.display_name()))
//!         .on_data_received(|session, data| {
//!             println!("{}: {:?}", session.display_name(), data);
//!         });
//!
//!     // Scanning starts once the adapter reports it is powered on.
//!     manager.run(events).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Event model
//!
//! Radio completions, timer firings and disconnect acknowledgements all
//! arrive as [`Event`]s on one queue and are applied by
//! [`ScanManager::dispatch`]. Session state is only ever touched from there,
//! so observer hooks see a consistent view.
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod observer;
pub mod scan_manager;
pub mod session;
pub mod timer;

// Re-exports for convenience
pub use ble::{
    AdapterState, AdvertisementData, BtleplugCentral, BtleplugPeripheral, Central,
    GattCharacteristic, GattService, PeripheralHandle, ScanOptions, WriteType,
};
pub use config::{DeviceProfile, ManagerConfig};
pub use error::{Error, Result};
pub use event::{event_channel, CentralEvent, Event, EventReceiver, EventSender};
pub use logging::{is_logging_enabled, set_logging_enabled};
pub use observer::Observer;
pub use scan_manager::ScanManager;
pub use session::{DeviceSession, SessionState, DISCONNECT_COMMAND, UNKNOWN_DEVICE_NAME};
pub use timer::TimerToken;
