//! BLE radio layer.
//!
//! This module abstracts the central-role radio behind [`Central`] and
//! [`PeripheralHandle`], and provides the btleplug-backed implementation
//! used outside of tests.

pub mod advertising;
pub mod btleplug_backend;
pub mod central;
#[cfg(test)]
pub(crate) mod fake;
pub mod gatt;
pub mod uuids;

pub use advertising::AdvertisementData;
pub use btleplug_backend::{BtleplugCentral, BtleplugPeripheral};
pub use central::{AdapterState, Central, PeripheralHandle, ScanOptions};
pub use gatt::{find_characteristic, GattCharacteristic, GattService, WriteType};
pub use uuids::*;
