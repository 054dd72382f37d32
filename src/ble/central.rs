//! Radio boundary.
//!
//! The session layer never talks to a BLE library directly. It issues
//! fire-and-forget commands through [`Central`] and [`PeripheralHandle`], and
//! every result comes back later as a [`CentralEvent`](crate::event::CentralEvent)
//! on the event queue.

use std::fmt::Debug;
use std::hash::Hash;

use uuid::Uuid;

use crate::ble::gatt::{GattCharacteristic, GattService, WriteType};

/// Power/authorization state of the local radio adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdapterState {
    /// State not reported yet.
    #[default]
    Unknown,
    /// The adapter is resetting.
    Resetting,
    /// The platform does not support BLE central role.
    Unsupported,
    /// The application is not authorized to use Bluetooth.
    Unauthorized,
    /// Bluetooth is switched off.
    PoweredOff,
    /// Bluetooth is on and ready.
    PoweredOn,
}

impl AdapterState {
    /// Check if the adapter can be used.
    pub fn is_powered_on(&self) -> bool {
        matches!(self, Self::PoweredOn)
    }
}

impl std::fmt::Display for AdapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Resetting => write!(f, "Resetting"),
            Self::Unsupported => write!(f, "Unsupported"),
            Self::Unauthorized => write!(f, "Unauthorized"),
            Self::PoweredOff => write!(f, "Powered off"),
            Self::PoweredOn => write!(f, "Powered on"),
        }
    }
}

/// Parameters for an adapter scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanOptions {
    /// Only report peripherals advertising one of these services.
    pub services: Vec<Uuid>,
    /// Report each peripheral repeatedly within one scan cycle.
    pub allow_duplicates: bool,
}

/// A platform peripheral object.
///
/// Clones refer to the same physical device; identity is [`PeripheralHandle::id`].
pub trait PeripheralHandle: Clone + Debug + Send + Sync + 'static {
    /// Identity of the physical device.
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Identity of the physical device.
    fn id(&self) -> Self::Id;

    /// Platform-provided name, if any.
    fn name(&self) -> Option<String>;

    /// Current service tree; `None` if service discovery never completed.
    fn services(&self) -> Option<Vec<GattService>>;

    /// Discover services, restricted to `filter` when it is non-empty.
    fn discover_services(&self, filter: &[Uuid]);

    /// Discover the characteristics of `service`, restricted to `filter` when non-empty.
    fn discover_characteristics(&self, service: &GattService, filter: &[Uuid]);

    /// Write a value to a characteristic.
    fn write(&self, characteristic: &GattCharacteristic, data: &[u8], write_type: WriteType);

    /// Enable or disable notifications on a characteristic.
    fn set_notify(&self, characteristic: &GattCharacteristic, enabled: bool);
}

/// The local radio adapter.
#[cfg_attr(test, mockall::automock(type Peripheral = crate::ble::fake::FakePeripheral;))]
pub trait Central: Send + 'static {
    /// Peripheral handle type produced by this adapter.
    type Peripheral: PeripheralHandle;

    /// Start (or restart) scanning.
    fn start_scan(&self, options: &ScanOptions);

    /// Stop scanning.
    fn stop_scan(&self);

    /// Request a connection to a peripheral.
    fn connect(&self, peripheral: &Self::Peripheral);

    /// Request the link to a peripheral be torn down.
    fn cancel_connection(&self, peripheral: &Self::Peripheral);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_state() {
        assert!(AdapterState::PoweredOn.is_powered_on());
        assert!(!AdapterState::PoweredOff.is_powered_on());
        assert_eq!(AdapterState::default(), AdapterState::Unknown);
        assert_eq!(format!("{}", AdapterState::PoweredOff), "Powered off");
    }
}
