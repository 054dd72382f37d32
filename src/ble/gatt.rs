//! GATT tree snapshots.
//!
//! A peripheral exposes its discovered services through these plain value
//! types. A service whose characteristics have not been discovered yet has
//! `characteristics == None`, which is distinct from an empty list.

use uuid::Uuid;

/// How a write is acknowledged by the remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WriteType {
    /// Confirmed write; the platform reports completion.
    WithResponse,
    /// Fire-and-forget write.
    WithoutResponse,
}

/// A characteristic on a discovered service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GattCharacteristic {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// UUID of the owning service.
    pub service_uuid: Uuid,
}

impl GattCharacteristic {
    /// Create a characteristic descriptor.
    pub fn new(uuid: Uuid, service_uuid: Uuid) -> Self {
        Self { uuid, service_uuid }
    }
}

/// A discovered service.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GattService {
    /// Service UUID.
    pub uuid: Uuid,
    /// Discovered characteristics, `None` until characteristic discovery ran.
    pub characteristics: Option<Vec<GattCharacteristic>>,
}

impl GattService {
    /// A service with no characteristic discovery performed yet.
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            characteristics: None,
        }
    }

    /// A service with the given characteristic UUIDs already discovered.
    pub fn with_characteristics(uuid: Uuid, characteristics: &[Uuid]) -> Self {
        Self {
            uuid,
            characteristics: Some(
                characteristics
                    .iter()
                    .map(|c| GattCharacteristic::new(*c, uuid))
                    .collect(),
            ),
        }
    }

    /// Look up a characteristic by UUID.
    pub fn characteristic(&self, uuid: &Uuid) -> Option<&GattCharacteristic> {
        self.characteristics
            .as_ref()?
            .iter()
            .find(|c| c.uuid == *uuid)
    }
}

/// Find `characteristic` inside `service` within a service list.
///
/// Returns `None` when either level is absent.
pub fn find_characteristic(
    services: &[GattService],
    service: &Uuid,
    characteristic: &Uuid,
) -> Option<GattCharacteristic> {
    services
        .iter()
        .find(|s| s.uuid == *service)?
        .characteristic(characteristic)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::uuids::*;

    #[test]
    fn test_find_characteristic_levels() {
        let services = vec![
            GattService::new(SEND_CHARACTERISTIC_UUID),
            GattService::with_characteristics(
                DISCOVER_SERVICE_UUID,
                &[RECEIVE_CHARACTERISTIC_UUID, SEND_CHARACTERISTIC_UUID],
            ),
        ];

        let found = find_characteristic(
            &services,
            &DISCOVER_SERVICE_UUID,
            &SEND_CHARACTERISTIC_UUID,
        );
        assert_eq!(
            found,
            Some(GattCharacteristic::new(
                SEND_CHARACTERISTIC_UUID,
                DISCOVER_SERVICE_UUID
            ))
        );

        assert!(find_characteristic(
            &services,
            &DISCOVER_SERVICE_UUID,
            &DISCONNECT_CHARACTERISTIC_UUID
        )
        .is_none());
        assert!(find_characteristic(&[], &DISCOVER_SERVICE_UUID, &SEND_CHARACTERISTIC_UUID).is_none());
    }

    #[test]
    fn test_undiscovered_characteristics() {
        let service = GattService::new(DISCOVER_SERVICE_UUID);
        assert!(service.characteristic(&SEND_CHARACTERISTIC_UUID).is_none());
    }
}
