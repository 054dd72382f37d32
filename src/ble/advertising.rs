//! Advertisement data reported with each discovery.

use std::collections::HashMap;

use bytes::Bytes;
use uuid::Uuid;

/// Advertisement payload as reported by the platform scanner.
///
/// The session manager does not interpret any of it; it is kept on the
/// session so consumers can inspect what the device last advertised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdvertisementData {
    /// Advertised local name.
    pub local_name: Option<String>,
    /// Manufacturer specific data keyed by company identifier.
    pub manufacturer_data: HashMap<u16, Bytes>,
    /// Advertised service UUIDs.
    pub service_uuids: Vec<Uuid>,
    /// Advertised transmit power in dBm.
    pub tx_power_level: Option<i16>,
}
