//! Manager configuration.
//!
//! The four profile identifiers default to the RFduino assignments
//! (`2220`..`2223`) and may be overridden with any textual UUID form accepted
//! by [`parse_uuid`]. Everything is validated once, when the
//! [`ScanManager`](crate::ScanManager) is constructed.

use std::time::Duration;

use uuid::Uuid;

use crate::ble::uuids::{self, parse_uuid};
use crate::error::{Error, Result};

/// Service and characteristic identifiers of the device profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceProfile {
    /// Service UUID; also the scan filter.
    pub service: Uuid,
    /// Disconnect-control characteristic.
    pub disconnect: Uuid,
    /// Characteristic the device notifies on.
    pub receive: Uuid,
    /// Characteristic written to send data.
    pub send: Uuid,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            service: uuids::DISCOVER_SERVICE_UUID,
            disconnect: uuids::DISCONNECT_CHARACTERISTIC_UUID,
            receive: uuids::RECEIVE_CHARACTERISTIC_UUID,
            send: uuids::SEND_CHARACTERISTIC_UUID,
        }
    }
}

impl DeviceProfile {
    /// Build a profile from textual identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUuid`] for unparsable input and
    /// [`Error::InvalidParameter`] if two characteristics collide.
    pub fn parse(service: &str, disconnect: &str, receive: &str, send: &str) -> Result<Self> {
        let profile = Self {
            service: parse_uuid(service)?,
            disconnect: parse_uuid(disconnect)?,
            receive: parse_uuid(receive)?,
            send: parse_uuid(send)?,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Check that the disconnect, receive and send characteristics are distinct.
    ///
    /// Write acknowledgements are routed by characteristic, so the disconnect
    /// characteristic in particular must not double as the send channel.
    pub fn validate(&self) -> Result<()> {
        let pairs = [
            ("disconnect", self.disconnect, "send", self.send),
            ("disconnect", self.disconnect, "receive", self.receive),
            ("receive", self.receive, "send", self.send),
        ];

        for (a_name, a, b_name, b) in pairs {
            if a == b {
                return Err(Error::InvalidParameter {
                    name: format!("{a_name}/{b_name}"),
                    value: a.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Configuration for a [`ScanManager`](crate::ScanManager).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManagerConfig {
    /// Device profile identifiers.
    pub profile: DeviceProfile,
    /// How long a disconnected session waits for a reconnect before timing out.
    pub timeout_threshold: Duration,
    /// Interval of the rescan timer.
    pub rescan_interval: Duration,
    /// Whether the crate installs its own log output.
    pub logging_enabled: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            profile: DeviceProfile::default(),
            timeout_threshold: Self::DEFAULT_TIMEOUT_THRESHOLD,
            rescan_interval: Self::DEFAULT_RESCAN_INTERVAL,
            logging_enabled: false,
        }
    }
}

impl ManagerConfig {
    /// Default connection-liveness timeout (5 seconds).
    pub const DEFAULT_TIMEOUT_THRESHOLD: Duration = Duration::from_secs(5);

    /// Default rescan interval (3 seconds).
    pub const DEFAULT_RESCAN_INTERVAL: Duration = Duration::from_secs(3);

    /// Configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different device profile.
    pub fn with_profile(mut self, profile: DeviceProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Override the liveness timeout.
    pub fn with_timeout_threshold(mut self, threshold: Duration) -> Self {
        self.timeout_threshold = threshold;
        self
    }

    /// Override the rescan interval.
    pub fn with_rescan_interval(mut self, interval: Duration) -> Self {
        self.rescan_interval = interval;
        self
    }

    /// Turn crate-installed logging on or off.
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.profile.validate()?;

        if self.timeout_threshold.is_zero() {
            return Err(Error::InvalidParameter {
                name: "timeout_threshold".to_string(),
                value: format!("{:?}", self.timeout_threshold),
            });
        }

        // tokio intervals panic on a zero period
        if self.rescan_interval.is_zero() {
            return Err(Error::InvalidParameter {
                name: "rescan_interval".to_string(),
                value: format!("{:?}", self.rescan_interval),
            });
        }

        Ok(())
    }
}
