//! Error types for the rfduino-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// No discovered session matches the given identifier.
    #[error("Session not found: {identifier}")]
    SessionNotFound {
        /// The identifier that was searched for.
        identifier: String,
    },

    /// Characteristic not found on the device.
    ///
    /// Covers both "services not discovered yet" and "the device does not
    /// expose this characteristic".
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// A textual UUID could not be parsed.
    #[error("Invalid UUID: {value}")]
    InvalidUuid {
        /// The rejected input.
        value: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// A GATT operation reported a failure.
    #[error("GATT operation failed: {message}")]
    Gatt {
        /// Description reported by the platform.
        message: String,
    },
}

impl Error {
    /// Build a [`Error::Gatt`] from anything printable.
    pub fn gatt(message: impl std::fmt::Display) -> Self {
        Self::Gatt {
            message: message.to_string(),
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
