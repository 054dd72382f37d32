//! The tagged event type consumed by [`ScanManager::dispatch`](crate::ScanManager::dispatch).
//!
//! Adapter callbacks, timer firings and internal follow-ups all travel through
//! one unbounded channel, so they are handled strictly one at a time.

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ble::advertising::AdvertisementData;
use crate::ble::central::{AdapterState, PeripheralHandle};
use crate::ble::gatt::GattCharacteristic;
use crate::error::Error;
use crate::timer::TimerToken;

/// Events reported by the radio adapter and peripherals.
#[derive(Debug)]
pub enum CentralEvent<P: PeripheralHandle> {
    /// The adapter changed power/authorization state.
    StateChanged(AdapterState),
    /// A peripheral advertising the profile service was seen.
    PeripheralDiscovered {
        /// The peripheral.
        peripheral: P,
        /// Advertisement payload.
        advertisement: AdvertisementData,
        /// Signal strength in dBm.
        rssi: Option<i16>,
    },
    /// A connection was established.
    PeripheralConnected {
        /// Peripheral identity.
        id: P::Id,
    },
    /// A connection was lost or torn down.
    PeripheralDisconnected {
        /// Peripheral identity.
        id: P::Id,
        /// Reason, if the platform reported one.
        error: Option<Error>,
    },
    /// A connection attempt failed.
    ConnectFailed {
        /// Peripheral identity.
        id: P::Id,
        /// Reason, if the platform reported one.
        error: Option<Error>,
    },
    /// Service discovery finished.
    ServicesDiscovered {
        /// Peripheral identity.
        id: P::Id,
        /// Failure, if any.
        error: Option<Error>,
    },
    /// Characteristic discovery for one service finished.
    CharacteristicsDiscovered {
        /// Peripheral identity.
        id: P::Id,
        /// The service whose characteristics were discovered.
        service: Uuid,
        /// Failure, if any.
        error: Option<Error>,
    },
    /// A confirmed write was acknowledged.
    WriteCompleted {
        /// Peripheral identity.
        id: P::Id,
        /// Characteristic that was written.
        characteristic: GattCharacteristic,
        /// Failure, if any.
        error: Option<Error>,
    },
    /// A notification or read delivered a value.
    ValueUpdated {
        /// Peripheral identity.
        id: P::Id,
        /// Characteristic that changed.
        characteristic: GattCharacteristic,
        /// Raw payload.
        value: Option<Bytes>,
        /// Failure, if any.
        error: Option<Error>,
    },
}

impl<P: PeripheralHandle> CentralEvent<P> {
    /// Identity of the peripheral this event concerns, if any.
    pub fn peripheral_id(&self) -> Option<P::Id> {
        match self {
            Self::StateChanged(_) => None,
            Self::PeripheralDiscovered { peripheral, .. } => Some(peripheral.id()),
            Self::PeripheralConnected { id }
            | Self::PeripheralDisconnected { id, .. }
            | Self::ConnectFailed { id, .. }
            | Self::ServicesDiscovered { id, .. }
            | Self::CharacteristicsDiscovered { id, .. }
            | Self::WriteCompleted { id, .. }
            | Self::ValueUpdated { id, .. } => Some(id.clone()),
        }
    }
}

/// Everything the manager's dispatch loop handles.
#[derive(Debug)]
pub enum Event<P: PeripheralHandle> {
    /// Adapter or peripheral callback.
    Central(CentralEvent<P>),
    /// A session's liveness timer fired.
    SessionTimeout {
        /// Session identity.
        id: P::Id,
        /// Token of the timer that fired.
        token: TimerToken,
    },
    /// The rescan timer ticked.
    Rescan {
        /// Token of the timer that ticked.
        token: TimerToken,
    },
    /// A disconnect handshake completed; tear the link down.
    CancelConnection {
        /// The peripheral to disconnect.
        peripheral: P,
    },
}

impl<P: PeripheralHandle> From<CentralEvent<P>> for Event<P> {
    fn from(event: CentralEvent<P>) -> Self {
        Self::Central(event)
    }
}

/// Sending half of the event queue.
pub type EventSender<P> = mpsc::UnboundedSender<Event<P>>;

/// Receiving half of the event queue.
pub type EventReceiver<P> = mpsc::UnboundedReceiver<Event<P>>;

/// Create the event queue.
pub fn event_channel<P: PeripheralHandle>() -> (EventSender<P>, EventReceiver<P>) {
    mpsc::unbounded_channel()
}
