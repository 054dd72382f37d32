//! Recording peripheral used by unit tests.

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::ble::central::PeripheralHandle;
use crate::ble::gatt::{GattCharacteristic, GattService, WriteType};
use crate::ble::uuids::*;

/// A command issued to a [`FakePeripheral`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PeripheralCall {
    DiscoverServices(Vec<Uuid>),
    DiscoverCharacteristics { service: Uuid, filter: Vec<Uuid> },
    Write {
        characteristic: Uuid,
        data: Vec<u8>,
        write_type: WriteType,
    },
    SetNotify { characteristic: Uuid, enabled: bool },
}

#[derive(Debug, Default)]
struct FakeState {
    services: Option<Vec<GattService>>,
    calls: Vec<PeripheralCall>,
}

/// Peripheral double that records every command. Clones share state.
///
/// `pub` because the generated `MockCentral` names it as its peripheral type.
#[derive(Debug, Clone)]
pub struct FakePeripheral {
    id: u32,
    name: Option<String>,
    state: Arc<Mutex<FakeState>>,
}

impl FakePeripheral {
    pub(crate) fn new(id: u32, name: Option<&str>) -> Self {
        Self {
            id,
            name: name.map(str::to_string),
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    /// Replace the service tree.
    pub(crate) fn set_services(&self, services: Option<Vec<GattService>>) {
        self.state.lock().services = services;
    }

    /// Populate the full default profile tree.
    pub(crate) fn with_default_profile(self) -> Self {
        self.set_services(Some(vec![GattService::with_characteristics(
            DISCOVER_SERVICE_UUID,
            &[
                DISCONNECT_CHARACTERISTIC_UUID,
                RECEIVE_CHARACTERISTIC_UUID,
                SEND_CHARACTERISTIC_UUID,
            ],
        )]));
        self
    }

    pub(crate) fn calls(&self) -> Vec<PeripheralCall> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PeripheralCall::Write {
                    characteristic,
                    data,
                    ..
                } => Some((characteristic, data)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn record(&self, call: PeripheralCall) {
        self.state.lock().calls.push(call);
    }
}

impl PeripheralHandle for FakePeripheral {
    type Id = u32;

    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn services(&self) -> Option<Vec<GattService>> {
        self.state.lock().services.clone()
    }

    fn discover_services(&self, filter: &[Uuid]) {
        self.record(PeripheralCall::DiscoverServices(filter.to_vec()));
    }

    fn discover_characteristics(&self, service: &GattService, filter: &[Uuid]) {
        self.record(PeripheralCall::DiscoverCharacteristics {
            service: service.uuid,
            filter: filter.to_vec(),
        });
    }

    fn write(&self, characteristic: &GattCharacteristic, data: &[u8], write_type: WriteType) {
        self.record(PeripheralCall::Write {
            characteristic: characteristic.uuid,
            data: data.to_vec(),
            write_type,
        });
    }

    fn set_notify(&self, characteristic: &GattCharacteristic, enabled: bool) {
        self.record(PeripheralCall::SetNotify {
            characteristic: characteristic.uuid,
            enabled,
        });
    }
}

/// Observer that records `(hook, session id)` pairs in call order.
pub(crate) fn recording_observer() -> (
    crate::observer::Observer<FakePeripheral>,
    Arc<Mutex<Vec<(&'static str, u32)>>>,
) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut observer = crate::observer::Observer::new();

    macro_rules! record {
        ($hook:ident, $name:literal) => {{
            let log = log.clone();
            observer.$hook(move |session| log.lock().push(($name, session.id())));
        }};
    }

    record!(on_discovered, "discovered");
    record!(on_connected, "connected");
    record!(on_disconnect, "disconnect");
    record!(on_timeout, "timeout");
    record!(on_services_discovered, "services_discovered");
    record!(on_characteristics_discovered, "characteristics_discovered");

    let sent = log.clone();
    observer.on_data_sent(move |session, _, _| sent.lock().push(("data_sent", session.id())));
    let received = log.clone();
    observer.on_data_received(move |session, _| received.lock().push(("data_received", session.id())));

    (observer, log)
}
