//! [`Central`] and [`PeripheralHandle`] on top of btleplug.
//!
//! btleplug exposes async request/response calls and an adapter event
//! stream. Every command here spawns a tokio task for the btleplug call and
//! posts its outcome to the manager's event queue, so callers never block.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use btleplug::api::{
    Central as _, CentralEvent as BtleplugEvent, CentralState, Characteristic, Manager as _,
    Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use bytes::Bytes;
use futures::stream::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::ble::advertising::AdvertisementData;
use crate::ble::central::{AdapterState, Central, PeripheralHandle, ScanOptions};
use crate::ble::gatt::{GattCharacteristic, GattService, WriteType};
use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::event::{event_channel, CentralEvent, Event, EventReceiver, EventSender};
use crate::scan_manager::ScanManager;

type Events = EventSender<BtleplugPeripheral>;

fn post(events: &Events, event: CentralEvent<BtleplugPeripheral>) {
    if events.send(Event::Central(event)).is_err() {
        trace!("Event queue closed, dropping adapter event");
    }
}

impl From<CentralState> for AdapterState {
    fn from(state: CentralState) -> Self {
        match state {
            CentralState::PoweredOn => Self::PoweredOn,
            CentralState::PoweredOff => Self::PoweredOff,
            _ => Self::Unknown,
        }
    }
}

/// A btleplug peripheral plus the caches the session layer reads synchronously.
///
/// One handle exists per physical device; clones share the caches.
#[derive(Debug, Clone)]
pub struct BtleplugPeripheral {
    /// The btleplug peripheral.
    inner: Peripheral,
    /// Advertised name, refreshed on every advertisement.
    name: Arc<RwLock<Option<String>>>,
    /// Service tree, `None` until service discovery completed.
    services: Arc<RwLock<Option<Vec<GattService>>>>,
    /// Notification forwarding task.
    notifications: Arc<Mutex<Option<JoinHandle<()>>>>,
    /// Queue that completions are posted to.
    events: Events,
}

impl BtleplugPeripheral {
    fn new(inner: Peripheral, name: Option<String>, events: Events) -> Self {
        Self {
            inner,
            name: Arc::new(RwLock::new(name)),
            services: Arc::new(RwLock::new(None)),
            notifications: Arc::new(Mutex::new(None)),
            events,
        }
    }

    /// The underlying btleplug peripheral.
    pub fn inner(&self) -> &Peripheral {
        &self.inner
    }

    fn set_name(&self, name: Option<String>) {
        if name.is_some() {
            *self.name.write() = name;
        }
    }

    fn btleplug_characteristic(&self, characteristic: &GattCharacteristic) -> Option<Characteristic> {
        self.inner.characteristics().into_iter().find(|c| {
            c.uuid == characteristic.uuid && c.service_uuid == characteristic.service_uuid
        })
    }

    /// Forward value notifications to the event queue. Started once.
    fn ensure_notification_pump(&self) {
        let mut slot = self.notifications.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let handle = self.clone();
        *slot = Some(tokio::spawn(async move {
            let mut stream = match handle.inner.notifications().await {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Failed to get notifications stream: {}", e);
                    return;
                }
            };

            debug!("Notification listener started for {:?}", handle.inner.id());

            while let Some(notification) = stream.next().await {
                trace!(
                    "Notification from {}: {} bytes",
                    notification.uuid,
                    notification.value.len()
                );

                let service_uuid = handle
                    .inner
                    .characteristics()
                    .into_iter()
                    .find(|c| c.uuid == notification.uuid)
                    .map(|c| c.service_uuid)
                    .unwrap_or_else(Uuid::nil);

                post(
                    &handle.events,
                    CentralEvent::ValueUpdated {
                        id: handle.inner.id(),
                        characteristic: GattCharacteristic::new(notification.uuid, service_uuid),
                        value: Some(Bytes::from(notification.value)),
                        error: None,
                    },
                );
            }

            debug!("Notification listener stopped for {:?}", handle.inner.id());
        }));
    }
}

impl PeripheralHandle for BtleplugPeripheral {
    type Id = PeripheralId;

    fn id(&self) -> PeripheralId {
        self.inner.id()
    }

    fn name(&self) -> Option<String> {
        self.name.read().clone()
    }

    fn services(&self) -> Option<Vec<GattService>> {
        self.services.read().clone()
    }

    fn discover_services(&self, filter: &[Uuid]) {
        let handle = self.clone();
        let filter = filter.to_vec();

        tokio::spawn(async move {
            let id = handle.inner.id();
            let error = match handle.inner.discover_services().await {
                Ok(()) => {
                    let services: Vec<_> = handle
                        .inner
                        .services()
                        .into_iter()
                        .filter(|s| filter.is_empty() || filter.contains(&s.uuid))
                        .map(|s| GattService::new(s.uuid))
                        .collect();
                    debug!("Discovered {} matching services on {:?}", services.len(), id);
                    *handle.services.write() = Some(services);
                    None
                }
                Err(e) => {
                    warn!("Failed to discover services on {:?}: {}", id, e);
                    Some(Error::Bluetooth(e))
                }
            };

            post(&handle.events, CentralEvent::ServicesDiscovered { id, error });
        });
    }

    fn discover_characteristics(&self, service: &GattService, filter: &[Uuid]) {
        // btleplug resolves characteristics together with services, so this
        // only projects them into the cache.
        let found = self
            .inner
            .services()
            .into_iter()
            .find(|s| s.uuid == service.uuid)
            .map(|s| {
                s.characteristics
                    .into_iter()
                    .filter(|c| filter.is_empty() || filter.contains(&c.uuid))
                    .map(|c| GattCharacteristic::new(c.uuid, c.service_uuid))
                    .collect::<Vec<_>>()
            });

        let error = match found {
            Some(characteristics) => {
                if let Some(cached) = self
                    .services
                    .write()
                    .get_or_insert_with(Vec::new)
                    .iter_mut()
                    .find(|s| s.uuid == service.uuid)
                {
                    cached.characteristics = Some(characteristics);
                }
                None
            }
            None => Some(Error::gatt(format!("service {} not present", service.uuid))),
        };

        post(
            &self.events,
            CentralEvent::CharacteristicsDiscovered {
                id: self.inner.id(),
                service: service.uuid,
                error,
            },
        );
    }

    fn write(&self, characteristic: &GattCharacteristic, data: &[u8], write_type: WriteType) {
        let id = self.inner.id();
        let Some(target) = self.btleplug_characteristic(characteristic) else {
            post(
                &self.events,
                CentralEvent::WriteCompleted {
                    id,
                    characteristic: characteristic.clone(),
                    error: Some(Error::CharacteristicNotFound {
                        uuid: characteristic.uuid.to_string(),
                    }),
                },
            );
            return;
        };

        let handle = self.clone();
        let characteristic = characteristic.clone();
        let data = data.to_vec();

        tokio::spawn(async move {
            let btleplug_write_type = match write_type {
                WriteType::WithResponse => btleplug::api::WriteType::WithResponse,
                WriteType::WithoutResponse => btleplug::api::WriteType::WithoutResponse,
            };

            let result = handle
                .inner
                .write(&target, &data, btleplug_write_type)
                .await;
            trace!("Wrote {} bytes to {}", data.len(), characteristic.uuid);

            match (write_type, result) {
                (WriteType::WithResponse, result) => post(
                    &handle.events,
                    CentralEvent::WriteCompleted {
                        id,
                        characteristic,
                        error: result.err().map(Error::Bluetooth),
                    },
                ),
                (WriteType::WithoutResponse, Err(e)) => {
                    warn!("Unconfirmed write to {} failed: {}", characteristic.uuid, e)
                }
                (WriteType::WithoutResponse, Ok(())) => {}
            }
        });
    }

    fn set_notify(&self, characteristic: &GattCharacteristic, enabled: bool) {
        let Some(target) = self.btleplug_characteristic(characteristic) else {
            warn!(
                "Cannot change notifications on unknown characteristic {}",
                characteristic.uuid
            );
            return;
        };

        if enabled {
            self.ensure_notification_pump();
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let result = if enabled {
                inner.subscribe(&target).await
            } else {
                inner.unsubscribe(&target).await
            };

            match result {
                Ok(()) => debug!("Notifications on {} set to {}", target.uuid, enabled),
                Err(e) => warn!("Failed to set notifications on {}: {}", target.uuid, e),
            }
        });
    }
}

/// The first system Bluetooth adapter, driven through btleplug.
pub struct BtleplugCentral {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
    /// Queue that adapter events are posted to.
    events: Events,
    /// Peripheral handles by id, so every sighting reuses one handle.
    peripherals: Arc<Mutex<HashMap<PeripheralId, BtleplugPeripheral>>>,
    /// Peripherals reported during the current scan cycle.
    reported: Arc<Mutex<HashSet<PeripheralId>>>,
    /// Whether the current scan reports duplicates.
    allow_duplicates: Arc<AtomicBool>,
    /// Handle to the adapter event task.
    event_task: JoinHandle<()>,
}

impl BtleplugCentral {
    /// Use the first Bluetooth adapter on this system.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new(events: Events) -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Self::with_adapter(adapter, events).await
    }

    /// Use a specific adapter.
    pub async fn with_adapter(adapter: Adapter, events: Events) -> Result<Self> {
        let stream = adapter.events().await.map_err(Error::Bluetooth)?;

        let peripherals = Arc::new(Mutex::new(HashMap::new()));
        let reported = Arc::new(Mutex::new(HashSet::new()));
        let allow_duplicates = Arc::new(AtomicBool::new(false));

        let event_task = {
            let adapter = adapter.clone();
            let events = events.clone();
            let peripherals = peripherals.clone();
            let reported = reported.clone();
            let allow_duplicates = allow_duplicates.clone();

            tokio::spawn(async move {
                match adapter.adapter_state().await {
                    Ok(state) => post(&events, CentralEvent::StateChanged(state.into())),
                    Err(e) => warn!("Failed to read adapter state: {}", e),
                }

                let mut stream = stream;
                while let Some(event) = stream.next().await {
                    if events.is_closed() {
                        break;
                    }

                    match event {
                        BtleplugEvent::DeviceDiscovered(id) | BtleplugEvent::DeviceUpdated(id) => {
                            Self::report_peripheral(
                                &adapter,
                                id,
                                &events,
                                &peripherals,
                                &reported,
                                allow_duplicates.load(Ordering::SeqCst),
                            )
                            .await;
                        }
                        BtleplugEvent::DeviceConnected(id) => {
                            debug!("Device connected: {:?}", id);
                            post(&events, CentralEvent::PeripheralConnected { id });
                        }
                        BtleplugEvent::DeviceDisconnected(id) => {
                            debug!("Device disconnected: {:?}", id);
                            post(&events, CentralEvent::PeripheralDisconnected { id, error: None });
                        }
                        BtleplugEvent::StateUpdate(state) => {
                            post(&events, CentralEvent::StateChanged(state.into()));
                        }
                        _ => {}
                    }
                }

                debug!("Adapter event loop ended");
            })
        };

        Ok(Self {
            adapter,
            events,
            peripherals,
            reported,
            allow_duplicates,
            event_task,
        })
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Resolve a sighting and post it as a discovery.
    async fn report_peripheral(
        adapter: &Adapter,
        id: PeripheralId,
        events: &Events,
        peripherals: &Mutex<HashMap<PeripheralId, BtleplugPeripheral>>,
        reported: &Mutex<HashSet<PeripheralId>>,
        allow_duplicates: bool,
    ) {
        if !allow_duplicates && reported.lock().contains(&id) {
            return;
        }

        let peripheral = match adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return,
        };

        if !allow_duplicates && !reported.lock().insert(id.clone()) {
            return;
        }

        let handle = peripherals
            .lock()
            .entry(id)
            .or_insert_with(|| {
                BtleplugPeripheral::new(peripheral, properties.local_name.clone(), events.clone())
            })
            .clone();
        handle.set_name(properties.local_name.clone());

        let advertisement = AdvertisementData {
            local_name: properties.local_name,
            manufacturer_data: properties
                .manufacturer_data
                .into_iter()
                .map(|(company, data)| (company, Bytes::from(data)))
                .collect(),
            service_uuids: properties.services,
            tx_power_level: properties.tx_power_level,
        };

        post(
            events,
            CentralEvent::PeripheralDiscovered {
                peripheral: handle,
                advertisement,
                rssi: properties.rssi,
            },
        );
    }
}

impl Central for BtleplugCentral {
    type Peripheral = BtleplugPeripheral;

    fn start_scan(&self, options: &ScanOptions) {
        self.allow_duplicates
            .store(options.allow_duplicates, Ordering::SeqCst);
        if !options.allow_duplicates {
            // A new scan cycle reports every device again, once.
            self.reported.lock().clear();
        }

        let adapter = self.adapter.clone();
        let filter = ScanFilter {
            services: options.services.clone(),
        };

        tokio::spawn(async move {
            if let Err(e) = adapter.start_scan(filter).await {
                error!("Failed to start scan: {}", e);
            }
        });
    }

    fn stop_scan(&self) {
        let adapter = self.adapter.clone();
        tokio::spawn(async move {
            if let Err(e) = adapter.stop_scan().await {
                warn!("Failed to stop scan: {}", e);
            }
        });
    }

    fn connect(&self, peripheral: &BtleplugPeripheral) {
        let inner = peripheral.inner.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            if let Err(e) = inner.connect().await {
                post(
                    &events,
                    CentralEvent::ConnectFailed {
                        id: inner.id(),
                        error: Some(Error::Bluetooth(e)),
                    },
                );
            }
        });
    }

    fn cancel_connection(&self, peripheral: &BtleplugPeripheral) {
        let inner = peripheral.inner.clone();

        tokio::spawn(async move {
            if let Err(e) = inner.disconnect().await {
                warn!("Failed to disconnect {:?}: {}", inner.id(), e);
            }
        });
    }
}

impl Drop for BtleplugCentral {
    fn drop(&mut self) {
        self.event_task.abort();
    }
}

impl std::fmt::Debug for BtleplugCentral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleplugCentral")
            .field("known_peripherals", &self.peripherals.lock().len())
            .finish()
    }
}

impl ScanManager<BtleplugCentral> {
    /// Create a manager on the first system adapter.
    ///
    /// Drive the returned receiver with [`ScanManager::run`]; scanning starts
    /// as soon as the adapter reports it is powered on.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available or the configuration is invalid.
    pub async fn with_btleplug(
        config: ManagerConfig,
    ) -> Result<(Self, EventReceiver<BtleplugPeripheral>)> {
        let (tx, rx) = event_channel();
        let central = BtleplugCentral::new(tx.clone()).await?;
        let manager = ScanManager::new(central, config, tx)?;
        Ok((manager, rx))
    }
}
