//! Device session.
//!
//! Represents a single RFduino-profile peripheral: its connection and
//! liveness-timeout state machine, characteristic lookup, and the disconnect
//! handshake.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::ble::advertising::AdvertisementData;
use crate::ble::central::PeripheralHandle;
use crate::ble::gatt::{find_characteristic, GattCharacteristic, WriteType};
use crate::config::DeviceProfile;
use crate::error::{Error, Result};
use crate::event::{Event, EventSender};
use crate::observer::Observer;
use crate::timer::{Timer, TimerToken};

/// Name reported when the platform has none.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown device";

/// Byte written to the disconnect-control characteristic.
pub const DISCONNECT_COMMAND: u8 = 1;

/// Completion of a disconnect handshake.
pub type DisconnectAck = Box<dyn FnOnce() + Send>;

/// Last transition a session went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionState {
    /// Seen in an advertisement.
    #[default]
    Discovered,
    /// Service discovery requested.
    ServicesDiscovering,
    /// Services reported by the peripheral.
    ServicesDiscovered,
    /// Characteristic discovery requested.
    CharacteristicsDiscovering,
    /// Notifications enabled; the session can carry traffic.
    Ready,
    /// Link established.
    Connected,
    /// Not reconnected within the timeout threshold.
    TimedOut,
    /// Link dropped.
    Disconnected,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovered => write!(f, "Discovered"),
            Self::ServicesDiscovering => write!(f, "Discovering services"),
            Self::ServicesDiscovered => write!(f, "Services discovered"),
            Self::CharacteristicsDiscovering => write!(f, "Discovering characteristics"),
            Self::Ready => write!(f, "Ready"),
            Self::Connected => write!(f, "Connected"),
            Self::TimedOut => write!(f, "Timed out"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// One discovered peripheral.
pub struct DeviceSession<P: PeripheralHandle> {
    /// Platform handle.
    peripheral: P,
    /// Identifiers this session talks to.
    profile: DeviceProfile,
    /// Queue that timer firings are posted to.
    events: EventSender<P>,
    /// Delay before a disconnected session times out.
    timeout_threshold: Duration,
    state: SessionState,
    is_connected: bool,
    is_timed_out: bool,
    did_discover_characteristics: bool,
    /// Last advertised signal strength.
    rssi: Option<i16>,
    advertisement: AdvertisementData,
    last_seen: DateTime<Utc>,
    /// At most one outstanding disconnect acknowledgment.
    pending_disconnect_ack: Option<DisconnectAck>,
    /// At most one live liveness timer.
    timeout: Option<Timer>,
}

impl<P: PeripheralHandle> DeviceSession<P> {
    /// Create a session for a freshly sighted peripheral.
    pub(crate) fn new(
        peripheral: P,
        profile: DeviceProfile,
        timeout_threshold: Duration,
        events: EventSender<P>,
    ) -> Self {
        Self {
            peripheral,
            profile,
            events,
            timeout_threshold,
            state: SessionState::Discovered,
            is_connected: false,
            is_timed_out: false,
            did_discover_characteristics: false,
            rssi: None,
            advertisement: AdvertisementData::default(),
            last_seen: Utc::now(),
            pending_disconnect_ack: None,
            timeout: None,
        }
    }

    /// Update from an advertisement sighting.
    pub(crate) fn update_from_advertising(
        &mut self,
        advertisement: AdvertisementData,
        rssi: Option<i16>,
    ) {
        trace!("Advertisement from {:?}: rssi={:?}", self.id(), rssi);
        self.advertisement = advertisement;
        self.rssi = rssi;
        self.last_seen = Utc::now();
    }

    // === Identification ===

    /// Identity of the underlying peripheral.
    pub fn id(&self) -> P::Id {
        self.peripheral.id()
    }

    /// The platform peripheral handle.
    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    /// Platform-provided name, or [`UNKNOWN_DEVICE_NAME`].
    pub fn display_name(&self) -> String {
        self.peripheral
            .name()
            .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string())
    }

    // === State ===

    /// Last transition.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the link is currently up.
    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    /// Whether the session timed out after its last disconnect.
    pub fn is_timed_out(&self) -> bool {
        self.is_timed_out
    }

    /// Whether characteristic discovery ever completed.
    pub fn did_discover_characteristics(&self) -> bool {
        self.did_discover_characteristics
    }

    /// Last advertised signal strength in dBm.
    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }

    /// Last advertisement payload.
    pub fn advertisement(&self) -> &AdvertisementData {
        &self.advertisement
    }

    /// When the peripheral last advertised.
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    /// Whether a disconnect handshake is waiting for its acknowledgment.
    pub fn has_pending_disconnect_ack(&self) -> bool {
        self.pending_disconnect_ack.is_some()
    }

    /// Whether a liveness timer is armed.
    pub fn has_pending_timeout(&self) -> bool {
        self.timeout.is_some()
    }

    // === Commands ===

    /// Request discovery of the profile service.
    ///
    /// The result arrives later as a services-discovered event.
    pub fn discover_services(&mut self) {
        debug!("Going to discover services for {:?}", self.id());
        self.state = SessionState::ServicesDiscovering;
        self.peripheral.discover_services(&[self.profile.service]);
    }

    /// Ask the device to prepare for disconnection.
    ///
    /// `on_complete` replaces any pending acknowledgment. If no services were
    /// ever discovered there is nothing to negotiate: `on_complete` runs
    /// before this returns and nothing is written. Otherwise a confirmed
    /// single-byte write goes to the disconnect characteristic and
    /// `on_complete` runs once that write is acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CharacteristicNotFound`] if services are known but the
    /// disconnect characteristic is not; the acknowledgment stays pending.
    pub fn send_disconnect_command<F>(&mut self, on_complete: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.peripheral.services().is_none() {
            debug!("No services discovered for {:?}, disconnect is immediate", self.id());
            self.pending_disconnect_ack = None;
            on_complete();
            return Ok(());
        }

        self.pending_disconnect_ack = Some(Box::new(on_complete));

        let characteristic = self.require_characteristic(&self.profile.disconnect)?;
        debug!("Sending disconnect command to {:?}", self.id());
        self.peripheral
            .write(&characteristic, &[DISCONNECT_COMMAND], WriteType::WithResponse);

        Ok(())
    }

    /// Write `payload` to the send characteristic as a confirmed write.
    ///
    /// Completion is reported through the observer's data-sent hook. Wait for
    /// characteristic discovery before sending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CharacteristicNotFound`] when the send characteristic
    /// is not (yet) known. Nothing is written in that case.
    pub fn send(&self, payload: impl AsRef<[u8]>) -> Result<()> {
        let payload = payload.as_ref();
        let characteristic = self.require_characteristic(&self.profile.send)?;

        trace!("Sending {} bytes to {:?}", payload.len(), self.id());
        self.peripheral
            .write(&characteristic, payload, WriteType::WithResponse);

        Ok(())
    }

    /// Find a characteristic of the profile service.
    ///
    /// `None` both when services are not discovered yet and when the device
    /// does not expose the characteristic.
    pub fn find_characteristic(&self, uuid: &Uuid) -> Option<GattCharacteristic> {
        let services = self.peripheral.services()?;
        find_characteristic(&services, &self.profile.service, uuid)
    }

    fn require_characteristic(&self, uuid: &Uuid) -> Result<GattCharacteristic> {
        self.find_characteristic(uuid)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: uuid.to_string(),
            })
    }

    // === Transitions ===

    /// The adapter confirmed a connection.
    pub(crate) fn handle_connected(&mut self) {
        info!("Connected to {}", self.display_name());
        self.cancel_timeout();
        self.is_connected = true;
        self.is_timed_out = false;
        self.state = SessionState::Connected;
    }

    /// The link dropped.
    ///
    /// Re-announces the session as discovered, arms the liveness timer, then
    /// reports the disconnect.
    pub(crate) fn handle_disconnected(&mut self, error: Option<&Error>, observer: &mut Observer<P>) {
        match error {
            Some(e) => warn!("{} disconnected: {}", self.display_name(), e),
            None => info!("{} disconnected", self.display_name()),
        }

        self.is_connected = false;
        self.is_timed_out = false;
        self.state = SessionState::Disconnected;

        observer.discovered(self);
        self.arm_timeout();
        observer.disconnected(self);
    }

    /// A liveness timer fired. Returns `false` for a stale firing.
    pub(crate) fn handle_timeout(&mut self, token: TimerToken, observer: &mut Observer<P>) -> bool {
        if !self.timeout.as_ref().is_some_and(|t| t.owns(token)) {
            trace!("Ignoring stale timeout {:?} for {:?}", token, self.id());
            return false;
        }

        self.timeout = None;
        self.is_timed_out = true;
        self.is_connected = false;
        self.state = SessionState::TimedOut;

        info!("{} timed out", self.display_name());
        observer.timed_out(self);
        true
    }

    /// Service discovery finished; discover characteristics of the profile service.
    pub(crate) fn handle_services_discovered(
        &mut self,
        error: Option<&Error>,
        observer: &mut Observer<P>,
    ) {
        if let Some(e) = error {
            warn!("Service discovery on {} reported: {}", self.display_name(), e);
        }

        debug!("Did discover services for {:?}", self.id());
        self.state = SessionState::ServicesDiscovered;

        for service in self.peripheral.services().unwrap_or_default() {
            if service.uuid == self.profile.service {
                self.peripheral.discover_characteristics(&service, &[]);
                self.state = SessionState::CharacteristicsDiscovering;
            }
        }

        observer.services_discovered(self);
    }

    /// Characteristic discovery finished; subscribe to the data channels.
    pub(crate) fn handle_characteristics_discovered(
        &mut self,
        service: &Uuid,
        error: Option<&Error>,
        observer: &mut Observer<P>,
    ) {
        if let Some(e) = error {
            warn!(
                "Characteristic discovery on {} reported: {}",
                self.display_name(),
                e
            );
        }

        let services = self.peripheral.services().unwrap_or_default();
        let characteristics = services
            .iter()
            .filter(|s| s.uuid == *service)
            .filter_map(|s| s.characteristics.as_ref())
            .flatten();

        for characteristic in characteristics {
            debug!("Did discover characteristic {}", characteristic.uuid);
            if characteristic.uuid == self.profile.receive
                || characteristic.uuid == self.profile.send
            {
                self.peripheral.set_notify(characteristic, true);
            }
        }

        self.did_discover_characteristics = true;
        self.state = SessionState::Ready;

        debug!("Did discover characteristics for {:?}", self.id());
        observer.characteristics_discovered(self);
    }

    /// A confirmed write was acknowledged.
    pub(crate) fn handle_write_completed(
        &mut self,
        characteristic: &GattCharacteristic,
        error: Option<&Error>,
        observer: &mut Observer<P>,
    ) {
        trace!("Write to {} acknowledged", characteristic.uuid);

        if characteristic.uuid == self.profile.disconnect {
            if let Some(ack) = self.pending_disconnect_ack.take() {
                ack();
            }
        } else {
            observer.data_sent(self, characteristic, error);
        }
    }

    /// The peripheral pushed a value.
    pub(crate) fn handle_value_updated(
        &mut self,
        value: Option<&Bytes>,
        error: Option<&Error>,
        observer: &mut Observer<P>,
    ) {
        if let Some(e) = error {
            debug!("Value update from {:?} carried error: {}", self.id(), e);
        }

        trace!("Did receive data from {:?}", self.id());
        observer.data_received(self, value);
    }

    fn arm_timeout(&mut self) {
        self.cancel_timeout();

        let id = self.id();
        self.timeout = Some(Timer::once(
            self.timeout_threshold,
            &self.events,
            move |token| Event::SessionTimeout { id, token },
        ));
    }

    fn cancel_timeout(&mut self) {
        if let Some(timer) = self.timeout.take() {
            trace!("Cancelling timeout {:?} for {:?}", timer.token(), self.id());
        }
    }
}

impl<P: PeripheralHandle> std::fmt::Debug for DeviceSession<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("id", &self.id())
            .field("name", &self.display_name())
            .field("state", &self.state)
            .field("rssi", &self.rssi)
            .field("is_connected", &self.is_connected)
            .field("is_timed_out", &self.is_timed_out)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::fake::{recording_observer, FakePeripheral, PeripheralCall};
    use crate::ble::gatt::GattService;
    use crate::ble::uuids::*;
    use crate::event::{event_channel, EventReceiver};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const THRESHOLD: Duration = Duration::from_secs(5);

    fn session(peripheral: FakePeripheral) -> (DeviceSession<FakePeripheral>, EventReceiver<FakePeripheral>) {
        let (tx, rx) = event_channel();
        (
            DeviceSession::new(peripheral, DeviceProfile::default(), THRESHOLD, tx),
            rx,
        )
    }

    fn next_timeout(rx: &mut EventReceiver<FakePeripheral>) -> Option<TimerToken> {
        match rx.try_recv() {
            Ok(Event::SessionTimeout { token, .. }) => Some(token),
            _ => None,
        }
    }

    #[test]
    fn test_display_name() {
        let (named, _rx) = session(FakePeripheral::new(1, Some("RFduino")));
        assert_eq!(named.display_name(), "RFduino");

        let (anonymous, _rx) = session(FakePeripheral::new(2, None));
        assert_eq!(anonymous.display_name(), UNKNOWN_DEVICE_NAME);
    }

    #[test]
    fn test_new_session_state() {
        let (session, _rx) = session(FakePeripheral::new(1, None));
        assert_eq!(session.state(), SessionState::Discovered);
        assert!(!session.is_connected());
        assert!(!session.is_timed_out());
        assert!(!session.has_pending_timeout());
        assert_eq!(session.rssi(), None);
    }

    #[test]
    fn test_disconnect_command_without_services_completes_synchronously() {
        let peripheral = FakePeripheral::new(1, None);
        let (mut session, _rx) = session(peripheral.clone());

        let done = Arc::new(AtomicUsize::new(0));
        let counter = done.clone();
        session
            .send_disconnect_command(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(peripheral.writes().is_empty());
        assert!(!session.has_pending_disconnect_ack());
    }

    #[test]
    fn test_disconnect_command_waits_for_ack() {
        let peripheral = FakePeripheral::new(1, None).with_default_profile();
        let (mut session, _rx) = session(peripheral.clone());
        let (mut observer, log) = recording_observer();

        let done = Arc::new(AtomicUsize::new(0));
        let counter = done.clone();
        session
            .send_disconnect_command(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(
            peripheral.writes(),
            vec![(DISCONNECT_CHARACTERISTIC_UUID, vec![1])]
        );

        // An ack for another characteristic does not complete the handshake.
        let send = GattCharacteristic::new(SEND_CHARACTERISTIC_UUID, DISCOVER_SERVICE_UUID);
        session.handle_write_completed(&send, None, &mut observer);
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(*log.lock(), vec![("data_sent", 1)]);

        let disconnect =
            GattCharacteristic::new(DISCONNECT_CHARACTERISTIC_UUID, DISCOVER_SERVICE_UUID);
        session.handle_write_completed(&disconnect, None, &mut observer);
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(!session.has_pending_disconnect_ack());

        // A second ack finds nothing pending.
        session.handle_write_completed(&disconnect, None, &mut observer);
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_new_disconnect_request_overwrites_pending() {
        let peripheral = FakePeripheral::new(1, None).with_default_profile();
        let (mut session, _rx) = session(peripheral);
        let (mut observer, _log) = recording_observer();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let first = calls.clone();
        session
            .send_disconnect_command(move || first.lock().push("first"))
            .unwrap();
        let second = calls.clone();
        session
            .send_disconnect_command(move || second.lock().push("second"))
            .unwrap();

        let disconnect =
            GattCharacteristic::new(DISCONNECT_CHARACTERISTIC_UUID, DISCOVER_SERVICE_UUID);
        session.handle_write_completed(&disconnect, None, &mut observer);

        assert_eq!(*calls.lock(), vec!["second"]);
    }

    #[test]
    fn test_disconnect_command_missing_characteristic() {
        let peripheral = FakePeripheral::new(1, None);
        peripheral.set_services(Some(vec![GattService::new(DISCOVER_SERVICE_UUID)]));
        let (mut session, _rx) = session(peripheral.clone());

        let result = session.send_disconnect_command(|| {});
        assert!(matches!(result, Err(Error::CharacteristicNotFound { .. })));
        assert!(session.has_pending_disconnect_ack());
        assert!(peripheral.writes().is_empty());
    }

    #[test]
    fn test_send_requires_characteristic() {
        let peripheral = FakePeripheral::new(1, None);
        let (session, _rx) = session(peripheral.clone());

        let result = session.send(b"hello");
        assert!(matches!(result, Err(Error::CharacteristicNotFound { .. })));
        assert!(peripheral.calls().is_empty());
    }

    #[test]
    fn test_send_writes_with_response() {
        let peripheral = FakePeripheral::new(1, None).with_default_profile();
        let (session, _rx) = session(peripheral.clone());

        session.send([0xde_u8, 0xad]).unwrap();

        assert_eq!(
            peripheral.calls(),
            vec![PeripheralCall::Write {
                characteristic: SEND_CHARACTERISTIC_UUID,
                data: vec![0xde, 0xad],
                write_type: WriteType::WithResponse,
            }]
        );
    }

    #[test]
    fn test_discovery_chain() {
        let peripheral = FakePeripheral::new(1, None);
        let (mut session, _rx) = session(peripheral.clone());
        let (mut observer, log) = recording_observer();

        session.discover_services();
        assert_eq!(session.state(), SessionState::ServicesDiscovering);
        assert_eq!(
            peripheral.calls(),
            vec![PeripheralCall::DiscoverServices(vec![DISCOVER_SERVICE_UUID])]
        );

        peripheral.clear_calls();
        peripheral.set_services(Some(vec![GattService::new(DISCOVER_SERVICE_UUID)]));
        session.handle_services_discovered(None, &mut observer);
        assert_eq!(session.state(), SessionState::CharacteristicsDiscovering);
        assert_eq!(
            peripheral.calls(),
            vec![PeripheralCall::DiscoverCharacteristics {
                service: DISCOVER_SERVICE_UUID,
                filter: vec![],
            }]
        );

        peripheral.clear_calls();
        let peripheral = peripheral.with_default_profile();
        session.handle_characteristics_discovered(&DISCOVER_SERVICE_UUID, None, &mut observer);
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.did_discover_characteristics());
        assert_eq!(
            peripheral.calls(),
            vec![
                PeripheralCall::SetNotify {
                    characteristic: RECEIVE_CHARACTERISTIC_UUID,
                    enabled: true,
                },
                PeripheralCall::SetNotify {
                    characteristic: SEND_CHARACTERISTIC_UUID,
                    enabled: true,
                },
            ]
        );

        assert_eq!(
            *log.lock(),
            vec![("services_discovered", 1), ("characteristics_discovered", 1)]
        );
    }

    #[test]
    fn test_services_without_profile_service() {
        let peripheral = FakePeripheral::new(1, None);
        peripheral.set_services(Some(vec![GattService::new(SEND_CHARACTERISTIC_UUID)]));
        let (mut session, _rx) = session(peripheral.clone());
        let (mut observer, _log) = recording_observer();

        session.handle_services_discovered(None, &mut observer);
        assert_eq!(session.state(), SessionState::ServicesDiscovered);
        assert!(peripheral.calls().is_empty());
    }

    #[test]
    fn test_value_update_forwards_payload() {
        let (mut session, _rx) = session(FakePeripheral::new(1, None));
        let mut observer = Observer::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        observer.on_data_received(move |_, data| {
            sink.lock().push(data.cloned());
        });

        session.handle_value_updated(Some(&Bytes::from_static(b"\x01\x02")), None, &mut observer);
        session.handle_value_updated(None, None, &mut observer);

        assert_eq!(
            *received.lock(),
            vec![Some(Bytes::from_static(b"\x01\x02")), None]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_then_timeout() {
        let (mut session, mut rx) = session(FakePeripheral::new(1, None));
        let (mut observer, log) = recording_observer();

        session.handle_connected();
        session.handle_disconnected(None, &mut observer);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.has_pending_timeout());
        assert_eq!(*log.lock(), vec![("discovered", 1), ("disconnect", 1)]);

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(next_timeout(&mut rx), None);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let token = next_timeout(&mut rx).expect("timeout should have fired");
        assert!(session.handle_timeout(token, &mut observer));

        assert_eq!(session.state(), SessionState::TimedOut);
        assert!(session.is_timed_out());
        assert!(!session.is_connected());
        assert!(!session.has_pending_timeout());
        assert_eq!(log.lock().last(), Some(&("timeout", 1)));

        // One-shot: nothing further fires and a replay is stale.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(next_timeout(&mut rx), None);
        assert!(!session.handle_timeout(token, &mut observer));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_cancels_timeout() {
        let (mut session, mut rx) = session(FakePeripheral::new(1, None));
        let (mut observer, log) = recording_observer();

        session.handle_disconnected(None, &mut observer);
        tokio::time::sleep(Duration::from_secs(2)).await;
        session.handle_connected();

        assert_eq!(session.state(), SessionState::Connected);
        assert!(!session.has_pending_timeout());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(next_timeout(&mut rx), None);
        assert!(!log.lock().contains(&("timeout", 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_timer() {
        let (mut session, mut rx) = session(FakePeripheral::new(1, None));
        let (mut observer, _log) = recording_observer();

        session.handle_disconnected(None, &mut observer);
        tokio::time::sleep(Duration::from_secs(3)).await;
        session.handle_disconnected(None, &mut observer);

        // The first timer would have fired at 5s; only the second fires, at 8s.
        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(next_timeout(&mut rx), None);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let token = next_timeout(&mut rx).expect("second timer should fire");
        assert_eq!(next_timeout(&mut rx), None);
        assert!(session.handle_timeout(token, &mut observer));
    }
}
