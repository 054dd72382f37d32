//! Scan manager for discovering and managing RFduino-profile peripherals.
//!
//! The manager owns the radio adapter, the ordered set of discovered
//! sessions, the rescan timer and the observer. Everything that happens to it
//! arrives through [`ScanManager::dispatch`], one event at a time.

use tracing::{debug, info, trace, warn};

use crate::ble::advertising::AdvertisementData;
use crate::ble::central::{AdapterState, Central, PeripheralHandle, ScanOptions};
use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::event::{CentralEvent, Event, EventReceiver, EventSender};
use crate::logging;
use crate::observer::Observer;
use crate::session::DeviceSession;
use crate::timer::Timer;

type PeripheralId<C> = <<C as Central>::Peripheral as PeripheralHandle>::Id;

/// Central controller over the radio adapter.
pub struct ScanManager<C: Central> {
    /// Radio adapter.
    central: C,
    /// Validated configuration.
    config: ManagerConfig,
    /// Sending half of the queue this manager is driven from.
    events: EventSender<C::Peripheral>,
    /// Discovered sessions in discovery order, unique by peripheral id.
    sessions: Vec<DeviceSession<C::Peripheral>>,
    /// Registered hooks.
    observer: Observer<C::Peripheral>,
    /// At most one live rescan timer.
    rescan_timer: Option<Timer>,
    /// Last reported adapter state.
    adapter_state: AdapterState,
    /// Whether a scan was requested and not stopped.
    is_scanning: bool,
}

impl<C: Central> ScanManager<C> {
    /// Create a new manager.
    ///
    /// `events` must be the sending half of the queue whose receiver drives
    /// [`ScanManager::dispatch`] (or [`ScanManager::run`]); timers and
    /// disconnect handshakes post back into it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        central: C,
        config: ManagerConfig,
        events: EventSender<C::Peripheral>,
    ) -> Result<Self> {
        config.validate()?;

        if config.logging_enabled {
            logging::set_logging_enabled(true);
        }

        info!("Initialized scan manager");

        Ok(Self {
            central,
            config,
            events,
            sessions: Vec::new(),
            observer: Observer::new(),
            rescan_timer: None,
            adapter_state: AdapterState::Unknown,
            is_scanning: false,
        })
    }

    /// Turn crate-installed logging on or off.
    pub fn set_logging_enabled(&mut self, enabled: bool) {
        self.config.logging_enabled = enabled;
        logging::set_logging_enabled(enabled);
    }

    // === Scanning ===

    /// Scan for peripherals advertising the profile service.
    ///
    /// Duplicate reports are suppressed; the rescan timer restarts the scan
    /// periodically so devices keep being reported.
    pub fn start_scanning(&mut self) {
        info!("Started scanning for peripherals");
        self.is_scanning = true;
        self.central.start_scan(&ScanOptions {
            services: vec![self.config.profile.service],
            allow_duplicates: false,
        });
    }

    /// Stop scanning and forget every discovered session.
    ///
    /// Established links are not torn down.
    pub fn stop_scanning(&mut self) {
        self.sessions.clear();
        self.rescan_timer = None;
        self.is_scanning = false;
        info!("Stopped scanning for peripherals");
        self.central.stop_scan();
    }

    /// Check if a scan is active.
    pub fn is_scanning(&self) -> bool {
        self.is_scanning
    }

    // === Connections ===

    /// Request a connection to a discovered session.
    pub fn connect(&self, id: &PeripheralId<C>) -> Result<()> {
        let session = self.require_session(id)?;
        info!("Connecting to {}", session.display_name());
        self.central.connect(session.peripheral());
        Ok(())
    }

    /// Disconnect gracefully.
    ///
    /// Sends the disconnect command first and tears the link down only once
    /// the device acknowledged it (immediately if services were never
    /// discovered).
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] for an unknown id, or
    /// [`Error::CharacteristicNotFound`] if the device lacks the disconnect
    /// characteristic; use [`ScanManager::disconnect_without_command`] then.
    pub fn disconnect(&mut self, id: &PeripheralId<C>) -> Result<()> {
        let events = self.events.clone();
        let session = self.require_session_mut(id)?;
        info!("Disconnecting from {}", session.display_name());

        let peripheral = session.peripheral().clone();
        session.send_disconnect_command(move || {
            let _ = events.send(Event::CancelConnection { peripheral });
        })
    }

    /// Tear the link down without the disconnect handshake.
    pub fn disconnect_without_command(&self, id: &PeripheralId<C>) -> Result<()> {
        let session = self.require_session(id)?;
        info!("Disconnecting from {} without command", session.display_name());
        self.central.cancel_connection(session.peripheral());
        Ok(())
    }

    /// Request service discovery on a session.
    pub fn discover_services(&mut self, id: &PeripheralId<C>) -> Result<()> {
        self.require_session_mut(id)?.discover_services();
        Ok(())
    }

    /// Send a payload on a session's data channel.
    pub fn send(&self, id: &PeripheralId<C>, payload: impl AsRef<[u8]>) -> Result<()> {
        self.require_session(id)?.send(payload)
    }

    /// Stop scanning and drop every live link without handshakes.
    pub fn shutdown(&mut self) {
        info!("Shutting down scan manager");

        for session in self.sessions.iter().filter(|s| s.is_connected()) {
            self.central.cancel_connection(session.peripheral());
        }

        self.stop_scanning();
    }

    // === Sessions ===

    /// Discovered sessions in discovery order.
    pub fn sessions(&self) -> &[DeviceSession<C::Peripheral>] {
        &self.sessions
    }

    /// Look up a session by peripheral id.
    pub fn session(&self, id: &PeripheralId<C>) -> Option<&DeviceSession<C::Peripheral>> {
        self.sessions.iter().find(|s| s.id() == *id)
    }

    /// Look up a session mutably, e.g. to send or discover services.
    pub fn session_mut(
        &mut self,
        id: &PeripheralId<C>,
    ) -> Option<&mut DeviceSession<C::Peripheral>> {
        find_session_mut(&mut self.sessions, id)
    }

    /// Number of discovered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The session with the strongest signal.
    pub fn nearest_session(&self) -> Option<&DeviceSession<C::Peripheral>> {
        self.sessions
            .iter()
            .max_by_key(|s| s.rssi().unwrap_or(i16::MIN))
    }

    /// Sessions sorted by signal strength (strongest first).
    pub fn sessions_by_signal(&self) -> Vec<&DeviceSession<C::Peripheral>> {
        let mut sessions: Vec<_> = self.sessions.iter().collect();
        sessions.sort_by_key(|s| std::cmp::Reverse(s.rssi().unwrap_or(i16::MIN)));
        sessions
    }

    // === Accessors ===

    /// Register observer hooks.
    pub fn observer_mut(&mut self) -> &mut Observer<C::Peripheral> {
        &mut self.observer
    }

    /// The validated configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Last reported adapter state.
    pub fn adapter_state(&self) -> AdapterState {
        self.adapter_state
    }

    /// The radio adapter.
    pub fn central(&self) -> &C {
        &self.central
    }

    // === Event processing ===

    /// Process events until the queue closes or the future is dropped.
    pub async fn run(&mut self, mut events: EventReceiver<C::Peripheral>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event);
        }

        debug!("Event queue closed");
    }

    /// Handle one event.
    ///
    /// # Panics
    ///
    /// Discoveries and disconnects arm timers with `tokio::spawn`, so this
    /// must be called from within a tokio runtime.
    pub fn dispatch(&mut self, event: Event<C::Peripheral>) {
        match event {
            Event::Central(event) => self.handle_central_event(event),
            Event::SessionTimeout { id, token } => {
                match find_session_mut(&mut self.sessions, &id) {
                    Some(session) => {
                        session.handle_timeout(token, &mut self.observer);
                    }
                    None => debug!("Dropping timeout for unknown session {:?}", id),
                }
            }
            Event::Rescan { token } => {
                if self.rescan_timer.as_ref().is_some_and(|t| t.owns(token)) {
                    self.start_scanning();
                } else {
                    trace!("Ignoring stale rescan tick {:?}", token);
                }
            }
            Event::CancelConnection { peripheral } => {
                debug!("Disconnect handshake done for {:?}", peripheral.id());
                self.central.cancel_connection(&peripheral);
            }
        }
    }

    fn handle_central_event(&mut self, event: CentralEvent<C::Peripheral>) {
        let is_discovery = matches!(event, CentralEvent::PeripheralDiscovered { .. });
        if let Some(id) = event.peripheral_id().filter(|_| !is_discovery) {
            if self.session(&id).is_none() {
                debug!("Dropping event for unknown peripheral {:?}", id);
                return;
            }
        }

        match event {
            CentralEvent::StateChanged(state) => self.handle_state_changed(state),
            CentralEvent::PeripheralDiscovered {
                peripheral,
                advertisement,
                rssi,
            } => self.handle_discovered(peripheral, advertisement, rssi),
            CentralEvent::PeripheralConnected { id } => {
                debug!("Did connect peripheral {:?}", id);
                if let Some(session) = find_session_mut(&mut self.sessions, &id) {
                    session.handle_connected();
                    self.observer.connected(session);
                }
            }
            CentralEvent::PeripheralDisconnected { id, error } => {
                debug!("Did disconnect peripheral {:?}", id);
                if let Some(session) = find_session_mut(&mut self.sessions, &id) {
                    session.handle_disconnected(error.as_ref(), &mut self.observer);
                }
            }
            CentralEvent::ConnectFailed { id, error } => match error {
                Some(e) => warn!("Did fail to connect to {:?}: {}", id, e),
                None => warn!("Did fail to connect to {:?}", id),
            },
            CentralEvent::ServicesDiscovered { id, error } => {
                if let Some(session) = find_session_mut(&mut self.sessions, &id) {
                    session.handle_services_discovered(error.as_ref(), &mut self.observer);
                }
            }
            CentralEvent::CharacteristicsDiscovered { id, service, error } => {
                if let Some(session) = find_session_mut(&mut self.sessions, &id) {
                    session.handle_characteristics_discovered(
                        &service,
                        error.as_ref(),
                        &mut self.observer,
                    );
                }
            }
            CentralEvent::WriteCompleted {
                id,
                characteristic,
                error,
            } => {
                if let Some(session) = find_session_mut(&mut self.sessions, &id) {
                    session.handle_write_completed(
                        &characteristic,
                        error.as_ref(),
                        &mut self.observer,
                    );
                }
            }
            CentralEvent::ValueUpdated {
                id, value, error, ..
            } => {
                if let Some(session) = find_session_mut(&mut self.sessions, &id) {
                    session.handle_value_updated(
                        value.as_ref(),
                        error.as_ref(),
                        &mut self.observer,
                    );
                }
            }
        }
    }

    fn handle_state_changed(&mut self, state: AdapterState) {
        self.adapter_state = state;

        if state.is_powered_on() {
            info!("Bluetooth powered on");
            self.start_scanning();
        } else {
            info!("Bluetooth state: {}", state);
        }
    }

    fn handle_discovered(
        &mut self,
        peripheral: C::Peripheral,
        advertisement: AdvertisementData,
        rssi: Option<i16>,
    ) {
        debug!(
            "Did discover peripheral with name: {}",
            peripheral.name().unwrap_or_default()
        );

        let id = peripheral.id();
        if !self.is_scanning {
            // Reports still in flight after stop_scanning.
            debug!("Ignoring discovery of {:?} while not scanning", id);
            return;
        }

        let (index, is_new) = match self.sessions.iter().position(|s| s.id() == id) {
            Some(index) => (index, false),
            None => {
                self.sessions.push(DeviceSession::new(
                    peripheral,
                    self.config.profile,
                    self.config.timeout_threshold,
                    self.events.clone(),
                ));
                (self.sessions.len() - 1, true)
            }
        };

        let session = &mut self.sessions[index];
        session.update_from_advertising(advertisement, rssi);

        if is_new {
            info!(
                "Discovered new peripheral: {} ({:?})",
                session.display_name(),
                id
            );
            self.observer.discovered(session);
        }

        self.rearm_rescan();
    }

    fn rearm_rescan(&mut self) {
        self.rescan_timer = None;
        self.rescan_timer = Some(Timer::repeating(
            self.config.rescan_interval,
            &self.events,
            |token| Event::Rescan { token },
        ));
    }

    fn require_session(&self, id: &PeripheralId<C>) -> Result<&DeviceSession<C::Peripheral>> {
        self.session(id).ok_or_else(|| Error::SessionNotFound {
            identifier: format!("{:?}", id),
        })
    }

    fn require_session_mut(
        &mut self,
        id: &PeripheralId<C>,
    ) -> Result<&mut DeviceSession<C::Peripheral>> {
        find_session_mut(&mut self.sessions, id).ok_or_else(|| Error::SessionNotFound {
            identifier: format!("{:?}", id),
        })
    }
}

fn find_session_mut<'a, P: PeripheralHandle>(
    sessions: &'a mut [DeviceSession<P>],
    id: &P::Id,
) -> Option<&'a mut DeviceSession<P>> {
    sessions.iter_mut().find(|s| s.id() == *id)
}

impl<C: Central> std::fmt::Debug for ScanManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanManager")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("adapter_state", &self.adapter_state)
            .field("is_scanning", &self.is_scanning)
            .finish()
    }
}
