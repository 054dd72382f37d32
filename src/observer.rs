//! Observer hooks.
//!
//! Every hook is optional; registering a hook replaces the previous one.
//! Hooks run synchronously inside [`ScanManager::dispatch`](crate::ScanManager::dispatch),
//! so they must not block. They receive a shared reference to the session and
//! cannot call back into the manager; record the session id and act after
//! dispatch returns.

use bytes::Bytes;

use crate::ble::central::PeripheralHandle;
use crate::ble::gatt::GattCharacteristic;
use crate::error::Error;
use crate::session::DeviceSession;

type SessionHook<P> = Box<dyn FnMut(&DeviceSession<P>) + Send>;
type DataSentHook<P> = Box<dyn FnMut(&DeviceSession<P>, &GattCharacteristic, Option<&Error>) + Send>;
type DataReceivedHook<P> = Box<dyn FnMut(&DeviceSession<P>, Option<&Bytes>) + Send>;

/// Registered observer hooks.
pub struct Observer<P: PeripheralHandle> {
    on_discovered: Option<SessionHook<P>>,
    on_connected: Option<SessionHook<P>>,
    on_disconnect: Option<SessionHook<P>>,
    on_timeout: Option<SessionHook<P>>,
    on_services_discovered: Option<SessionHook<P>>,
    on_characteristics_discovered: Option<SessionHook<P>>,
    on_data_sent: Option<DataSentHook<P>>,
    on_data_received: Option<DataReceivedHook<P>>,
}

impl<P: PeripheralHandle> Default for Observer<P> {
    fn default() -> Self {
        Self {
            on_discovered: None,
            on_connected: None,
            on_disconnect: None,
            on_timeout: None,
            on_services_discovered: None,
            on_characteristics_discovered: None,
            on_data_sent: None,
            on_data_received: None,
        }
    }
}

impl<P: PeripheralHandle> Observer<P> {
    /// An observer with no hooks registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when a new session joins the discovered set, and again when a
    /// session disconnects (before [`Observer::on_disconnect`]) to re-announce
    /// it as available for reconnection.
    pub fn on_discovered<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&DeviceSession<P>) + Send + 'static,
    {
        self.on_discovered = Some(Box::new(hook));
        self
    }

    /// Called when the adapter confirms a connection.
    pub fn on_connected<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&DeviceSession<P>) + Send + 'static,
    {
        self.on_connected = Some(Box::new(hook));
        self
    }

    /// Called when a session's link drops.
    pub fn on_disconnect<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&DeviceSession<P>) + Send + 'static,
    {
        self.on_disconnect = Some(Box::new(hook));
        self
    }

    /// Called when a disconnected session was not reconnected in time.
    pub fn on_timeout<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&DeviceSession<P>) + Send + 'static,
    {
        self.on_timeout = Some(Box::new(hook));
        self
    }

    /// Called when service discovery finishes.
    pub fn on_services_discovered<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&DeviceSession<P>) + Send + 'static,
    {
        self.on_services_discovered = Some(Box::new(hook));
        self
    }

    /// Called when characteristic discovery finishes; the session is ready for traffic.
    pub fn on_characteristics_discovered<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&DeviceSession<P>) + Send + 'static,
    {
        self.on_characteristics_discovered = Some(Box::new(hook));
        self
    }

    /// Called when a data write is acknowledged (or fails).
    pub fn on_data_sent<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&DeviceSession<P>, &GattCharacteristic, Option<&Error>) + Send + 'static,
    {
        self.on_data_sent = Some(Box::new(hook));
        self
    }

    /// Called with the raw payload of every notification.
    pub fn on_data_received<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&DeviceSession<P>, Option<&Bytes>) + Send + 'static,
    {
        self.on_data_received = Some(Box::new(hook));
        self
    }

    pub(crate) fn discovered(&mut self, session: &DeviceSession<P>) {
        if let Some(hook) = self.on_discovered.as_mut() {
            hook(session);
        }
    }

    pub(crate) fn connected(&mut self, session: &DeviceSession<P>) {
        if let Some(hook) = self.on_connected.as_mut() {
            hook(session);
        }
    }

    pub(crate) fn disconnected(&mut self, session: &DeviceSession<P>) {
        if let Some(hook) = self.on_disconnect.as_mut() {
            hook(session);
        }
    }

    pub(crate) fn timed_out(&mut self, session: &DeviceSession<P>) {
        if let Some(hook) = self.on_timeout.as_mut() {
            hook(session);
        }
    }

    pub(crate) fn services_discovered(&mut self, session: &DeviceSession<P>) {
        if let Some(hook) = self.on_services_discovered.as_mut() {
            hook(session);
        }
    }

    pub(crate) fn characteristics_discovered(&mut self, session: &DeviceSession<P>) {
        if let Some(hook) = self.on_characteristics_discovered.as_mut() {
            hook(session);
        }
    }

    pub(crate) fn data_sent(
        &mut self,
        session: &DeviceSession<P>,
        characteristic: &GattCharacteristic,
        error: Option<&Error>,
    ) {
        if let Some(hook) = self.on_data_sent.as_mut() {
            hook(session, characteristic, error);
        }
    }

    pub(crate) fn data_received(&mut self, session: &DeviceSession<P>, data: Option<&Bytes>) {
        if let Some(hook) = self.on_data_received.as_mut() {
            hook(session, data);
        }
    }
}

impl<P: PeripheralHandle> std::fmt::Debug for Observer<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("on_discovered", &self.on_discovered.is_some())
            .field("on_connected", &self.on_connected.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_timeout", &self.on_timeout.is_some())
            .field("on_services_discovered", &self.on_services_discovered.is_some())
            .field(
                "on_characteristics_discovered",
                &self.on_characteristics_discovered.is_some(),
            )
            .field("on_data_sent", &self.on_data_sent.is_some())
            .field("on_data_received", &self.on_data_received.is_some())
            .finish()
    }
}
