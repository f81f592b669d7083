// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stream manager multiplexing per-device telemetry streams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};

use crate::error::ProtocolError;
use crate::event::{ConnectionEvent, EventBus};
#[cfg(feature = "websocket")]
use crate::protocol::WsConnector;
use crate::protocol::{Connector, TelemetryStream, TransportEvent};
use crate::storage::KeyValueStore;
use crate::subscription::{
    ConnectedCallback, DataCallback, Subscription, SubscriptionId, Unsubscribe,
};
use crate::telemetry::{TelemetryMessage, decode_frame};
use crate::types::DeviceId;

use super::device_link::{DeviceLink, LinkState};
use super::stream_config::StreamConfig;

/// Manager for real-time device telemetry streams.
///
/// The `StreamManager` keeps at most one stream per device, no matter how
/// many parts of the application subscribe to it. Every decoded frame is
/// fanned out to all subscribers of that device in registration order. When
/// a stream closes it is reopened after a fixed delay, up to a bounded number
/// of attempts. When the last subscriber of a device leaves, its stream is
/// closed and all state for it is dropped.
///
/// Subscribers never see connection errors. Failures are logged through
/// `tracing` and published as [`ConnectionEvent`]s on [`events`](Self::events).
///
/// The manager is cheap to clone; clones share the same registry.
///
/// # Runtime
///
/// Subscribing spawns Tokio tasks, so [`subscribe`](Self::subscribe) must be
/// called from within a Tokio runtime. Callbacks run on those tasks and must
/// not block.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use plug_telemetry::manager::StreamManager;
/// use plug_telemetry::storage::MemoryStore;
/// use plug_telemetry::types::DeviceId;
///
/// #[tokio::main]
/// async fn main() -> plug_telemetry::Result<()> {
///     let manager = StreamManager::new(Arc::new(MemoryStore::with_token("secret")));
///     let plug = DeviceId::new("plug-1")?;
///
///     let sub = manager.subscribe_with_connected(
///         &plug,
///         |msg| println!("{} draws {} W", msg.device_id, msg.power),
///         |id| println!("{id} connected"),
///     );
///
///     // ...
///
///     sub.unsubscribe();
///     Ok(())
/// }
/// ```
#[cfg(feature = "websocket")]
pub struct StreamManager<C: Connector = WsConnector> {
    shared: Arc<Shared<C>>,
}

/// Manager for real-time device telemetry streams.
#[cfg(not(feature = "websocket"))]
pub struct StreamManager<C: Connector> {
    shared: Arc<Shared<C>>,
}

/// State shared between the manager handles and the connection tasks.
struct Shared<C> {
    connector: C,
    store: Arc<dyn KeyValueStore>,
    config: StreamConfig,
    /// Device links, keyed by device ID. Never held across an await.
    links: Mutex<HashMap<DeviceId, DeviceLink>>,
    next_subscription: AtomicU64,
    next_epoch: AtomicU64,
    event_bus: EventBus,
}

#[cfg(feature = "websocket")]
impl StreamManager<WsConnector> {
    /// Creates a manager using the default endpoint and reconnect policy.
    ///
    /// The session token is read from `store` each time a connection is
    /// attempted.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(store, StreamConfig::default())
    }

    /// Creates a manager with a custom configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn KeyValueStore>, config: StreamConfig) -> Self {
        Self::with_connector(WsConnector::new(), store, config)
    }
}

impl<C: Connector> StreamManager<C> {
    /// Creates a manager that opens streams through `connector`.
    #[must_use]
    pub fn with_connector(connector: C, store: Arc<dyn KeyValueStore>, config: StreamConfig) -> Self {
        let event_bus = EventBus::with_capacity(config.event_capacity);
        Self {
            shared: Arc::new(Shared {
                connector,
                store,
                config,
                links: Mutex::new(HashMap::new()),
                next_subscription: AtomicU64::new(1),
                next_epoch: AtomicU64::new(1),
                event_bus,
            }),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.shared.config
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Subscribes to telemetry for `device_id`.
    ///
    /// Opens the device stream if it is neither open nor being opened. The
    /// callback is invoked once per decoded frame, after any callbacks
    /// registered earlier for the same device.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn subscribe<F>(&self, device_id: &DeviceId, on_data: F) -> Subscription
    where
        F: Fn(&TelemetryMessage) + Send + Sync + 'static,
    {
        self.register(device_id, Arc::new(on_data), None)
    }

    /// Subscribes to telemetry and to connection establishment.
    ///
    /// `on_connected` fires each time the stream opens after this call,
    /// including reopens after a reconnect. If the stream is already open it
    /// does not fire until the next open.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn subscribe_with_connected<F, G>(
        &self,
        device_id: &DeviceId,
        on_data: F,
        on_connected: G,
    ) -> Subscription
    where
        F: Fn(&TelemetryMessage) + Send + Sync + 'static,
        G: Fn(&DeviceId) + Send + Sync + 'static,
    {
        self.register(device_id, Arc::new(on_data), Some(Arc::new(on_connected)))
    }

    /// Removes the subscription `id` from `device_id`.
    ///
    /// Removing the last subscription closes the stream, cancels any pending
    /// reconnect and drops all state for the device. Returns `false` if the
    /// subscription was not registered.
    pub fn unsubscribe(&self, device_id: &DeviceId, id: SubscriptionId) -> bool {
        self.shared.unsubscribe(device_id, id)
    }

    /// Subscribes to connection lifecycle events for all devices.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.event_bus.subscribe()
    }

    fn register(
        &self,
        device_id: &DeviceId,
        on_data: DataCallback,
        on_connected: Option<ConnectedCallback>,
    ) -> Subscription {
        let id = SubscriptionId::new(self.shared.next_subscription.fetch_add(1, Ordering::Relaxed));

        {
            let mut links = self.shared.links.lock();
            let link = links.entry(device_id.clone()).or_insert_with(DeviceLink::new);
            link.callbacks.push(id, on_data, on_connected);
            tracing::debug!(
                %device_id,
                subscription = %id,
                subscribers = link.callbacks.len(),
                "Subscription added"
            );
        }

        self.shared.connect(device_id);

        let weak = Arc::downgrade(&self.shared);
        let registry: Weak<dyn Unsubscribe> = weak;
        Subscription::new(device_id.clone(), id, registry)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Closes the stream of `device_id` and removes all its subscriptions.
    ///
    /// Pending reconnects are cancelled. Returns `false` if the device had no
    /// subscribers. Calling it again is a no-op.
    pub fn disconnect(&self, device_id: &DeviceId) -> bool {
        let link = self.shared.links.lock().remove(device_id);
        match link {
            Some(link) => {
                self.shared.tear_down(device_id, link);
                true
            }
            None => false,
        }
    }

    /// Closes every stream and removes every subscription.
    ///
    /// Returns the number of devices that were disconnected.
    pub fn disconnect_all(&self) -> usize {
        let links: Vec<_> = self.shared.links.lock().drain().collect();
        let count = links.len();

        for (device_id, link) in links {
            link.teardown();
            self.shared
                .event_bus
                .publish(ConnectionEvent::disconnected(device_id));
        }

        tracing::info!(count, "All telemetry streams disconnected");
        count
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Returns the link state of `device_id`.
    #[must_use]
    pub fn link_state(&self, device_id: &DeviceId) -> LinkState {
        self.shared
            .links
            .lock()
            .get(device_id)
            .map_or(LinkState::Absent, DeviceLink::state)
    }

    /// Returns true if the stream of `device_id` is open.
    #[must_use]
    pub fn is_connected(&self, device_id: &DeviceId) -> bool {
        self.link_state(device_id).is_connected()
    }

    /// Returns the number of subscriptions registered for `device_id`.
    #[must_use]
    pub fn subscriber_count(&self, device_id: &DeviceId) -> usize {
        self.shared
            .links
            .lock()
            .get(device_id)
            .map_or(0, |link| link.callbacks.len())
    }

    /// Returns the devices that currently have subscribers, sorted.
    #[must_use]
    pub fn device_ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<_> = self.shared.links.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the consecutive reconnect attempts for `device_id`, or `None`
    /// if it has no subscribers.
    #[must_use]
    pub fn reconnect_attempts(&self, device_id: &DeviceId) -> Option<u32> {
        self.shared
            .links
            .lock()
            .get(device_id)
            .map(DeviceLink::reconnect_attempts)
    }
}

impl<C: Connector> Clone for StreamManager<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connector> std::fmt::Debug for StreamManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamManager")
            .field("endpoint", &self.shared.config.endpoint)
            .field("devices", &self.shared.links.lock().len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Connection tasks
// =============================================================================

impl<C: Connector> Shared<C> {
    /// Starts a connection for `device_id` unless one is open or in flight.
    fn connect(self: &Arc<Self>, device_id: &DeviceId) {
        let mut links = self.links.lock();
        let Some(link) = links.get_mut(device_id) else {
            return;
        };
        if link.is_active() {
            tracing::debug!(%device_id, "Stream already open or connecting");
            return;
        }

        let token = match self.session_token() {
            Ok(token) => token,
            Err(e) => {
                drop(links);
                tracing::warn!(%device_id, error = %e, "Connection not attempted");
                self.event_bus.publish(ConnectionEvent::TokenMissing {
                    device_id: device_id.clone(),
                });
                return;
            }
        };

        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let shutdown = link.begin(epoch);
        let attempt = link.reconnect_attempts();
        drop(links);

        tracing::debug!(
            %device_id,
            url = %self.config.endpoint.redacted_url_for(device_id),
            attempt,
            "Connecting"
        );
        self.event_bus
            .publish(ConnectionEvent::connecting(device_id.clone(), attempt));

        let url = self.config.endpoint.url_for(device_id, &token);
        tokio::spawn(Arc::clone(self).run_link(device_id.clone(), epoch, url, shutdown));
    }

    /// Reads the session token. An empty token counts as missing.
    fn session_token(&self) -> Result<String, ProtocolError> {
        self.store
            .get(&self.config.token_key)
            .filter(|token| !token.is_empty())
            .ok_or(ProtocolError::MissingToken)
    }

    /// Drives one connection from open to close.
    async fn run_link(
        self: Arc<Self>,
        device_id: DeviceId,
        epoch: u64,
        url: String,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let opened = tokio::select! {
            biased;
            _ = &mut shutdown => None,
            result = self.connector.connect(&url) => Some(result),
        };

        let mut stream = match opened {
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                tracing::error!(%device_id, error = %e, "Failed to open telemetry stream");
                self.handle_close(&device_id, epoch);
                return;
            }
            None => {
                tracing::debug!(%device_id, epoch, "Connection attempt cancelled");
                return;
            }
        };

        if !self.handle_open(&device_id, epoch) {
            tracing::debug!(%device_id, epoch, "Link gone before open, closing stream");
            stream.close().await;
            return;
        }

        loop {
            let event = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                event = stream.next_event() => Some(event),
            };

            match event {
                Some(TransportEvent::Frame(payload)) => {
                    self.dispatch_frame(&device_id, epoch, &payload);
                }
                Some(TransportEvent::Error(e)) => {
                    tracing::error!(%device_id, error = %e, "Telemetry stream error");
                }
                Some(TransportEvent::Closed) => break,
                None => {
                    stream.close().await;
                    tracing::debug!(%device_id, epoch, "Connection task stopped");
                    return;
                }
            }
        }

        self.handle_close(&device_id, epoch);
    }

    /// Marks the link open and notifies connection callbacks.
    ///
    /// The `Connected` event is published before the callbacks run, so a
    /// callback that disconnects is observed after it. Returns false if the
    /// link was torn down or replaced meanwhile.
    fn handle_open(&self, device_id: &DeviceId, epoch: u64) -> bool {
        let fan_out = {
            let mut links = self.links.lock();
            let Some(link) = links.get_mut(device_id) else {
                return false;
            };
            if !link.mark_open(epoch) {
                return false;
            }
            self.event_bus
                .publish(ConnectionEvent::connected(device_id.clone()));
            link.callbacks.connected_fan_out()
        };

        tracing::info!(%device_id, "Telemetry stream opened");
        fan_out.deliver(device_id);
        true
    }

    /// Decodes one frame and delivers it to the device's subscribers.
    fn dispatch_frame(&self, device_id: &DeviceId, epoch: u64, payload: &str) {
        let message = match decode_frame(device_id, payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(%device_id, error = %e, "Dropping malformed telemetry frame");
                return;
            }
        };

        let fan_out = {
            let links = self.links.lock();
            match links.get(device_id) {
                Some(link) if link.is_current(epoch) => link.callbacks.data_fan_out(),
                _ => return,
            }
        };

        let delivered = fan_out.deliver(&message);
        tracing::debug!(%device_id, delivered, "Telemetry frame dispatched");
    }

    /// Clears the live connection and schedules a reconnect if allowed.
    fn handle_close(self: &Arc<Self>, device_id: &DeviceId, epoch: u64) {
        let mut links = self.links.lock();
        let Some(link) = links.get_mut(device_id) else {
            tracing::debug!(%device_id, epoch, "Stream closed after teardown");
            return;
        };
        if !link.mark_closed(epoch) {
            tracing::debug!(%device_id, epoch, "Stale stream closed");
            return;
        }

        let policy = &self.config.reconnect;
        let scheduled = if policy.should_retry(link.reconnect_attempts()) {
            let attempt = link.next_attempt();
            let delay = policy.delay();
            let timer = tokio::spawn(Arc::clone(self).reconnect_after(
                device_id.clone(),
                epoch,
                delay,
            ));
            link.set_timer(epoch, timer.abort_handle());
            Some((attempt, delay))
        } else {
            None
        };
        let attempts = link.reconnect_attempts();
        drop(links);

        self.event_bus
            .publish(ConnectionEvent::closed(device_id.clone()));

        match scheduled {
            Some((attempt, delay)) => {
                tracing::debug!(
                    %device_id,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Reconnect scheduled"
                );
                self.event_bus.publish(ConnectionEvent::ReconnectScheduled {
                    device_id: device_id.clone(),
                    attempt,
                    delay,
                });
            }
            None if policy.enabled => {
                tracing::warn!(%device_id, attempts, "Reconnect attempts exhausted, giving up");
                self.event_bus.publish(ConnectionEvent::ReconnectExhausted {
                    device_id: device_id.clone(),
                    attempts,
                });
            }
            None => {
                tracing::debug!(%device_id, "Stream closed, reconnect disabled");
            }
        }
    }

    /// Waits `delay`, then reconnects unless the timer was cancelled.
    async fn reconnect_after(self: Arc<Self>, device_id: DeviceId, epoch: u64, delay: Duration) {
        tokio::time::sleep(delay).await;

        let due = self
            .links
            .lock()
            .get_mut(&device_id)
            .is_some_and(|link| link.take_timer(epoch));

        if due {
            tracing::debug!(%device_id, "Reconnecting");
            self.connect(&device_id);
        }
    }

    /// Releases a link already removed from the registry.
    fn tear_down(&self, device_id: &DeviceId, link: DeviceLink) {
        link.teardown();
        tracing::info!(%device_id, "Telemetry stream disconnected");
        self.event_bus
            .publish(ConnectionEvent::disconnected(device_id.clone()));
    }
}

impl<C: Connector> Unsubscribe for Shared<C> {
    fn unsubscribe(&self, device_id: &DeviceId, id: SubscriptionId) -> bool {
        let emptied = {
            let mut links = self.links.lock();
            let Some(link) = links.get_mut(device_id) else {
                return false;
            };
            if !link.callbacks.remove(id) {
                return false;
            }
            tracing::debug!(
                %device_id,
                subscription = %id,
                remaining = link.callbacks.len(),
                "Subscription removed"
            );
            if link.callbacks.is_empty() {
                links.remove(device_id)
            } else {
                None
            }
        };

        if let Some(link) = emptied {
            self.tear_down(device_id, link);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ReconnectPolicy;
    use crate::storage::MemoryStore;

    /// Connector whose attempts never complete.
    struct PendingConnector;

    struct IdleStream;

    impl TelemetryStream for IdleStream {
        async fn next_event(&mut self) -> TransportEvent {
            std::future::pending().await
        }

        async fn close(&mut self) {}
    }

    impl Connector for PendingConnector {
        type Stream = IdleStream;

        async fn connect(&self, _url: &str) -> Result<IdleStream, ProtocolError> {
            std::future::pending().await
        }
    }

    fn manager(store: MemoryStore) -> StreamManager<PendingConnector> {
        StreamManager::with_connector(PendingConnector, Arc::new(store), StreamConfig::default())
    }

    fn dev(id: &str) -> DeviceId {
        DeviceId::new(id).unwrap()
    }

    #[tokio::test]
    async fn subscribe_starts_connecting() {
        let manager = manager(MemoryStore::with_token("t"));
        let _sub = manager.subscribe(&dev("a"), |_| {});

        assert_eq!(manager.link_state(&dev("a")), LinkState::Connecting);
        assert_eq!(manager.subscriber_count(&dev("a")), 1);
        assert!(!manager.is_connected(&dev("a")));
    }

    #[tokio::test]
    async fn subscription_ids_are_unique() {
        let manager = manager(MemoryStore::with_token("t"));
        let first = manager.subscribe(&dev("a"), |_| {});
        let second = manager.subscribe(&dev("a"), |_| {});

        assert_ne!(first.id(), second.id());
        assert_eq!(manager.subscriber_count(&dev("a")), 2);
    }

    #[tokio::test]
    async fn last_unsubscribe_removes_device() {
        let manager = manager(MemoryStore::with_token("t"));
        let first = manager.subscribe(&dev("a"), |_| {});
        let second = manager.subscribe(&dev("a"), |_| {});

        assert!(first.unsubscribe());
        assert_eq!(manager.link_state(&dev("a")), LinkState::Connecting);

        assert!(manager.unsubscribe(&dev("a"), second.id()));
        assert_eq!(manager.link_state(&dev("a")), LinkState::Absent);
        assert!(manager.device_ids().is_empty());
        assert!(!second.unsubscribe());
    }

    #[tokio::test]
    async fn unsubscribe_unknown_is_noop() {
        let manager = manager(MemoryStore::with_token("t"));
        let sub = manager.subscribe(&dev("a"), |_| {});

        assert!(!manager.unsubscribe(&dev("b"), sub.id()));
        assert!(!manager.unsubscribe(&dev("a"), SubscriptionId::new(999)));
        assert_eq!(manager.subscriber_count(&dev("a")), 1);
    }

    #[tokio::test]
    async fn missing_token_leaves_link_closed() {
        let manager = manager(MemoryStore::new());
        let mut events = manager.events();
        let _sub = manager.subscribe(&dev("a"), |_| {});

        assert_eq!(
            manager.link_state(&dev("a")),
            LinkState::Closed { attempts: 0 }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::TokenMissing { device_id: dev("a") }
        );
    }

    #[tokio::test]
    async fn empty_token_counts_as_missing() {
        let manager = manager(MemoryStore::with_token(""));
        let _sub = manager.subscribe(&dev("a"), |_| {});

        assert!(!manager.link_state(&dev("a")).is_connected());
        assert_eq!(
            manager.link_state(&dev("a")),
            LinkState::Closed { attempts: 0 }
        );
    }

    #[test]
    fn session_token_lookup() {
        let present = manager(MemoryStore::with_token("t"));
        assert_eq!(present.shared.session_token().unwrap(), "t");

        for store in [MemoryStore::new(), MemoryStore::with_token("")] {
            let absent = manager(store);
            assert!(matches!(
                absent.shared.session_token(),
                Err(ProtocolError::MissingToken)
            ));
        }
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let manager = manager(MemoryStore::with_token("t"));
        let _sub = manager.subscribe(&dev("a"), |_| {});

        assert!(manager.disconnect(&dev("a")));
        assert!(!manager.disconnect(&dev("a")));
        assert_eq!(manager.reconnect_attempts(&dev("a")), None);
    }

    #[tokio::test]
    async fn disconnect_all_clears_registry() {
        let manager = manager(MemoryStore::with_token("t"));
        let _a = manager.subscribe(&dev("b"), |_| {});
        let _b = manager.subscribe(&dev("a"), |_| {});

        assert_eq!(manager.device_ids(), vec![dev("a"), dev("b")]);
        assert_eq!(manager.disconnect_all(), 2);
        assert!(manager.device_ids().is_empty());
        assert_eq!(manager.disconnect_all(), 0);
    }

    #[tokio::test]
    async fn clones_share_registry() {
        let manager = manager(MemoryStore::with_token("t"));
        let clone = manager.clone();
        let _sub = manager.subscribe(&dev("a"), |_| {});

        assert_eq!(clone.subscriber_count(&dev("a")), 1);
        assert!(format!("{clone:?}").contains("StreamManager"));
    }

    #[tokio::test]
    async fn custom_token_key_is_used() {
        let store = MemoryStore::new();
        store.set("session", "abc").unwrap();
        let config = StreamConfig::new()
            .with_token_key("session")
            .with_reconnect(ReconnectPolicy::disabled());
        let manager = StreamManager::with_connector(PendingConnector, Arc::new(store), config);

        let _sub = manager.subscribe(&dev("a"), |_| {});
        assert_eq!(manager.link_state(&dev("a")), LinkState::Connecting);
    }
}
