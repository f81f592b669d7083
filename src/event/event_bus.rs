// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast channel carrying [`ConnectionEvent`]s.

use tokio::sync::broadcast;

use super::ConnectionEvent;

/// Number of events buffered per observer before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out of connection events to any number of observers.
///
/// Publishing never waits on observers. An observer that falls more than
/// [`capacity`](Self::capacity) events behind skips the oldest ones and gets
/// `RecvError::Lagged` once. Clones publish into the same channel.
///
/// ```
/// use plug_telemetry::event::{ConnectionEvent, EventBus};
/// use plug_telemetry::types::DeviceId;
///
/// let bus = EventBus::with_capacity(16);
/// let mut rx = bus.subscribe();
///
/// let plug = DeviceId::new("plug-1").unwrap();
/// assert_eq!(bus.publish(ConnectionEvent::closed(plug.clone())), 1);
/// assert_eq!(rx.try_recv().unwrap(), ConnectionEvent::closed(plug));
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ConnectionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a bus with [`DEFAULT_CHANNEL_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a bus buffering up to `capacity` events per observer.
    ///
    /// Zero is raised to one, since a broadcast channel needs a slot.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Returns the per-observer buffer size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Registers an observer. It sees only events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of live observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Sends `event` to every observer and returns how many there were.
    ///
    /// With no observers the event is dropped and 0 is returned.
    pub fn publish(&self, event: ConnectionEvent) -> usize {
        match self.sender.send(event) {
            Ok(observers) => observers,
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(device_id = %event.device_id(), "No event observers");
                0
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
