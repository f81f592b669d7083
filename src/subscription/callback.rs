// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for device telemetry subscriptions.
//!
//! This module provides the core types for managing subscription callbacks:
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`CallbackList`] - Ordered per-device list of registered callbacks
//! - [`FanOut`] - Snapshot of a list, used to deliver one event outside the
//!   registry lock

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::telemetry::TelemetryMessage;
use crate::types::DeviceId;

/// Unique identifier for a subscription.
///
/// This ID is returned when creating a subscription and can be used to
/// unsubscribe later. IDs are unique within a manager's lifetime, so two
/// subscriptions with identical closures are still removed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a new subscription ID with the given value.
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Callback invoked once per decoded telemetry message.
pub type DataCallback = Arc<dyn Fn(&TelemetryMessage) + Send + Sync>;

/// Callback invoked each time the device stream is (re)established.
pub type ConnectedCallback = Arc<dyn Fn(&DeviceId) + Send + Sync>;

/// One registered callback pair.
struct Registration {
    id: SubscriptionId,
    /// Cleared on removal; checked again right before each invocation.
    active: Arc<AtomicBool>,
    on_data: DataCallback,
    on_connected: Option<ConnectedCallback>,
}

/// Ordered list of callbacks registered for one device.
///
/// Registration order is delivery order. The list is not thread-safe on its
/// own; the manager keeps it behind the registry lock.
#[derive(Default)]
pub struct CallbackList {
    registrations: Vec<Registration>,
}

impl CallbackList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a callback pair.
    pub fn push(
        &mut self,
        id: SubscriptionId,
        on_data: DataCallback,
        on_connected: Option<ConnectedCallback>,
    ) {
        self.registrations.push(Registration {
            id,
            active: Arc::new(AtomicBool::new(true)),
            on_data,
            on_connected,
        });
    }

    /// Removes the callback pair registered under `id`.
    ///
    /// Returns `true` if it was found. A removed callback never fires again,
    /// even from a [`FanOut`] snapshot taken before the removal.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let Some(index) = self.registrations.iter().position(|r| r.id == id) else {
            return false;
        };
        let registration = self.registrations.remove(index);
        registration.active.store(false, Ordering::Release);
        true
    }

    /// Removes every callback pair.
    pub fn clear(&mut self) {
        for registration in self.registrations.drain(..) {
            registration.active.store(false, Ordering::Release);
        }
    }

    /// Returns the number of registered callback pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Snapshots the data callbacks in registration order.
    #[must_use]
    pub fn data_fan_out(&self) -> FanOut<DataCallback> {
        FanOut(
            self.registrations
                .iter()
                .map(|r| (Arc::clone(&r.active), Arc::clone(&r.on_data)))
                .collect(),
        )
    }

    /// Snapshots the connection-established callbacks in registration order.
    #[must_use]
    pub fn connected_fan_out(&self) -> FanOut<ConnectedCallback> {
        FanOut(
            self.registrations
                .iter()
                .filter_map(|r| {
                    r.on_connected
                        .as_ref()
                        .map(|cb| (Arc::clone(&r.active), Arc::clone(cb)))
                })
                .collect(),
        )
    }
}

impl std::fmt::Debug for CallbackList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackList")
            .field("ids", &self.registrations.iter().map(|r| r.id).collect::<Vec<_>>())
            .finish()
    }
}

/// Ordered snapshot of callbacks, delivered without holding any lock.
pub struct FanOut<C>(Vec<(Arc<AtomicBool>, C)>);

impl FanOut<DataCallback> {
    /// Delivers `message` to every still-registered callback, in order.
    ///
    /// Returns the number of callbacks invoked.
    pub fn deliver(&self, message: &TelemetryMessage) -> usize {
        let mut delivered = 0;
        for (active, callback) in &self.0 {
            if active.load(Ordering::Acquire) {
                callback(message);
                delivered += 1;
            }
        }
        delivered
    }
}

impl FanOut<ConnectedCallback> {
    /// Notifies every still-registered callback that `device_id` connected.
    ///
    /// Returns the number of callbacks invoked.
    pub fn deliver(&self, device_id: &DeviceId) -> usize {
        let mut delivered = 0;
        for (active, callback) in &self.0 {
            if active.load(Ordering::Acquire) {
                callback(device_id);
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicU32;

    fn message() -> TelemetryMessage {
        TelemetryMessage {
            device_id: DeviceId::new("dev-1").unwrap(),
            state_relay: true,
            power: "5".to_string(),
            ts: 1,
        }
    }

    fn counting(counter: &Arc<AtomicU32>) -> DataCallback {
        let counter = Arc::clone(counter);
        Arc::new(move |_: &TelemetryMessage| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn subscription_id_display() {
        let id = SubscriptionId::new(42);
        assert_eq!(id.to_string(), "Sub(42)");
        assert_eq!(id.value(), 42);
    }

    #[test]
    fn list_new_is_empty() {
        let list = CallbackList::new();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert_eq!(list.data_fan_out().deliver(&message()), 0);
    }

    #[test]
    fn delivery_follows_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut list = CallbackList::new();

        for n in 1..=3 {
            let order = Arc::clone(&order);
            list.push(
                SubscriptionId::new(n),
                Arc::new(move |_: &TelemetryMessage| order.lock().push(n)),
                None,
            );
        }

        assert_eq!(list.data_fan_out().deliver(&message()), 3);
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn identical_callbacks_are_removed_independently() {
        let counter = Arc::new(AtomicU32::new(0));
        let callback = counting(&counter);
        let mut list = CallbackList::new();

        list.push(SubscriptionId::new(1), Arc::clone(&callback), None);
        list.push(SubscriptionId::new(2), callback, None);

        assert!(list.remove(SubscriptionId::new(1)));
        assert!(!list.remove(SubscriptionId::new(1)));
        assert_eq!(list.len(), 1);

        list.data_fan_out().deliver(&message());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removal_silences_existing_snapshot() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut list = CallbackList::new();
        list.push(SubscriptionId::new(1), counting(&counter), None);

        let snapshot = list.data_fan_out();
        list.remove(SubscriptionId::new(1));

        assert_eq!(snapshot.deliver(&message()), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn connected_fan_out_skips_missing_callbacks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let mut list = CallbackList::new();

        list.push(SubscriptionId::new(1), Arc::new(|_: &TelemetryMessage| {}), None);
        list.push(
            SubscriptionId::new(2),
            Arc::new(|_: &TelemetryMessage| {}),
            Some(Arc::new(move |id: &DeviceId| {
                seen_clone.lock().push(id.to_string());
            })),
        );

        let fan_out = list.connected_fan_out();
        assert_eq!(fan_out.deliver(&DeviceId::new("dev-7").unwrap()), 1);
        assert_eq!(*seen.lock(), vec!["dev-7".to_string()]);
    }

    #[test]
    fn clear_deactivates_everything() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut list = CallbackList::new();
        list.push(SubscriptionId::new(1), counting(&counter), None);
        list.push(SubscriptionId::new(2), counting(&counter), None);

        let snapshot = list.data_fan_out();
        list.clear();

        assert!(list.is_empty());
        assert_eq!(snapshot.deliver(&message()), 0);
    }

    #[test]
    fn list_debug_shows_ids() {
        let mut list = CallbackList::new();
        list.push(SubscriptionId::new(9), Arc::new(|_: &TelemetryMessage| {}), None);

        let debug = format!("{list:?}");
        assert!(debug.contains("CallbackList"));
        assert!(debug.contains("SubscriptionId(9)"));
    }
}
