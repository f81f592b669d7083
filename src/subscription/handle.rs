// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handle returned by a subscribe call.

use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use super::SubscriptionId;
use crate::types::DeviceId;

/// Something that can remove a subscription by device and ID.
pub(crate) trait Unsubscribe: Send + Sync {
    /// Removes the subscription, returning `true` if it was registered.
    fn unsubscribe(&self, device_id: &DeviceId, id: SubscriptionId) -> bool;
}

/// Handle to one telemetry subscription.
///
/// Call [`unsubscribe`](Self::unsubscribe) to remove exactly this callback
/// pair. Dropping the handle does *not* unsubscribe; the subscription then
/// lives until [`StreamManager::unsubscribe`], `disconnect` or
/// `disconnect_all` removes it.
///
/// [`StreamManager::unsubscribe`]: crate::manager::StreamManager::unsubscribe
#[must_use = "dropping a Subscription leaves the callback registered"]
pub struct Subscription {
    device_id: DeviceId,
    id: SubscriptionId,
    registry: Weak<dyn Unsubscribe>,
    done: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(
        device_id: DeviceId,
        id: SubscriptionId,
        registry: Weak<dyn Unsubscribe>,
    ) -> Self {
        Self {
            device_id,
            id,
            registry,
            done: AtomicBool::new(false),
        }
    }

    /// Returns the device this subscription targets.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Returns the subscription ID.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes this subscription.
    ///
    /// Removing the last subscription of a device tears its stream down.
    /// Only the first call has an effect; it returns `true` if the
    /// subscription was still registered at that point.
    pub fn unsubscribe(&self) -> bool {
        if self.done.swap(true, Ordering::AcqRel) {
            return false;
        }
        match self.registry.upgrade() {
            Some(registry) => registry.unsubscribe(&self.device_id, self.id),
            None => false,
        }
    }

    /// Returns `true` once [`unsubscribe`](Self::unsubscribe) has been called.
    #[must_use]
    pub fn is_unsubscribed(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("device_id", &self.device_id)
            .field("id", &self.id)
            .field("unsubscribed", &self.is_unsubscribed())
            .finish()
    }
}
