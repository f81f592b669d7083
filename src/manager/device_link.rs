// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device link record for the stream manager.

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::subscription::CallbackList;

/// Observable state of a device link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No subscriber is registered for the device.
    Absent,
    /// A connection attempt is in flight.
    Connecting,
    /// The stream is open and delivering frames.
    Open,
    /// Subscribers exist but the stream is down, either waiting for a
    /// reconnect or given up.
    Closed {
        /// Consecutive reconnect attempts since the last successful open.
        attempts: u32,
    },
}

impl LinkState {
    /// Returns true if the stream is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Ownership token for the task driving one connection.
///
/// Every connection gets a fresh epoch. A task whose epoch no longer matches
/// the link's handle is stale and must not touch the link.
pub(crate) struct LinkHandle {
    epoch: u64,
    shutdown: oneshot::Sender<()>,
}

impl LinkHandle {
    fn shutdown(self) {
        // The task may already have exited
        let _ = self.shutdown.send(());
    }
}

/// Pending reconnect, tagged with the epoch of the connection that closed.
struct ReconnectTimer {
    epoch: u64,
    abort: AbortHandle,
}

/// Internal representation of a device in the manager.
///
/// A link exists exactly while the device has at least one subscriber.
#[derive(Default)]
pub(crate) struct DeviceLink {
    /// Registered callbacks, in registration order.
    pub callbacks: CallbackList,
    /// Connection task owning the stream, present while connecting or open.
    handle: Option<LinkHandle>,
    /// Set from the start of an attempt until it opens or fails.
    connecting: bool,
    /// Consecutive reconnect attempts since the last successful open.
    reconnect_attempts: u32,
    reconnect_timer: Option<ReconnectTimer>,
}

impl DeviceLink {
    /// Creates a link with no callbacks and no connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    pub fn state(&self) -> LinkState {
        match (&self.handle, self.connecting) {
            (Some(_), true) => LinkState::Connecting,
            (Some(_), false) => LinkState::Open,
            (None, _) => LinkState::Closed {
                attempts: self.reconnect_attempts,
            },
        }
    }

    /// Returns true while a connection is in flight or open.
    pub fn is_active(&self) -> bool {
        self.handle.is_some() || self.connecting
    }

    /// Returns the consecutive reconnect attempt count.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Returns true if `epoch` owns the current connection.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.handle.as_ref().is_some_and(|h| h.epoch == epoch)
    }

    /// Starts a connection owned by `epoch`.
    ///
    /// Cancels any pending reconnect timer. Returns the receiver the task
    /// watches for an explicit shutdown.
    pub fn begin(&mut self, epoch: u64) -> oneshot::Receiver<()> {
        self.cancel_timer();
        let (shutdown, rx) = oneshot::channel();
        self.handle = Some(LinkHandle { epoch, shutdown });
        self.connecting = true;
        rx
    }

    /// Records a successful open. Returns false for a stale epoch.
    pub fn mark_open(&mut self, epoch: u64) -> bool {
        if !self.is_current(epoch) {
            return false;
        }
        self.connecting = false;
        self.reconnect_attempts = 0;
        true
    }

    /// Records a close or failed open. Returns false for a stale epoch.
    pub fn mark_closed(&mut self, epoch: u64) -> bool {
        if !self.is_current(epoch) {
            return false;
        }
        self.handle = None;
        self.connecting = false;
        true
    }

    /// Counts one more reconnect attempt and returns the new total.
    pub fn next_attempt(&mut self) -> u32 {
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        self.reconnect_attempts
    }

    /// Stores the timer that will reconnect after the close of `epoch`.
    pub fn set_timer(&mut self, epoch: u64, abort: AbortHandle) {
        self.cancel_timer();
        self.reconnect_timer = Some(ReconnectTimer { epoch, abort });
    }

    /// Takes the pending timer if it was scheduled for `epoch`.
    pub fn take_timer(&mut self, epoch: u64) -> bool {
        if self.reconnect_timer.as_ref().is_some_and(|t| t.epoch == epoch) {
            self.reconnect_timer = None;
            true
        } else {
            false
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort.abort();
        }
    }

    /// Releases everything the link holds.
    ///
    /// Callbacks are deactivated so in-flight deliveries skip them, the
    /// pending reconnect is aborted and the connection task is told to close.
    pub fn teardown(mut self) {
        self.callbacks.clear();
        self.cancel_timer();
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
        }
    }
}
