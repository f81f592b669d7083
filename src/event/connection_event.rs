// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection lifecycle event types.

use std::time::Duration;

use serde::Serialize;

use crate::types::DeviceId;

/// Events emitted by the stream manager.
///
/// These events report the lifecycle of each device link. All events include
/// the relevant device ID for targeted handling.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use plug_telemetry::event::ConnectionEvent;
/// use plug_telemetry::types::DeviceId;
///
/// let device_id = DeviceId::new("dev-1").unwrap();
///
/// let scheduled = ConnectionEvent::ReconnectScheduled {
///     device_id: device_id.clone(),
///     attempt: 1,
///     delay: Duration::from_secs(3),
/// };
/// assert!(scheduled.is_reconnect());
/// assert_eq!(scheduled.device_id(), &device_id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConnectionEvent {
    /// A connection attempt started.
    Connecting {
        /// The device being connected.
        device_id: DeviceId,
        /// Number of reconnect attempts made before this one (0 for a
        /// first connection).
        attempt: u32,
    },

    /// The stream opened.
    Connected {
        /// The connected device.
        device_id: DeviceId,
    },

    /// The stream closed or could not be opened.
    Closed {
        /// The device whose stream closed.
        device_id: DeviceId,
    },

    /// A reconnect was scheduled after a close.
    ReconnectScheduled {
        /// The device to reconnect.
        device_id: DeviceId,
        /// The attempt number, starting at 1.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },

    /// The reconnect budget was spent; the link stays down until a new
    /// subscription arrives.
    ReconnectExhausted {
        /// The device that gave up.
        device_id: DeviceId,
        /// Number of reconnect attempts made.
        attempts: u32,
    },

    /// No session token was available, so the connection was not attempted.
    TokenMissing {
        /// The device that could not connect.
        device_id: DeviceId,
    },

    /// The link was torn down by an unsubscribe or an explicit disconnect.
    Disconnected {
        /// The removed device.
        device_id: DeviceId,
    },
}

impl ConnectionEvent {
    /// Returns the device ID associated with this event.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::Connecting { device_id, .. }
            | Self::Connected { device_id }
            | Self::Closed { device_id }
            | Self::ReconnectScheduled { device_id, .. }
            | Self::ReconnectExhausted { device_id, .. }
            | Self::TokenMissing { device_id }
            | Self::Disconnected { device_id } => device_id,
        }
    }

    /// Returns `true` for events about the reconnect loop.
    #[must_use]
    pub fn is_reconnect(&self) -> bool {
        matches!(
            self,
            Self::ReconnectScheduled { .. } | Self::ReconnectExhausted { .. }
        )
    }

    /// Returns `true` if the event means the device is no longer streaming.
    #[must_use]
    pub fn is_link_down(&self) -> bool {
        matches!(
            self,
            Self::Closed { .. }
                | Self::ReconnectExhausted { .. }
                | Self::TokenMissing { .. }
                | Self::Disconnected { .. }
        )
    }

    /// Creates a connecting event.
    #[must_use]
    pub fn connecting(device_id: DeviceId, attempt: u32) -> Self {
        Self::Connecting { device_id, attempt }
    }

    /// Creates a connected event.
    #[must_use]
    pub fn connected(device_id: DeviceId) -> Self {
        Self::Connected { device_id }
    }

    /// Creates a closed event.
    #[must_use]
    pub fn closed(device_id: DeviceId) -> Self {
        Self::Closed { device_id }
    }

    /// Creates a disconnected event.
    #[must_use]
    pub fn disconnected(device_id: DeviceId) -> Self {
        Self::Disconnected { device_id }
    }
}
