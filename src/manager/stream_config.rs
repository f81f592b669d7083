// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stream manager configuration.

use std::time::Duration;

use crate::event::DEFAULT_CHANNEL_CAPACITY;
use crate::protocol::StreamEndpoint;
use crate::storage::keys;

/// Configuration for a [`StreamManager`](super::StreamManager).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use plug_telemetry::manager::{ReconnectPolicy, StreamConfig};
/// use plug_telemetry::protocol::StreamEndpoint;
///
/// # fn main() -> plug_telemetry::Result<()> {
/// let config = StreamConfig::new()
///     .with_endpoint(StreamEndpoint::parse("wss://plugs.example.com/iot")?)
///     .with_reconnect(ReconnectPolicy::new().with_delay(Duration::from_secs(1)));
///
/// assert_eq!(config.token_key, "token");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Streaming endpoint the per-device URLs are built from.
    pub endpoint: StreamEndpoint,
    /// Automatic reconnection behaviour.
    pub reconnect: ReconnectPolicy,
    /// Store key holding the session token.
    pub token_key: String,
    /// Capacity of the connection event bus.
    pub event_capacity: usize,
}

impl StreamConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the streaming endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: StreamEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Sets the reconnection policy.
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Sets the store key the session token is read from.
    #[must_use]
    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    /// Sets the connection event bus capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: StreamEndpoint::default(),
            reconnect: ReconnectPolicy::default(),
            token_key: keys::TOKEN.to_string(),
            event_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Configuration for automatic reconnection.
///
/// Reconnects use a fixed delay. The attempt counter of a link is reset
/// whenever a connection opens successfully.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use plug_telemetry::manager::ReconnectPolicy;
///
/// // Default policy: 5 attempts, 3 seconds apart
/// let policy = ReconnectPolicy::default();
/// assert_eq!(policy.delay(), Duration::from_millis(3000));
///
/// // Disable reconnection
/// let policy = ReconnectPolicy::disabled();
/// assert!(!policy.should_retry(0));
///
/// // Custom policy
/// let policy = ReconnectPolicy::new()
///     .with_max_attempts(10)
///     .with_delay(Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Whether automatic reconnection is enabled.
    pub enabled: bool,
    /// Maximum number of consecutive reconnect attempts.
    pub max_attempts: u32,
    /// Delay between a close and the next attempt.
    pub delay: Duration,
}

impl ReconnectPolicy {
    /// Default number of attempts.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Default delay between attempts.
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(3000);

    /// Creates a new reconnection policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a disabled reconnection policy.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the delay between attempts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the delay before the next attempt.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns true if another attempt should be made after `attempts`
    /// consecutive failures.
    #[must_use]
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.enabled && attempts < self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            delay: Self::DEFAULT_DELAY,
        }
    }
}
