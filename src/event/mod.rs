// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system for connection lifecycle changes.
//!
//! Telemetry subscribers only ever see decoded messages; connection problems
//! are invisible to them. This module gives the host application a separate
//! channel to observe links opening, closing, retrying and giving up. The
//! [`EventBus`] uses tokio's broadcast channel so any number of observers can
//! listen.
//!
//! # Examples
//!
//! ```
//! use plug_telemetry::event::{ConnectionEvent, EventBus};
//! use plug_telemetry::types::DeviceId;
//!
//! let bus = EventBus::new();
//!
//! // Subscribe to events
//! let mut rx = bus.subscribe();
//!
//! // Publish an event
//! let device_id = DeviceId::new("dev-1").unwrap();
//! bus.publish(ConnectionEvent::connected(device_id));
//! ```

mod connection_event;
mod event_bus;

pub use connection_event::ConnectionEvent;
pub use event_bus::{DEFAULT_CHANNEL_CAPACITY, EventBus};
