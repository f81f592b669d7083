// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stream manager for real-time device telemetry.
//!
//! # Overview
//!
//! The [`StreamManager`] is the central component for applications that show
//! live data from several smart plugs. It provides:
//!
//! - **One stream per device**: any number of subscribers share a single
//!   connection
//! - **Fan-out**: each decoded frame reaches every subscriber of the device,
//!   in registration order
//! - **Auto-reconnection**: closed streams are reopened after a fixed delay,
//!   up to a bounded number of attempts
//! - **Automatic teardown**: the stream closes when its last subscriber leaves
//! - **Event system**: connection lifecycle changes via broadcast channels
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use plug_telemetry::manager::StreamManager;
//! use plug_telemetry::storage::MemoryStore;
//! use plug_telemetry::types::DeviceId;
//!
//! #[tokio::main]
//! async fn main() -> plug_telemetry::Result<()> {
//!     let manager = StreamManager::new(Arc::new(MemoryStore::with_token("secret")));
//!     let plug = DeviceId::new("living-room")?;
//!
//!     let sub = manager.subscribe(&plug, |msg| {
//!         println!("relay: {}, power: {} W", msg.relay(), msg.power);
//!     });
//!
//!     // ...
//!
//!     sub.unsubscribe();
//!     Ok(())
//! }
//! ```
//!
//! ## Watching the connection
//!
//! ```no_run
//! use std::sync::Arc;
//! use plug_telemetry::event::ConnectionEvent;
//! use plug_telemetry::manager::StreamManager;
//! use plug_telemetry::storage::MemoryStore;
//!
//! # async fn example() {
//! let manager = StreamManager::new(Arc::new(MemoryStore::with_token("secret")));
//! let mut events = manager.events();
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             ConnectionEvent::Connected { device_id } => println!("{device_id} live"),
//!             ConnectionEvent::ReconnectExhausted { device_id, .. } => {
//!                 println!("{device_id} data is stale");
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//! # }
//! ```

mod device_link;
mod stream_config;
mod stream_manager;

pub use device_link::LinkState;
pub use stream_config::{ReconnectPolicy, StreamConfig};
pub use stream_manager::StreamManager;
