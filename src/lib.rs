// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plug Telemetry - real-time smart plug telemetry over WebSocket.
//!
//! This library keeps one push stream open per device and fans each status
//! update out to every part of an application that subscribed to it.
//!
//! # Supported Features
//!
//! - **Shared streams**: at most one connection per device, however many
//!   subscribers it has
//! - **Ordered fan-out**: each frame reaches every subscriber in registration order
//! - **Permissive decoding**: missing fields fall back to relay off, power `"0"`
//!   and the time of receipt
//! - **Auto-reconnection**: fixed delay between attempts, bounded attempt count
//! - **Lifecycle events**: connection changes over a broadcast channel
//! - **Session store**: the authentication token is read from a pluggable
//!   key-value store, in memory or persisted as JSON
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use plug_telemetry::{DeviceId, MemoryStore, StreamManager};
//!
//! #[tokio::main]
//! async fn main() -> plug_telemetry::Result<()> {
//!     let store = Arc::new(MemoryStore::with_token("session-token"));
//!     let manager = StreamManager::new(store);
//!
//!     let plug = DeviceId::new("dev-1")?;
//!     let card = manager.subscribe(&plug, |msg| {
//!         println!("relay on: {}, power: {} W", msg.state_relay, msg.power);
//!     });
//!     let chart = manager.subscribe(&plug, |msg| {
//!         println!("sample at {}", msg.ts);
//!     });
//!
//!     // Both callbacks share one stream. It closes after the last
//!     // subscriber leaves.
//!     card.unsubscribe();
//!     chart.unsubscribe();
//!     Ok(())
//! }
//! ```
//!
//! ## Persistent Session Store
//!
//! ```no_run
//! use std::sync::Arc;
//! use plug_telemetry::{FileStore, KeyValueStore, StreamManager};
//!
//! # fn main() -> plug_telemetry::Result<()> {
//! let store = FileStore::open("session.json")?;
//! store.set_token("session-token")?;
//!
//! let manager = StreamManager::new(Arc::new(store));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod manager;
pub mod protocol;
pub mod storage;
pub mod subscription;
pub mod telemetry;
pub mod types;

pub use error::{Error, ParseError, ProtocolError, Result, StorageError, ValueError};
pub use event::{ConnectionEvent, EventBus};
pub use manager::{LinkState, ReconnectPolicy, StreamConfig, StreamManager};
pub use protocol::{Connector, StreamEndpoint, TelemetryStream, TransportEvent};
#[cfg(feature = "websocket")]
pub use protocol::{WsConnector, WsStream};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use subscription::{Subscription, SubscriptionId};
pub use telemetry::{TelemetryMessage, decode_frame};
pub use types::{DeviceId, RelayState};
