// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription system for device telemetry.
//!
//! This module provides the callback-based subscription types used by the
//! [`StreamManager`](crate::manager::StreamManager).
//!
//! # Overview
//!
//! - [`SubscriptionId`] - A unique identifier for a subscription
//! - [`Subscription`] - Handle returned by a subscribe call, used to unsubscribe
//! - [`CallbackList`] - Ordered per-device registry of callbacks
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use plug_telemetry::manager::StreamManager;
//! use plug_telemetry::storage::MemoryStore;
//! use plug_telemetry::types::DeviceId;
//!
//! # async fn example() -> plug_telemetry::Result<()> {
//! let manager = StreamManager::new(Arc::new(MemoryStore::with_token("secret")));
//! let device_id = DeviceId::new("dev-1")?;
//!
//! let sub = manager.subscribe(&device_id, |msg| {
//!     println!("relay on: {}, power: {}", msg.state_relay, msg.power);
//! });
//!
//! // Later, unsubscribe; the last one out closes the stream
//! sub.unsubscribe();
//! # Ok(())
//! # }
//! ```

mod callback;
mod handle;

pub use callback::{CallbackList, ConnectedCallback, DataCallback, FanOut, SubscriptionId};
pub use handle::Subscription;
pub(crate) use handle::Unsubscribe;
