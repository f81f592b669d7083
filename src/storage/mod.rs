// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session key-value storage.
//!
//! The stream manager reads the authentication token from a
//! [`KeyValueStore`] right before every connection attempt, so a token that
//! appears later (after login) is picked up by the next attempt.
//!
//! Two implementations are provided:
//!
//! - [`MemoryStore`] - process-local, for tests and embedded use
//! - [`FileStore`] - persisted as a JSON object on disk
//!
//! # Examples
//!
//! ```
//! use plug_telemetry::storage::{KeyValueStore, MemoryStore, keys};
//!
//! let store = MemoryStore::new();
//! assert!(store.token().is_none());
//!
//! store.set_token("secret").unwrap();
//! assert_eq!(store.get(keys::TOKEN).as_deref(), Some("secret"));
//! ```

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;

/// Well-known keys of the session store.
pub mod keys {
    /// Bearer token of the signed-in user.
    pub const TOKEN: &str = "token";
    /// Display name of the household.
    pub const HOUSE_NAME: &str = "houseName";
    /// JSON list of rooms.
    pub const ROOMS: &str = "rooms";
    /// JSON list of linked device identifiers.
    pub const CONNECTED_DEVICES: &str = "connectedDevices";
    /// JSON object mapping device identifier to room.
    pub const DEVICE_ROOM_MAP: &str = "deviceRoomMap";
    /// JSON user profile.
    pub const USER_PROFILE: &str = "userProfile";
    /// JSON `{latitude, longitude}` used by the weather panel.
    pub const WEATHER_LOCATION: &str = "weatherLocation";
}

/// A synchronous string key-value store.
///
/// Implementations must be cheap to call from async code: `get` is invoked
/// on the connection path and must not block on I/O.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value could not be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the change could not be persisted.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Removes every key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the change could not be persisted.
    fn clear(&self) -> Result<(), StorageError>;

    /// Returns the session token.
    fn token(&self) -> Option<String> {
        self.get(keys::TOKEN)
    }

    /// Stores the session token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the token could not be persisted.
    fn set_token(&self, token: &str) -> Result<(), StorageError> {
        self.set(keys::TOKEN, token)
    }

    /// Removes the session token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the change could not be persisted.
    fn remove_token(&self) -> Result<(), StorageError> {
        self.remove(keys::TOKEN)
    }

    /// Reads a JSON-encoded value.
    ///
    /// Returns `None` when the key is missing or the stored text does not
    /// decode as `T`; decode failures are logged.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T>
    where
        Self: Sized,
    {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Stored value is not valid JSON for the requested type");
                None
            }
        }
    }

    /// Stores a value as JSON.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be serialized or persisted.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }
}
