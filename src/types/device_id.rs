// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identifier type.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValueError;

/// Opaque identifier of a controllable device.
///
/// The identifier is issued by the backend when a device is linked to a
/// home and is used verbatim as the `deviceId` query parameter of the
/// telemetry stream. It is also the key of every registry lookup in the
/// [`StreamManager`](crate::manager::StreamManager).
///
/// Cloning is cheap: the string is shared behind an `Arc`.
///
/// # Examples
///
/// ```
/// use plug_telemetry::types::DeviceId;
///
/// let id = DeviceId::new("dev-1").unwrap();
/// assert_eq!(id.as_str(), "dev-1");
///
/// // Empty identifiers are rejected
/// assert!(DeviceId::new("  ").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(Arc<str>);

impl DeviceId {
    /// Creates a device identifier.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptyDeviceId` if `id` is empty or whitespace only.
    pub fn new(id: impl AsRef<str>) -> Result<Self, ValueError> {
        let id = id.as_ref();
        if id.trim().is_empty() {
            return Err(ValueError::EmptyDeviceId);
        }
        Ok(Self(Arc::from(id)))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for DeviceId {
    type Error = ValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_keeps_value() {
        let id = DeviceId::new("plug-42").unwrap();
        assert_eq!(id.as_str(), "plug-42");
        assert_eq!(id.to_string(), "plug-42");
    }

    #[test]
    fn empty_is_rejected() {
        assert_eq!(DeviceId::new(""), Err(ValueError::EmptyDeviceId));
        assert_eq!(DeviceId::new(" \t"), Err(ValueError::EmptyDeviceId));
    }

    #[test]
    fn parse_and_try_from() {
        let parsed: DeviceId = "abc".parse().unwrap();
        let converted = DeviceId::try_from("abc".to_string()).unwrap();
        assert_eq!(parsed, converted);
    }

    #[test]
    fn debug_format() {
        let id = DeviceId::new("dev-1").unwrap();
        assert_eq!(format!("{id:?}"), "DeviceId(dev-1)");
    }

    #[test]
    fn hash_map_lookup_by_str() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(DeviceId::new("dev-1").unwrap(), 1);
        assert_eq!(map.get("dev-1"), Some(&1));
    }

    #[test]
    fn serde_round_trip_rejects_empty() {
        let id: DeviceId = serde_json::from_str("\"dev-9\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"dev-9\"");
        assert!(serde_json::from_str::<DeviceId>("\"\"").is_err());
    }
}
