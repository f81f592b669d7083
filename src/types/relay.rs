// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Relay state of a smart plug.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValueError;

/// On/off state of a device's controllable relay.
///
/// # Examples
///
/// ```
/// use plug_telemetry::types::RelayState;
///
/// assert_eq!(RelayState::On.as_str(), "ON");
/// assert!(RelayState::from(true).is_on());
/// assert_eq!("off".parse::<RelayState>().unwrap(), RelayState::Off);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RelayState {
    /// Relay is open; the device is not powered.
    #[default]
    Off,
    /// Relay is closed; the device is powered.
    On,
}

impl RelayState {
    /// Returns the upper-case string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }

    /// Returns `true` if the relay is on.
    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }

    /// Decodes the relay field of a telemetry frame.
    ///
    /// Only a JSON `true` or the exact string `"true"` mean on. Everything
    /// else, including a missing field, `1` or `"ON"`, means off.
    #[must_use]
    pub fn from_frame_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Bool(true)) => Self::On,
            Some(Value::String(s)) if s == "true" => Self::On,
            _ => Self::Off,
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelayState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OFF" | "0" | "FALSE" => Ok(Self::Off),
            "ON" | "1" | "TRUE" => Ok(Self::On),
            _ => Err(ValueError::InvalidRelayState(s.to_string())),
        }
    }
}

impl From<bool> for RelayState {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}

impl From<RelayState> for bool {
    fn from(state: RelayState) -> Self {
        state.is_on()
    }
}
