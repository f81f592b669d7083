// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Telemetry frame decoding.
//!
//! Each device stream pushes small JSON objects such as:
//!
//! ```json
//! {"stateRelay": "true", "power": "42", "ts": 1700000000}
//! ```
//!
//! [`decode_frame`] turns one such frame into a [`TelemetryMessage`]. Decoding
//! is deliberately permissive: missing or oddly typed fields fall back to
//! defaults (relay off, power `"0"`, timestamp = time of receipt). Only frames
//! that are not a JSON object at all are rejected.
//!
//! # Examples
//!
//! ```
//! use plug_telemetry::telemetry::decode_frame;
//! use plug_telemetry::types::DeviceId;
//!
//! let device_id = DeviceId::new("dev-1").unwrap();
//! let msg = decode_frame(&device_id, r#"{"stateRelay":true,"power":"42"}"#).unwrap();
//!
//! assert!(msg.state_relay);
//! assert_eq!(msg.power, "42");
//! assert_eq!(msg.device_id, device_id);
//! ```

mod frame_parser;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::types::{DeviceId, RelayState};

/// Decoded real-time status update for one device.
///
/// The `device_id` is the identifier of the stream the frame arrived on,
/// not a field of the frame itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryMessage {
    /// Device the frame was received for.
    pub device_id: DeviceId,
    /// `true` when the device relay is on.
    pub state_relay: bool,
    /// Instantaneous power draw as numeric text.
    pub power: String,
    /// Sample timestamp in epoch milliseconds.
    pub ts: i64,
}

impl TelemetryMessage {
    /// Returns the relay state as a typed value.
    #[must_use]
    pub fn relay(&self) -> RelayState {
        RelayState::from(self.state_relay)
    }

    /// Returns the power draw parsed as a number.
    ///
    /// The stored text is always numeric, so this only returns `None` for
    /// messages built by hand with an invalid value.
    #[must_use]
    pub fn power_watts(&self) -> Option<f64> {
        self.power.trim().parse().ok()
    }
}

/// Decodes one inbound frame for `device_id`, stamping missing timestamps with
/// the current time.
///
/// # Errors
///
/// Returns `ParseError` if the payload is not valid JSON or not a JSON object.
pub fn decode_frame(device_id: &DeviceId, payload: &str) -> Result<TelemetryMessage, ParseError> {
    decode_frame_at(device_id, payload, chrono::Utc::now().timestamp_millis())
}

/// Decodes one inbound frame, using `received_at` (epoch milliseconds) when
/// the frame carries no timestamp.
///
/// # Errors
///
/// Returns `ParseError` if the payload is not valid JSON or not a JSON object.
pub fn decode_frame_at(
    device_id: &DeviceId,
    payload: &str,
    received_at: i64,
) -> Result<TelemetryMessage, ParseError> {
    let frame = frame_parser::parse_frame(payload)?;

    Ok(TelemetryMessage {
        device_id: device_id.clone(),
        state_relay: frame.relay().is_on(),
        power: frame.power(),
        ts: frame.timestamp().unwrap_or(received_at),
    })
}
