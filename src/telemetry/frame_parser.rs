// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parser for raw telemetry stream frames.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::types::RelayState;

/// Power draw reported when a frame carries no usable value.
pub(crate) const DEFAULT_POWER: &str = "0";

/// Raw key-value frame as pushed by the `/iot` endpoint.
///
/// Every field is optional and loosely typed: the firmware and backend have
/// sent booleans, strings and numbers for the same key over time. The typed
/// accessors apply the documented defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawFrame {
    /// Relay state (`true`, `"true"`, anything else).
    #[serde(rename = "stateRelay", default)]
    state_relay: Option<Value>,

    /// Instantaneous power draw, usually numeric text.
    #[serde(default)]
    power: Option<Value>,

    /// Sample timestamp in epoch milliseconds.
    #[serde(default)]
    ts: Option<Value>,
}

impl RawFrame {
    /// Returns the decoded relay state.
    pub fn relay(&self) -> RelayState {
        RelayState::from_frame_value(self.state_relay.as_ref())
    }

    /// Returns the power draw as numeric text, `"0"` when absent or unparsable.
    pub fn power(&self) -> String {
        match &self.power {
            Some(Value::String(s)) if is_numeric_text(s) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => DEFAULT_POWER.to_string(),
        }
    }

    /// Returns the frame timestamp, or `None` when absent, zero or not an integer.
    pub fn timestamp(&self) -> Option<i64> {
        let ts = match self.ts.as_ref()? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(truncate_millis)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }?;
        (ts != 0).then_some(ts)
    }
}

// Saturating float-to-int cast; epoch millis are far below i64::MAX
#[allow(clippy::cast_possible_truncation)]
fn truncate_millis(value: f64) -> i64 {
    value.trunc() as i64
}

fn is_numeric_text(s: &str) -> bool {
    s.trim().parse::<f64>().is_ok_and(f64::is_finite)
}

/// Parses a frame payload.
///
/// The payload must be a JSON object. Arrays, scalars and `null` are
/// rejected so that they are dropped rather than decoded into defaults.
pub(crate) fn parse_frame(payload: &str) -> Result<RawFrame, ParseError> {
    let value: Value = serde_json::from_str(payload)?;
    if !value.is_object() {
        return Err(ParseError::UnexpectedFormat(format!(
            "expected a JSON object, got {}",
            kind_of(&value)
        )));
    }
    Ok(serde_json::from_value(value)?)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
