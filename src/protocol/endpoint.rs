// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Streaming endpoint addressing.

use std::fmt;

use crate::error::ProtocolError;
use crate::types::DeviceId;

/// Base URL of the per-device telemetry stream.
///
/// A connection URL is the base URL plus two query parameters, `deviceId`
/// and `token`, both percent-encoded.
///
/// # Examples
///
/// ```
/// use plug_telemetry::protocol::StreamEndpoint;
/// use plug_telemetry::types::DeviceId;
///
/// let endpoint = StreamEndpoint::parse("ws://localhost:8080/iot").unwrap();
/// let device_id = DeviceId::new("dev 1").unwrap();
///
/// assert_eq!(
///     endpoint.url_for(&device_id, "t0k"),
///     "ws://localhost:8080/iot?deviceId=dev%201&token=t0k"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoint {
    base: String,
}

impl StreamEndpoint {
    /// Production endpoint used by the web client.
    pub const DEFAULT_URL: &'static str = "ws://slothz.ddns.net:22021/iot";

    /// Parses and validates a base URL.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` if the URL does not use the
    /// `ws://` or `wss://` scheme or has no host.
    pub fn parse(url: impl Into<String>) -> Result<Self, ProtocolError> {
        let base = url.into().trim().to_string();

        let rest = base
            .strip_prefix("ws://")
            .or_else(|| base.strip_prefix("wss://"))
            .ok_or_else(|| {
                ProtocolError::InvalidAddress(format!("expected ws:// or wss:// URL: {base}"))
            })?;

        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if host.is_empty() {
            return Err(ProtocolError::InvalidAddress(format!(
                "missing host in URL: {base}"
            )));
        }

        if base.contains('#') {
            return Err(ProtocolError::InvalidAddress(format!(
                "fragments are not allowed in stream URLs: {base}"
            )));
        }

        Ok(Self { base })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Returns `true` if the endpoint uses TLS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base.starts_with("wss://")
    }

    /// Builds the connection URL for a device.
    #[must_use]
    pub fn url_for(&self, device_id: &DeviceId, token: &str) -> String {
        format!(
            "{}deviceId={}&token={}",
            self.query_prefix(),
            urlencoding::encode(device_id.as_str()),
            urlencoding::encode(token)
        )
    }

    /// Builds the connection URL with the token masked, for logging.
    #[must_use]
    pub fn redacted_url_for(&self, device_id: &DeviceId) -> String {
        format!(
            "{}deviceId={}&token=***",
            self.query_prefix(),
            urlencoding::encode(device_id.as_str())
        )
    }

    fn query_prefix(&self) -> String {
        if self.base.contains('?') {
            format!("{}&", self.base)
        } else {
            format!("{}?", self.base)
        }
    }
}

impl Default for StreamEndpoint {
    fn default() -> Self {
        Self {
            base: Self::DEFAULT_URL.to_string(),
        }
    }
}

impl fmt::Display for StreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}
