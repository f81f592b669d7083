// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `plug_telemetry` library.
//!
//! This module provides the error hierarchy used across the library: value
//! validation, transport communication, frame decoding, and the session
//! key-value store.
//!
//! Note that the [`StreamManager`](crate::manager::StreamManager) never hands
//! these errors to telemetry subscribers. Connection-level failures are logged
//! and published as [`ConnectionEvent`](crate::event::ConnectionEvent)s.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Error occurred during transport communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while decoding a frame.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error occurred while reading or writing the session store.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A device identifier was empty or whitespace only.
    #[error("device identifier must not be empty")]
    EmptyDeviceId,

    /// A relay state string was not recognised.
    #[error("invalid relay state: {0}")]
    InvalidRelayState(String),
}

/// Errors related to the streaming transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// WebSocket handshake or communication failed.
    #[cfg(feature = "websocket")]
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection to the streaming endpoint failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid endpoint URL.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// No session token was available to authenticate the stream.
    #[error("session token not found")]
    MissingToken,
}

/// Errors related to decoding inbound telemetry frames.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame was valid JSON but not a key-value object.
    #[error("unexpected frame format: {0}")]
    UnexpectedFormat(String),
}

/// Errors related to the persistent key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file does not hold a JSON object of strings.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        assert_eq!(
            ValueError::EmptyDeviceId.to_string(),
            "device identifier must not be empty"
        );
        assert_eq!(
            ValueError::InvalidRelayState("maybe".to_string()).to_string(),
            "invalid relay state: maybe"
        );
    }

    #[test]
    fn error_from_value_error() {
        let err: Error = ValueError::EmptyDeviceId.into();
        assert!(matches!(err, Error::Value(ValueError::EmptyDeviceId)));
        assert_eq!(
            err.to_string(),
            "value error: device identifier must not be empty"
        );
    }

    #[test]
    fn protocol_error_display() {
        assert_eq!(
            ProtocolError::MissingToken.to_string(),
            "session token not found"
        );
        assert_eq!(
            ProtocolError::InvalidAddress("nope".to_string()).to_string(),
            "invalid address: nope"
        );
    }

    #[test]
    fn parse_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ParseError = json_err.into();
        assert!(matches!(err, ParseError::Json(_)));
        assert!(err.to_string().starts_with("JSON parse error"));
    }

    #[test]
    fn storage_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = StorageError::from(io).into();
        assert!(matches!(err, Error::Storage(StorageError::Io(_))));
    }
}
