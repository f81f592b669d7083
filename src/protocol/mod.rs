// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport layer for device telemetry streams.
//!
//! The [`StreamManager`](crate::manager::StreamManager) talks to the network
//! only through the [`Connector`] and [`TelemetryStream`] traits. The
//! production implementation is [`WsConnector`], which opens one WebSocket
//! per device against a [`StreamEndpoint`]. Tests substitute an in-process
//! connector to script opens, frames and closes.
//!
//! Streams are receive-only: the core never sends application messages.

mod endpoint;
#[cfg(feature = "websocket")]
mod websocket;

pub use endpoint::StreamEndpoint;
#[cfg(feature = "websocket")]
pub use websocket::{WsConnector, WsStream};

use std::future::Future;

use crate::error::ProtocolError;

/// One event observed on an open stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Frame(String),
    /// The transport reported an error. A [`TransportEvent::Closed`] follows.
    Error(String),
    /// The stream ended, either by a close frame or by the connection dropping.
    Closed,
}

/// An open, receive-only telemetry stream.
pub trait TelemetryStream: Send + 'static {
    /// Waits for the next event.
    ///
    /// Once [`TransportEvent::Closed`] has been returned, every further call
    /// returns it again immediately.
    fn next_event(&mut self) -> impl Future<Output = TransportEvent> + Send;

    /// Closes the stream from our side.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens telemetry streams.
pub trait Connector: Send + Sync + 'static {
    /// The stream type produced by this connector.
    type Stream: TelemetryStream;

    /// Opens a stream to the fully-qualified connection `url`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the connection cannot be established.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Stream, ProtocolError>> + Send;
}
