// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WebSocket transport built on `tokio-tungstenite`.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{Connector, TelemetryStream, TransportEvent};
use crate::error::ProtocolError;

/// Upper bound on waiting for the peer's close acknowledgement.
const CLOSE_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens telemetry streams over WebSocket.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use plug_telemetry::protocol::WsConnector;
///
/// let connector = WsConnector::new().with_connect_timeout(Duration::from_secs(5));
/// assert_eq!(connector.connect_timeout(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    /// Default handshake timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a connector with the default handshake timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the handshake timeout (default: 10 seconds).
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns the handshake timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for WsConnector {
    type Stream = WsStream;

    async fn connect(&self, url: &str) -> Result<Self::Stream, ProtocolError> {
        let handshake = connect_async(url);
        let (inner, response) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                ProtocolError::ConnectionFailed(format!(
                    "WebSocket handshake timeout after {}s",
                    self.connect_timeout.as_secs()
                ))
            })??;

        tracing::debug!(status = %response.status(), "WebSocket handshake completed");

        Ok(WsStream {
            inner,
            finished: false,
        })
    }
}

/// An open WebSocket telemetry stream.
pub struct WsStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Set once a close, an error or the end of the stream was observed.
    finished: bool,
}

impl std::fmt::Debug for WsStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsStream")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl TelemetryStream for WsStream {
    async fn next_event(&mut self) -> TransportEvent {
        if self.finished {
            return TransportEvent::Closed;
        }

        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Frame(text),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => return TransportEvent::Frame(text),
                    Err(_) => {
                        tracing::warn!("Dropping binary frame that is not valid UTF-8");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "WebSocket close frame received");
                    self.finished = true;
                    return TransportEvent::Closed;
                }
                // Ping/pong replies are queued by tungstenite itself
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => {
                    self.finished = true;
                    return TransportEvent::Error(e.to_string());
                }
                None => {
                    self.finished = true;
                    return TransportEvent::Closed;
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        if let Err(e) = self.inner.close(None).await {
            tracing::debug!(error = %e, "WebSocket close handshake failed");
        }
        // Drain until the peer acknowledges the close
        let drain = async { while let Some(Ok(_)) = self.inner.next().await {} };
        if tokio::time::timeout(CLOSE_ACK_TIMEOUT, drain).await.is_err() {
            tracing::debug!("Peer did not acknowledge WebSocket close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout() {
        assert_eq!(
            WsConnector::default().connect_timeout(),
            Duration::from_secs(10)
        );
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = WsConnector::new()
            .connect(&format!("ws://127.0.0.1:{port}/iot?deviceId=d&token=t"))
            .await;

        assert!(matches!(result, Err(ProtocolError::WebSocket(_))));
    }

    #[tokio::test]
    async fn invalid_url_fails() {
        let result = WsConnector::new().connect("not a url").await;
        assert!(result.is_err());
    }
}
