// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the WebSocket transport against a loopback server.

#![cfg(feature = "websocket")]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use plug_telemetry::event::ConnectionEvent;
use plug_telemetry::manager::{ReconnectPolicy, StreamConfig, StreamManager};
use plug_telemetry::protocol::{
    Connector, StreamEndpoint, TelemetryStream, TransportEvent, WsConnector,
};
use plug_telemetry::storage::MemoryStore;
use plug_telemetry::telemetry::TelemetryMessage;
use plug_telemetry::types::DeviceId;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};

const WAIT: Duration = Duration::from_secs(10);

/// One accepted server-side connection.
struct ServerConn {
    query: String,
    ws: WebSocketStream<TcpStream>,
}

impl ServerConn {
    async fn send_text(&mut self, text: &str) {
        self.ws.send(Message::Text(text.to_string())).await.unwrap();
    }

    /// Waits for the client's close frame or the end of the stream.
    async fn expect_client_close(&mut self) {
        let closed = timeout(WAIT, async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "client did not close the stream");
    }
}

/// Loopback WebSocket server handing every accepted connection to the test.
struct TestServer {
    url: String,
    conns: mpsc::UnboundedReceiver<ServerConn>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, conns) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (query_tx, query_rx) = oneshot::channel();
                let capture = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    let _ = query_tx.send(req.uri().query().unwrap_or_default().to_string());
                    Ok(resp)
                };

                let Ok(ws) = accept_hdr_async(stream, capture).await else {
                    continue;
                };
                let query = query_rx.await.unwrap_or_default();
                if tx.send(ServerConn { query, ws }).is_err() {
                    break;
                }
            }
        });

        Self {
            url: format!("ws://{addr}/iot"),
            conns,
        }
    }

    async fn next_conn(&mut self) -> ServerConn {
        timeout(WAIT, self.conns.recv())
            .await
            .expect("timed out waiting for a client")
            .expect("server stopped")
    }

    fn config(&self) -> StreamConfig {
        StreamConfig::new()
            .with_endpoint(StreamEndpoint::parse(&self.url).unwrap())
            .with_reconnect(ReconnectPolicy::new().with_delay(Duration::from_millis(50)))
    }
}

fn dev(id: &str) -> DeviceId {
    DeviceId::new(id).unwrap()
}

// ============================================================================
// WsConnector
// ============================================================================

mod ws_connector {
    use super::*;

    #[tokio::test]
    async fn receives_text_and_utf8_binary_frames() {
        let mut server = TestServer::start().await;
        let url = format!("{}?deviceId=dev-1&token=secret", server.url);

        let mut stream = WsConnector::new().connect(&url).await.unwrap();
        let mut conn = server.next_conn().await;
        assert_eq!(conn.query, "deviceId=dev-1&token=secret");

        conn.send_text(r#"{"power":"1"}"#).await;
        conn.ws.send(Message::Binary(vec![0xff, 0xfe])).await.unwrap();
        conn.ws
            .send(Message::Binary(br#"{"power":"2"}"#.to_vec()))
            .await
            .unwrap();
        conn.ws.close(None).await.unwrap();

        assert_eq!(
            stream.next_event().await,
            TransportEvent::Frame(r#"{"power":"1"}"#.to_string())
        );
        assert_eq!(
            stream.next_event().await,
            TransportEvent::Frame(r#"{"power":"2"}"#.to_string())
        );
        assert_eq!(stream.next_event().await, TransportEvent::Closed);
        assert_eq!(stream.next_event().await, TransportEvent::Closed);
    }

    #[tokio::test]
    async fn close_sends_close_frame() {
        let mut server = TestServer::start().await;

        let mut stream = WsConnector::new().connect(&server.url).await.unwrap();
        let mut conn = server.next_conn().await;

        let server_side = tokio::spawn(async move { conn.expect_client_close().await });
        stream.close().await;

        server_side.await.unwrap();
        assert_eq!(stream.next_event().await, TransportEvent::Closed);
    }
}

// ============================================================================
// StreamManager over WebSocket
// ============================================================================

mod stream_manager {
    use super::*;

    #[tokio::test]
    async fn delivers_frames_from_server() {
        let mut server = TestServer::start().await;
        let manager =
            StreamManager::with_config(Arc::new(MemoryStore::with_token("secret")), server.config());
        let (tx, mut rx) = mpsc::unbounded_channel::<TelemetryMessage>();

        let _sub = manager.subscribe(&dev("dev-1"), move |msg| {
            let _ = tx.send(msg.clone());
        });

        let mut conn = server.next_conn().await;
        assert_eq!(conn.query, "deviceId=dev-1&token=secret");

        conn.send_text(r#"{"stateRelay":"true","power":"42","ts":1700000000}"#)
            .await;

        let msg = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(
            msg,
            TelemetryMessage {
                device_id: dev("dev-1"),
                state_relay: true,
                power: "42".to_string(),
                ts: 1_700_000_000,
            }
        );
        assert_eq!(manager.disconnect_all(), 1);
    }

    #[tokio::test]
    async fn reconnects_when_server_closes() {
        let mut server = TestServer::start().await;
        let manager =
            StreamManager::with_config(Arc::new(MemoryStore::with_token("secret")), server.config());
        let mut events = manager.events();
        let opens = Arc::new(Mutex::new(0_u32));
        let opens_clone = Arc::clone(&opens);

        let _sub = manager.subscribe_with_connected(
            &dev("dev-1"),
            |_| {},
            move |_| *opens_clone.lock() += 1,
        );

        let mut first = server.next_conn().await;
        first.ws.close(None).await.unwrap();

        let _second = server.next_conn().await;
        let reopened = timeout(WAIT, async {
            let mut connected = 0;
            while let Ok(event) = events.recv().await {
                if matches!(event, ConnectionEvent::Connected { .. }) {
                    connected += 1;
                    if connected == 2 {
                        return;
                    }
                }
            }
        })
        .await;

        assert!(reopened.is_ok());
        assert_eq!(*opens.lock(), 2);
        manager.disconnect_all();
    }

    #[tokio::test]
    async fn unsubscribe_closes_server_connection() {
        let mut server = TestServer::start().await;
        let manager =
            StreamManager::with_config(Arc::new(MemoryStore::with_token("secret")), server.config());
        let mut events = manager.events();

        let sub = manager.subscribe(&dev("dev-1"), |_| {});
        let mut conn = server.next_conn().await;

        timeout(WAIT, async {
            while let Ok(event) = events.recv().await {
                if matches!(event, ConnectionEvent::Connected { .. }) {
                    return;
                }
            }
        })
        .await
        .unwrap();

        assert!(sub.unsubscribe());
        conn.expect_client_close().await;
        assert!(manager.device_ids().is_empty());
    }
}
