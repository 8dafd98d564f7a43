//! Shared helpers for the integration tests: an in-process WebSocket
//! server standing in for the iHuman `/ws` endpoint.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use ih_sdk::{ClientEvent, IhumanClient, ReconnectPolicy};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub const WAIT: Duration = Duration::from_secs(5);

/// One accepted socket plus the request URI it was opened with.
pub struct ServerConn {
    pub uri: String,
    pub ws: WebSocketStream<TcpStream>,
}

impl ServerConn {
    pub async fn send_json(&mut self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    pub async fn send_text(&mut self, text: &str) {
        self.ws.send(Message::Text(text.to_owned())).await.unwrap();
    }

    /// Next text frame from the client, parsed as JSON.
    pub async fn recv_json(&mut self) -> Value {
        loop {
            let msg = tokio::time::timeout(WAIT, self.ws.next())
                .await
                .expect("timed out waiting for client frame")
                .expect("client closed the socket")
                .unwrap();
            if let Message::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }
}

pub struct MiniServer {
    pub addr: SocketAddr,
    pub conns: mpsc::UnboundedReceiver<ServerConn>,
    shutdown: Option<oneshot::Sender<()>>,
    accept_task: Option<JoinHandle<()>>,
}

impl MiniServer {
    /// Bind an ephemeral port and accept WebSocket upgrades in the background.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, conns) = mpsc::unbounded_channel();
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();

        let accept_task = tokio::spawn(async move {
            loop {
                let stream = tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _peer)) => stream,
                        Err(_) => break,
                    },
                };
                let mut uri = String::new();
                let callback = |req: &Request, resp: Response| {
                    uri = req.uri().to_string();
                    Ok::<_, ErrorResponse>(resp)
                };
                let accepted = tokio_tungstenite::accept_hdr_async(stream, callback).await;
                if let Ok(ws) = accepted {
                    let _ = tx.send(ServerConn { uri, ws });
                }
            }
            drop(listener);
        });

        Self {
            addr,
            conns,
            shutdown: Some(shutdown),
            accept_task: Some(accept_task),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn next_conn(&mut self) -> ServerConn {
        tokio::time::timeout(WAIT, self.conns.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("server stopped")
    }

    /// Close the listening socket. Returns once the port is released, so
    /// later connects are refused.
    pub async fn stop_accepting(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.accept_task.take() {
            task.await.unwrap();
        }
    }
}

/// Client pointed at `server` with a fast reconnect.
pub fn client_for(server: &MiniServer, reconnect: ReconnectPolicy) -> IhumanClient {
    IhumanClient::builder()
        .base_url(server.base_url())
        .token("T")
        .reconnect_policy(reconnect)
        .build()
        .unwrap()
}

pub fn fast_reconnect() -> ReconnectPolicy {
    ReconnectPolicy {
        delay: Duration::from_millis(100),
        ..ReconnectPolicy::default()
    }
}

/// Forward every event named in `names` into a channel.
pub fn record(client: &IhumanClient, names: &[&str]) -> mpsc::UnboundedReceiver<ClientEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for name in names {
        let tx = tx.clone();
        client.on(*name, move |e| {
            let _ = tx.send(e.clone());
        });
    }
    rx
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}
