//! Persistent WebSocket lifecycle: connect, receive loop, frame dispatch,
//! disconnect detection and reconnect.
//!
//! ```text
//!              connect()            open ok
//! Disconnected ─────────► Connecting ───────► Connected
//!      ▲                      ▲                   │ socket closed
//!      │ close() / give up    │ delay elapsed     ▼
//!      └────────────── ReconnectScheduled ◄───────┘ (auto-reconnect)
//! ```
//!
//! One background task (the *driver*) owns the read half of the socket and
//! runs the reconnect loop, so a reconnect can never overlap a live
//! connection. The write half belongs to a writer task fed through
//! [`SocketLink`].

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use ih_domain::error::{Error, Result};
use ih_domain::trace::TraceEvent;
use ih_protocol::InboundMessage;
use parking_lot::Mutex;
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::events::{ClientEvent, EventBus};
use crate::link::{OutboundFrame, SocketLink};
use crate::reconnect::ReconnectPolicy;
use crate::session::SessionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsReader = SplitStream<WsStream>;
type WsWriter = SplitSink<WsStream, Message>;

const OUTBOUND_QUEUE: usize = 64;
/// How long a closing writer gets to flush before it is aborted.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Observable state of the persistent connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Socket lost; waiting out the reconnect delay.
    ReconnectScheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    /// Server sent a close frame or the stream ended.
    Remote,
    /// `close()` was called.
    Local,
    /// Read error.
    Failed,
}

impl CloseReason {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
            Self::Failed => "failed",
        }
    }
}

/// Owns the socket lifecycle. Always used behind an `Arc` so the driver
/// task can hold a reference.
pub struct ConnectionManager {
    base_url: String,
    connect_timeout: Duration,
    session: Arc<SessionState>,
    events: Arc<EventBus>,
    link: Arc<SocketLink>,
    reconnect: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    cancel: Mutex<CancellationToken>,
    driver: Mutex<Option<JoinHandle<()>>>,
    filter: Mutex<Option<String>>,
}

impl ConnectionManager {
    pub(crate) fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        session: Arc<SessionState>,
        events: Arc<EventBus>,
        link: Arc<SocketLink>,
        reconnect: ReconnectPolicy,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            base_url: base_url.into(),
            connect_timeout,
            session,
            events,
            link,
            reconnect,
            state,
            cancel: Mutex::new(CancellationToken::new()),
            driver: Mutex::new(None),
            filter: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// `true` iff a live socket is held.
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Execution filter of the current (or last) connection.
    pub fn execution_filter(&self) -> Option<String> {
        self.filter.lock().clone()
    }

    pub fn reconnect_policy(&self) -> &ReconnectPolicy {
        &self.reconnect
    }

    /// Open the socket, emit `connected`, and start the background receive
    /// loop. Returns once the socket is open.
    ///
    /// Fails with [`Error::AlreadyConnected`] while a connection (or a
    /// pending reconnect) is active, and with a transport error if the
    /// first open fails. Later drops are reported only through the
    /// `disconnected` event.
    pub async fn connect(self: &Arc<Self>, execution_id: Option<String>) -> Result<()> {
        let claimed = self.state.send_if_modified(|s| {
            if *s == ConnectionState::Disconnected {
                *s = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(Error::AlreadyConnected);
        }

        let cancel = CancellationToken::new();
        *self.cancel.lock() = cancel.clone();

        let ws = match self.open(execution_id.as_deref()).await {
            Ok(ws) => ws,
            Err(e) => {
                self.state.send_replace(ConnectionState::Disconnected);
                return Err(e);
            }
        };
        *self.filter.lock() = execution_id.clone();

        let (reader, writer) = self.attach(ws).await;
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            manager.drive(reader, writer, execution_id, cancel).await;
        });
        *self.driver.lock() = Some(handle);
        Ok(())
    }

    /// Stop the receive loop and any pending reconnect, send a close
    /// frame, and wait for the driver to finish. Emits `disconnected` if a
    /// socket was open.
    ///
    /// Must not be awaited from inside an event listener: listeners run
    /// on the driver task this method waits for. Use
    /// [`shutdown`](Self::shutdown) there instead.
    pub async fn close(&self) {
        self.shutdown();
        let handle = self.driver.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "connection driver ended abnormally");
            }
        }
    }

    /// Signal the driver to stop without waiting for it.
    pub fn shutdown(&self) {
        self.cancel.lock().cancel();
    }

    // ── lifecycle internals ──────────────────────────────────────────

    async fn open(&self, execution_id: Option<&str>) -> Result<WsStream> {
        // Rebuilt per attempt: the token may have changed since last time.
        let url = build_socket_url(&self.base_url, self.session.token().as_deref(), execution_id)?;
        let shown = redacted(&url);
        tracing::info!(url = %shown, "connecting websocket");

        let (ws, _response) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(url.as_str()))
                .await
                .map_err(|_| Error::Timeout(format!("websocket connect to {shown} timed out")))?
                .map_err(|e| Error::Transport(format!("websocket connect to {shown} failed: {e}")))?;

        TraceEvent::SocketOpened { url: shown }.emit();
        Ok(ws)
    }

    /// Start the writer, mark the link live, emit `connected`.
    async fn attach(&self, ws: WsStream) -> (WsReader, JoinHandle<()>) {
        let (sink, reader) = ws.split();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let writer = tokio::spawn(write_loop(sink, rx));

        self.link.attach(tx);
        self.state.send_replace(ConnectionState::Connected);
        self.events.emit(ClientEvent::Connected).await;
        (reader, writer)
    }

    async fn drive(
        self: Arc<Self>,
        mut reader: WsReader,
        mut writer: JoinHandle<()>,
        execution_id: Option<String>,
        cancel: CancellationToken,
    ) {
        loop {
            let reason = self.receive(&mut reader, &cancel).await;
            self.detach(writer, reason).await;

            let reconnect = self.reconnect.enabled && reason != CloseReason::Local;
            self.state.send_replace(if reconnect {
                ConnectionState::ReconnectScheduled
            } else {
                ConnectionState::Disconnected
            });
            TraceEvent::SocketClosed {
                reason: reason.as_str().into(),
            }
            .emit();
            self.events.emit(ClientEvent::Disconnected).await;

            if !reconnect {
                return;
            }

            match self.reopen(execution_id.as_deref(), &cancel).await {
                Some(ws) => {
                    (reader, writer) = self.attach(ws).await;
                }
                None => {
                    self.state.send_replace(ConnectionState::Disconnected);
                    return;
                }
            }
        }
    }

    /// Read frames until the socket closes or `cancel` fires.
    async fn receive(&self, reader: &mut WsReader, cancel: &CancellationToken) -> CloseReason {
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return CloseReason::Local,
                frame = reader.next() => frame,
            };

            match next {
                Some(Ok(Message::Text(text))) => self.dispatch_frame(&text).await,
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => self.dispatch_frame(text).await,
                    Err(_) => drop_frame("binary frame is not UTF-8".into()),
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(frame = ?frame, "server closed connection");
                    return CloseReason::Remote;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "websocket read failed");
                    return CloseReason::Failed;
                }
                None => return CloseReason::Remote,
            }
        }
    }

    /// Decode one frame and emit its event. Malformed frames are logged
    /// and dropped; unknown types are ignored.
    async fn dispatch_frame(&self, text: &str) {
        match InboundMessage::parse(text) {
            Ok(msg) => match ClientEvent::from_inbound(msg) {
                Some(event) => self.events.emit(event).await,
                None => tracing::debug!(frame = %text, "ignoring unrecognized message type"),
            },
            Err(e) => drop_frame(e.to_string()),
        }
    }

    /// Clear the connected flag and stop the writer.
    async fn detach(&self, mut writer: JoinHandle<()>, reason: CloseReason) {
        if let Some(tx) = self.link.detach() {
            if reason == CloseReason::Local {
                let _ = tx.send(OutboundFrame::Close).await;
            }
        }
        if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
            writer.abort();
        }
    }

    /// Fixed-delay reconnect loop. Returns `None` on cancel or when the
    /// policy gives up.
    async fn reopen(&self, execution_id: Option<&str>, cancel: &CancellationToken) -> Option<WsStream> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            if self.reconnect.should_give_up(attempt) {
                tracing::error!(attempts = attempt - 1, "max reconnect attempts exhausted");
                return None;
            }

            let delay = self.reconnect.delay;
            self.state.send_replace(ConnectionState::ReconnectScheduled);
            TraceEvent::ReconnectScheduled {
                attempt,
                delay_ms: delay.as_millis() as u64,
            }
            .emit();

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return None,
            }

            self.state.send_replace(ConnectionState::Connecting);
            let result = tokio::select! {
                r = self.open(execution_id) => r,
                _ = cancel.cancelled() => return None,
            };
            match result {
                Ok(ws) => {
                    tracing::info!(attempt, "reconnected");
                    return Some(ws);
                }
                Err(e) => tracing::warn!(attempt, error = %e, "reconnect attempt failed"),
            }
        }
    }
}

/// Writer task: the only code that touches the socket's write half.
async fn write_loop(mut sink: WsWriter, mut rx: mpsc::Receiver<OutboundFrame>) {
    while let Some(frame) = rx.recv().await {
        let msg = match frame {
            OutboundFrame::Message(msg) => match serde_json::to_string(&msg) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize outbound message");
                    continue;
                }
            },
            OutboundFrame::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        };
        if let Err(e) = sink.send(msg).await {
            tracing::debug!(error = %e, "websocket write failed");
            break;
        }
    }
}

fn drop_frame(reason: String) {
    tracing::warn!(reason = %reason, "dropping malformed frame");
    TraceEvent::FrameDropped { reason }.emit();
}

/// Build `ws(s)://host[:port]/ws?token=<token>[&execution=<id>]` from the
/// HTTP base URL. A missing token omits the `token` parameter.
pub fn build_socket_url(base_url: &str, token: Option<&str>, execution_id: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| Error::Config(format!("invalid base_url {base_url:?}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::Config(format!(
                "base_url scheme must be http or https, got {other:?}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| Error::Config(format!("cannot use {scheme} scheme for {base_url:?}")))?;
    url.set_path("/ws");
    url.set_query(None);
    url.set_fragment(None);

    if token.is_some() || execution_id.is_some() {
        let mut query = url.query_pairs_mut();
        if let Some(token) = token {
            query.append_pair("token", token);
        }
        if let Some(id) = execution_id {
            query.append_pair("execution", id);
        }
    }
    Ok(url)
}

/// The URL with its `token` value masked, for logs.
fn redacted(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "token") {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    let mut shown = url.clone();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}
