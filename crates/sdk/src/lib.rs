//! `ih-sdk` — client SDK for the iHuman skills service.
//!
//! Authenticate, call skills over HTTP, and receive live execution
//! updates over a persistent WebSocket as typed local events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  IhumanClient                                                │
//! │                                                              │
//! │   authenticate / resources ──► RequestDispatcher ──► HTTP    │
//! │                                   │  (retry, auth header)    │
//! │                              SessionState (token)            │
//! │                                   │                          │
//! │   connect ──► ConnectionManager ──┴─► WebSocket /ws          │
//! │                 │  receive loop, reconnect                   │
//! │                 ▼                                            │
//! │              EventBus ──► on("progress", ...) listeners      │
//! │                                                              │
//! │   subscribe ──► SubscriptionRegistry ──► writer task         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! # async fn demo() -> ih_sdk::Result<()> {
//! use ih_sdk::{EventKind, IhumanClient};
//!
//! let client = IhumanClient::builder()
//!     .base_url("http://localhost:5173")
//!     .build()?;
//! client.authenticate("a@b.com", "secret").await?;
//! client.on(EventKind::Progress, |e| println!("{}", e.payload()));
//!
//! let created = client.execute_skill("seo-audit", serde_json::json!({})).await?;
//! client.connect(Some(created.execution_id.as_str())).await?;
//! client.subscribe(&created.execution_id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Events
//!
//! `authenticated`, `skill_executed`, `connected`, `disconnected`,
//! `subscribed`, `unsubscribed`, `progress`, `complete`, `error`, `log`.
//! Payload keys are snake_case (see [`ClientEvent::payload`]).

pub mod builder;
pub mod client;
pub mod connection;
pub mod dispatcher;
pub mod events;
pub(crate) mod link;
pub mod reconnect;
pub mod retry;
pub mod session;
pub mod subscriptions;
pub mod transport;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use builder::IhumanClientBuilder;
pub use client::IhumanClient;
pub use connection::{ConnectionManager, ConnectionState};
pub use dispatcher::RequestDispatcher;
pub use events::{ClientEvent, EventBus, EventKind, EventListener};
pub use reconnect::ReconnectPolicy;
pub use retry::RetryPolicy;
pub use session::SessionState;
pub use subscriptions::SubscriptionRegistry;
pub use transport::{ApiRequest, ApiResponse, Credentials, HttpTransport, ReqwestTransport};
pub use types::{ExecutionCreated, HistoryQuery, SkillQuery, UserInfo};

pub use ih_domain::config::ClientConfig;
pub use ih_domain::error::{Error, Result};
pub use ih_protocol::{ExecutionStatus, InboundMessage, OutboundMessage};

/// SDK version, from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
