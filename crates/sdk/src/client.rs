//! Client facade: authentication, resource calls, live execution updates.

use std::sync::Arc;

use ih_domain::config::ClientConfig;
use ih_domain::error::Result;
use ih_protocol::OutboundMessage;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::watch;

use crate::builder::IhumanClientBuilder;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::dispatcher::RequestDispatcher;
use crate::events::{ClientEvent, EventBus, EventListener};
use crate::link::SocketLink;
use crate::session::SessionState;
use crate::subscriptions::SubscriptionRegistry;
use crate::transport::ApiRequest;
use crate::types::{ExecutionCreated, HistoryQuery, LoginResponse, SkillQuery, UserInfo};

/// A configured client for one account and one live connection.
///
/// Create via [`IhumanClient::builder`] or [`IhumanClient::new`].
/// Dropping the client stops its background connection task.
pub struct IhumanClient {
    pub(crate) base_url: String,
    pub(crate) session: Arc<SessionState>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) dispatcher: RequestDispatcher,
    pub(crate) link: Arc<SocketLink>,
    pub(crate) subscriptions: SubscriptionRegistry,
    pub(crate) connection: Arc<ConnectionManager>,
}

impl IhumanClient {
    pub fn builder() -> IhumanClientBuilder {
        IhumanClientBuilder::new()
    }

    /// Build a client straight from a [`ClientConfig`].
    pub fn new(config: ClientConfig) -> Result<Self> {
        IhumanClientBuilder::new().config(config).build()
    }

    /// SDK version string.
    pub fn version() -> &'static str {
        crate::VERSION
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Register a synchronous callback for `event` (e.g. `"progress"` or
    /// [`EventKind::Progress`](crate::events::EventKind)).
    pub fn on<F>(&self, event: impl AsRef<str>, callback: F) -> &Self
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.events.on(event, callback);
        self
    }

    /// Register an async callback; each invocation is awaited before the
    /// next listener runs.
    pub fn on_async<F, Fut>(&self, event: impl AsRef<str>, callback: F) -> &Self
    where
        F: Fn(ClientEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.events.on_async(event, callback);
        self
    }

    pub fn on_listener(&self, event: impl AsRef<str>, listener: Arc<dyn EventListener>) -> &Self {
        self.events.on_listener(event, listener);
        self
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Log in, store the returned token, and emit `authenticated`.
    ///
    /// Request failures (including bad credentials) propagate unchanged.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<UserInfo> {
        let value = self
            .dispatcher
            .send(
                Method::POST,
                "/api/auth/login",
                Some(json!({ "email": email, "password": password })),
            )
            .await?;
        let login: LoginResponse = serde_json::from_value(value)?;

        self.session.set_token(login.access_token);
        tracing::info!(user_id = %login.user.id, "authenticated");
        self.events
            .emit(ClientEvent::Authenticated {
                user_id: login.user.id.clone(),
            })
            .await;
        Ok(login.user)
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, email: &str, username: &str, password: &str) -> Result<UserInfo> {
        let value = self
            .dispatcher
            .send(
                Method::POST,
                "/api/auth/register",
                Some(json!({ "email": email, "username": username, "password": password })),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn current_user(&self) -> Result<UserInfo> {
        let value = self.dispatcher.send(Method::GET, "/api/auth/me", None).await?;
        Ok(serde_json::from_value(value)?)
    }

    // ── Skills ───────────────────────────────────────────────────────

    pub async fn list_skills(&self, query: &SkillQuery) -> Result<Value> {
        let request = ApiRequest::get("/api/skills")
            .query_opt("category", query.category.as_deref())
            .query_opt("difficulty", query.difficulty.as_deref())
            .query("limit", query.limit)
            .query("offset", query.offset);
        self.dispatcher.dispatch(request).await
    }

    pub async fn search_skills(&self, query: &str, limit: u32, offset: u32) -> Result<Value> {
        let request = ApiRequest::get("/api/skills/search")
            .query("q", query)
            .query("limit", limit)
            .query("offset", offset);
        self.dispatcher.dispatch(request).await
    }

    pub async fn get_skill(&self, skill_id: &str) -> Result<Value> {
        let path = format!("/api/skills/{}", urlencoding::encode(skill_id));
        self.dispatcher.send(Method::GET, &path, None).await
    }

    // ── Executions ───────────────────────────────────────────────────

    /// Start a skill execution and emit `skill_executed`.
    pub async fn execute_skill(&self, skill_id: &str, params: Value) -> Result<ExecutionCreated> {
        let value = self
            .dispatcher
            .send(
                Method::POST,
                "/api/executions",
                Some(json!({ "skillId": skill_id, "params": params })),
            )
            .await?;
        let created: ExecutionCreated = serde_json::from_value(value)?;

        self.events
            .emit(ClientEvent::SkillExecuted {
                execution_id: created.execution_id.clone(),
                skill_id: skill_id.to_owned(),
            })
            .await;
        Ok(created)
    }

    pub async fn get_execution(&self, execution_id: &str) -> Result<Value> {
        let path = format!("/api/executions/{}", urlencoding::encode(execution_id));
        self.dispatcher.send(Method::GET, &path, None).await
    }

    pub async fn execution_history(&self, query: &HistoryQuery) -> Result<Value> {
        let request = ApiRequest::get("/api/executions")
            .query("limit", query.limit)
            .query("offset", query.offset)
            .query_opt("status", query.status);
        self.dispatcher.dispatch(request).await
    }

    pub async fn cancel_execution(&self, execution_id: &str) -> Result<Value> {
        let path = format!("/api/executions/{}/cancel", urlencoding::encode(execution_id));
        self.dispatcher.send(Method::POST, &path, None).await
    }

    // ── Live updates ─────────────────────────────────────────────────

    /// Open the live connection, optionally filtered to one execution.
    /// See [`ConnectionManager::connect`].
    pub async fn connect(&self, execution_id: Option<&str>) -> Result<()> {
        self.connection
            .connect(execution_id.map(str::to_owned))
            .await
    }

    /// Close the live connection; no reconnect follows.
    pub async fn close(&self) {
        self.connection.close().await;
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    /// Ask the server for updates on `execution_id` and emit `subscribed`.
    pub async fn subscribe(&self, execution_id: &str) -> Result<()> {
        self.subscriptions.subscribe(execution_id).await?;
        self.events
            .emit(ClientEvent::Subscribed {
                execution_id: execution_id.to_owned(),
            })
            .await;
        Ok(())
    }

    /// Stop updates for `execution_id`. A no-op while disconnected;
    /// otherwise emits `unsubscribed`.
    pub async fn unsubscribe(&self, execution_id: &str) -> Result<()> {
        if self.subscriptions.unsubscribe(execution_id).await? {
            self.events
                .emit(ClientEvent::Unsubscribed {
                    execution_id: execution_id.to_owned(),
                })
                .await;
        }
        Ok(())
    }

    /// Ask the server to resend the current state of `execution_id`.
    pub async fn request_update(&self, execution_id: &str) -> Result<()> {
        self.link
            .send(OutboundMessage::RequestUpdate {
                execution_id: execution_id.to_owned(),
            })
            .await
    }
}

impl Drop for IhumanClient {
    fn drop(&mut self) {
        self.connection.shutdown();
    }
}

impl std::fmt::Debug for IhumanClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IhumanClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .field("state", &self.connection.state())
            .finish_non_exhaustive()
    }
}
