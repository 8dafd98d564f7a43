//! Builder pattern for constructing an [`IhumanClient`].

use std::sync::Arc;
use std::time::Duration;

use ih_domain::config::ClientConfig;
use ih_domain::error::{Error, Result};
use reqwest::Url;

use crate::client::IhumanClient;
use crate::connection::ConnectionManager;
use crate::dispatcher::RequestDispatcher;
use crate::events::EventBus;
use crate::link::SocketLink;
use crate::reconnect::ReconnectPolicy;
use crate::retry::RetryPolicy;
use crate::session::SessionState;
use crate::subscriptions::SubscriptionRegistry;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Fluent builder for [`IhumanClient`].
///
/// # Example
///
/// ```rust,no_run
/// # use ih_sdk::IhumanClientBuilder;
/// let client = IhumanClientBuilder::new()
///     .base_url("https://api.ihuman.dev")
///     .api_key("ih_live_123")
///     .timeout(std::time::Duration::from_secs(10))
///     .build()
///     .unwrap();
/// ```
pub struct IhumanClientBuilder {
    base_url: String,
    api_key: Option<String>,
    token: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
    reconnect: ReconnectPolicy,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl Default for IhumanClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IhumanClientBuilder {
    pub fn new() -> Self {
        Self::from_config(&ClientConfig::default())
    }

    fn from_config(config: &ClientConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            token: None,
            timeout: config.timeout(),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: config.retry_base_delay(),
                ..RetryPolicy::default()
            },
            reconnect: ReconnectPolicy {
                enabled: config.auto_reconnect,
                delay: config.reconnect_delay(),
                max_attempts: config.max_reconnect_attempts,
            },
            transport: None,
        }
    }

    /// Take every setting from `config`, replacing earlier calls.
    /// The initial token and custom transport are kept.
    pub fn config(self, config: ClientConfig) -> Self {
        Self {
            token: self.token,
            transport: self.transport,
            ..Self::from_config(&config)
        }
    }

    // ── Connection ───────────────────────────────────────────────────

    /// Base HTTP address (default `http://localhost:5173`). The socket
    /// address is derived from it.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Static API key, sent as `X-API-Key` while no session token is held.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Seed the session with an existing token, as if `authenticate` had
    /// succeeded.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Per-request HTTP timeout, also used for the socket handshake.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    // ── Behavior ─────────────────────────────────────────────────────

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect.enabled = enabled;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Replace the reqwest-backed HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<IhumanClient> {
        validate_base_url(&self.base_url)?;
        let base_url = self.base_url.trim_end_matches('/').to_owned();

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::new(&base_url, self.timeout)?),
        };

        let session = Arc::new(match self.token {
            Some(token) => SessionState::with_token(token),
            None => SessionState::new(),
        });
        let events = Arc::new(EventBus::new());
        let link = Arc::new(SocketLink::new());

        let dispatcher = RequestDispatcher::new(transport, session.clone(), self.api_key, self.retry);
        let subscriptions = SubscriptionRegistry::new(link.clone());
        let connection = Arc::new(ConnectionManager::new(
            base_url.clone(),
            self.timeout,
            session.clone(),
            events.clone(),
            link.clone(),
            self.reconnect,
        ));

        tracing::debug!(base_url = %base_url, "client built");

        Ok(IhumanClient {
            base_url,
            session,
            events,
            dispatcher,
            link,
            subscriptions,
            connection,
        })
    }
}

fn validate_base_url(base_url: &str) -> Result<()> {
    if base_url.trim().is_empty() {
        return Err(Error::Config("base_url must not be empty".into()));
    }
    let url = Url::parse(base_url)
        .map_err(|e| Error::Config(format!("invalid base_url {base_url:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "base_url scheme must be http or https, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_client_config() {
        let b = IhumanClientBuilder::new();
        assert_eq!(b.base_url, "http://localhost:5173");
        assert_eq!(b.timeout, Duration::from_secs(30));
        assert_eq!(b.retry.max_retries, 3);
        assert!(b.retry.retry_client_errors);
        assert!(b.reconnect.enabled);
        assert_eq!(b.reconnect.delay, Duration::from_secs(3));
    }

    #[test]
    fn config_maps_every_field() {
        let config = ClientConfig {
            base_url: "https://api.example.com".into(),
            api_key: Some("k".into()),
            timeout_secs: 5,
            auto_reconnect: false,
            max_retries: 1,
            retry_base_delay_ms: 10,
            reconnect_delay_ms: 250,
            max_reconnect_attempts: 4,
        };
        let b = IhumanClientBuilder::new().token("T").config(config);
        assert_eq!(b.base_url, "https://api.example.com");
        assert_eq!(b.api_key.as_deref(), Some("k"));
        assert_eq!(b.token.as_deref(), Some("T"));
        assert_eq!(b.timeout, Duration::from_secs(5));
        assert_eq!(b.retry.max_retries, 1);
        assert_eq!(b.retry.base_delay, Duration::from_millis(10));
        assert!(!b.reconnect.enabled);
        assert_eq!(b.reconnect.delay, Duration::from_millis(250));
        assert_eq!(b.reconnect.max_attempts, 4);
    }

    #[test]
    fn rejects_bad_base_urls() {
        for bad in ["", "   ", "localhost:5173", "ftp://example.com", "ws://example.com"] {
            let err = IhumanClientBuilder::new().base_url(bad).build().unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{bad:?} gave {err}");
        }
    }

    #[test]
    fn initial_token_seeds_session() {
        let client = IhumanClientBuilder::new().token("T").build().unwrap();
        assert_eq!(client.session().token().as_deref(), Some("T"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = IhumanClientBuilder::new()
            .base_url("http://localhost:5173/")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:5173");
    }
}
