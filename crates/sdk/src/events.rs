//! Local event surface: typed client events, listener trait, and the
//! ordered event bus.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use ih_protocol::InboundMessage;
use parking_lot::RwLock;
use serde_json::{json, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Names under which listeners can be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Authenticated,
    SkillExecuted,
    Connected,
    Disconnected,
    Subscribed,
    Unsubscribed,
    Progress,
    Complete,
    Error,
    Log,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        Self::Authenticated,
        Self::SkillExecuted,
        Self::Connected,
        Self::Disconnected,
        Self::Subscribed,
        Self::Unsubscribed,
        Self::Progress,
        Self::Complete,
        Self::Error,
        Self::Log,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::SkillExecuted => "skill_executed",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Subscribed => "subscribed",
            Self::Unsubscribed => "unsubscribed",
            Self::Progress => "progress",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Log => "log",
        }
    }
}

impl AsRef<str> for EventKind {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// An event delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Authenticated {
        user_id: String,
    },
    SkillExecuted {
        execution_id: String,
        skill_id: String,
    },
    Connected,
    Disconnected,
    Subscribed {
        execution_id: String,
    },
    Unsubscribed {
        execution_id: String,
    },
    Progress {
        execution_id: String,
        progress: Value,
        status: Value,
    },
    Complete {
        execution_id: String,
        result: Value,
        duration_ms: Value,
    },
    Error {
        execution_id: String,
        error: Value,
    },
    Log {
        execution_id: String,
        level: Value,
        message: Value,
    },
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Authenticated { .. } => EventKind::Authenticated,
            Self::SkillExecuted { .. } => EventKind::SkillExecuted,
            Self::Connected => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
            Self::Subscribed { .. } => EventKind::Subscribed,
            Self::Unsubscribed { .. } => EventKind::Unsubscribed,
            Self::Progress { .. } => EventKind::Progress,
            Self::Complete { .. } => EventKind::Complete,
            Self::Error { .. } => EventKind::Error,
            Self::Log { .. } => EventKind::Log,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// The execution this event refers to, if any.
    pub fn execution_id(&self) -> Option<&str> {
        match self {
            Self::SkillExecuted { execution_id, .. }
            | Self::Subscribed { execution_id }
            | Self::Unsubscribed { execution_id }
            | Self::Progress { execution_id, .. }
            | Self::Complete { execution_id, .. }
            | Self::Error { execution_id, .. }
            | Self::Log { execution_id, .. } => Some(execution_id),
            _ => None,
        }
    }

    /// JSON payload with snake_case keys.
    pub fn payload(&self) -> Value {
        match self {
            Self::Authenticated { user_id } => json!({ "user_id": user_id }),
            Self::SkillExecuted {
                execution_id,
                skill_id,
            } => json!({ "execution_id": execution_id, "skill_id": skill_id }),
            Self::Connected | Self::Disconnected => json!({}),
            Self::Subscribed { execution_id } | Self::Unsubscribed { execution_id } => {
                json!({ "execution_id": execution_id })
            }
            Self::Progress {
                execution_id,
                progress,
                status,
            } => json!({ "execution_id": execution_id, "progress": progress, "status": status }),
            Self::Complete {
                execution_id,
                result,
                duration_ms,
            } => json!({ "execution_id": execution_id, "result": result, "duration_ms": duration_ms }),
            Self::Error {
                execution_id,
                error,
            } => json!({ "execution_id": execution_id, "error": error }),
            Self::Log {
                execution_id,
                level,
                message,
            } => json!({ "execution_id": execution_id, "level": level, "message": message }),
        }
    }

    /// Map a decoded envelope to the event it produces. Unknown envelope
    /// types produce nothing.
    pub fn from_inbound(msg: InboundMessage) -> Option<Self> {
        match msg {
            InboundMessage::ExecutionProgress {
                execution_id,
                progress,
                status,
            } => Some(Self::Progress {
                execution_id,
                progress,
                status,
            }),
            InboundMessage::ExecutionComplete {
                execution_id,
                result,
                duration_ms,
            } => Some(Self::Complete {
                execution_id,
                result,
                duration_ms,
            }),
            InboundMessage::ExecutionError {
                execution_id,
                error,
            } => Some(Self::Error {
                execution_id,
                error,
            }),
            InboundMessage::ExecutionLog {
                execution_id,
                level,
                message,
            } => Some(Self::Log {
                execution_id,
                level,
                message,
            }),
            InboundMessage::Unknown => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Listeners
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Implement this trait to receive client events.
///
/// Closures work too: see [`EventBus::on`] for synchronous callbacks and
/// [`EventBus::on_async`] for async ones.
///
/// ```rust,no_run
/// use ih_sdk::{ClientEvent, EventListener};
///
/// struct PrintProgress;
///
/// #[async_trait::async_trait]
/// impl EventListener for PrintProgress {
///     async fn on_event(&self, event: &ClientEvent) -> anyhow::Result<()> {
///         println!("{}", event.payload());
///         Ok(())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait EventListener: Send + Sync + 'static {
    async fn on_event(&self, event: &ClientEvent) -> anyhow::Result<()>;
}

struct SyncListener<F>(F);

#[async_trait::async_trait]
impl<F> EventListener for SyncListener<F>
where
    F: Fn(&ClientEvent) + Send + Sync + 'static,
{
    async fn on_event(&self, event: &ClientEvent) -> anyhow::Result<()> {
        (self.0)(event);
        Ok(())
    }
}

struct AsyncListener<F>(F);

#[async_trait::async_trait]
impl<F, Fut> EventListener for AsyncListener<F>
where
    F: Fn(ClientEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn on_event(&self, event: &ClientEvent) -> anyhow::Result<()> {
        (self.0)(event.clone()).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bus
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Event name → listeners, in registration order.
///
/// Emission is sequential: each listener is awaited before the next one
/// starts. A listener that errors or panics is logged and skipped; it
/// never stops the rest of the list or reaches the emitter.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<Arc<dyn EventListener>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous callback. Registering the same callback
    /// twice makes it run twice per emission.
    pub fn on<F>(&self, event: impl AsRef<str>, callback: F) -> &Self
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.on_listener(event, Arc::new(SyncListener(callback)))
    }

    /// Register an async callback; its future completes before the next
    /// listener runs.
    pub fn on_async<F, Fut>(&self, event: impl AsRef<str>, callback: F) -> &Self
    where
        F: Fn(ClientEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_listener(event, Arc::new(AsyncListener(callback)))
    }

    /// Register a pre-wrapped listener.
    pub fn on_listener(&self, event: impl AsRef<str>, listener: Arc<dyn EventListener>) -> &Self {
        self.listeners
            .write()
            .entry(event.as_ref().to_owned())
            .or_default()
            .push(listener);
        self
    }

    pub fn listener_count(&self, event: impl AsRef<str>) -> usize {
        self.listeners
            .read()
            .get(event.as_ref())
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener registered under its name.
    pub async fn emit(&self, event: ClientEvent) {
        let name = event.name();
        // Snapshot so listeners may register more listeners while running.
        let listeners: Vec<Arc<dyn EventListener>> = match self.listeners.read().get(name) {
            Some(list) => list.clone(),
            None => return,
        };

        for (index, listener) in listeners.iter().enumerate() {
            let outcome = AssertUnwindSafe(listener.on_event(&event))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(event = name, listener = index, error = %e, "event listener failed");
                }
                Err(_panic) => {
                    tracing::error!(event = name, listener = index, "event listener panicked");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    fn progress(id: &str) -> ClientEvent {
        ClientEvent::Progress {
            execution_id: id.into(),
            progress: json!(50),
            status: json!("in-progress"),
        }
    }

    #[tokio::test]
    async fn listeners_fire_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s1 = seen.clone();
        bus.on(EventKind::Progress, move |_| s1.lock().push("first"));
        let s2 = seen.clone();
        bus.on("progress", move |_| s2.lock().push("second"));

        bus.emit(progress("e1")).await;
        assert_eq!(*seen.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn same_callback_twice_runs_twice() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        let callback = {
            let count = count.clone();
            move |_: &ClientEvent| *count.lock() += 1
        };
        bus.on(EventKind::Connected, callback.clone());
        bus.on(EventKind::Connected, callback);

        bus.emit(ClientEvent::Connected).await;
        assert_eq!(*count.lock(), 2);
        assert_eq!(bus.listener_count("connected"), 2);
    }

    #[tokio::test]
    async fn async_listener_completes_before_next_starts() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s1 = seen.clone();
        bus.on_async(EventKind::Log, move |_| {
            let s1 = s1.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                s1.lock().push("slow async");
                Ok::<_, anyhow::Error>(())
            }
        });
        let s2 = seen.clone();
        bus.on(EventKind::Log, move |_| s2.lock().push("sync"));

        bus.emit(ClientEvent::Log {
            execution_id: "e1".into(),
            level: json!("info"),
            message: json!("hi"),
        })
        .await;
        assert_eq!(*seen.lock(), vec!["slow async", "sync"]);
    }

    #[tokio::test]
    async fn failing_and_panicking_listeners_are_isolated() {
        let bus = EventBus::new();
        let reached = Arc::new(Mutex::new(false));

        bus.on_async(EventKind::Error, |_| async { Err::<(), _>(anyhow::anyhow!("listener blew up")) });
        bus.on(EventKind::Error, |_| panic!("intentional panic in listener"));
        let r = reached.clone();
        bus.on(EventKind::Error, move |_| *r.lock() = true);

        bus.emit(ClientEvent::Error {
            execution_id: "e1".into(),
            error: json!("boom"),
        })
        .await;
        assert!(*reached.lock());
    }

    #[tokio::test]
    async fn emit_without_listeners_is_noop() {
        let bus = EventBus::new();
        bus.emit(ClientEvent::Disconnected).await;
        assert_eq!(bus.listener_count(EventKind::Disconnected), 0);
    }

    #[tokio::test]
    async fn listeners_only_see_their_event() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        bus.on(EventKind::Complete, move |_| *c.lock() += 1);

        bus.emit(progress("e1")).await;
        assert_eq!(*count.lock(), 0);
    }

    #[test]
    fn progress_envelope_maps_to_progress_event() {
        let msg = InboundMessage::parse(
            r#"{"type":"execution-progress","executionId":"e1","progress":50,"status":"in-progress"}"#,
        )
        .unwrap();
        let event = ClientEvent::from_inbound(msg).unwrap();
        assert_eq!(event.kind(), EventKind::Progress);
        assert_eq!(
            event.payload(),
            json!({"execution_id": "e1", "progress": 50, "status": "in-progress"})
        );
    }

    #[test]
    fn complete_payload_uses_duration_ms() {
        let event = ClientEvent::from_inbound(InboundMessage::ExecutionComplete {
            execution_id: "e2".into(),
            result: json!({"answer": 42}),
            duration_ms: json!(900),
        })
        .unwrap();
        assert_eq!(
            event.payload(),
            json!({"execution_id": "e2", "result": {"answer": 42}, "duration_ms": 900})
        );
        assert_eq!(event.execution_id(), Some("e2"));
    }

    #[test]
    fn fractional_duration_still_yields_complete() {
        let msg = InboundMessage::parse(
            r#"{"type":"execution-complete","executionId":"e2","result":{"ok":true},"durationMs":1200.5}"#,
        )
        .unwrap();
        let event = ClientEvent::from_inbound(msg).unwrap();
        assert_eq!(event.kind(), EventKind::Complete);
        assert_eq!(
            event.payload(),
            json!({"execution_id": "e2", "result": {"ok": true}, "duration_ms": 1200.5})
        );
    }

    #[test]
    fn unknown_envelope_maps_to_nothing() {
        assert!(ClientEvent::from_inbound(InboundMessage::Unknown).is_none());
    }

    #[test]
    fn authenticated_payload_carries_only_user_id() {
        let event = ClientEvent::Authenticated {
            user_id: "u1".into(),
        };
        assert_eq!(event.payload(), json!({"user_id": "u1"}));
        assert_eq!(event.name(), "authenticated");
    }

    #[test]
    fn every_kind_has_distinct_name() {
        let mut names: Vec<&str> = EventKind::ALL.iter().map(EventKind::as_str).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
    }
}
