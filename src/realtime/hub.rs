//! Session registry and fan-out.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::config::RealtimeConfig;
use crate::error::AppError;
use crate::http::request::X_REQUEST_ID;
use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::realtime::messages::{ClientMessage, ServerMessage, BROADCAST_CHANNEL};
use crate::realtime::session;

pub type SessionId = Uuid;

/// Error type for real-time initialization.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("real-time hub is already attached to a listener")]
    AlreadyInitialized,
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

struct SessionEntry {
    tx: mpsc::Sender<ServerMessage>,
    channels: HashSet<String>,
}

struct HubInner {
    config: RealtimeConfig,
    sessions: DashMap<SessionId, SessionEntry>,
    closing: Shutdown,
    initialized: AtomicBool,
}

/// WebSocket hub. Cheap to clone; clones share the same sessions.
#[derive(Clone)]
pub struct RealtimeHub {
    inner: Arc<HubInner>,
}

impl RealtimeHub {
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config: config.clone(),
                sessions: DashMap::new(),
                closing: Shutdown::new(),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// Install the upgrade route on `listener`. Must run before serving.
    ///
    /// A disabled hub attaches nothing and reports success.
    pub fn initialize(&self, listener: &mut Listener) -> Result<(), RealtimeError> {
        if !self.inner.config.enabled {
            tracing::info!("Real-time hub disabled");
            return Ok(());
        }
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            return Err(RealtimeError::AlreadyInitialized);
        }

        let path = self.inner.config.path.clone();
        let router = Router::new()
            .route(&path, get(upgrade_handler))
            .with_state(self.clone());

        if let Err(e) = listener.attach_upgrade(&path, router) {
            self.inner.initialized.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        tracing::info!(path = %path, "Real-time hub initialized");
        Ok(())
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    /// Register a new session. The welcome message is already queued.
    pub(crate) fn register(&self) -> (SessionId, mpsc::Receiver<ServerMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.inner.config.session_buffer.max(1));
        let _ = tx.try_send(ServerMessage::Welcome { session: id });

        self.inner.sessions.insert(
            id,
            SessionEntry {
                tx,
                channels: HashSet::new(),
            },
        );
        metrics::set_realtime_connections(self.connection_count());
        tracing::debug!(session = %id, "Real-time session opened");
        (id, rx)
    }

    pub(crate) fn unregister(&self, id: SessionId) {
        if self.inner.sessions.remove(&id).is_some() {
            metrics::set_realtime_connections(self.connection_count());
            tracing::debug!(session = %id, "Real-time session closed");
        }
    }

    /// Apply one inbound text frame and produce the reply.
    pub(crate) fn handle_client_text(&self, id: SessionId, text: &str) -> ServerMessage {
        let limit = self.inner.config.max_message_bytes;
        if text.len() > limit {
            return ServerMessage::error(format!("message exceeds {limit} bytes"));
        }

        let message = match ClientMessage::parse(text) {
            Ok(message) => message,
            Err(e) => return ServerMessage::error(format!("invalid message: {e}")),
        };

        match message {
            ClientMessage::Ping => ServerMessage::Pong,
            ClientMessage::Subscribe { channel } => {
                if let Err(reason) = check_channel(&channel) {
                    return ServerMessage::error(reason);
                }
                let cap = self.inner.config.max_subscriptions;
                match self.inner.sessions.get_mut(&id) {
                    Some(mut session) => {
                        if !session.channels.contains(&channel) && session.channels.len() >= cap {
                            return ServerMessage::error(format!(
                                "subscription limit of {cap} channels reached"
                            ));
                        }
                        session.channels.insert(channel.clone());
                        ServerMessage::Subscribed { channel }
                    }
                    None => ServerMessage::error("session is closed"),
                }
            }
            ClientMessage::Unsubscribe { channel } => {
                if let Some(mut session) = self.inner.sessions.get_mut(&id) {
                    session.channels.remove(&channel);
                }
                ServerMessage::Unsubscribed { channel }
            }
        }
    }

    /// Send an event to every session subscribed to `channel`.
    ///
    /// Returns the number of sessions the event was queued for. Sessions
    /// whose queue is full miss the event.
    pub fn publish(&self, channel: &str, event: &str, data: Value) -> usize {
        let message = ServerMessage::event(channel, event, data);
        self.fan_out(channel, &message, |session| session.channels.contains(channel))
    }

    /// Send an event to every session, on the `*` channel.
    pub fn broadcast(&self, event: &str, data: Value) -> usize {
        let message = ServerMessage::event(BROADCAST_CHANNEL, event, data);
        self.fan_out(BROADCAST_CHANNEL, &message, |_| true)
    }

    fn fan_out(
        &self,
        channel: &str,
        message: &ServerMessage,
        wants: impl Fn(&SessionEntry) -> bool,
    ) -> usize {
        let mut delivered = 0;
        for session in self.inner.sessions.iter() {
            if !wants(session.value()) {
                continue;
            }
            match session.tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    metrics::record_realtime_dropped(channel);
                    tracing::warn!(session = %session.key(), channel, "Session queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    pub fn connection_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Subscriber count per channel.
    pub fn channel_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for session in self.inner.sessions.iter() {
            for channel in &session.channels {
                *counts.entry(channel.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Close every session with a close frame and refuse new upgrades.
    pub fn close_all(&self) {
        if !self.inner.closing.is_triggered() {
            tracing::info!(
                sessions = self.connection_count(),
                "Closing real-time sessions"
            );
        }
        self.inner.closing.trigger();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closing.is_triggered()
    }

    pub(crate) fn closing_signal(&self) -> ShutdownSignal {
        self.inner.closing.subscribe()
    }
}

fn check_channel(channel: &str) -> Result<(), String> {
    if channel.trim().is_empty() {
        return Err("channel name must not be empty".to_string());
    }
    if channel == BROADCAST_CHANNEL {
        return Err(format!("channel '{BROADCAST_CHANNEL}' is reserved"));
    }
    Ok(())
}

async fn upgrade_handler(
    State(hub): State<RealtimeHub>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let request_id = headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok());

    if hub.is_closed() {
        return AppError::Status(StatusCode::SERVICE_UNAVAILABLE).render(request_id);
    }

    match upgrade {
        Ok(upgrade) => upgrade.on_upgrade(move |socket| session::run(hub, socket)),
        Err(rejection) => AppError::Status(rejection.status()).render(request_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hub_with_buffer(session_buffer: usize) -> RealtimeHub {
        RealtimeHub::new(&RealtimeConfig {
            session_buffer,
            max_message_bytes: 64,
            ..Default::default()
        })
    }

    fn subscribe(hub: &RealtimeHub, id: SessionId, channel: &str) {
        let frame = json!({"type": "subscribe", "channel": channel}).to_string();
        assert_eq!(
            hub.handle_client_text(id, &frame),
            ServerMessage::Subscribed {
                channel: channel.to_string()
            }
        );
    }

    #[tokio::test]
    async fn new_session_is_welcomed() {
        let hub = hub_with_buffer(4);
        let (id, mut rx) = hub.register();

        assert_eq!(rx.recv().await, Some(ServerMessage::Welcome { session: id }));
        assert_eq!(hub.connection_count(), 1);

        hub.unregister(id);
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn publish_reaches_subscribers_only() {
        let hub = hub_with_buffer(4);
        let (alice, mut alice_rx) = hub.register();
        let (_bob, mut bob_rx) = hub.register();
        alice_rx.recv().await;
        bob_rx.recv().await;

        subscribe(&hub, alice, "orders");
        assert_eq!(hub.publish("orders", "created", json!({"id": 1})), 1);

        match alice_rx.recv().await {
            Some(ServerMessage::Event { channel, event, data, .. }) => {
                assert_eq!(channel, "orders");
                assert_eq!(event, "created");
                assert_eq!(data, json!({"id": 1}));
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_ignores_subscriptions() {
        let hub = hub_with_buffer(4);
        let (_a, _a_rx) = hub.register();
        let (_b, _b_rx) = hub.register();

        assert_eq!(hub.broadcast("heartbeat", json!({})), 2);
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let hub = hub_with_buffer(1);
        let (id, _rx) = hub.register();
        subscribe(&hub, id, "orders");

        // The welcome message already fills the queue.
        assert_eq!(hub.publish("orders", "created", json!(null)), 0);
    }

    #[test]
    fn unsubscribe_and_channel_counts() {
        let hub = hub_with_buffer(4);
        let (a, _a_rx) = hub.register();
        let (b, _b_rx) = hub.register();
        subscribe(&hub, a, "orders");
        subscribe(&hub, b, "orders");
        subscribe(&hub, b, "chat");

        assert_eq!(hub.channel_counts().get("orders"), Some(&2));
        assert_eq!(hub.channel_counts().get("chat"), Some(&1));

        let frame = r#"{"type":"unsubscribe","channel":"orders"}"#;
        assert_eq!(
            hub.handle_client_text(b, frame),
            ServerMessage::Unsubscribed {
                channel: "orders".into()
            }
        );
        assert_eq!(hub.channel_counts().get("orders"), Some(&1));
    }

    #[test]
    fn subscriptions_per_session_are_capped() {
        let hub = RealtimeHub::new(&RealtimeConfig {
            max_subscriptions: 2,
            ..Default::default()
        });
        let (id, _rx) = hub.register();
        subscribe(&hub, id, "a");
        subscribe(&hub, id, "b");

        // Re-subscribing to a held channel does not count against the cap.
        subscribe(&hub, id, "a");

        let reply = hub.handle_client_text(id, r#"{"type":"subscribe","channel":"c"}"#);
        assert!(matches!(reply, ServerMessage::Error { .. }));
        assert_eq!(hub.channel_counts().get("c"), None);

        let frame = r#"{"type":"unsubscribe","channel":"a"}"#;
        hub.handle_client_text(id, frame);
        subscribe(&hub, id, "c");
    }

    #[test]
    fn bad_frames_get_error_replies() {
        let hub = hub_with_buffer(4);
        let (id, _rx) = hub.register();

        let is_error = |m: ServerMessage| matches!(m, ServerMessage::Error { .. });
        assert!(is_error(hub.handle_client_text(id, "not json")));
        assert!(is_error(hub.handle_client_text(id, &"x".repeat(65))));
        assert!(is_error(
            hub.handle_client_text(id, r#"{"type":"subscribe","channel":"*"}"#)
        ));
        assert_eq!(
            hub.handle_client_text(id, r#"{"type":"ping"}"#),
            ServerMessage::Pong
        );
    }

    #[tokio::test]
    async fn initialize_attaches_once() {
        let hub = hub_with_buffer(4);
        let mut listener = Listener::bind(&crate::config::ListenerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..Default::default()
        })
        .await
        .unwrap();

        hub.initialize(&mut listener).unwrap();
        assert_eq!(listener.upgrade_paths(), ["/ws".to_string()]);
        assert!(matches!(
            hub.initialize(&mut listener),
            Err(RealtimeError::AlreadyInitialized)
        ));
    }

    #[test]
    fn close_all_marks_hub_closed() {
        let hub = hub_with_buffer(4);
        let signal = hub.closing_signal();
        assert!(!hub.is_closed());

        hub.close_all();
        assert!(hub.is_closed());
        assert!(signal.is_triggered());
    }
}
