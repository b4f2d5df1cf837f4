//! Streaming service: subscriptions pushed over `WebSocket`.
//!
//! Upgrade requests on [`DATALINK_PATH`] are taken over by
//! [`steal_upgrade`] before the responsibility chain sees them. Each
//! connection keeps its own [`ConnectionState`] and is driven by the tick
//! broadcast: on every tick it checks whether a push is due and, if so,
//! sends one JSON object with a value per subscribed API string.
//!
//! Lagged ticks are skipped, lost frames are not resent, and a failed send
//! ends only that connection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{FromRequestParts, Request, State, WebSocketUpgrade};
use axum::http::{Method, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use datalink_core::ApiRegistry;
use datalink_core::config::StreamConfig;
use datalink_types::{ConnectionId, StreamRequest, Telemetry};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::{debug, trace};

use crate::datalink::{DATALINK_PATH, lay_out};
use crate::state::{AppState, ServerContext, TickEvent};

/// Middleware that hands `WebSocket` upgrades on the data-link path to
/// the streaming service and passes every other request through.
pub async fn steal_upgrade(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !is_stream_upgrade(&request) {
        return next.run(request).await;
    }

    let (mut parts, _body) = request.into_parts();
    match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => {
            let context = Arc::clone(&state.context);
            let shutdown = state.shutdown.clone();
            upgrade.on_upgrade(move |socket| serve_connection(socket, context, shutdown))
        }
        Err(rejection) => {
            debug!(%rejection, "rejected stream upgrade");
            rejection.into_response()
        }
    }
}

fn is_stream_upgrade(request: &Request) -> bool {
    request.method() == Method::GET
        && request.uri().path() == DATALINK_PATH
        && request
            .headers()
            .get(header::UPGRADE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Per-connection subscription state. Owned by its connection task.
#[derive(Debug)]
pub struct ConnectionState {
    id: ConnectionId,
    subscriptions: Vec<String>,
    pending_runs: Vec<String>,
    interval: Duration,
    last_push: Option<Instant>,
    seen_generation: u64,
}

impl ConnectionState {
    /// Fresh state pushing every `config.push_interval_ms`.
    pub fn new(id: ConnectionId, config: &StreamConfig, generation: u64) -> Self {
        Self {
            id,
            subscriptions: Vec::new(),
            pending_runs: Vec::new(),
            interval: Duration::from_millis(config.clamp_interval(config.push_interval_ms)),
            last_push: None,
            seen_generation: generation,
        }
    }

    /// The connection's identity.
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Subscribed API strings, in subscription order.
    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    /// Current push interval.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Apply a client message.
    ///
    /// A changed subscription list or a pending run makes the next tick
    /// push regardless of the interval.
    pub fn apply(&mut self, request: StreamRequest, config: &StreamConfig) {
        let before = self.subscriptions.len();
        for api in request.subscribe {
            if !self.subscriptions.contains(&api) {
                self.subscriptions.push(api);
            }
        }
        let added = self.subscriptions.len() != before;

        let before = self.subscriptions.len();
        self.subscriptions
            .retain(|api| !request.unsubscribe.contains(api));
        let removed = self.subscriptions.len() != before;

        if let Some(rate) = request.rate {
            self.interval = Duration::from_millis(config.clamp_interval(rate));
        }
        self.pending_runs.extend(request.run);

        if added || removed {
            self.last_push = None;
        }
    }

    /// Whether a frame should be sent at `now`.
    pub fn is_due(&self, now: Instant, generation: u64) -> bool {
        generation != self.seen_generation
            || !self.pending_runs.is_empty()
            || self
                .last_push
                .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Evaluate subscriptions then pending runs into one frame.
    ///
    /// The frame is keyed by API string. A run that repeats a subscription
    /// or another run turns the frame into an array of values in the same
    /// order, as for a plain batch. Returns `None` when there is nothing to
    /// send. Consumes the pending runs and records the push.
    pub fn frame(
        &mut self,
        registry: &ApiRegistry,
        telemetry: &Arc<Telemetry>,
        now: Instant,
        generation: u64,
    ) -> Option<Value> {
        self.last_push = Some(now);
        self.seen_generation = generation;

        let runs = std::mem::take(&mut self.pending_runs);
        if self.subscriptions.is_empty() && runs.is_empty() {
            return None;
        }

        let mut frame = Vec::with_capacity(self.subscriptions.len().saturating_add(runs.len()));
        for api in self.subscriptions.iter().chain(runs.iter()) {
            let value = registry.process(api, telemetry).unwrap_or_else(|e| {
                trace!(connection = %self.id, %api, error = %e, "stream value unavailable");
                Value::Null
            });
            frame.push((api.clone(), value));
        }
        Some(lay_out(frame))
    }
}

/// Drive one upgraded connection until it closes or the server stops.
async fn serve_connection(
    mut socket: WebSocket,
    context: Arc<ServerContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    let guard = context.track_stream(ConnectionId::new());
    let id = guard.id();
    let mut state = ConnectionState::new(id, context.stream_config(), context.changes().generation());
    let mut ticks = context.subscribe_ticks();
    debug!(connection = %id, active = context.active_streams(), "stream connected");

    loop {
        tokio::select! {
            () = stopping(&mut shutdown) => {
                let _ = socket.send(Message::Close(None)).await;
                debug!(connection = %id, "stream closed by shutdown");
                break;
            }
            tick = ticks.recv() => {
                match tick {
                    Ok(event) => {
                        if !push(&mut socket, &mut state, &context, event).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(connection = %id, skipped = n, "stream lagged, skipping ahead");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        context.stream_rates().record_up(byte_len(text.len()));
                        match serde_json::from_str::<StreamRequest>(text.as_str()) {
                            Ok(request) => state.apply(request, context.stream_config()),
                            Err(e) => debug!(connection = %id, error = %e, "ignoring malformed stream message"),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(connection = %id, "stream disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(connection = %id, "stream disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(connection = %id, error = %e, "stream transport error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(guard);
    debug!(connection = %id, active = context.active_streams(), "stream ended");
}

/// Resolves once the run is stopping. A dropped sender counts as stopping.
async fn stopping(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopping| *stopping).await;
}

/// Push a frame if one is due. Returns `false` when the connection is gone.
async fn push(
    socket: &mut WebSocket,
    state: &mut ConnectionState,
    context: &ServerContext,
    event: TickEvent,
) -> bool {
    let now = Instant::now();
    if !state.is_due(now, event.generation) {
        return true;
    }
    let telemetry = context.snapshot();
    let Some(frame) = state.frame(context.registry(), &telemetry, now, event.generation) else {
        return true;
    };

    let text = match serde_json::to_string(&frame) {
        Ok(text) => text,
        Err(e) => {
            debug!(connection = %state.id(), error = %e, "failed to serialize stream frame");
            return true;
        }
    };
    let bytes = byte_len(text.len());
    if socket.send(Message::Text(text.into())).await.is_err() {
        debug!(connection = %state.id(), "stream disconnected (send failed)");
        return false;
    }
    context.stream_rates().record_down(bytes);
    true
}

fn byte_len(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use datalink_core::{BoundListener, ControlQueue, DeferredQueue, PluginRegistry, ServerSettings};
    use serde_json::json;

    use super::*;

    fn registry() -> ApiRegistry {
        let queue: Arc<ControlQueue> = Arc::new(DeferredQueue::new());
        ApiRegistry::standard(
            &ServerSettings::default(),
            &BoundListener::new(),
            &queue,
            Arc::new(PluginRegistry::new()),
        )
        .unwrap()
    }

    fn request(json: &str) -> StreamRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn subscriptions_are_ordered_and_deduplicated() {
        let config = StreamConfig::default();
        let mut state = ConnectionState::new(ConnectionId::new(), &config, 0);
        state.apply(request(r#"{"+":["b","a","b"]}"#), &config);
        state.apply(request(r#"{"+":["c"],"-":["a"]}"#), &config);
        assert_eq!(state.subscriptions(), ["b".to_owned(), "c".to_owned()]);
    }

    #[test]
    fn rate_is_clamped_to_the_floor() {
        let config = StreamConfig::default();
        let mut state = ConnectionState::new(ConnectionId::new(), &config, 0);
        state.apply(request(r#"{"rate":1}"#), &config);
        assert_eq!(state.interval(), Duration::from_millis(50));
        state.apply(request(r#"{"rate":2000}"#), &config);
        assert_eq!(state.interval(), Duration::from_secs(2));
    }

    #[test]
    fn due_after_interval_or_subject_change() {
        let config = StreamConfig::default();
        let registry = registry();
        let telemetry = Arc::new(Telemetry::default());
        let mut state = ConnectionState::new(ConnectionId::new(), &config, 0);
        state.apply(request(r#"{"+":["game.time"]}"#), &config);

        let start = Instant::now();
        assert!(state.is_due(start, 0));
        assert!(state.frame(&registry, &telemetry, start, 0).is_some());

        let soon = start.checked_add(Duration::from_millis(10)).unwrap();
        assert!(!state.is_due(soon, 0));
        assert!(state.is_due(soon, 1));

        let later = start.checked_add(Duration::from_millis(600)).unwrap();
        assert!(state.is_due(later, 0));
    }

    #[test]
    fn frame_lists_subscriptions_then_runs_once() {
        let config = StreamConfig::default();
        let registry = registry();
        let telemetry = Arc::new(Telemetry::default());
        let mut state = ConnectionState::new(ConnectionId::new(), &config, 0);
        state.apply(
            request(r#"{"+":["game.time","unknown.metric"],"run":["game.paused"]}"#),
            &config,
        );

        let now = Instant::now();
        let frame = state.frame(&registry, &telemetry, now, 0).unwrap();
        assert_eq!(
            frame,
            json!({"game.time": 0.0, "unknown.metric": null, "game.paused": 2})
        );

        let frame = state.frame(&registry, &telemetry, now, 0).unwrap();
        assert_eq!(
            frame.as_object().unwrap().keys().collect::<Vec<_>>(),
            vec!["game.time", "unknown.metric"]
        );
    }

    #[test]
    fn run_repeating_a_subscription_keeps_both_positions() {
        let config = StreamConfig::default();
        let registry = registry();
        let telemetry = Arc::new(Telemetry::default());
        let mut state = ConnectionState::new(ConnectionId::new(), &config, 0);
        state.apply(
            request(r#"{"+":["game.time"],"run":["game.paused","game.time"]}"#),
            &config,
        );

        let now = Instant::now();
        let frame = state.frame(&registry, &telemetry, now, 0).unwrap();
        assert_eq!(frame, json!([0.0, 2, 0.0]));

        let frame = state.frame(&registry, &telemetry, now, 0).unwrap();
        assert_eq!(frame, json!({"game.time": 0.0}));
    }

    #[test]
    fn nothing_subscribed_sends_nothing() {
        let config = StreamConfig::default();
        let mut state = ConnectionState::new(ConnectionId::new(), &config, 0);
        let frame = state.frame(&registry(), &Arc::new(Telemetry::default()), Instant::now(), 0);
        assert!(frame.is_none());
    }
}
