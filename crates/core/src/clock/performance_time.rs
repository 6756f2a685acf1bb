use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::clock::announcement::{Announcement, CuePoint};
use crate::clock::epoch_ms_now;
use crate::events::{EventBus, SubscriptionId};

/// Event fired for every broadcast that is a periodic timing heartbeat.
pub const TIME_SYNC: &str = "timeSync";

/// Event fired once for every broadcast caused by a cue trigger.
/// An event named after the triggered cue fires immediately before it.
pub const CUE_CHANGE: &str = "cueChange";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct ClientInner {
    cues: RwLock<Vec<CuePoint>>,
    events: EventBus,
    state: Mutex<ConnectionState>,
}

/// Client for the performance time feed.
///
/// Owns the live connection and the cue history announced by the server, and
/// fans out `timeSync`, `cueChange`, and per-cue-name events to subscribers.
/// The history records the wall-clock occurrence time of every announced cue,
/// so elapsed times keep advancing between broadcasts and survive network
/// drops; it is replaced wholesale on every broadcast that carries time
/// points, never merged, so an operator re-triggering an earlier cue takes
/// effect immediately on all clients.
pub struct PerformanceTimeClient {
    url: String,
    reconnect_backoff: Duration,
    inner: Arc<ClientInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PerformanceTimeClient {
    /// Create a client for the given websocket URL
    /// (e.g. `ws://localhost:3000/ws/performanceTime`).
    pub fn new(url: impl Into<String>, reconnect_backoff: Duration) -> Self {
        Self {
            url: url.into(),
            reconnect_backoff,
            inner: Arc::new(ClientInner {
                cues: RwLock::new(Vec::new()),
                events: EventBus::new(),
                state: Mutex::new(ConnectionState::Disconnected),
            }),
            task: Mutex::new(None),
        }
    }

    /// Establish the server connection. Idempotent: calling it while a
    /// connection task is already running does nothing.
    ///
    /// On connect failure or remote close, the task waits out the fixed
    /// backoff and retries, indefinitely. Transient disconnects emit no
    /// events; subscribers simply resume receiving notifications once the
    /// feed is re-established.
    pub fn connect(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let url = self.url.clone();
        let backoff = self.reconnect_backoff;
        *task = Some(tokio::spawn(async move {
            connection_loop(inner, url, backoff).await;
        }));
    }

    /// Tear the connection down and cancel any pending reconnect.
    pub fn shutdown(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        *self.inner.state.lock() = ConnectionState::Disconnected;
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Seconds elapsed since the named cue last fired, computed against the
    /// current instant on every call. Negative if the cue has not fired.
    pub fn since_cue(&self, name: &str) -> f64 {
        self.inner.since_cue(name)
    }

    /// The most recently occurred cue, or `None` if no cue has been announced.
    pub fn latest_cue(&self) -> Option<CuePoint> {
        self.inner
            .cues
            .read()
            .iter()
            .max_by_key(|c| c.occurred_at_epoch_ms)
            .cloned()
    }

    pub fn on<F>(&self, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.events.on(name, handler)
    }

    pub fn once<F>(&self, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.events.once(name, handler)
    }

    pub fn off(&self, name: &str, id: SubscriptionId) {
        self.inner.events.off(name, id)
    }

    /// Feed a raw broadcast body into the client as if it had arrived on the
    /// transport. Useful for alternate transports and for tests.
    pub fn ingest(&self, raw: &str) {
        self.inner.handle_message(raw, epoch_ms_now());
    }

    /// As [`ingest`](Self::ingest), with an explicit receipt time.
    pub fn ingest_at(&self, raw: &str, received_at_epoch_ms: i64) {
        self.inner.handle_message(raw, received_at_epoch_ms);
    }
}

impl Drop for PerformanceTimeClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl ClientInner {
    fn since_cue(&self, name: &str) -> f64 {
        let now = epoch_ms_now();
        self.cues
            .read()
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| (now - c.occurred_at_epoch_ms) as f64 / 1000.0)
            .unwrap_or(-1.0)
    }

    fn handle_message(&self, raw: &str, received_at_epoch_ms: i64) {
        let Some(announcement) = Announcement::decode(raw) else {
            return;
        };

        let points = announcement.cue_points(received_at_epoch_ms);
        let replaced = !points.is_empty();
        if replaced {
            // Wholesale replacement: readers see either the old history or
            // the new one, never a partial mix.
            *self.cues.write() = points;
        }

        if announcement.is_cue_trigger() {
            // Only a broadcast that carried points names a newly fired cue;
            // a trigger without points must not re-fire the previous cue's
            // named event.
            if replaced {
                let triggered = self.cues.read().last().cloned();
                if let Some(point) = triggered {
                    log::info!("received cue: {}", point.name);
                    self.events.emit(&point.name);
                }
            }
            self.events.emit(CUE_CHANGE);
        } else {
            self.events.emit(TIME_SYNC);
        }
    }
}

async fn connection_loop(inner: Arc<ClientInner>, url: String, backoff: Duration) {
    loop {
        *inner.state.lock() = ConnectionState::Connecting;
        log::info!("connecting to performance time server at {}", url);

        match connect_async(&url).await {
            Ok((stream, _)) => {
                *inner.state.lock() = ConnectionState::Connected;
                log::info!("connected to performance time server");

                let (_, mut read) = stream.split();
                while let Some(message) = read.next().await {
                    match message {
                        Ok(Message::Text(text)) => {
                            inner.handle_message(&text, epoch_ms_now());
                        }
                        Ok(Message::Close(_)) => {
                            log::info!("server closed performance time connection");
                            break;
                        }
                        Ok(_) => {} // ping/pong/binary carry no announcements
                        Err(err) => {
                            // Treat receive errors as a close so the
                            // reconnect path below runs.
                            log::warn!("error receiving from server: {}", err);
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                log::warn!("failed to connect to performance time server: {}", err);
            }
        }

        *inner.state.lock() = ConnectionState::Disconnected;
        tokio::time::sleep(backoff).await;
    }
}
