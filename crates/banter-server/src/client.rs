use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use banter_core::{ConnectionId, Message, Profile};
use banter_store::MessageStore;

use crate::hub::HubHandle;
use crate::wire::InboundFrame;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(90);

/// Registry key for a connected client.
///
/// Authenticated clients collapse onto their subject id, so a reconnect
/// replaces the stale entry for the same account. Anonymous clients get a
/// generated per-connection key and never collide with each other.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum RegistryKey {
    Subject(String),
    Anonymous(ConnectionId),
}

impl RegistryKey {
    pub fn for_uid(uid: &str) -> Self {
        if uid.is_empty() {
            Self::Anonymous(ConnectionId::new())
        } else {
            Self::Subject(uid.to_owned())
        }
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subject(uid) => write!(f, "subject:{uid}"),
            Self::Anonymous(id) => write!(f, "anon:{id}"),
        }
    }
}

/// Outcome of one delivery attempt to one client's send queue.
#[derive(Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Queue full; this one delivery is dropped, the client stays.
    QueueFull,
    /// Queue receiver dropped; the client is gone and should be evicted.
    Gone,
}

/// The hub's view of one connection: subject id, liveness flag, outbound
/// queue sender, and the profile cell the resolution task fills in.
///
/// The socket itself belongs to the session tasks; the hub only ever
/// observes the liveness flag and pushes frames onto the queue.
#[derive(Clone)]
pub struct ClientHandle {
    pub key: RegistryKey,
    pub uid: String,
    tx: mpsc::Sender<String>,
    connected: Arc<AtomicBool>,
    last_pong: Arc<AtomicU64>,
    profile: Arc<RwLock<Option<Profile>>>,
}

impl ClientHandle {
    /// Build a handle plus the session-side receiver for its send queue.
    pub fn new(uid: impl Into<String>, max_send_queue: usize) -> (Self, mpsc::Receiver<String>) {
        let uid = uid.into();
        let (tx, rx) = mpsc::channel(max_send_queue);
        let handle = Self {
            key: RegistryKey::for_uid(&uid),
            uid,
            tx,
            connected: Arc::new(AtomicBool::new(true)),
            last_pong: Arc::new(AtomicU64::new(now_secs())),
            profile: Arc::new(RwLock::new(None)),
        };
        (handle, rx)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    pub fn try_deliver(&self, frame: String) -> Delivery {
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::QueueFull,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Gone,
        }
    }

    pub fn profile(&self) -> Option<Profile> {
        self.profile.read().clone()
    }

    /// Shared cell for the join-time resolution task to fill.
    pub fn profile_cell(&self) -> Arc<RwLock<Option<Profile>>> {
        Arc::clone(&self.profile)
    }

    fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    fn pong_stale(&self) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) >= CLIENT_TIMEOUT.as_secs()
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Run one connection's session: a writer task draining the send queue
/// into the socket (plus heartbeat), and a reader task turning inbound
/// frames into persisted messages dispatched to the hub.
///
/// Returns when either side of the socket dies; the handle's liveness flag
/// is false by then and the hub evicts the registry entry lazily on its
/// next dispatch pass.
pub async fn run_session(
    socket: WebSocket,
    handle: ClientHandle,
    mut rx: mpsc::Receiver<String>,
    hub: HubHandle,
    store: Arc<dyn MessageStore>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: queue -> socket, heartbeat ping, stale-pong cutoff.
    let writer_handle = handle.clone();
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                frame = rx.recv() => {
                    match frame {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if writer_handle.pong_stale() {
                        tracing::info!(key = %writer_handle.key, "client idle past timeout");
                        break;
                    }
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }

        writer_handle.mark_disconnected();
    });

    // Reader: socket -> store -> hub.
    let reader_handle = handle.clone();
    let reader = tokio::spawn(async move {
        while let Some(Ok(frame)) = ws_rx.next().await {
            match frame {
                WsMessage::Text(text) => {
                    let inbound: InboundFrame = match serde_json::from_str(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!(key = %reader_handle.key, error = %e, "malformed frame, closing");
                            break;
                        }
                    };

                    // The sender's identity comes from the session, never
                    // the frame; display fields are the hub's to fill.
                    let mut message = Message::inbound(&reader_handle.uid, inbound.text);
                    match store.append(&message).await {
                        Ok(id) => message.id = id,
                        Err(e) => {
                            // Live delivery proceeds; only durability is lost.
                            tracing::error!(key = %reader_handle.key, error = %e, "message not persisted");
                        }
                    }
                    hub.dispatch(message).await;
                }
                WsMessage::Pong(_) => reader_handle.record_pong(),
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) => {} // axum replies automatically
                _ => {}
            }
        }

        reader_handle.mark_disconnected();
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    handle.mark_disconnected();
    tracing::info!(key = %handle.key, "session ended");
}
