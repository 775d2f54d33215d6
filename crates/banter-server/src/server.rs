use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use banter_directory::{Credentials, ProfileDirectory, SubjectResolver};
use banter_store::MessageStore;

use crate::client::{self, ClientHandle};
use crate::handlers;
use crate::hub::{Hub, HubHandle};

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    /// Capacity of each client's outbound send queue.
    pub max_send_queue: usize,
    /// Capacity of the hub's event intake.
    pub hub_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 2000,
            max_send_queue: 256,
            hub_queue: 1024,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub store: Arc<dyn MessageStore>,
    pub directory: Arc<dyn ProfileDirectory>,
    pub subjects: Arc<dyn SubjectResolver>,
    pub max_send_queue: usize,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/messages", get(handlers::history))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Create and start the server. The returned handle owns the background
/// tasks; dropping it tears the server down.
pub async fn start(
    config: ServerConfig,
    store: Arc<dyn MessageStore>,
    directory: Arc<dyn ProfileDirectory>,
    subjects: Arc<dyn SubjectResolver>,
) -> Result<ServerHandle, std::io::Error> {
    let (hub, hub_task) = Hub::spawn(Arc::clone(&directory), config.hub_queue);

    let state = AppState {
        hub,
        store,
        directory,
        subjects,
        max_send_queue: config.max_send_queue,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "chat server listening");

    let server_task = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_task,
        _hub: hub_task,
    })
}

/// Handle returned by `start()` — keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
    _hub: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade handler. Identity extraction is best effort: a
/// missing or unverifiable credential pair yields an anonymous client,
/// never a rejection.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let credentials = headers
        .get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(Credentials::from_cookie_header);

    let uid = match credentials {
        Some(credentials) => match state.subjects.resolve(&credentials).await {
            Ok(uid) => uid,
            Err(e) => {
                tracing::debug!(error = %e, "subject resolution failed, continuing anonymous");
                String::new()
            }
        },
        None => String::new(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, uid))
}

/// Register the new client with the hub, then run its session to
/// completion. Registration precedes the first read, so every later
/// dispatch is ordered after this join.
async fn handle_socket(socket: WebSocket, state: AppState, uid: String) {
    let (handle, rx) = ClientHandle::new(uid, state.max_send_queue);
    tracing::info!(key = %handle.key, "websocket client connected");

    state.hub.register(handle.clone()).await;
    client::run_session(socket, handle, rx, state.hub.clone(), state.store).await;
}
