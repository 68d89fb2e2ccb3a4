use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::coordinator::Coordinator;
use crate::hub::{Hub, HubHandle};
use crate::session::{self, Topology};

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub ws_path: String,
    pub topology: Topology,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 1234,
            ws_path: "/ws".into(),
            topology: Topology::Echo,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    hub: HubHandle,
    events: mpsc::UnboundedSender<String>,
    topology: Topology,
}

/// Build the Axum router with the upgrade endpoint and health route.
pub fn build_router(ws_path: &str, state: AppState) -> Router {
    Router::new()
        .route(ws_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server.
///
/// Binds the listener (the one fatal failure), then spawns the hub
/// dispatch loop, the coordinator loop, and the accept loop.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let (hub, hub_handle) = Hub::new();
    let hub_task = tokio::spawn(hub.run());

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let coordinator_task = tokio::spawn(Coordinator::new(event_rx, hub_handle.clone()).run());

    let state = AppState {
        hub: hub_handle.clone(),
        events: event_tx,
        topology: config.topology,
    };
    let router = build_router(&config.ws_path, state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        port = local_addr.port(),
        topology = ?config.topology,
        "relay server started"
    );

    let server_task = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        hub: hub_handle,
        _server: server_task,
        _hub: hub_task,
        _coordinator: coordinator_task,
    })
}

/// Handle returned by `start()` — keeps the background loops alive.
pub struct ServerHandle {
    pub port: u16,
    pub hub: HubHandle,
    _server: tokio::task::JoinHandle<()>,
    _hub: tokio::task::JoinHandle<()>,
    _coordinator: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade handler. A failed upgrade is answered by axum's
/// rejection response and never reaches the hub.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::run(socket, state.hub, state.events, state.topology))
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "clients": state.hub.client_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(topology: Topology) -> ServerConfig {
        ServerConfig {
            port: 0, // ephemeral
            topology,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn server_starts_and_serves_health() {
        let handle = start(test_config(Topology::Echo)).await.unwrap();
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["clients"], 0);
    }

    #[tokio::test]
    async fn build_router_creates_routes() {
        let (_hub, handle) = Hub::new();
        let (events, _events_rx) = mpsc::unbounded_channel();
        let state = AppState {
            hub: handle,
            events,
            topology: Topology::Echo,
        };
        let _router = build_router("/ws", state);
    }
}
