use log::*;
use service::config::Config;
use ::sse::Relay;
use std::io;
use tokio::net::TcpListener;

pub(crate) mod controller;
pub mod router;
pub(crate) mod sse;

// Web-layer state shared by every handler
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub relay: Relay,
}

impl AppState {
    pub fn new(app_config: Config, relay: Relay) -> Self {
        Self {
            config: app_config,
            relay,
        }
    }
}

/// Bind the configured interface and port, then serve the relay endpoints until
/// the listener fails or the future is dropped.
pub async fn init_server(app_state: AppState) -> io::Result<()> {
    let host = app_state.config.interface().to_string();
    let port = app_state.config.port;
    let listen_addr = format!("{host}:{port}");

    let listener = TcpListener::bind(&listen_addr).await.map_err(|e| {
        error!("Failed to bind {listen_addr}: {e}");
        e
    })?;
    info!("Relay listening on http://{listen_addr}");

    axum::serve(listener, router::define_routes(app_state)).await
}
