use log::*;
use service::{config::Config, logging::Logger};
use sse::Relay;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!("Starting up the SSE relay for {}...", config.target_url());

    let relay = match Relay::new(&config) {
        Ok(relay) => relay,
        Err(e) => {
            error!("Failed to configure the relay: {e}");
            std::process::exit(1);
        }
    };

    if config.lazy_connect {
        info!("Lazy connect: waiting for the first subscriber before connecting upstream");
    } else {
        relay.start();
    }

    let app_state = web::AppState::new(config, relay.clone());

    #[cfg(unix)]
    let mut sigterm =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Failed to install the SIGTERM handler: {e}");
                std::process::exit(1);
            }
        };
    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    let exit_code = tokio::select! {
        result = web::init_server(app_state) => match result {
            Ok(()) => 0,
            Err(e) => {
                error!("Server error: {e}");
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
            0
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
            0
        }
    };

    relay.shutdown();
    std::process::exit(exit_code);
}
