//! # Call Relay - Main Application Entry Point
//!
//! Bridges phone calls from a carrier's media-stream socket to a realtime AI
//! voice endpoint, and lets human operators watch and join calls live.
//!
//! Loads configuration, starts the relay actor and serves the socket and
//! REST routes until SIGTERM or SIGINT.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use actix::Actor;
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use call_relay::config::AppConfig;
use call_relay::relay::Relay;
use call_relay::state::AppState;
use call_relay::tools::ToolRegistry;
use call_relay::websocket::{self, RealtimeConnector};
use call_relay::{handlers, health};
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set once a termination signal arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// ## Startup order:
/// 1. `.env`, logging, then configuration. A missing AI credential stops here.
/// 2. The relay actor, before any socket can be accepted
/// 3. The HTTP server with the socket upgrades and the REST routes
/// 4. Wait for the server to exit or a shutdown signal
#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting call-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);
    info!("AI endpoint: {}", config.model.url);
    if config.relay.monitor_token().is_none() {
        info!("Monitor token not set; /logs and config updates are unauthenticated");
    }

    let config = Arc::new(config);
    let tools = Arc::new(ToolRegistry::with_builtins());
    let connector = Arc::new(RealtimeConnector::new(&config.model));
    let relay = Relay::new(config.relay.clone(), tools.clone(), connector).start();

    let app_state = AppState::new(config.clone(), relay, tools);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .route("/call", web::get().to(websocket::carrier_socket))
            .route("/logs", web::get().to(websocket::monitor_socket))
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/sessions", web::get().to(handlers::list_sessions))
                    .route("/sessions/{id}/terminate", web::post().to(handlers::terminate_session))
                    .route("/sessions/{id}/dtmf", web::post().to(handlers::send_dtmf))
                    .route("/tools", web::get().to(handlers::list_tools))
                    .route("/agent-config", web::get().to(handlers::get_agent_config))
                    .route("/agent-config", web::put().to(handlers::update_agent_config)),
            )
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Console logging filtered by `RUST_LOG`, defaulting to
/// `call_relay=debug,actix_web=info`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "call_relay=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Flip [`SHUTDOWN_SIGNAL`] on SIGTERM or SIGINT.
fn setup_signal_handlers() {
    tokio::spawn(async {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
