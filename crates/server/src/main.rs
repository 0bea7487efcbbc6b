//! Packet TTS Server Entry Point

use std::net::SocketAddr;

use packet_tts_config::{load_settings, Settings};
use packet_tts_server::{create_router, init_metrics, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first (need observability settings for tracing init)
    let env = std::env::var("PACKET_TTS_ENV").ok();
    let config = load_settings(env.as_deref())?;

    init_tracing(&config);

    tracing::info!("Starting Packet TTS Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        words_per_packet = config.streaming.words_per_packet,
        sample_rate = config.streaming.sample_rate,
        first_frame_ms = config.streaming.first_frame_ms,
        "Loaded configuration"
    );

    if config.observability.metrics_enabled {
        init_metrics()?;
        tracing::info!("Initialized Prometheus metrics at /metrics");
    }

    let state = AppState::new(config.clone());
    tracing::info!(models = ?state.registry.models(), "Initialized application state");

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

/// Console logging, JSON or human-readable
fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!(
            "packet_tts_server={level},packet_tts_pipeline={level},packet_tts_config={level},tower_http=info"
        )
        .into()
    });

    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
