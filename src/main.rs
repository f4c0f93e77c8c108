mod config;
mod engine;
mod error;
mod host;
mod lock;
mod mqtt;

use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting mqtt-door-lock (accessory={}, mqtt={}:{}, client_id={})",
        config.accessory.name,
        config.mqtt.broker_host,
        config.mqtt.broker_port,
        config.mqtt.client_id,
    );
    info!(
        "  status topic {} ({}=unsecured, {}=secured), command topic {}",
        config.lock.topic_status,
        config.lock.off_value,
        config.lock.on_value,
        config.lock.topic_command,
    );

    // Channels
    let (broker_tx, broker_rx) = mpsc::channel::<mqtt::BrokerEvent>(100);
    let (host_tx, host_rx) = mpsc::channel::<host::HostRequest>(16);

    let session = mqtt::session::BrokerSession::connect(&config.mqtt);
    let sync = lock::synchronizer::LockSynchronizer::new(
        config.lock.clone(),
        session.client(),
        host::TracingHost::new(&config.accessory),
    );
    let engine = engine::LockEngine::new(sync, config.accessory.clone());

    let session_handle = tokio::spawn(session.run(broker_tx));
    let engine_handle = tokio::spawn(engine.run(broker_rx, host_rx));
    let console_handle = tokio::spawn(host::run_console(host_tx));

    let mut sigterm =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to register SIGTERM handler: {}", e);
                std::process::exit(1);
            }
        };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
    }

    // Cleanup
    console_handle.abort();
    engine_handle.abort();
    session_handle.abort();
    info!("mqtt-door-lock stopped");
}
