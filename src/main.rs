mod collectors;
mod config;
mod events;
mod http;
mod report;
mod sampler;
mod session;
mod snapshot;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::serve;
use clap::Parser;
use config::Config;
use events::EventBus;
use sampler::{Sampler, SharedLatest};
use session::TrackingManager;
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "resmond")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "./config.yaml")]
    config: String,
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match Config::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    info!(
        listen = %cfg.listen,
        interval_secs = cfg.interval_secs,
        tracking_duration_secs = cfg.tracking.duration_secs,
        "starting resmond"
    );

    let bus = EventBus::new(cfg.sampler.event_buffer);
    let session = Arc::new(TrackingManager::new(Duration::from_secs(
        cfg.tracking.duration_secs,
    )));
    let latest: SharedLatest = Arc::new(RwLock::new(None));
    let sampler = Sampler::new(Duration::from_secs(cfg.interval_secs), cfg.sampler.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = {
        let cfg = cfg.clone();
        let latest = latest.clone();
        let session = session.clone();
        let bus = bus.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let app = http::build_router(latest, session, bus);
            let addr: SocketAddr = match cfg.listen.parse() {
                Ok(addr) => addr,
                Err(err) => {
                    error!(error = %err, listen = %cfg.listen, "invalid listen address");
                    return;
                }
            };

            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(err) => {
                    error!(error = %err, "failed to start HTTP server");
                    return;
                }
            };

            let server = serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });

            if let Err(err) = server.await {
                error!(error = %err, "HTTP server error");
            }
        })
    };

    if let Err(err) = sampler
        .start(session.clone(), bus.clone(), latest.clone())
        .await
    {
        error!(error = %err, "failed to start sampler");
        std::process::exit(1);
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to wait for Ctrl+C");
    }
    info!("received Ctrl+C, shutting down");

    sampler.stop().await;
    let _ = shutdown_tx.send(true);
    let _ = http_task.await;
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
