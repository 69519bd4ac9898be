mod config;
mod sweep;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use meetpulse_api::AppStateInner;
use meetpulse_core::clock::SystemClock;
use meetpulse_core::notifier::{BrevoNotifier, LogNotifier, Notifier, ResendNotifier};
use meetpulse_db::Database;

use crate::config::{Config, EmailProvider};

const SWEEP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meetpulse=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e}");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Arc::new(Database::open(&config.db_path)?);
    let notifier = build_notifier(&config)?;

    let state = AppStateInner::new(
        db,
        notifier,
        Arc::new(SystemClock),
        config.secret_key.as_bytes(),
        config.identity_settings(),
    );

    tokio::spawn(sweep::run_sweep_loop(state.clone(), SWEEP_INTERVAL_SECS));

    let app = meetpulse_api::router(state)
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("MeetPulse server listening on {}", addr);
    if config.auto_approve {
        info!("Auto-approve is on: every verified signup is approved");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    Ok(match &config.email {
        EmailProvider::Resend { api_key } => {
            info!("Email provider: Resend");
            Arc::new(ResendNotifier::new(api_key.clone(), config.from_email.clone())?)
        }
        EmailProvider::Brevo { api_key } => {
            info!("Email provider: Brevo");
            Arc::new(BrevoNotifier::new(api_key.clone(), &config.from_email)?)
        }
        EmailProvider::LogOnly => {
            warn!("No email provider configured; sign-in codes will be logged");
            Arc::new(LogNotifier)
        }
    })
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
