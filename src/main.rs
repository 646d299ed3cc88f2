//! PadPlus Session - Main Entry Point
//!
//! Connects to the streaming backend, logs in (stored session or QR code) and
//! keeps the session cache current, logging every session event.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use padplus_session::session::ScanStatus;
use padplus_session::{
    MemorySessionStore, SessionConfig, SessionError, SessionEvent, SessionManager, SessionStore,
    SqliteSessionStore, ws_transport,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,padplus_session=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 PadPlus session starting...");

    let config = SessionConfig::from_env()?;
    info!("📋 Configuration loaded, endpoint {}", config.endpoint);

    let store: Arc<dyn SessionStore> = match &config.storage_path {
        Some(path) => {
            let store = SqliteSessionStore::new(path)
                .with_context(|| format!("Failed to open session store at {path:?}"))?;
            info!("📦 Session store at {:?}", path);
            Arc::new(store)
        }
        None => {
            info!("📦 No storage path, session identity kept in memory");
            Arc::new(MemorySessionStore::new())
        }
    };

    let (transport, frames) = ws_transport::connect(&config).await?;
    let manager = SessionManager::new(config, Arc::new(transport), store);

    let events = spawn_event_logger(manager.subscribe());
    manager.start().await.context("Failed to start login")?;

    let result = tokio::select! {
        result = manager.run(frames) => result,
        signal = signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("📢 Shutdown signal received"),
                Err(err) => error!("Unable to listen for shutdown signal: {}", err),
            }
            Ok(())
        }
    };
    events.abort();

    match result {
        Ok(()) => {
            info!("✅ PadPlus session stopped");
            Ok(())
        }
        Err(SessionError::RemoteLogout(reason)) => {
            warn!("🛑 Logged out by backend: {}", reason);
            Err(SessionError::RemoteLogout(reason).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Log session events as they are emitted
fn spawn_event_logger(
    mut events: broadcast::Receiver<SessionEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Scan {
                    status: ScanStatus::Cancel,
                    qrcode: Some(qrcode),
                }) => info!(
                    "📱 Scan QR code {} ({} bytes)",
                    qrcode.qrcode_id,
                    qrcode.image.len()
                ),
                Ok(SessionEvent::Scan { status, .. }) => info!("📱 Scan status {:?}", status),
                Ok(SessionEvent::Login(user)) => {
                    info!("✅ Logged in as {} ({})", user.nick_name, user.user_name)
                }
                Ok(SessionEvent::Message(message)) => info!(
                    "💬 [{}] {} -> {}: {:?}",
                    message.room_id().unwrap_or("direct"),
                    message.from_user_name,
                    message.to_user_name,
                    message.msg_type
                ),
                Ok(event) => info!("Event {}", event.name()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event logger lagged, {} events skipped", skipped)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
