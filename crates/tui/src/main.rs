mod admin;
mod app;
mod event;
mod form;
mod theme;

use std::{
    fs::{self, OpenOptions},
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use busbook_core::{
    config::{self, AppConfig},
    ApiClient, FileCredentialStore, SessionManager,
};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    tracing::info!(api_url = %config.api_url, "starting busbook");

    let store = Arc::new(FileCredentialStore::new(config.credentials_file()));
    let api = ApiClient::new(&config, store.clone())?;
    let session = SessionManager::new(store, Arc::new(api.clone()), config.inactivity_limit());

    let resolver = session.clone();
    tokio::spawn(async move {
        let state = resolver.resolve_session().await;
        tracing::debug!(authenticated = state.is_authenticated, "initial session resolved");
    });

    let mut app = app::BusBookApp::new(config, api, session);
    app.run().await
}

// The terminal owns stdout, so logs only go to a file.
fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("busbook.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
