//! Confidential client sample: authorization-code flow behind a local web server.
//!
//! Browse to `/` to sign in. The app registration must list
//! `http://localhost:8080/redirect` (or the configured `redirect_uri`) as a
//! redirect URI.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use msal_samples::auth::{ConfidentialClient, Credential, FileCacheAccessor, TokenCache};
use msal_samples::config::Config;
use msal_samples::logging;
use msal_samples::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    logging::load_dotenv();
    logging::init_logging();

    info!(
        "Starting confidential auth code sample v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::load("confidential_config.json")?;
    config.validate_confidential()?;

    let secret = config.client_secret.clone().unwrap_or_default();
    let credential = Credential::from_secret(secret).context("Invalid client secret")?;

    let cache_path = config.cache_path();
    info!("Token cache at {}", cache_path.display());
    let cache = TokenCache::with_accessor(Arc::new(FileCacheAccessor::new(cache_path)));

    let client = ConfidentialClient::new(&config.authority, &config.client_id, credential, cache)
        .context("Failed to create confidential client")?;

    let redirect_uri = config
        .redirect_uri
        .clone()
        .context("redirect_uri not configured")?;
    let state = AppState::new(client, redirect_uri, config.scopes.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, web::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
