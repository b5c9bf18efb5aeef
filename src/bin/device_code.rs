//! Public client sample: device code flow with a cancellation timeout.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use msal_samples::auth::{DeviceCodeResult, FileCacheAccessor, PublicClient, TokenCache};
use msal_samples::config::Config;
use msal_samples::logging;

#[tokio::main]
async fn main() -> ExitCode {
    logging::load_dotenv();
    logging::init_logging();

    match acquire_token_device_code().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn acquire_token_device_code() -> Result<()> {
    let config = Config::load("config.json")?;

    let cache = TokenCache::with_accessor(Arc::new(FileCacheAccessor::new(config.cache_path())));
    let client = PublicClient::new(&config.authority, &config.client_id, cache)
        .context("Failed to create public client")?;

    // A previous run may have left a usable token in the cache
    if let Some(account) = client.accounts().await.into_iter().next() {
        match client
            .acquire_token_silent(&config.scopes, Some(&account))
            .await
        {
            Ok(result) => {
                info!("Using cached sign-in for {}", account.display_name());
                println!("Access token is {}", result.access_token);
                return Ok(());
            }
            Err(e) if e.requires_interaction() => {
                info!("Cached sign-in for {} needs renewal", account.display_name());
            }
            Err(e) => return Err(e).context("Silent token acquisition failed"),
        }
    }

    let cancel = CancellationToken::new();
    spawn_cancel_timeout(cancel.clone(), config.device_code_timeout());

    let result = client
        .acquire_token_by_device_code(&config.scopes, device_code_callback, cancel.clone())
        .await
        .context("Device code sign-in failed")?;
    cancel.cancel();

    println!("Access token is {}", result.access_token);
    Ok(())
}

fn device_code_callback(result: &DeviceCodeResult) {
    info!("{}", result.message());
}

/// Cancel the flow after `timeout`, or on Ctrl-C.
fn spawn_cancel_timeout(cancel: CancellationToken, timeout: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(timeout) => {
                warn!("No sign-in after {} seconds, cancelling", timeout.as_secs());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, cancelling sign-in");
            }
        }
        cancel.cancel();
    });
}
