//! Tracing setup shared by both binaries.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging.
///
/// Honours `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

/// Load `.env` if present. Must run before logging is initialised.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        // .env file is optional - only report if it's not a "file not found" error
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }
}
