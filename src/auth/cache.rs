//! Token cache with an optional persistence hook.
//!
//! The cache lives in memory. When a [`CacheAccessor`] is attached, the
//! accessor is asked to replace the in-memory contents before every read and
//! to export them after every write.

use crate::auth::account::Account;
use crate::auth::oauth::OIDC_SCOPES;
use crate::error::CacheError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Access tokens expiring within this window are treated as expired.
const EXPIRY_BUFFER_SECONDS: i64 = 300;

/// A cached access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenEntry {
    pub home_account_id: String,
    pub scopes: BTreeSet<String>,
    pub secret: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessTokenEntry {
    fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.expires_on - now > Duration::seconds(EXPIRY_BUFFER_SECONDS)
    }
}

/// Serializable cache contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    #[serde(default)]
    pub accounts: BTreeMap<String, Account>,
    #[serde(default)]
    pub access_tokens: Vec<AccessTokenEntry>,
    /// Refresh tokens keyed by home account id.
    #[serde(default)]
    pub refresh_tokens: BTreeMap<String, String>,
}

/// Everything a successful token response adds to the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub account: Account,
    pub scopes: BTreeSet<String>,
    pub access_token: String,
    pub expires_on: DateTime<Utc>,
    pub refresh_token: Option<String>,
}

/// Persistence hook for the token cache.
pub trait CacheAccessor: Send + Sync {
    /// Overwrite `cache` with the persisted contents, if any.
    fn replace(&self, cache: &mut CacheSnapshot) -> Result<(), CacheError>;

    /// Persist `cache`.
    fn export(&self, cache: &CacheSnapshot) -> Result<(), CacheError>;
}

/// Stores the cache as JSON in a single file.
#[derive(Debug, Clone)]
pub struct FileCacheAccessor {
    path: PathBuf,
}

impl FileCacheAccessor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheAccessor for FileCacheAccessor {
    fn replace(&self, cache: &mut CacheSnapshot) -> Result<(), CacheError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CacheError::Read(e)),
        };
        *cache = serde_json::from_slice(&raw)?;
        Ok(())
    }

    fn export(&self, cache: &CacheSnapshot) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(CacheError::Write)?;
        }
        let raw = serde_json::to_vec_pretty(cache)?;
        std::fs::write(&self.path, raw).map_err(CacheError::Write)
    }
}

/// Shared token cache used by both client types.
pub struct TokenCache {
    inner: RwLock<CacheSnapshot>,
    accessor: Option<Arc<dyn CacheAccessor>>,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCache {
    /// In-memory cache that lives as long as the process.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CacheSnapshot::default()),
            accessor: None,
        }
    }

    /// Cache backed by a persistence hook.
    pub fn with_accessor(accessor: Arc<dyn CacheAccessor>) -> Self {
        Self {
            inner: RwLock::new(CacheSnapshot::default()),
            accessor: Some(accessor),
        }
    }

    async fn reload(&self) {
        let Some(accessor) = self.accessor.clone() else {
            return;
        };
        let mut guard = self.inner.write().await;
        let mut snapshot = guard.clone();
        let loaded =
            tokio::task::spawn_blocking(move || accessor.replace(&mut snapshot).map(|()| snapshot))
                .await;

        // A broken cache file should not block sign-in; keep what is in memory.
        match loaded {
            Ok(Ok(snapshot)) => *guard = snapshot,
            Ok(Err(e)) => warn!("Failed to load token cache: {}", e),
            Err(e) => warn!("Token cache load task failed: {}", e),
        }
    }

    /// Hand a copy of the cache to the accessor. Failures leave the in-memory
    /// cache as the only copy.
    async fn persist(&self, snapshot: CacheSnapshot) {
        let Some(accessor) = self.accessor.clone() else {
            return;
        };
        let saved = tokio::task::spawn_blocking(move || accessor.export(&snapshot)).await;

        match saved {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to save token cache, keeping it in memory: {}", e),
            Err(e) => warn!("Token cache save task failed: {}", e),
        }
    }

    /// Find a usable access token for the account covering every requested scope.
    pub async fn lookup_access_token(
        &self,
        account: &Account,
        scopes: &[String],
    ) -> Option<AccessTokenEntry> {
        self.reload().await;
        let wanted = normalize_scopes(scopes);
        let now = Utc::now();

        let guard = self.inner.read().await;
        guard
            .access_tokens
            .iter()
            .find(|entry| {
                entry.home_account_id == account.home_account_id
                    && entry.scopes.is_superset(&wanted)
                    && entry.is_usable(now)
            })
            .cloned()
    }

    pub async fn refresh_token(&self, account: &Account) -> Option<String> {
        self.reload().await;
        let guard = self.inner.read().await;
        guard.refresh_tokens.get(&account.home_account_id).cloned()
    }

    pub async fn accounts(&self) -> Vec<Account> {
        self.reload().await;
        let guard = self.inner.read().await;
        guard.accounts.values().cloned().collect()
    }

    /// Save the result of a token request.
    pub async fn store(&self, entry: CacheEntry) {
        self.reload().await;
        let mut guard = self.inner.write().await;
        let id = entry.account.home_account_id.clone();
        let now = Utc::now();

        guard.access_tokens.retain(|at| {
            at.expires_on > now && !(at.home_account_id == id && at.scopes == entry.scopes)
        });
        guard.access_tokens.push(AccessTokenEntry {
            home_account_id: id.clone(),
            scopes: entry.scopes,
            secret: entry.access_token,
            expires_on: entry.expires_on,
        });

        if let Some(refresh_token) = entry.refresh_token {
            guard.refresh_tokens.insert(id.clone(), refresh_token);
        }
        guard.accounts.insert(id, entry.account);

        debug!("Token cache updated ({} access tokens)", guard.access_tokens.len());
        self.persist(guard.clone()).await;
    }

    /// Drop a refresh token the identity platform rejected.
    pub async fn remove_refresh_token(&self, account: &Account) {
        self.reload().await;
        let mut guard = self.inner.write().await;
        if guard.refresh_tokens.remove(&account.home_account_id).is_some() {
            self.persist(guard.clone()).await;
        }
    }
}

/// Lower-case resource scopes, without the OIDC scopes every request carries.
pub fn normalize_scopes<S: AsRef<str>>(scopes: &[S]) -> BTreeSet<String> {
    scopes
        .iter()
        .map(|s| s.as_ref().to_ascii_lowercase())
        .filter(|s| !OIDC_SCOPES.contains(&s.as_str()))
        .collect()
}
