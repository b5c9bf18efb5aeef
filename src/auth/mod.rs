//! Microsoft identity platform client.
//!
//! Provides confidential and public clients with a shared token cache,
//! the authorization-code flow with PKCE, and the device code flow.

pub mod account;
pub mod cache;
mod client;
pub mod confidential;
pub mod device_code;
pub mod oauth;
pub mod public;

#[cfg(test)]
pub(crate) mod testing;

pub use account::Account;
pub use cache::{CacheAccessor, FileCacheAccessor, TokenCache};
pub use client::AuthResult;
pub use confidential::{AuthCodeRequest, ConfidentialClient, Credential};
pub use device_code::DeviceCodeResult;
pub use public::PublicClient;
