//! Microsoft identity platform samples.
//!
//! Library side of the `confidential-auth-code` and `device-code` binaries.

#![deny(clippy::all)]

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod web;
