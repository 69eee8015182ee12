#![forbid(unsafe_code)]

//! `chat-bridge` — chat host for a locally spawned LLM backend process.
//!
//! The host supervises one backend process, exchanges newline-delimited JSON
//! with it over stdio, and folds the replies into an append-only transcript.

pub mod backend;
pub mod boundary;
pub mod bridge;
pub mod config;
pub mod errors;
pub mod frontend;
pub mod models;
pub mod protocol;
pub mod session;
pub mod transcript;

pub use config::BridgeConfig;
pub use errors::{AppError, Result};
