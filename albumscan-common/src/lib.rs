//! # albumscan common library
//!
//! Shared code for the album scanning crates:
//! - Error type and result alias
//! - TOML configuration model and loading
//! - Logging initialisation
//! - SQLite pool initialisation and schema
//! - Scan event types and the broadcast event bus

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{EventBus, ScanBranch, ScanEvent, ScanState};
