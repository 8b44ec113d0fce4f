//! Utility modules for albumscan-core

pub mod retry;

pub use retry::{retry_transient, RetryPolicy, TransientError};
