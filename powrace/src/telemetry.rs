// Copyright (c) 2024 Botho Foundation

//! Logging setup.
//!
//! `RUST_LOG` takes precedence when set; otherwise the level follows the
//! verbosity flag.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Returns false if a subscriber was already installed, which happens when
/// several tests in one process ask for logging.
pub fn init_tracing(verbose: bool) -> bool {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
