//! # Tracing configuration setup.
//!
//! The pipeline code is instrumented with Rust's `tracing` framework.
//!
//! Calling the `init` function will initialize a global tracing subscriber based on the value of
//! the `LOUPE_LOG` environment variable, which follows the same conventions as `RUST_LOG`.

use tracing_subscriber::{EnvFilter, filter::LevelFilter, prelude::*};

const LOUPE_LOG: &str = "LOUPE_LOG";

/// Initialize the tracing subscriber.
///
/// Creates a compact `tracing_subscriber::fmt` layer filtered by `LOUPE_LOG`
/// (defaulting to `warn`).
pub fn init() {
    let fmt_layer = tracing_subscriber::fmt::layer().compact();
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(LOUPE_LOG)
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
