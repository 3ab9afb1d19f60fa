//! Shared helpers for the refinement integration tests.

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;

/// Installs a test subscriber so `RUST_LOG=helios_refine=trace` shows the
/// pipeline's decisions. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
