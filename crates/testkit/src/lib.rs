#![warn(missing_docs)]
//! Test collaborators for the audio system: scripted samples, a movable player
//! and a settable volume store.

mod collaborators;
mod sample;

use std::time::{Duration, Instant};

pub use collaborators::*;
pub use sample::*;

/// Install a test subscriber once so `RUST_LOG` works in tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or `timeout` passes. Returns whether it held.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
