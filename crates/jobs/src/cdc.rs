//! Change-data-capture status.
//!
//! When an external CDC service is running it tails the store and keeps
//! vector searchers in sync on its own, so components skip scheduling
//! their initial copy jobs. The flag is injected rather than read from a
//! global so tests and embedders can control it.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether CDC is currently running.
pub trait CdcStatus: Send + Sync {
    /// True while an external CDC service is active
    fn is_running(&self) -> bool;
}

impl CdcStatus for bool {
    fn is_running(&self) -> bool {
        *self
    }
}

/// Shared, switchable CDC flag.
#[derive(Debug, Default)]
pub struct CdcFlag {
    running: AtomicBool,
}

impl CdcFlag {
    /// Create a flag with an initial state
    pub fn new(running: bool) -> Self {
        Self {
            running: AtomicBool::new(running),
        }
    }

    /// Switch CDC on or off
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

impl CdcStatus for CdcFlag {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
