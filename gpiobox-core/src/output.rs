//! The single controlled digital output.
//!
//! `OutputState` is a cloneable handle over an [`OutputPin`]. Both the
//! HTTP control surface and the stream client hold a clone; every write
//! is one `set_output` call, never a read-modify-write, so concurrent
//! writers resolve to whichever store landed last.
//!
//! If the state ever grows beyond one boolean, writers must take a lock.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Hardware capability boundary for one digital output.
pub trait OutputPin: Send + Sync {
    /// Drive the output high (`true`) or low (`false`).
    fn set_output(&self, on: bool);

    /// Read back the current level.
    fn read_output(&self) -> bool;
}

/// In-memory pin, used on hosts without GPIO access and in tests.
#[derive(Debug, Default)]
pub struct MemoryPin {
    level: AtomicBool,
}

impl MemoryPin {
    pub fn new(initial: bool) -> Self {
        Self {
            level: AtomicBool::new(initial),
        }
    }
}

impl OutputPin for MemoryPin {
    fn set_output(&self, on: bool) {
        self.level.store(on, Ordering::SeqCst);
    }

    fn read_output(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

/// Shared handle to the process-wide output.
#[derive(Clone)]
pub struct OutputState {
    pin: Arc<dyn OutputPin>,
}

impl OutputState {
    pub fn new(pin: Arc<dyn OutputPin>) -> Self {
        Self { pin }
    }

    /// Handle backed by a [`MemoryPin`].
    pub fn in_memory(initial: bool) -> Self {
        Self::new(Arc::new(MemoryPin::new(initial)))
    }

    /// Single-assignment write.
    pub fn set(&self, on: bool) {
        debug!(on, "output set");
        self.pin.set_output(on);
    }

    pub fn get(&self) -> bool {
        self.pin.read_output()
    }

    /// `"ON"` / `"OFF"`, as rendered on the control page.
    pub fn label(&self) -> &'static str {
        if self.get() { "ON" } else { "OFF" }
    }
}

impl fmt::Debug for OutputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputState")
            .field("on", &self.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_value() {
        let a = OutputState::in_memory(false);
        let b = a.clone();
        a.set(true);
        assert!(b.get());
        b.set(false);
        assert!(!a.get());
    }

    #[test]
    fn label_follows_level() {
        let out = OutputState::in_memory(true);
        assert_eq!(out.label(), "ON");
        out.set(false);
        assert_eq!(out.label(), "OFF");
    }

    #[test]
    fn last_writer_wins_across_threads() {
        let out = OutputState::in_memory(false);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let out = out.clone();
                std::thread::spawn(move || out.set(i % 2 == 0))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        out.set(true);
        assert!(out.get());
    }
}
