//! Output backends for the agent.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use gpiobox_core::{BoxError, MemoryPin, OutputPin, OutputState};

use crate::config::{OutputConfig, PinBackend};

/// A pin driven through the Linux sysfs GPIO interface.
///
/// The last written level is cached so a failed read still answers.
#[derive(Debug)]
pub struct SysfsPin {
    value_path: PathBuf,
    last: AtomicBool,
}

impl SysfsPin {
    /// Export `pin` under `root` if needed and configure it as an output.
    pub fn open(root: &Path, pin: u32) -> Result<Self, BoxError> {
        let dir = root.join(format!("gpio{pin}"));
        if !dir.exists() {
            std::fs::write(root.join("export"), pin.to_string())?;
        }
        std::fs::write(dir.join("direction"), "out")?;
        let value_path = dir.join("value");
        let current = read_level(&value_path).unwrap_or(false);
        info!(pin, path = %value_path.display(), "sysfs pin ready");
        Ok(Self {
            value_path,
            last: AtomicBool::new(current),
        })
    }
}

fn read_level(path: &Path) -> Option<bool> {
    let text = std::fs::read_to_string(path).ok()?;
    match text.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

impl OutputPin for SysfsPin {
    fn set_output(&self, on: bool) {
        self.last.store(on, Ordering::SeqCst);
        if let Err(e) = std::fs::write(&self.value_path, if on { "1" } else { "0" }) {
            warn!(path = %self.value_path.display(), "gpio write failed: {e}");
        }
    }

    fn read_output(&self) -> bool {
        read_level(&self.value_path).unwrap_or_else(|| self.last.load(Ordering::SeqCst))
    }
}

/// Build the output handle for the configured backend and apply the
/// initial level.
pub fn open_output(cfg: &OutputConfig) -> Result<OutputState, BoxError> {
    let pin: Arc<dyn OutputPin> = match cfg.backend {
        PinBackend::Memory => Arc::new(MemoryPin::new(cfg.initial)),
        PinBackend::Sysfs => Arc::new(SysfsPin::open(Path::new(&cfg.sysfs_root), cfg.pin)?),
    };
    let output = OutputState::new(pin);
    output.set(cfg.initial);
    Ok(output)
}
