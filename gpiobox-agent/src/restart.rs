//! Operator-requested restart.
//!
//! `GET /reboot` only raises the flag. `main` waits for the HTTP server
//! to drain (so the reply reaches the client), then calls
//! [`restart_process`].

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use gpiobox_core::BoxError;

use crate::config::RestartMode;

/// Exit status used by [`RestartMode::Exit`].
pub const RESTART_EXIT_CODE: i32 = 75;

/// One-shot restart request shared by the HTTP surface and `main`.
#[derive(Clone, Debug)]
pub struct RestartHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for RestartHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl RestartHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the request. Repeated calls are no-ops.
    pub fn request(&self) {
        self.tx.send_if_modified(|requested| {
            let changed = !*requested;
            *requested = true;
            changed
        });
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once a restart has been requested.
    pub async fn requested(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self` and outlives `rx`.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

/// Replace or end the current process. Only returns on failure.
pub fn restart_process(mode: RestartMode) -> Result<(), BoxError> {
    match mode {
        RestartMode::Exec => exec_self(),
        RestartMode::Exit => {
            info!(code = RESTART_EXIT_CODE, "exiting for restart");
            std::process::exit(RESTART_EXIT_CODE);
        }
    }
}

#[cfg(unix)]
fn exec_self() -> Result<(), BoxError> {
    use std::os::unix::process::CommandExt;

    let exe = std::env::current_exe()?;
    info!(exe = %exe.display(), "re-executing");
    let err = std::process::Command::new(&exe)
        .args(std::env::args_os().skip(1))
        .exec();
    warn!("exec failed: {err}");
    Err(BoxError::FatalRestart)
}

#[cfg(not(unix))]
fn exec_self() -> Result<(), BoxError> {
    let exe = std::env::current_exe()?;
    info!(exe = %exe.display(), "spawning replacement process");
    std::process::Command::new(&exe)
        .args(std::env::args_os().skip(1))
        .spawn()?;
    std::process::exit(0);
}
