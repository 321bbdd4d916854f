//! Process-level plumbing the host binary installs exactly once: termination
//! signals, the panic hook, and the forced-exit path for a second signal
//! arriving while shutdown is already in progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Completes when the process receives SIGINT or SIGTERM.
///
/// `tokio::signal::ctrl_c` is awaited as a fallback so the helper also works
/// where unix signal streams are unavailable.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Guard tracking whether a shutdown sequence is already running.
///
/// The first signal begins a graceful shutdown; `arm` then spawns a watcher
/// that forces the process down if a second signal arrives before the
/// sequence completes.
#[derive(Clone, Default)]
pub struct ShutdownGuard {
    in_progress: Arc<AtomicBool>,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks shutdown as started. Returns false if it already was.
    pub fn begin(&self) -> bool {
        !self.in_progress.swap(true, Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Spawns a detached watcher that exits the process with code 1 on the
    /// next termination signal.
    pub fn arm_forced_exit(&self) {
        tokio::spawn(async {
            if wait_for_shutdown_signal().await.is_ok() {
                log::error!("Second termination signal received, forcing exit");
                std::process::exit(1);
            }
        });
    }
}

/// Installs a panic hook that logs the panic instead of tearing the process
/// down. Background tasks surviving a panicked sibling keep the kernel
/// observable during incident triage.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("Unhandled panic: {}", info);
        default_hook(info);
    }));
}
