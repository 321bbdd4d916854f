use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use keel_core::kernel::constants;
use keel_core::kernel::host::{self, ShutdownGuard};
use keel_core::manager::loader;
use keel_core::memory::{LeakTracker, LeakTrackerPlugin, MemoryOptions};
use keel_core::manager::RecoveryOptions;
use keel_core::{KernelSettings, Manager, ManagerOptions};

/// keel: a modular application kernel host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Configuration directory (overrides the CONFIG_PATH environment variable)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Modules directory (overrides the configured modulesPath)
    #[arg(long)]
    modules: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    env_logger::Builder::from_env(env_logger::Env::default().filter_or("LOG_LEVEL", "info"))
        .init();
    host::install_panic_hook();

    if let Err(e) = run(args).await {
        error!("fatal startup error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> keel_core::Result<()> {
    let config_path = args
        .config
        .or_else(|| std::env::var("CONFIG_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_CONFIG_DIR));

    let mut settings = KernelSettings::load(&config_path).await?;
    if let Some(modules) = args.modules {
        settings.modules_path = modules;
    }
    info!(
        "{} v{} starting (modules: {}, config: {})",
        constants::APP_NAME,
        constants::KERNEL_VERSION,
        settings.modules_path.display(),
        settings.config_path.display()
    );

    let manager = Manager::new(ManagerOptions {
        modules_path: settings.modules_path.clone(),
        config_path: settings.config_path.clone(),
        auto_start: settings.auto_start,
        memory: MemoryOptions {
            enabled: settings.memory_analysis.enabled,
            ..MemoryOptions::default()
        },
        recovery: RecoveryOptions {
            enabled: settings.auto_recovery,
            ..RecoveryOptions::default()
        },
    });

    if settings.leak_detection.enabled {
        manager.register_plugin(Arc::new(LeakTrackerPlugin)).await?;
    }
    for spec in &settings.plugins {
        match loader::load_plugin_library(&spec.path) {
            Ok(plugin) => {
                if let Err(e) = manager.register_plugin(plugin).await {
                    warn!("plugin at {} failed to initialize: {}", spec.path.display(), e);
                }
            }
            Err(e) => warn!("failed to load plugin {}: {}", spec.path.display(), e),
        }
    }

    manager.load_modules().await?;
    manager.initialize_modules().await?;

    let errored: Vec<String> = manager
        .status()
        .await
        .into_iter()
        .filter(|status| status.has_error)
        .map(|status| status.name)
        .collect();
    if !errored.is_empty() {
        warn!("modules with errors after startup: {}", errored.join(", "));
    }

    // Periodic leak sweep, independent of the inspector's sampling cadence.
    let sweeper = if settings.memory_analysis.enabled {
        let sweep_manager = manager.clone();
        let initial_delay = settings.memory_analysis.initial_delay;
        let interval = settings.memory_analysis.interval;
        Some(tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;
            loop {
                for finding in sweep_manager.analyze_memory() {
                    warn!(
                        "memory growth in '{}': {:.1} MB/h over {:.2} h ({})",
                        finding.module, finding.growth_rate, finding.elapsed_hours, finding.severity
                    );
                }
                tokio::time::sleep(interval).await;
            }
        }))
    } else {
        None
    };

    if settings.update_check.enabled {
        // The hosting-service client is an integration point, not part of
        // this build; the schedule stays dormant without one.
        info!("update checks enabled but no release source is configured in this host");
    }

    info!("startup complete, waiting for termination signal");
    host::wait_for_shutdown_signal()
        .await
        .map_err(|e| keel_core::KernelError::Other(format!("signal handler failed: {}", e)))?;

    let guard = ShutdownGuard::new();
    guard.begin();
    guard.arm_forced_exit();
    info!("termination signal received, stopping modules");

    if let Some(handle) = sweeper {
        handle.abort();
    }

    match tokio::time::timeout(settings.shutdown_timeout, manager.stop_modules()).await {
        Ok(Ok(summary)) => {
            info!(
                "shutdown: {} stopped, {} skipped, {} failed",
                summary.completed, summary.skipped, summary.failed
            );
        }
        Ok(Err(e)) => {
            error!("shutdown error: {}", e);
            std::process::exit(1);
        }
        Err(_) => {
            error!(
                "shutdown exceeded {:?}, forcing exit",
                settings.shutdown_timeout
            );
            std::process::exit(1);
        }
    }

    if settings.leak_detection.check_on_shutdown {
        drop(manager);
        let leaked = LeakTracker::global()
            .check_for_leaks(Duration::from_millis(250))
            .await;
        for name in leaked {
            warn!("module '{}' handle is still alive after shutdown", name);
        }
    }

    info!("shutdown complete");
    Ok(())
}
