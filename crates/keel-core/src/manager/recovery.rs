//! Bounded, delayed retry of failed modules.

use std::collections::HashMap;
use std::sync::{Mutex, Weak};
use std::time::Duration;

use crate::health::Operation;
use crate::manager::ManagerInner;

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct RecoveryOptions {
    pub enabled: bool,
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Reacts to runtime module failures by scheduling `recover_module`.
///
/// Initialization failures are left alone; a module that never came up is
/// an operator problem, not a supervision one. Attempts are counted per
/// module, incremented before each scheduled attempt and cleared on the
/// first successful recovery.
#[derive(Debug)]
pub struct RecoverySupervisor {
    options: RecoveryOptions,
    attempts: Mutex<HashMap<String, u32>>,
}

impl RecoverySupervisor {
    pub fn new(options: RecoveryOptions) -> Self {
        Self {
            options,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &RecoveryOptions {
        &self.options
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Attempts recorded for a module since its last successful recovery.
    pub fn attempts(&self, module: &str) -> u32 {
        self.lock().get(module).copied().unwrap_or(0)
    }

    /// Forget the attempt count after a successful recovery.
    pub(crate) fn clear(&self, module: &str) {
        self.lock().remove(module);
    }

    /// React to a module error signal.
    ///
    /// Schedules a detached recovery task after the configured delay; the
    /// task holds only a weak manager reference and dies silently if the
    /// manager is gone by the time it fires.
    pub(crate) fn handle_module_error(
        &self,
        manager: Weak<ManagerInner>,
        module: &str,
        operation: Operation,
    ) {
        if !self.options.enabled || operation == Operation::Initialize {
            return;
        }

        let attempt = {
            let mut attempts = self.lock();
            let count = attempts.entry(module.to_string()).or_insert(0);
            if *count >= self.options.max_attempts {
                log::warn!(
                    "recovery exhausted for module '{}' after {} attempt(s); waiting for an external trigger",
                    module,
                    count
                );
                return;
            }
            *count += 1;
            *count
        };

        let name = module.to_string();
        let delay = self.options.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = manager.upgrade() else {
                return;
            };
            log::info!("recovery attempt {} for module '{}'", attempt, name);
            if let Err(e) = inner.recover_module(&name).await {
                log::warn!("recovery attempt {} for module '{}' failed: {}", attempt, name, e);
            }
        });
    }
}
