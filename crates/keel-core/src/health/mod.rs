//! Per-operation timing and error accounting for module lifecycle calls.
//!
//! The manager stamps a monotonic instant before each lifecycle call and
//! feeds the outcome back here; nothing else writes to the aggregates.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;

use crate::module::ModuleState;

/// Threshold above which a lifecycle operation is always worth a warning.
const SLOW_OPERATION_WARN: Duration = Duration::from_secs(5);

/// Threshold above which a lifecycle operation is logged at debug level.
const SLOW_OPERATION_DEBUG: Duration = Duration::from_secs(1);

/// Lifecycle operation tracked per module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Initialize,
    Start,
    Stop,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Initialize => write!(f, "initialize"),
            Operation::Start => write!(f, "start"),
            Operation::Stop => write!(f, "stop"),
        }
    }
}

/// Aggregates for one `(module, operation)` pair.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationMetrics {
    pub count: u64,
    pub total_duration: Duration,
    pub failures: u64,
    pub last_duration: Duration,
    pub avg_duration: Duration,
}

/// Everything tracked for a single module.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleHealth {
    pub operations: HashMap<Operation, OperationMetrics>,
    pub error_count: u64,
    #[serde(skip)]
    pub last_error_at: Option<SystemTime>,
    pub last_state: Option<ModuleState>,
}

impl ModuleHealth {
    /// Average initialize duration, if any initialize completed.
    fn avg_initialize(&self) -> Option<Duration> {
        self.operations
            .get(&Operation::Initialize)
            .filter(|m| m.count > 0)
            .map(|m| m.avg_duration)
    }
}

/// Aggregate view over every tracked module.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub total_modules: usize,
    pub total_operations: u64,
    pub total_failures: u64,
    pub total_errors: u64,
    pub average_initialize: Duration,
    /// Modules whose average initialize exceeds twice the system average.
    pub slow_modules: Vec<String>,
}

/// Records operation timings keyed by `(module, operation)`.
#[derive(Debug, Default)]
pub struct HealthTracker {
    modules: Mutex<HashMap<String, ModuleHealth>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the start of a lifecycle operation.
    pub fn track_start(&self, module: &str, operation: Operation) -> Instant {
        log::debug!("{}: {} starting", module, operation);
        Instant::now()
    }

    /// Record the completion of a lifecycle operation.
    pub fn track_end(
        &self,
        module: &str,
        operation: Operation,
        started: Instant,
        success: bool,
        state: ModuleState,
    ) {
        let duration = started.elapsed();
        if duration > SLOW_OPERATION_WARN {
            log::warn!("{}: {} took {:.1}s", module, operation, duration.as_secs_f64());
        } else if duration > SLOW_OPERATION_DEBUG {
            log::debug!("{}: {} took {:.2}s", module, operation, duration.as_secs_f64());
        }

        let mut modules = match self.modules.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let health = modules.entry(module.to_string()).or_default();
        let metrics = health.operations.entry(operation).or_default();
        metrics.count += 1;
        metrics.total_duration += duration;
        metrics.last_duration = duration;
        metrics.avg_duration = metrics.total_duration / metrics.count as u32;
        if !success {
            metrics.failures += 1;
        }
        health.last_state = Some(state);
    }

    /// Record an error signalled outside a tracked operation window.
    pub fn track_error(&self, module: &str) {
        let mut modules = match self.modules.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let health = modules.entry(module.to_string()).or_default();
        health.error_count += 1;
        health.last_error_at = Some(SystemTime::now());
    }

    /// Snapshot of everything tracked.
    pub fn metrics(&self) -> HashMap<String, ModuleHealth> {
        match self.modules.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Snapshot for a single module.
    pub fn module_metrics(&self, module: &str) -> Option<ModuleHealth> {
        match self.modules.lock() {
            Ok(guard) => guard.get(module).cloned(),
            Err(poisoned) => poisoned.into_inner().get(module).cloned(),
        }
    }

    /// Modules with at least one completed initialize, slowest average first.
    pub fn slowest_modules(&self, limit: usize) -> Vec<(String, Duration)> {
        let mut rows: Vec<(String, Duration)> = self
            .metrics()
            .into_iter()
            .filter_map(|(name, health)| health.avg_initialize().map(|avg| (name, avg)))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows.truncate(limit);
        rows
    }

    /// Modules ordered by error count, most errors first.
    pub fn most_error_prone_modules(&self, limit: usize) -> Vec<(String, u64)> {
        let mut rows: Vec<(String, u64)> = self
            .metrics()
            .into_iter()
            .filter(|(_, health)| health.error_count > 0)
            .map(|(name, health)| (name, health.error_count))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows.truncate(limit);
        rows
    }

    /// Aggregate totals across all modules.
    pub fn system_health(&self) -> SystemHealth {
        let metrics = self.metrics();
        let mut total_operations = 0u64;
        let mut total_failures = 0u64;
        let mut total_errors = 0u64;
        let mut init_total = Duration::ZERO;
        let mut init_count = 0u64;

        for health in metrics.values() {
            total_errors += health.error_count;
            for op in health.operations.values() {
                total_operations += op.count;
                total_failures += op.failures;
            }
            if let Some(init) = health.operations.get(&Operation::Initialize) {
                init_total += init.total_duration;
                init_count += init.count;
            }
        }

        let average_initialize = if init_count > 0 {
            init_total / init_count as u32
        } else {
            Duration::ZERO
        };

        let mut slow_modules: Vec<String> = metrics
            .iter()
            .filter_map(|(name, health)| {
                health
                    .avg_initialize()
                    .filter(|avg| init_count > 0 && *avg > average_initialize * 2)
                    .map(|_| name.clone())
            })
            .collect();
        slow_modules.sort();

        SystemHealth {
            total_modules: metrics.len(),
            total_operations,
            total_failures,
            total_errors,
            average_initialize,
            slow_modules,
        }
    }
}

#[cfg(test)]
mod tests;
