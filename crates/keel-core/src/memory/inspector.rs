//! Periodic heap sampler and growth-rate leak analysis.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, Weak};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::manager::ManagerInner;
use crate::memory::sample::{request_compaction, sample_process_memory, ProcessMemory};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Minimum observation window before a ring is analyzed, in hours.
const MIN_ELAPSED_HOURS: f64 = 0.01;

/// Growth-rate thresholds in MB per hour.
#[derive(Debug, Clone, Copy)]
pub struct GrowthThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for GrowthThresholds {
    fn default() -> Self {
        Self {
            low: 5.0,
            medium: 20.0,
            high: 50.0,
        }
    }
}

/// Inspector configuration.
#[derive(Debug, Clone)]
pub struct MemoryOptions {
    pub enabled: bool,
    pub snapshot_interval: Duration,
    pub max_snapshots: usize,
    pub thresholds: GrowthThresholds,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_interval: Duration::from_secs(300),
            max_snapshots: 12,
            thresholds: GrowthThresholds::default(),
        }
    }
}

/// One entry in a module's snapshot ring.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    #[serde(skip)]
    pub taken_at: SystemTime,
    pub heap_used: u64,
    pub heap_total: u64,
    pub shared: u64,
    /// Number of other registered modules depending on this one.
    pub reference_count: usize,
}

impl Snapshot {
    pub fn new(taken_at: SystemTime, memory: ProcessMemory, reference_count: usize) -> Self {
        Self {
            taken_at,
            heap_used: memory.heap_used,
            heap_total: memory.heap_total,
            shared: memory.shared,
            reference_count,
        }
    }
}

/// Severity of a confirmed growth finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakSeverity {
    Low,
    Medium,
    High,
}

impl fmt::Display for LeakSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeakSeverity::Low => write!(f, "low"),
            LeakSeverity::Medium => write!(f, "medium"),
            LeakSeverity::High => write!(f, "high"),
        }
    }
}

/// Likelihood classification used by the memory report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakProbability {
    None,
    Low,
    Medium,
    High,
}

/// Sustained-growth finding for one module.
#[derive(Debug, Clone, Serialize)]
pub struct LeakFinding {
    pub module: String,
    pub severity: LeakSeverity,
    pub heap_growth_mb: f64,
    /// Growth rate in MB per hour.
    pub growth_rate: f64,
    pub elapsed_hours: f64,
    pub snapshots: usize,
    pub recommendation: String,
}

/// Per-module line of a [`MemoryReport`].
#[derive(Debug, Clone, Serialize)]
pub struct ModuleMemoryReport {
    pub module: String,
    pub heap_growth_mb: f64,
    pub growth_rate: f64,
    pub leak_probability: LeakProbability,
}

/// Full memory report: current process counters plus per-module growth.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryReport {
    #[serde(skip)]
    pub taken_at: SystemTime,
    pub process: ProcessMemory,
    pub modules: Vec<ModuleMemoryReport>,
}

/// Periodic sampler keeping one bounded snapshot ring per module.
///
/// Holds only a weak reference to the manager: the sampling task dies with
/// it and never keeps the registry alive.
pub struct MemoryInspector {
    options: MemoryOptions,
    manager: Weak<ManagerInner>,
    rings: Mutex<HashMap<String, VecDeque<Snapshot>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MemoryInspector {
    pub(crate) fn new(options: MemoryOptions, manager: Weak<ManagerInner>) -> Self {
        Self {
            options,
            manager,
            rings: Mutex::new(HashMap::new()),
            task: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &MemoryOptions {
        &self.options
    }

    /// Begin periodic sampling. A second call replaces the previous task.
    pub fn start(&self) {
        if !self.options.enabled {
            log::debug!("memory inspector disabled, not starting");
            return;
        }
        let manager = self.manager.clone();
        let interval = self.options.snapshot_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick would sample before any module runs.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match manager.upgrade() {
                    Some(inner) => inner.inspector().take_snapshot().await,
                    None => break,
                }
            }
        });
        let mut task = lock(&self.task);
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
        log::info!(
            "memory inspector started (interval {:?}, ring of {})",
            self.options.snapshot_interval,
            self.options.max_snapshots
        );
    }

    /// Stop periodic sampling.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
            log::info!("memory inspector stopped");
        }
    }

    /// Sample the process counters and append a snapshot to every
    /// registered module's ring.
    pub async fn take_snapshot(&self) {
        let Some(inner) = self.manager.upgrade() else {
            return;
        };
        request_compaction();
        let memory = sample_process_memory();
        let now = SystemTime::now();

        let modules = inner.module_dependency_view().await;
        let mut rings = lock(&self.rings);

        // Drop rings for modules that are no longer registered.
        rings.retain(|name, _| modules.iter().any(|(m, _)| m == name));

        for (name, reference_count) in modules {
            let snapshot = Snapshot::new(now, memory, reference_count);
            let ring = rings.entry(name).or_default();
            ring.push_back(snapshot);
            while ring.len() > self.options.max_snapshots {
                ring.pop_front();
            }
        }
    }

    /// Append a pre-built snapshot to a module's ring. Diagnostics and
    /// analysis tooling use this to replay recorded samples.
    pub fn record_snapshot(&self, module: &str, snapshot: Snapshot) {
        let mut rings = lock(&self.rings);
        let ring = rings.entry(module.to_string()).or_default();
        ring.push_back(snapshot);
        while ring.len() > self.options.max_snapshots {
            ring.pop_front();
        }
    }

    /// Number of snapshots currently held for a module.
    pub fn ring_len(&self, module: &str) -> usize {
        lock(&self.rings).get(module).map(|r| r.len()).unwrap_or(0)
    }

    fn growth(ring: &VecDeque<Snapshot>) -> Option<(f64, f64, f64)> {
        if ring.len() < 2 {
            return None;
        }
        let oldest = ring.front()?;
        let newest = ring.back()?;
        let elapsed = newest.taken_at.duration_since(oldest.taken_at).ok()?;
        let elapsed_hours = elapsed.as_secs_f64() / 3600.0;
        if elapsed_hours < MIN_ELAPSED_HOURS {
            return None;
        }
        let growth_mb = (newest.heap_used as f64 - oldest.heap_used as f64) / BYTES_PER_MB;
        Some((growth_mb, growth_mb / elapsed_hours, elapsed_hours))
    }

    fn severity_for(&self, rate: f64) -> Option<LeakSeverity> {
        let t = self.options.thresholds;
        if rate >= t.high {
            Some(LeakSeverity::High)
        } else if rate >= t.medium {
            Some(LeakSeverity::Medium)
        } else if rate >= t.low {
            Some(LeakSeverity::Low)
        } else {
            None
        }
    }

    fn recommendation_for(severity: LeakSeverity) -> &'static str {
        match severity {
            LeakSeverity::Low => "Monitor this module; growth is above baseline but modest.",
            LeakSeverity::Medium => {
                "Inspect caches and event subscriptions held by this module; growth is sustained."
            }
            LeakSeverity::High => {
                "Likely leak: audit allocations and restart the module to reclaim memory."
            }
        }
    }

    /// Analyze every ring and return findings above the low threshold,
    /// highest growth rate first.
    pub fn analyze(&self) -> Vec<LeakFinding> {
        let rings = lock(&self.rings);
        let mut findings = Vec::new();
        for (name, ring) in rings.iter() {
            let Some((growth_mb, rate, elapsed_hours)) = Self::growth(ring) else {
                continue;
            };
            let Some(severity) = self.severity_for(rate) else {
                continue;
            };
            findings.push(LeakFinding {
                module: name.clone(),
                severity,
                heap_growth_mb: growth_mb,
                growth_rate: rate,
                elapsed_hours,
                snapshots: ring.len(),
                recommendation: Self::recommendation_for(severity).to_string(),
            });
        }
        findings.sort_by(|a, b| {
            b.growth_rate
                .partial_cmp(&a.growth_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        findings
    }

    /// Current process counters plus per-module growth classification,
    /// sorted by growth rate descending.
    pub fn report(&self) -> MemoryReport {
        let rings = lock(&self.rings);
        let t = self.options.thresholds;
        let mut modules: Vec<ModuleMemoryReport> = rings
            .iter()
            .map(|(name, ring)| {
                let (growth_mb, rate) = Self::growth(ring)
                    .map(|(g, r, _)| (g, r))
                    .unwrap_or((0.0, 0.0));
                let leak_probability = if rate >= t.high {
                    LeakProbability::High
                } else if rate >= t.medium {
                    LeakProbability::Medium
                } else if rate >= t.low {
                    LeakProbability::Low
                } else {
                    LeakProbability::None
                };
                ModuleMemoryReport {
                    module: name.clone(),
                    heap_growth_mb: growth_mb,
                    growth_rate: rate,
                    leak_probability,
                }
            })
            .collect();
        modules.sort_by(|a, b| {
            b.growth_rate
                .partial_cmp(&a.growth_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        MemoryReport {
            taken_at: SystemTime::now(),
            process: sample_process_memory(),
            modules,
        }
    }
}

impl fmt::Debug for MemoryInspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryInspector")
            .field("options", &self.options)
            .field("rings", &lock(&self.rings).len())
            .finish()
    }
}
