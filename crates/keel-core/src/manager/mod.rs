//! The kernel scheduler and registry.
//!
//! The [`Manager`] owns every module, drives the dependency-ordered
//! lifecycle passes, mediates inter-module events, and hosts the
//! cross-cutting observers (health tracking, memory inspection, recovery).

pub mod dependency;
pub mod loader;
pub mod plugin;
pub mod recovery;
pub mod registry;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant, SystemTime};

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::ConfigStore;
use crate::event::{EventBus, KernelEvent, SubscriptionId};
use crate::health::{HealthTracker, ModuleHealth, Operation, SystemHealth};
use crate::kernel::constants;
use crate::kernel::error::{KernelError, Result};
use crate::memory::{LeakFinding, MemoryInspector, MemoryOptions, MemoryReport};
use crate::module::{LifecycleObserver, Module, ModuleHandle, ModuleState};
use crate::update::{ReleaseSource, UpdateChecker, UpdateStatus};

pub use plugin::ManagerPlugin;
pub use recovery::{RecoveryOptions, RecoverySupervisor};
pub use registry::ModuleRegistry;

/// Manager construction options.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub modules_path: PathBuf,
    pub config_path: PathBuf,
    /// Start modules right after the initialize pass.
    pub auto_start: bool,
    pub memory: MemoryOptions,
    pub recovery: RecoveryOptions,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            modules_path: PathBuf::from(constants::DEFAULT_MODULES_DIR),
            config_path: PathBuf::from(constants::DEFAULT_CONFIG_DIR),
            auto_start: true,
            memory: MemoryOptions::default(),
            recovery: RecoveryOptions::default(),
        }
    }
}

/// Tally of a module discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub disabled: usize,
    pub failed: usize,
}

/// Tally of an initialize, start or stop pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Point-in-time view of one module, as carried by the `ready` event.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleStatus {
    pub name: String,
    pub state: ModuleState,
    pub dependencies: Vec<String>,
    pub version: String,
    pub api_version: String,
    pub has_error: bool,
    pub metrics: Option<ModuleHealth>,
}

/// Everything `export_metrics` hands to exporters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub modules: Vec<ModuleStatus>,
    pub health: SystemHealth,
    pub memory: MemoryReport,
    #[serde(skip)]
    pub timestamp: SystemTime,
}

/// Sink for assembled metrics snapshots.
#[async_trait::async_trait]
pub trait MetricsExporter: Send + Sync {
    fn name(&self) -> &str;
    async fn export(&self, snapshot: &MetricsSnapshot) -> Result<()>;
}

#[derive(Debug)]
struct CacheEntry {
    stored_at: Instant,
    data: Value,
}

/// Shared manager internals.
///
/// Modules hold a `Weak` to this through their context; the public
/// [`Manager`] is a thin `Arc` wrapper so it can be cloned into tasks.
pub(crate) struct ManagerInner {
    options: ManagerOptions,
    self_ref: Weak<ManagerInner>,
    registry: RwLock<ModuleRegistry>,
    initialized: AtomicBool,
    health: HealthTracker,
    config: ConfigStore,
    events: EventBus,
    plugins: RwLock<Vec<Arc<dyn ManagerPlugin>>>,
    exporters: RwLock<Vec<Arc<dyn MetricsExporter>>>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    recovery: RecoverySupervisor,
    inspector: MemoryInspector,
}

impl LifecycleObserver for ManagerInner {
    fn state_changed(&self, module: &str, state: ModuleState, previous: ModuleState) {
        self.emit(KernelEvent::StateChanged {
            module: module.to_string(),
            state,
            previous,
        });
    }

    fn module_error(&self, module: &str, operation: Operation, message: &str) {
        log::error!("module '{}' failed during {}: {}", module, operation, message);
        self.health.track_error(module);
        self.emit(KernelEvent::ModuleError {
            module: module.to_string(),
            operation,
            message: message.to_string(),
        });
        self.recovery
            .handle_module_error(self.self_ref.clone(), module, operation);
    }
}

impl ManagerInner {
    pub(crate) fn inspector(&self) -> &MemoryInspector {
        &self.inspector
    }

    /// Emit a kernel event from a context that cannot propagate errors.
    fn emit(&self, event: KernelEvent) {
        if let Err(e) = self.events.emit(&event) {
            log::error!("failed to emit '{}' event: {}", event.name(), e);
        }
    }

    async fn plugins_snapshot(&self) -> Vec<Arc<dyn ManagerPlugin>> {
        self.plugins.read().await.clone()
    }

    pub(crate) async fn module_handle(&self, name: &str) -> Option<Arc<ModuleHandle>> {
        self.registry.read().await.get(name)
    }

    /// Module names paired with how many peers depend on each.
    pub(crate) async fn module_dependency_view(&self) -> Vec<(String, usize)> {
        let registry = self.registry.read().await;
        let handles = registry.handles();
        handles
            .iter()
            .map(|handle| {
                let dependents = handles
                    .iter()
                    .filter(|other| {
                        other.name() != handle.name()
                            && other
                                .metadata()
                                .dependencies
                                .iter()
                                .any(|dep| dep == handle.name())
                    })
                    .count();
                (handle.name().to_string(), dependents)
            })
            .collect()
    }

    async fn sorted_names(&self) -> Result<Vec<String>> {
        let registry = self.registry.read().await;
        dependency::sort_by_dependencies(&registry)
    }

    /// Register a module instance. Returns false when the module is
    /// disabled (by metadata or configuration) and was skipped.
    pub(crate) async fn register_module(&self, module: Arc<dyn Module>) -> Result<bool> {
        let handle = Arc::new(ModuleHandle::new(module));
        let name = handle.name().to_string();

        if handle.metadata().disabled || self.config.module_disabled(&name) {
            log::info!("module '{}' is disabled, skipping registration", name);
            return Ok(false);
        }

        if let Some(inner) = self.self_ref.upgrade() {
            let observer: Arc<dyn LifecycleObserver> = inner;
            handle.set_observer(observer);
        }
        handle.attach_manager(self.self_ref.clone());

        {
            let mut registry = self.registry.write().await;
            registry.insert(Arc::clone(&handle))?;
        }

        // Re-attach after insertion so the reference survives anything a
        // module implementation did to its context during construction.
        handle.attach_manager(self.self_ref.clone());

        for plugin in self.plugins_snapshot().await {
            if let Err(e) = plugin.after_module_load(&handle).await {
                log::warn!(
                    "plugin '{}' hook 'afterModuleLoad' failed for '{}': {}",
                    plugin.name(),
                    name,
                    e
                );
            }
        }

        log::info!("registered module '{}' v{}", name, handle.metadata().version);
        Ok(true)
    }

    async fn load_module_dir(&self, dir: PathBuf) -> Result<Option<String>> {
        for plugin in self.plugins_snapshot().await {
            if let Err(e) = plugin.before_module_load(&dir).await {
                log::warn!(
                    "plugin '{}' hook 'beforeModuleLoad' failed for {}: {}",
                    plugin.name(),
                    dir.display(),
                    e
                );
            }
        }

        let entry = loader::module_entry_path(&dir);
        let module = loader::load_module_library(&entry)?;
        let name = module.metadata().name.clone();
        if self.register_module(module).await? {
            Ok(Some(name))
        } else {
            Ok(None)
        }
    }

    /// Discover and load every module directory under `modules_path`.
    pub(crate) async fn load_modules(&self) -> Result<LoadSummary> {
        self.config.load_all().await?;

        let mut read_dir = tokio::fs::read_dir(&self.options.modules_path)
            .await
            .map_err(|e| KernelError::io(e, "read_dir", self.options.modules_path.clone()))?;

        let mut dirs = Vec::new();
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if path.is_dir() {
                        dirs.push(path);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("failed to enumerate module directory: {}", e);
                    break;
                }
            }
        }

        let loads = dirs.into_iter().map(|dir| self.load_module_dir(dir));
        let results = join_all(loads).await;

        let mut summary = LoadSummary::default();
        for result in results {
            match result {
                Ok(Some(_)) => summary.loaded += 1,
                Ok(None) => summary.disabled += 1,
                Err(e) => {
                    log::error!("{}", e);
                    self.emit(KernelEvent::Error {
                        message: e.to_string(),
                        module: None,
                        operation: None,
                    });
                    summary.failed += 1;
                }
            }
        }
        log::info!(
            "module discovery complete: {} loaded, {} disabled, {} failed",
            summary.loaded,
            summary.disabled,
            summary.failed
        );

        {
            let registry = self.registry.read().await;
            dependency::validate(&registry);
        }
        Ok(summary)
    }

    async fn initialize_one(&self, handle: &Arc<ModuleHandle>) -> Result<()> {
        let name = handle.name().to_string();
        for plugin in self.plugins_snapshot().await {
            if let Err(e) = plugin.before_module_initialize(handle).await {
                log::warn!(
                    "plugin '{}' hook 'beforeModuleInitialize' failed for '{}': {}",
                    plugin.name(),
                    name,
                    e
                );
            }
        }

        let started = self.health.track_start(&name, Operation::Initialize);
        let result = handle.initialize().await;
        let success = handle.state() == ModuleState::Initialized;
        self.health
            .track_end(&name, Operation::Initialize, started, success, handle.state());

        if let Err(ref e) = result {
            let message = e.to_string();
            for plugin in self.plugins_snapshot().await {
                if let Err(hook_err) = plugin.on_error(&name, Operation::Initialize, &message).await {
                    log::warn!("plugin '{}' hook 'onError' failed: {}", plugin.name(), hook_err);
                }
            }
        }

        for plugin in self.plugins_snapshot().await {
            if let Err(e) = plugin.after_module_initialize(handle).await {
                log::warn!(
                    "plugin '{}' hook 'afterModuleInitialize' failed for '{}': {}",
                    plugin.name(),
                    name,
                    e
                );
            }
        }
        result
    }

    async fn start_one(&self, handle: &Arc<ModuleHandle>) -> Result<()> {
        let name = handle.name().to_string();
        for plugin in self.plugins_snapshot().await {
            if let Err(e) = plugin.before_module_start(handle).await {
                log::warn!(
                    "plugin '{}' hook 'beforeModuleStart' failed for '{}': {}",
                    plugin.name(),
                    name,
                    e
                );
            }
        }

        let started = self.health.track_start(&name, Operation::Start);
        let result = handle.start().await;
        let success = handle.state() == ModuleState::Running;
        self.health
            .track_end(&name, Operation::Start, started, success, handle.state());

        if let Err(ref e) = result {
            let message = e.to_string();
            for plugin in self.plugins_snapshot().await {
                if let Err(hook_err) = plugin.on_error(&name, Operation::Start, &message).await {
                    log::warn!("plugin '{}' hook 'onError' failed: {}", plugin.name(), hook_err);
                }
            }
        }

        for plugin in self.plugins_snapshot().await {
            if let Err(e) = plugin.after_module_start(handle).await {
                log::warn!(
                    "plugin '{}' hook 'afterModuleStart' failed for '{}': {}",
                    plugin.name(),
                    name,
                    e
                );
            }
        }
        result
    }

    async fn stop_one(&self, handle: &Arc<ModuleHandle>) -> Result<()> {
        let name = handle.name().to_string();
        for plugin in self.plugins_snapshot().await {
            if let Err(e) = plugin.before_module_stop(handle).await {
                log::warn!(
                    "plugin '{}' hook 'beforeModuleStop' failed for '{}': {}",
                    plugin.name(),
                    name,
                    e
                );
            }
        }

        let started = self.health.track_start(&name, Operation::Stop);
        let result = handle.stop().await;
        let success = handle.state() == ModuleState::Stopped;
        self.health
            .track_end(&name, Operation::Stop, started, success, handle.state());

        if let Err(ref e) = result {
            let message = e.to_string();
            for plugin in self.plugins_snapshot().await {
                if let Err(hook_err) = plugin.on_error(&name, Operation::Stop, &message).await {
                    log::warn!("plugin '{}' hook 'onError' failed: {}", plugin.name(), hook_err);
                }
            }
        }

        for plugin in self.plugins_snapshot().await {
            if let Err(e) = plugin.after_module_stop(handle).await {
                log::warn!(
                    "plugin '{}' hook 'afterModuleStop' failed for '{}': {}",
                    plugin.name(),
                    name,
                    e
                );
            }
        }
        result
    }

    /// Initialize every module in dependency order, sequentially.
    ///
    /// Per-module failures are surfaced as events and do not abort the
    /// pass. A dependency cycle aborts before any module runs.
    pub(crate) async fn initialize_modules(&self) -> Result<PhaseSummary> {
        let order = self.sorted_names().await?;
        let mut summary = PhaseSummary::default();

        for name in order {
            let Some(handle) = self.module_handle(&name).await else {
                continue;
            };
            if handle.state() == ModuleState::Initialized {
                summary.skipped += 1;
                continue;
            }
            match self.initialize_one(&handle).await {
                Ok(()) if handle.state() == ModuleState::Initialized => summary.completed += 1,
                Ok(()) => summary.skipped += 1,
                Err(e) => {
                    log::error!("initialization of module '{}' failed: {}", name, e);
                    summary.failed += 1;
                }
            }
        }

        log::info!(
            "initialize pass complete: {} initialized, {} skipped, {} failed",
            summary.completed,
            summary.skipped,
            summary.failed
        );

        self.initialized.store(true, Ordering::SeqCst);
        self.inspector.start();

        if self.options.auto_start {
            self.start_modules().await?;
        }
        Ok(summary)
    }

    /// Start every module in dependency order. Requires a prior
    /// initialize pass; emits `ready` with a status snapshot when done.
    pub(crate) async fn start_modules(&self) -> Result<PhaseSummary> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(KernelError::NotInitialized(
                "start_modules requires initialize_modules to have run".to_string(),
            ));
        }

        let order = self.sorted_names().await?;
        let mut summary = PhaseSummary::default();

        for name in order {
            let Some(handle) = self.module_handle(&name).await else {
                continue;
            };
            if !handle.state().can_start() {
                summary.skipped += 1;
                continue;
            }
            match self.start_one(&handle).await {
                Ok(()) if handle.is_ready() => summary.completed += 1,
                Ok(()) => summary.skipped += 1,
                Err(e) => {
                    log::error!("start of module '{}' failed: {}", name, e);
                    summary.failed += 1;
                }
            }
        }

        log::info!(
            "start pass complete: {} running, {} skipped, {} failed",
            summary.completed,
            summary.skipped,
            summary.failed
        );

        let status = self.status().await;
        self.emit(KernelEvent::Ready(status));
        Ok(summary)
    }

    /// Stop modules in reverse dependency order, best-effort.
    pub(crate) async fn stop_modules(&self) -> Result<PhaseSummary> {
        self.inspector.stop();

        let mut order = self.sorted_names().await?;
        order.reverse();
        let mut summary = PhaseSummary::default();

        for name in order {
            let Some(handle) = self.module_handle(&name).await else {
                continue;
            };
            if handle.state() != ModuleState::Running {
                summary.skipped += 1;
                continue;
            }
            match self.stop_one(&handle).await {
                Ok(()) if handle.state() == ModuleState::Stopped => summary.completed += 1,
                Ok(()) => summary.skipped += 1,
                Err(e) => {
                    log::error!("stop of module '{}' failed: {}", name, e);
                    summary.failed += 1;
                }
            }
        }

        self.initialized.store(false, Ordering::SeqCst);
        log::info!(
            "stop pass complete: {} stopped, {} skipped, {} failed",
            summary.completed,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    /// Load, initialize and start a single module by directory name.
    pub(crate) async fn load_module_on_demand(&self, name: &str) -> Option<Arc<ModuleHandle>> {
        let dir = self.options.modules_path.join(name);
        if !dir.is_dir() {
            log::warn!("module directory '{}' not found", dir.display());
            return None;
        }
        self.config.load_config(name).await;

        match self.load_module_dir(dir).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                log::info!("module '{}' is disabled", name);
                return None;
            }
            Err(e) => {
                log::error!("on-demand load of module '{}' failed: {}", name, e);
                return None;
            }
        }

        let handle = self.module_handle(name).await?;
        if let Err(e) = self.initialize_one(&handle).await {
            log::error!("on-demand initialization of module '{}' failed: {}", name, e);
            return None;
        }
        if let Err(e) = self.start_one(&handle).await {
            log::error!("on-demand start of module '{}' failed: {}", name, e);
            return None;
        }
        Some(handle)
    }

    /// Reset a failed module and drive it back to running.
    pub(crate) async fn recover_module(&self, name: &str) -> Result<()> {
        let handle = self
            .module_handle(name)
            .await
            .ok_or_else(|| KernelError::ModuleNotFound(name.to_string()))?;
        if handle.state() != ModuleState::Error {
            return Err(KernelError::Other(format!(
                "module '{}' is in state {} and cannot be recovered",
                name,
                handle.state()
            )));
        }

        handle.reset();
        self.initialize_one(&handle).await?;
        self.start_one(&handle).await?;
        self.recovery.clear(name);
        log::info!("module '{}' recovered", name);
        Ok(())
    }

    /// Deliver an event to every running module except the source.
    pub(crate) async fn broadcast_event(&self, name: &str, payload: Value, source: Option<String>) {
        let handles = { self.registry.read().await.handles() };
        let event = crate::event::BusEvent::new(name, payload, source.clone());

        for handle in handles {
            if source.as_deref() == Some(handle.name()) {
                continue;
            }
            if handle.state() != ModuleState::Running {
                continue;
            }
            if let Err(e) = handle.instance().on_event(&event, handle.context()).await {
                log::warn!(
                    "module '{}' failed handling event '{}': {}",
                    handle.name(),
                    event.name,
                    e
                );
            }
        }
    }

    pub(crate) async fn status(&self) -> Vec<ModuleStatus> {
        let handles = { self.registry.read().await.handles() };
        handles
            .iter()
            .map(|handle| {
                let metadata = handle.metadata();
                ModuleStatus {
                    name: metadata.name.clone(),
                    state: handle.state(),
                    dependencies: metadata.dependencies.clone(),
                    version: metadata.version.clone(),
                    api_version: handle.api_version(),
                    has_error: handle.has_error(),
                    metrics: self.health.module_metrics(handle.name()),
                }
            })
            .collect()
    }

    /// Run a leak analysis over the snapshot rings and surface findings.
    pub(crate) fn analyze_memory(&self) -> Vec<LeakFinding> {
        let findings = self.inspector.analyze();
        if !findings.is_empty() {
            log::warn!("memory analysis produced {} finding(s)", findings.len());
            self.emit(KernelEvent::MemoryLeaks(findings.clone()));
        }
        findings
    }
}

/// Public handle to the kernel. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

impl Manager {
    pub fn new(options: ManagerOptions) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<ManagerInner>| ManagerInner {
            self_ref: weak.clone(),
            registry: RwLock::new(ModuleRegistry::new()),
            initialized: AtomicBool::new(false),
            health: HealthTracker::new(),
            config: ConfigStore::new(options.config_path.clone()),
            events: EventBus::new(),
            plugins: RwLock::new(Vec::new()),
            exporters: RwLock::new(Vec::new()),
            cache: Mutex::new(HashMap::new()),
            recovery: RecoverySupervisor::new(options.recovery.clone()),
            inspector: MemoryInspector::new(options.memory.clone(), weak.clone()),
            options,
        });
        Self { inner }
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.inner.options
    }

    pub fn config(&self) -> &ConfigStore {
        &self.inner.config
    }

    pub fn health(&self) -> &HealthTracker {
        &self.inner.health
    }

    pub fn inspector(&self) -> &MemoryInspector {
        &self.inner.inspector
    }

    pub fn recovery(&self) -> &RecoverySupervisor {
        &self.inner.recovery
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Observe kernel events. The callback runs synchronously on the
    /// emitting task.
    pub fn on_event<F>(&self, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&KernelEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        self.inner.events.unsubscribe(id)
    }

    /// Register a module instance directly (the static-registration path).
    ///
    /// Returns false when the module was skipped as disabled. Duplicate
    /// names are a hard error.
    pub async fn register_module(&self, module: Arc<dyn Module>) -> Result<bool> {
        self.inner.register_module(module).await
    }

    /// Discover and load module bundles under the configured path.
    pub async fn load_modules(&self) -> Result<LoadSummary> {
        self.inner.load_modules().await
    }

    pub async fn initialize_modules(&self) -> Result<PhaseSummary> {
        self.inner.initialize_modules().await
    }

    pub async fn start_modules(&self) -> Result<PhaseSummary> {
        self.inner.start_modules().await
    }

    pub async fn stop_modules(&self) -> Result<PhaseSummary> {
        self.inner.stop_modules().await
    }

    pub async fn load_module_on_demand(&self, name: &str) -> Option<Arc<ModuleHandle>> {
        self.inner.load_module_on_demand(name).await
    }

    pub async fn restart_module(&self, name: &str) -> Result<()> {
        let handle = self
            .inner
            .module_handle(name)
            .await
            .ok_or_else(|| KernelError::ModuleNotFound(name.to_string()))?;
        handle.restart().await
    }

    pub async fn recover_module(&self, name: &str) -> Result<()> {
        self.inner.recover_module(name).await
    }

    pub async fn module(&self, name: &str) -> Option<Arc<ModuleHandle>> {
        self.inner.module_handle(name).await
    }

    pub async fn module_names(&self) -> Vec<String> {
        self.inner.registry.read().await.names()
    }

    pub async fn module_count(&self) -> usize {
        self.inner.registry.read().await.len()
    }

    /// Warn about missing or version-incompatible dependencies.
    pub async fn validate_dependencies(&self) -> Vec<String> {
        let registry = self.inner.registry.read().await;
        dependency::validate(&registry)
    }

    /// Deliver an event to every running module, optionally naming a source
    /// module that will be skipped.
    pub async fn broadcast_event(&self, name: &str, payload: Value, source: Option<String>) {
        self.inner.broadcast_event(name, payload, source).await
    }

    /// Status snapshot of every registered module.
    pub async fn status(&self) -> Vec<ModuleStatus> {
        self.inner.status().await
    }

    /// Register a plugin and run its `initialize` hook.
    pub async fn register_plugin(&self, plugin: Arc<dyn ManagerPlugin>) -> Result<()> {
        {
            self.inner.plugins.write().await.push(Arc::clone(&plugin));
        }
        if let Err(e) = plugin.initialize(self).await {
            log::warn!("plugin '{}' failed to initialize: {}", plugin.name(), e);
            return Err(e);
        }
        log::info!("registered plugin '{}'", plugin.name());
        Ok(())
    }

    pub async fn register_metrics_exporter(&self, exporter: Arc<dyn MetricsExporter>) {
        self.inner.exporters.write().await.push(exporter);
    }

    /// Assemble a metrics snapshot and fan it out to every exporter.
    pub async fn export_metrics(&self) -> MetricsSnapshot {
        let snapshot = MetricsSnapshot {
            modules: self.inner.status().await,
            health: self.inner.health.system_health(),
            memory: self.inner.inspector.report(),
            timestamp: SystemTime::now(),
        };

        let exporters = { self.inner.exporters.read().await.clone() };
        let results = join_all(exporters.iter().map(|e| e.export(&snapshot))).await;
        for (exporter, result) in exporters.iter().zip(results) {
            if let Err(e) = result {
                log::warn!("metrics exporter '{}' failed: {}", exporter.name(), e);
            }
        }
        snapshot
    }

    /// Run a leak analysis and emit findings as a kernel event.
    pub fn analyze_memory(&self) -> Vec<LeakFinding> {
        self.inner.analyze_memory()
    }

    /// Current memory report.
    pub fn memory_report(&self) -> MemoryReport {
        self.inner.inspector.report()
    }

    /// Check every module directory for newer published versions.
    pub async fn check_for_module_updates(
        &self,
        source: Arc<dyn ReleaseSource>,
    ) -> Result<Vec<UpdateStatus>> {
        let checker = UpdateChecker::new(source);
        let modules_path = &self.inner.options.modules_path;
        let mut read_dir = tokio::fs::read_dir(modules_path)
            .await
            .map_err(|e| KernelError::io(e, "read_dir", modules_path.clone()))?;

        let mut statuses = Vec::new();
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if !path.is_dir() {
                        continue;
                    }
                    match checker.check_module(&path).await {
                        Ok(Some(status)) => statuses.push(status),
                        Ok(None) => {}
                        Err(e) => log::warn!(
                            "update check failed for {}: {}",
                            path.display(),
                            e
                        ),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("failed to enumerate module directory: {}", e);
                    break;
                }
            }
        }
        Ok(statuses)
    }

    // --- TTL cache ---

    pub fn set_cached_data(&self, key: impl Into<String>, data: Value) {
        let mut cache = match self.inner.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.insert(
            key.into(),
            CacheEntry {
                stored_at: Instant::now(),
                data,
            },
        );
    }

    /// Read a cached entry no older than `max_age`. Expired entries are
    /// dropped on read.
    pub fn get_cached_data(&self, key: &str, max_age: Duration) -> Option<Value> {
        let mut cache = match self.inner.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match cache.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= max_age => Some(entry.data.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests;
