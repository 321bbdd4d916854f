
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::event::{BusEvent, KernelEvent};
use crate::kernel::error::{KernelError, Result};
use crate::manager::{Manager, ManagerOptions, RecoveryOptions};
use crate::memory::MemoryOptions;
use crate::module::{Module, ModuleContext, ModuleMetadata};

/// Shared record of lifecycle hook executions, in call order.
pub(crate) struct ExecutionTracker {
    entries: Mutex<Vec<String>>,
}

impl ExecutionTracker {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

/// Configurable module used across the manager tests.
pub(crate) struct TestModule {
    metadata: ModuleMetadata,
    tracker: Option<Arc<ExecutionTracker>>,
    fail_initialize: AtomicBool,
    start_failures: AtomicU32,
    fail_stop: AtomicBool,
    fail_events: AtomicBool,
}

impl TestModule {
    pub(crate) fn new(metadata: ModuleMetadata) -> Self {
        Self {
            metadata,
            tracker: None,
            fail_initialize: AtomicBool::new(false),
            start_failures: AtomicU32::new(0),
            fail_stop: AtomicBool::new(false),
            fail_events: AtomicBool::new(false),
        }
    }

    pub(crate) fn with_tracker(mut self, tracker: Arc<ExecutionTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub(crate) fn failing_initialize(self) -> Self {
        self.fail_initialize.store(true, Ordering::SeqCst);
        self
    }

    /// Fail the first `count` start attempts, then succeed.
    pub(crate) fn failing_starts(self, count: u32) -> Self {
        self.start_failures.store(count, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_stop(self) -> Self {
        self.fail_stop.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_events(self) -> Self {
        self.fail_events.store(true, Ordering::SeqCst);
        self
    }

    fn record(&self, phase: &str) {
        if let Some(tracker) = &self.tracker {
            tracker.record(format!("{}:{}", phase, self.metadata.name));
        }
    }
}

#[async_trait]
impl Module for TestModule {
    fn metadata(&self) -> ModuleMetadata {
        self.metadata.clone()
    }

    async fn on_initialize(&self, _ctx: &ModuleContext) -> Result<()> {
        self.record("init");
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(KernelError::Other(format!(
                "{} refused to initialize",
                self.metadata.name
            )));
        }
        Ok(())
    }

    async fn on_start(&self, _ctx: &ModuleContext) -> Result<()> {
        self.record("start");
        let remaining = self.start_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.start_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(KernelError::Other(format!(
                "{} failed to start",
                self.metadata.name
            )));
        }
        Ok(())
    }

    async fn on_stop(&self, _ctx: &ModuleContext) -> Result<()> {
        self.record("stop");
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(KernelError::Other(format!(
                "{} failed to stop",
                self.metadata.name
            )));
        }
        Ok(())
    }

    async fn on_event(&self, event: &BusEvent, _ctx: &ModuleContext) -> Result<()> {
        if let Some(tracker) = &self.tracker {
            tracker.record(format!("event:{}:{}", self.metadata.name, event.name));
        }
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(KernelError::Other("event handler broke".to_string()));
        }
        Ok(())
    }
}

pub(crate) fn module(name: &str, deps: &[&str]) -> TestModule {
    TestModule::new(ModuleMetadata::new(name, "1.0.0").with_dependencies(deps.iter().copied()))
}

/// Options with background machinery (auto-start, recovery, sampling) off.
pub(crate) fn test_options() -> ManagerOptions {
    ManagerOptions {
        auto_start: false,
        recovery: RecoveryOptions {
            enabled: false,
            ..RecoveryOptions::default()
        },
        memory: MemoryOptions {
            enabled: false,
            ..MemoryOptions::default()
        },
        ..ManagerOptions::default()
    }
}

pub(crate) fn manager() -> Manager {
    Manager::new(test_options())
}

pub(crate) fn recovering_manager(max_attempts: u32, delay: Duration) -> Manager {
    Manager::new(ManagerOptions {
        recovery: RecoveryOptions {
            enabled: true,
            max_attempts,
            delay,
        },
        ..test_options()
    })
}

/// Capture every kernel event the manager emits.
pub(crate) fn capture_events(manager: &Manager) -> Arc<Mutex<Vec<KernelEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    manager
        .on_event(move |event| sink.lock().unwrap().push(event.clone()))
        .unwrap();
    events
}
