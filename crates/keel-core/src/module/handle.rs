use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, Instant};

use crate::health::Operation;
use crate::kernel::error::{KernelError, Result};
use crate::manager::ManagerInner;
use crate::module::context::ModuleContext;
use crate::module::state::ModuleState;
use crate::module::{Module, ModuleMetadata};

/// Observer the manager installs on every registered module to receive its
/// state-change and error signals. Delivery is synchronous, inside the
/// lifecycle call that produced the signal.
pub trait LifecycleObserver: Send + Sync {
    fn state_changed(&self, module: &str, state: ModuleState, previous: ModuleState);
    fn module_error(&self, module: &str, operation: Operation, message: &str);
}

/// Manager-owned cell pairing a module implementation with its runtime
/// state. The handle enforces the lifecycle state machine; the wrapped
/// [`Module`] only ever sees its own `on_*` hooks.
pub struct ModuleHandle {
    module: Arc<dyn Module>,
    metadata: ModuleMetadata,
    state: Mutex<ModuleState>,
    last_error: Mutex<Option<String>>,
    started_at: Mutex<Option<Instant>>,
    context: Arc<ModuleContext>,
    observer: RwLock<Option<Arc<dyn LifecycleObserver>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ModuleHandle {
    pub fn new(module: Arc<dyn Module>) -> Self {
        let metadata = module.metadata();
        let context = Arc::new(ModuleContext::new(metadata.name.clone()));
        Self {
            module,
            metadata,
            state: Mutex::new(ModuleState::Uninitialized),
            last_error: Mutex::new(None),
            started_at: Mutex::new(None),
            context,
            observer: RwLock::new(None),
        }
    }

    // --- Identity and queries ---

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    pub fn instance(&self) -> Arc<dyn Module> {
        Arc::clone(&self.module)
    }

    pub fn context(&self) -> &Arc<ModuleContext> {
        &self.context
    }

    pub fn state(&self) -> ModuleState {
        *lock(&self.state)
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub fn has_error(&self) -> bool {
        lock(&self.last_error).is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ModuleState::Running
    }

    /// Time since the module entered RUNNING; zero while not running.
    pub fn uptime(&self) -> Duration {
        let started_at = *lock(&self.started_at);
        started_at
            .map(|instant| instant.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    pub fn api_version(&self) -> String {
        self.metadata.effective_api_version().to_string()
    }

    // --- Manager wiring ---

    pub(crate) fn set_observer(&self, observer: Arc<dyn LifecycleObserver>) {
        match self.observer.write() {
            Ok(mut slot) => *slot = Some(observer),
            Err(poisoned) => *poisoned.into_inner() = Some(observer),
        }
    }

    pub(crate) fn attach_manager(&self, manager: Weak<ManagerInner>) {
        self.context.attach_manager(manager);
    }

    fn notify_state_change(&self, state: ModuleState, previous: ModuleState) {
        let observer = match self.observer.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(observer) = observer {
            observer.state_changed(self.name(), state, previous);
        }
    }

    fn notify_error(&self, operation: Operation, message: &str) {
        let observer = match self.observer.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(observer) = observer {
            observer.module_error(self.name(), operation, message);
        }
    }

    /// Apply a transition if the state machine allows it.
    ///
    /// Illegal transitions are refused with a warning and leave the state
    /// untouched.
    fn transition(&self, next: ModuleState) -> bool {
        let previous = {
            let mut state = lock(&self.state);
            let current = *state;
            if !current.can_transition(next) {
                log::warn!(
                    "module '{}': refusing state transition {} -> {}",
                    self.name(),
                    current,
                    next
                );
                return false;
            }
            *state = next;
            current
        };
        log::debug!("module '{}': {} -> {}", self.name(), previous, next);
        self.notify_state_change(next, previous);
        true
    }

    /// Record a lifecycle failure: ERROR state, last_error, error signal.
    fn fail(&self, operation: Operation, error: KernelError) -> KernelError {
        let message = error.to_string();
        self.transition(ModuleState::Error);
        *lock(&self.last_error) = Some(message.clone());
        self.notify_error(operation, &message);
        KernelError::Lifecycle {
            module: self.name().to_string(),
            operation: operation.to_string(),
            message,
        }
    }

    // --- Lifecycle operations ---

    /// Drive the module through UNINITIALIZED -> INITIALIZING -> INITIALIZED.
    ///
    /// Idempotent from any later state: logs a warning and returns Ok.
    pub async fn initialize(&self) -> Result<()> {
        let current = self.state();
        if current != ModuleState::Uninitialized {
            log::warn!(
                "module '{}': initialize requested in state {}, ignoring",
                self.name(),
                current
            );
            return Ok(());
        }

        self.transition(ModuleState::Initializing);
        match self.module.on_initialize(&self.context).await {
            Ok(()) => {
                self.transition(ModuleState::Initialized);
                log::info!("module '{}' initialized", self.name());
                Ok(())
            }
            Err(e) => Err(self.fail(Operation::Initialize, e)),
        }
    }

    /// Drive the module through STARTING into RUNNING.
    ///
    /// Accepted from INITIALIZED and STOPPED only; otherwise refused with a
    /// warning.
    pub async fn start(&self) -> Result<()> {
        let current = self.state();
        if !current.can_start() {
            log::warn!(
                "module '{}': start requested in state {}, ignoring",
                self.name(),
                current
            );
            return Ok(());
        }

        self.transition(ModuleState::Starting);
        match self.module.on_start(&self.context).await {
            Ok(()) => {
                self.transition(ModuleState::Running);
                *lock(&self.started_at) = Some(Instant::now());
                log::info!("module '{}' running", self.name());
                Ok(())
            }
            Err(e) => Err(self.fail(Operation::Start, e)),
        }
    }

    /// Drive the module through STOPPING into STOPPED. RUNNING only.
    pub async fn stop(&self) -> Result<()> {
        let current = self.state();
        if current != ModuleState::Running {
            log::warn!(
                "module '{}': stop requested in state {}, ignoring",
                self.name(),
                current
            );
            return Ok(());
        }

        self.transition(ModuleState::Stopping);
        match self.module.on_stop(&self.context).await {
            Ok(()) => {
                self.transition(ModuleState::Stopped);
                *lock(&self.started_at) = None;
                log::info!("module '{}' stopped", self.name());
                Ok(())
            }
            Err(e) => Err(self.fail(Operation::Stop, e)),
        }
    }

    /// Stop then start.
    pub async fn restart(&self) -> Result<()> {
        self.stop().await?;
        self.start().await
    }

    /// Clear the error and force the state back to UNINITIALIZED.
    ///
    /// The only legal recovery from ERROR; refused from any other state.
    pub fn reset(&self) {
        let current = self.state();
        if current != ModuleState::Error {
            log::warn!(
                "module '{}': reset requested in state {}, ignoring",
                self.name(),
                current
            );
            return;
        }
        *lock(&self.last_error) = None;
        self.transition(ModuleState::Uninitialized);
        log::info!("module '{}' reset", self.name());
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("name", &self.metadata.name)
            .field("version", &self.metadata.version)
            .field("state", &self.state())
            .field("has_error", &self.has_error())
            .finish()
    }
}
