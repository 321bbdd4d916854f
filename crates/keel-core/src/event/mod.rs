//! Kernel event channel and inter-module bus payloads.
//!
//! Two distinct things flow through here. [`KernelEvent`] is what the
//! manager emits about itself (readiness, module failures, leak findings)
//! for host-side observers. [`BusEvent`] is the payload the manager's
//! broadcast path delivers to running modules.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde_json::Value;

use crate::health::Operation;
use crate::kernel::error::{KernelError, Result};
use crate::manager::ModuleStatus;
use crate::memory::LeakFinding;
use crate::module::ModuleState;

/// Type for subscription identifiers
pub type SubscriptionId = u64;

/// Events the manager emits about the kernel itself.
#[derive(Debug, Clone)]
pub enum KernelEvent {
    /// Every module finished the start pass; carries a status snapshot.
    Ready(Vec<ModuleStatus>),
    /// A module failed a lifecycle operation and entered the error state.
    ModuleError {
        module: String,
        operation: Operation,
        message: String,
    },
    /// A failure without a specific module context.
    Error {
        message: String,
        module: Option<String>,
        operation: Option<Operation>,
    },
    /// A module changed lifecycle state.
    StateChanged {
        module: String,
        state: ModuleState,
        previous: ModuleState,
    },
    /// The memory inspector flagged modules with sustained heap growth.
    MemoryLeaks(Vec<LeakFinding>),
}

impl KernelEvent {
    /// Stable name used for logging and filtering.
    pub fn name(&self) -> &'static str {
        match self {
            KernelEvent::Ready(_) => "ready",
            KernelEvent::ModuleError { .. } => "moduleError",
            KernelEvent::Error { .. } => "error",
            KernelEvent::StateChanged { .. } => "stateChange",
            KernelEvent::MemoryLeaks(_) => "memoryLeaks",
        }
    }
}

/// Message delivered to modules through the manager's broadcast path.
#[derive(Debug, Clone)]
pub struct BusEvent {
    /// Event name chosen by the sender
    pub name: String,
    /// Opaque payload; receivers deserialize what they understand
    pub payload: Value,
    /// Name of the sending module, if any
    pub source: Option<String>,
}

impl BusEvent {
    pub fn new(name: impl Into<String>, payload: Value, source: Option<String>) -> Self {
        Self {
            name: name.into(),
            payload,
            source,
        }
    }
}

impl fmt::Display for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{} (from {})", self.name, src),
            None => write!(f, "{}", self.name),
        }
    }
}

type Callback = Box<dyn Fn(&KernelEvent) + Send + Sync>;

/// Synchronous fan-out channel for [`KernelEvent`]s.
///
/// Delivery happens inline on the emitting task; observers must not block.
/// A subscriber that panics poisons the channel, and every later call
/// reports that as [`KernelError::Poisoned`] rather than pretending the
/// remaining observers were notified.
pub struct EventBus {
    subscribers: RwLock<Vec<(SubscriptionId, Callback)>>,
    next_id: AtomicU64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.subscribers.read().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("EventBus").field("subscribers", &count).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an observer. Returns an id usable with [`EventBus::unsubscribe`].
    pub fn subscribe<F>(&self, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&KernelEvent) + Send + Sync + 'static,
    {
        let mut subs = self
            .subscribers
            .write()
            .map_err(|_| KernelError::poisoned("event bus"))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        subs.push((id, Box::new(callback)));
        Ok(id)
    }

    /// Remove an observer. Returns whether it was present.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        let mut subs = self
            .subscribers
            .write()
            .map_err(|_| KernelError::poisoned("event bus"))?;
        let before = subs.len();
        subs.retain(|(sub_id, _)| *sub_id != id);
        Ok(subs.len() < before)
    }

    /// Deliver an event to every subscriber in registration order.
    pub fn emit(&self, event: &KernelEvent) -> Result<()> {
        let subs = self
            .subscribers
            .read()
            .map_err(|_| KernelError::poisoned("event bus"))?;
        for (_, callback) in subs.iter() {
            callback(event);
        }
        Ok(())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
