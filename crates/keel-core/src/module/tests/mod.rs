mod context_tests;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::kernel::error::{KernelError, Result};
use crate::module::{Module, ModuleContext, ModuleMetadata};

/// Minimal module whose lifecycle hooks can be told to fail.
pub(crate) struct ProbeModule {
    metadata: ModuleMetadata,
    fail_initialize: AtomicBool,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
}

impl ProbeModule {
    pub(crate) fn new(name: &str) -> Self {
        Self::with_metadata(ModuleMetadata::new(name, "1.0.0"))
    }

    pub(crate) fn with_metadata(metadata: ModuleMetadata) -> Self {
        Self {
            metadata,
            fail_initialize: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
        }
    }

    pub(crate) fn failing_initialize(self) -> Self {
        self.fail_initialize.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_start(self) -> Self {
        self.fail_start.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_stop(self) -> Self {
        self.fail_stop.store(true, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl Module for ProbeModule {
    fn metadata(&self) -> ModuleMetadata {
        self.metadata.clone()
    }

    async fn on_initialize(&self, _ctx: &ModuleContext) -> Result<()> {
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(KernelError::Other("init boom".to_string()));
        }
        Ok(())
    }

    async fn on_start(&self, _ctx: &ModuleContext) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(KernelError::Other("start boom".to_string()));
        }
        Ok(())
    }

    async fn on_stop(&self, _ctx: &ModuleContext) -> Result<()> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(KernelError::Other("stop boom".to_string()));
        }
        Ok(())
    }
}
