pub mod context;
pub mod handle;
pub mod state;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::kernel::error::Result;

pub use crate::event::BusEvent;
pub use context::ModuleContext;
pub use handle::{LifecycleObserver, ModuleHandle};
pub use state::ModuleState;

/// Static description a module declares about itself.
///
/// Also deserializable from a directory `manifest.json`, which is how
/// dynamically loaded bundles carry version and repository information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    /// Version of the API surface offered to peers. Defaults to `version`.
    #[serde(default)]
    pub api_version: Option<String>,
    /// Names of modules that must be running before this one starts.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Minimum required api_version per dependency name.
    #[serde(default)]
    pub dependency_versions: HashMap<String, String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    constants::DEFAULT_MODULE_PRIORITY
}

impl ModuleMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: version.into(),
            api_version: None,
            dependencies: Vec::new(),
            dependency_versions: HashMap::new(),
            disabled: false,
            priority: constants::DEFAULT_MODULE_PRIORITY,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependency_version(mut self, name: impl Into<String>, min: impl Into<String>) -> Self {
        self.dependency_versions.insert(name.into(), min.into());
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// The version peers compare against: `api_version` when set, else `version`.
    pub fn effective_api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or(&self.version)
    }
}

/// Behaviour contract every module implements.
///
/// The kernel drives the state machine and calls these hooks at the right
/// moments; implementations only supply the domain logic. All hooks receive
/// the module's [`ModuleContext`] for exports, permissions and peer access.
#[async_trait]
pub trait Module: Send + Sync {
    /// Static metadata: identity, version, dependency edges, flags.
    fn metadata(&self) -> ModuleMetadata;

    /// One-time setup. Runs while the module is in the INITIALIZING state.
    async fn on_initialize(&self, ctx: &ModuleContext) -> Result<()>;

    /// Bring the module into service. Runs in the STARTING state.
    async fn on_start(&self, ctx: &ModuleContext) -> Result<()>;

    /// Take the module out of service. Runs in the STOPPING state.
    async fn on_stop(&self, ctx: &ModuleContext) -> Result<()>;

    /// Receive a broadcast event from a peer. Default: ignore.
    async fn on_event(&self, _event: &BusEvent, _ctx: &ModuleContext) -> Result<()> {
        Ok(())
    }

    /// Policy hook consulted when this module is registered under the
    /// `auth` name and a peer has no local permission entry for a resource.
    /// `None` means "no opinion" and falls through to allow.
    fn check_module_permission(&self, _module: &str, _action: &str, _resource: &str) -> Option<bool> {
        None
    }
}

#[cfg(test)]
mod tests;
