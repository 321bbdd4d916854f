use std::fmt;

use serde::Serialize;

/// Lifecycle phase of a module.
///
/// Transitions outside [`ModuleState::can_transition`] are programmer errors
/// and are refused with a warning rather than applied or panicked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleState {
    Uninitialized,
    Initializing,
    Initialized,
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl ModuleState {
    /// Whether moving from `self` to `next` is a legal lifecycle transition.
    pub fn can_transition(self, next: ModuleState) -> bool {
        use ModuleState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Initializing, Initialized)
                | (Initializing, Error)
                | (Initialized, Starting)
                | (Starting, Running)
                | (Starting, Error)
                | (Running, Stopping)
                | (Stopping, Stopped)
                | (Stopping, Error)
                | (Stopped, Starting)
                | (Error, Uninitialized)
        )
    }

    /// Whether the module may accept a `start` call from this state.
    pub fn can_start(self) -> bool {
        matches!(self, ModuleState::Initialized | ModuleState::Stopped)
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleState::Uninitialized => "UNINITIALIZED",
            ModuleState::Initializing => "INITIALIZING",
            ModuleState::Initialized => "INITIALIZED",
            ModuleState::Starting => "STARTING",
            ModuleState::Running => "RUNNING",
            ModuleState::Stopping => "STOPPING",
            ModuleState::Stopped => "STOPPED",
            ModuleState::Error => "ERROR",
        };
        write!(f, "{}", name)
    }
}
