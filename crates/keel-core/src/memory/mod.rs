pub mod inspector;
pub mod leak;
pub mod sample;

pub use inspector::{
    GrowthThresholds, LeakFinding, LeakProbability, LeakSeverity, MemoryInspector, MemoryOptions,
    MemoryReport, ModuleMemoryReport, Snapshot,
};
pub use leak::{LeakTracker, LeakTrackerPlugin};
pub use sample::{request_compaction, sample_process_memory, ProcessMemory};

#[cfg(test)]
mod tests;
