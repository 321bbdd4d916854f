//! Best-effort process memory counters.
//!
//! The counters are process-wide; every module's snapshot ring records the
//! same values and growth attribution to individual modules is therefore
//! approximate. That is the documented contract of the leak findings — do
//! not narrow it here without revisiting the analysis semantics.

use serde::Serialize;

/// Assumed page size for `/proc/self/statm` accounting.
const PAGE_SIZE: u64 = 4096;

/// Point-in-time process memory counters, in bytes.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProcessMemory {
    /// Resident set size.
    pub heap_used: u64,
    /// Total virtual size.
    pub heap_total: u64,
    /// Resident shared pages.
    pub shared: u64,
}

/// Sample the current process counters.
///
/// Linux reads `/proc/self/statm`; other platforms report zeros and the
/// analysis degrades gracefully (no growth is ever observed).
pub fn sample_process_memory() -> ProcessMemory {
    #[cfg(target_os = "linux")]
    {
        if let Ok(contents) = std::fs::read_to_string("/proc/self/statm") {
            let mut parts = contents.split_whitespace();
            let size = parts.next().and_then(|p| p.parse::<u64>().ok());
            let resident = parts.next().and_then(|p| p.parse::<u64>().ok());
            let shared = parts.next().and_then(|p| p.parse::<u64>().ok());
            if let (Some(size), Some(resident), Some(shared)) = (size, resident, shared) {
                return ProcessMemory {
                    heap_used: resident * PAGE_SIZE,
                    heap_total: size * PAGE_SIZE,
                    shared: shared * PAGE_SIZE,
                };
            }
        }
    }

    ProcessMemory::default()
}

/// Request a heap compaction if the runtime offers one.
///
/// This runtime exposes no manual compaction entry point, so the request is
/// a no-op and callers treat their results as best-effort.
pub fn request_compaction() -> bool {
    false
}
