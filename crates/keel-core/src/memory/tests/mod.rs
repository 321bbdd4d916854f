
use std::time::{Duration, SystemTime};

use crate::memory::{ProcessMemory, Snapshot};

const MB: u64 = 1024 * 1024;

/// Snapshot with the given resident size taken `age` ago.
pub(crate) fn snapshot(heap_used_mb: u64, age: Duration) -> Snapshot {
    Snapshot::new(
        SystemTime::now() - age,
        ProcessMemory {
            heap_used: heap_used_mb * MB,
            heap_total: heap_used_mb * 2 * MB,
            shared: 0,
        },
        0,
    )
}
