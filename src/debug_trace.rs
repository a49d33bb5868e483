//! The optional structured debug stream.
//!
//! Every noteworthy decision the driver makes can be written here as one
//! line: a microsecond-precision UTC timestamp followed by a message, then
//! an `fsync` + `flush` so a crash immediately after a write never loses a
//! record. Writes are serialized behind a single mutex so concurrent
//! callers never interleave a record.

use chrono::Utc;
use parking_lot::Mutex;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A shared, append-style debug log. Cloning shares the same underlying
/// sink (cheap `Arc`-like clone via the inner `Mutex`'s reference count is
/// not needed here since `Driver` only ever holds one owned `DebugTrace`).
pub struct DebugTrace {
    sink: Mutex<File>,
}

impl DebugTrace {
    /// Opens (truncating) the debug file at `path`, creating any missing
    /// parent directories. Directory-creation errors are ignored, matching
    /// the original driver's "create, ignore errors" behavior. A debug
    /// stream that fails to open is simply not very useful, not fatal.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let file = File::create(path)?;
        Ok(Self {
            sink: Mutex::new(file),
        })
    }

    /// Writes one record: `<UTC ISO-8601 with microseconds>Z <message>\n`,
    /// then fsyncs and flushes before returning.
    pub fn record(&self, message: &str) {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f");
        let mut file = self.sink.lock();
        // Best-effort: a failed debug write must never take down the driver.
        let _ = writeln!(file, "{timestamp}Z {message}");
        let _ = file.sync_all();
        let _ = file.flush();
    }
}

impl std::fmt::Debug for DebugTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugTrace").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "debug_trace_tests.rs"]
mod tests;
