//! The Option Store: the closed set of configuration keys the driver
//! accepts, and the parsing/formatting rules for each.
//!
//! `OptionKey` enumerates the keys; `Driver::set_option`/`get_option` (in
//! `driver.rs`) dispatch on it and hold the actual values as typed fields.
//! Keeping the per-key parse/format rules here, separate from `Driver`
//! itself, mirrors the command builder split: small pure functions that are
//! easy to test in isolation.

use std::str::FromStr;

/// The closed set of option keys the driver understands. Unknown keys are
/// rejected by `FromStr` with `Err(())`, which `Driver::set_option` turns
/// into a `false` return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKey {
    QsubCmd,
    QstatCmd,
    QstatOptions,
    QdelCmd,
    Queue,
    NumCpusPerNode,
    NumNodes,
    KeepQsubOutput,
    ClusterLabel,
    JobPrefix,
    MemoryPerJob,
    SubmitSleep,
    DebugOutput,
    QueueQueryTimeout,
}

impl FromStr for OptionKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "QSUB_CMD" => Self::QsubCmd,
            "QSTAT_CMD" => Self::QstatCmd,
            "QSTAT_OPTIONS" => Self::QstatOptions,
            "QDEL_CMD" => Self::QdelCmd,
            "QUEUE" => Self::Queue,
            "NUM_CPUS_PER_NODE" => Self::NumCpusPerNode,
            "NUM_NODES" => Self::NumNodes,
            "KEEP_QSUB_OUTPUT" => Self::KeepQsubOutput,
            "CLUSTER_LABEL" => Self::ClusterLabel,
            "JOB_PREFIX" => Self::JobPrefix,
            "MEMORY_PER_JOB" => Self::MemoryPerJob,
            "SUBMIT_SLEEP" => Self::SubmitSleep,
            "DEBUG_OUTPUT" => Self::DebugOutput,
            "QUEUE_QUERY_TIMEOUT" => Self::QueueQueryTimeout,
            _ => return Err(()),
        })
    }
}

/// Parses a decimal-seconds string (e.g. `"1.5"`) into whole microseconds,
/// truncating any fractional microsecond. Rejects anything that doesn't
/// parse as a finite, non-negative number.
pub fn parse_submit_sleep_micros(value: &str) -> Option<u64> {
    let seconds: f64 = value.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some((seconds * 1_000_000.0).trunc() as u64)
}

/// Formats stored microseconds back into a decimal-seconds string with
/// trailing zeros trimmed (e.g. `1_500_000` -> `"1.5"`, `0` -> `"0"`).
///
/// The original C driver kept a shadow `_char` field to round-trip the
/// exact input string; this driver drops the shadow field and formats on
/// read instead, so round-tripping is exact for "nice" decimal inputs but
/// may normalize e.g. `"1.500000"` to `"1.5"`.
pub fn format_submit_sleep_micros(micros: u64) -> String {
    let whole = micros / 1_000_000;
    let frac = micros % 1_000_000;
    if frac == 0 {
        return whole.to_string();
    }
    let mut s = format!("{whole}.{frac:06}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// Parses a boolean-like option value. Accepts the same vocabulary as the
/// original driver's `util_sscanf_bool`: `1`/`0`, `true`/`false`,
/// `yes`/`no`, case-insensitively.
pub fn parse_bool_like(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "t" | "y" => Some(true),
        "0" | "false" | "no" | "f" | "n" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
