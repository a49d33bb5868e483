//! Error types for the driver's external-facing operations.

use thiserror::Error;

/// Errors that can occur while submitting a job.
///
/// Transient `qsub` failures are fully absorbed by the retry loop and never
/// surface here; only permanent failures (budget exhausted, capacity
/// exceeded, unparseable job id) reach the caller, and `Driver::submit`
/// turns all of them into `None` per spec. This type exists so internal
/// callers and tests can distinguish *why* a submission failed.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("num_cpu {requested} exceeds driver capacity {available} (num_cpus_per_node={cpn} * num_nodes={nodes})")]
    CapacityExceeded {
        requested: u32,
        available: u32,
        cpn: u32,
        nodes: u32,
    },
    #[error("qsub exited non-zero after exhausting retry budget: {0}")]
    SpawnFailed(String),
    #[error("could not parse a job id from qsub stdout")]
    UnparseableJobId,
    #[error("failed to write submit script: {0}")]
    ScriptWrite(#[source] std::io::Error),
    #[error("failed to allocate temp file: {0}")]
    TempFile(#[source] std::io::Error),
}

/// Errors surfaced while polling job status.
///
/// `Driver::status` never returns `Err` to its caller; every failure maps
/// to `JobStatus::Failure`. This type is used internally to log *why* a
/// particular status query failed.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("qstat never succeeded within the retry budget")]
    QstatFailed,
    #[error("qstat stdout file is missing")]
    MissingOutput,
    #[error("failed to allocate temp file: {0}")]
    TempFile(#[source] std::io::Error),
}
