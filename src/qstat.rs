//! Parses `qstat -f` output into the driver's abstract `JobStatus`.
//! Locale-insensitive, line-oriented, and scoped to a single target job id
//! within a file that may describe other jobs too.

use crate::driver::JobStatus;

/// Strips a job id's `.servername` namespace suffix, returning the leading
/// decimal integer (e.g. `"12345.server"` -> `Some(12345)`).
fn strip_namespace(job_id_str: &str) -> Option<i64> {
    let prefix = job_id_str.split('.').next().unwrap_or(job_id_str);
    prefix.parse().ok()
}

/// Parses the `qstat -f` output in `contents`, looking only for the job
/// identified by `job_id_str` (its own `.servername` suffix, if any, is
/// stripped before comparison against each `Job Id:` line encountered).
///
/// Returns `JobStatus::Failure` if the target job's state is never found
/// or doesn't map to a known Torque state character.
pub fn parse_status(contents: &str, job_id_str: &str) -> JobStatus {
    let target = strip_namespace(job_id_str);

    let mut current_job_id: Option<i64> = None;
    let mut job_state: Option<String> = None;
    let mut exit_status: i64 = 0;

    for line in contents.lines() {
        if let Some(rest) = line.find("Job Id: ").map(|pos| &line[pos + "Job Id: ".len()..]) {
            current_job_id = strip_namespace(rest.trim());
            continue;
        }

        if current_job_id.is_some() && current_job_id == target {
            if line.contains("job_state") {
                if let Some(value) = parse_key_equals_value(line) {
                    job_state = Some(value);
                }
            } else if line.contains("Exit_status") {
                if let Some(value) = parse_key_equals_value(line) {
                    if let Ok(parsed) = value.parse() {
                        exit_status = parsed;
                    }
                }
            }
        }
    }

    let mut status = match job_state.as_deref().and_then(|s| s.chars().next()) {
        Some('R') => JobStatus::Running,
        Some('E') | Some('F') | Some('C') => JobStatus::Done,
        Some('H') | Some('Q') => JobStatus::Pending,
        _ => JobStatus::Failure,
    };

    if exit_status != 0 {
        status = JobStatus::Exit;
    }

    status
}

/// Splits a `key = value` line on whitespace, returning the third token.
fn parse_key_equals_value(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace();
    let _key = tokens.next()?;
    let _eq = tokens.next()?;
    tokens.next().map(str::to_string)
}

#[cfg(test)]
#[path = "qstat_tests.rs"]
mod tests;
