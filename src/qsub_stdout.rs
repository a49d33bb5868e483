//! Parses the scheduler-assigned job id out of `qsub`'s free-form stdout:
//! read characters up to the first `.`, or the whole file if there's no
//! `.`, and parse that as a positive integer.

/// Returns the parsed job id, or `None` if no positive integer could be
/// extracted.
pub fn parse_qsub_stdout(contents: &str) -> Option<i64> {
    let candidate = match contents.split_once('.') {
        Some((prefix, _)) => prefix,
        None => contents.trim(),
    };
    let job_id: i64 = candidate.trim().parse().ok()?;
    if job_id > 0 {
        Some(job_id)
    } else {
        None
    }
}

#[cfg(test)]
#[path = "qsub_stdout_tests.rs"]
mod tests;
