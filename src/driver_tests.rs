use super::*;
use crate::retry::{Jitter, Sleeper};
use crate::spawn::fake::{FakeSpawner, ScriptedAttempt};
use std::time::Duration;

struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _duration: Duration) {}
}

struct NoJitter;

impl Jitter for NoJitter {
    fn jitter(&self, _cap: Duration) -> Duration {
        Duration::ZERO
    }
}

fn driver_with(spawner: FakeSpawner) -> Driver {
    Driver::new().with_collaborators(Box::new(spawner), Box::new(NoSleep), Box::new(NoJitter))
}

fn run_path() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

#[test]
fn submit_succeeds_and_returns_the_parsed_job_id() {
    let spawner = FakeSpawner::new(vec![ScriptedAttempt {
        exit_code: 0,
        stdout: "12345.cluster1\n".to_string(),
        stderr: String::new(),
    }]);
    let driver = driver_with(spawner.clone());
    let dir = run_path();

    let handle = driver
        .submit("run_forward_model", 1, dir.path(), "REAL01", &[])
        .expect("submission should succeed");

    assert_eq!(handle.job_id(), 12345);
    assert_eq!(handle.job_id_str(), "12345");
    assert_eq!(spawner.calls().len(), 1);
}

#[test]
fn submit_rejects_requests_over_capacity_without_spawning() {
    let spawner = FakeSpawner::new(vec![ScriptedAttempt {
        exit_code: 0,
        stdout: "1.cluster1\n".to_string(),
        stderr: String::new(),
    }]);
    let mut driver = Driver::new();
    assert!(driver.set_option("NUM_NODES", "1"));
    assert!(driver.set_option("NUM_CPUS_PER_NODE", "2"));
    let driver = driver.with_collaborators(Box::new(spawner.clone()), Box::new(NoSleep), Box::new(NoJitter));
    let dir = run_path();

    let handle = driver.submit("run_forward_model", 4, dir.path(), "REAL01", &[]);

    assert!(handle.is_none());
    assert!(spawner.calls().is_empty());
}

#[test]
fn submit_retries_transient_qsub_failures_before_succeeding() {
    let spawner = FakeSpawner::new(vec![
        ScriptedAttempt {
            exit_code: 1,
            stdout: String::new(),
            stderr: "qsub: server busy\n".to_string(),
        },
        ScriptedAttempt {
            exit_code: 1,
            stdout: String::new(),
            stderr: "qsub: server busy\n".to_string(),
        },
        ScriptedAttempt {
            exit_code: 0,
            stdout: "777.cluster1\n".to_string(),
            stderr: String::new(),
        },
    ]);
    let mut driver = driver_with(spawner.clone());
    assert!(driver.set_option("QUEUE_QUERY_TIMEOUT", "60"));
    let dir = run_path();

    let handle = driver
        .submit("run_forward_model", 1, dir.path(), "REAL01", &[])
        .expect("should eventually succeed");

    assert_eq!(handle.job_id(), 777);
    assert_eq!(spawner.calls().len(), 3);
}

#[test]
fn submit_gives_up_after_the_retry_budget_and_still_tries_to_parse_stdout() {
    // The original driver always attempts to read the job id from whatever
    // qsub last wrote, even after giving up on retrying.
    let spawner = FakeSpawner::new(vec![ScriptedAttempt {
        exit_code: 1,
        stdout: String::new(),
        stderr: "qsub: server busy\n".to_string(),
    }]);
    let driver = driver_with(spawner);
    let dir = run_path();

    let handle = driver.submit("run_forward_model", 1, dir.path(), "REAL01", &[]);

    assert!(handle.is_none());
}

#[test]
fn submit_honors_the_configured_job_prefix() {
    let spawner = FakeSpawner::new(vec![ScriptedAttempt {
        exit_code: 0,
        stdout: "1.cluster1\n".to_string(),
        stderr: String::new(),
    }]);
    let mut driver = Driver::new();
    assert!(driver.set_option("JOB_PREFIX", "ert-"));
    let driver = driver.with_collaborators(Box::new(spawner.clone()), Box::new(NoSleep), Box::new(NoJitter));
    let dir = run_path();

    driver
        .submit("run_forward_model", 1, dir.path(), "REAL01", &[])
        .unwrap();

    let call = &spawner.calls()[0];
    let name_index = call.argv.iter().position(|a| a == "-N").unwrap();
    assert_eq!(call.argv[name_index + 1], "ert-REAL01");
}

#[test]
fn status_parses_a_successful_qstat_response() {
    let spawner = FakeSpawner::new(vec![ScriptedAttempt {
        exit_code: 0,
        stdout: "Job Id: 12345.cluster1\n    job_state = R\n".to_string(),
        stderr: String::new(),
    }]);
    let driver = driver_with(spawner);
    let handle = JobHandle::from_raw(12345).unwrap();

    assert_eq!(driver.status(&handle), JobStatus::Running);
}

#[test]
fn status_passes_an_empty_options_slot_positionally_when_unset() {
    let spawner = FakeSpawner::new(vec![ScriptedAttempt {
        exit_code: 0,
        stdout: "Job Id: 12345.cluster1\n    job_state = R\n".to_string(),
        stderr: String::new(),
    }]);
    let driver = driver_with(spawner.clone());
    let handle = JobHandle::from_raw(12345).unwrap();

    driver.status(&handle);

    let call = &spawner.calls()[0];
    assert_eq!(
        call.argv,
        vec!["qstat".to_string(), "-f".to_string(), String::new(), "12345".to_string()]
    );
}

#[test]
fn status_passes_qstat_options_in_the_same_positional_slot_when_set() {
    let spawner = FakeSpawner::new(vec![ScriptedAttempt {
        exit_code: 0,
        stdout: "Job Id: 12345.cluster1\n    job_state = R\n".to_string(),
        stderr: String::new(),
    }]);
    let mut driver = Driver::new();
    assert!(driver.set_option("QSTAT_OPTIONS", "-x"));
    let driver = driver.with_collaborators(Box::new(spawner.clone()), Box::new(NoSleep), Box::new(NoJitter));
    let handle = JobHandle::from_raw(12345).unwrap();

    driver.status(&handle);

    let call = &spawner.calls()[0];
    assert_eq!(
        call.argv,
        vec!["qstat".to_string(), "-f".to_string(), "-x".to_string(), "12345".to_string()]
    );
}

#[test]
fn status_reports_failure_when_qstat_never_succeeds() {
    let spawner = FakeSpawner::new(vec![ScriptedAttempt {
        exit_code: 1,
        stdout: String::new(),
        stderr: "qstat: server unavailable\n".to_string(),
    }]);
    let driver = driver_with(spawner);
    let handle = JobHandle::from_raw(12345).unwrap();

    assert_eq!(driver.status(&handle), JobStatus::Failure);
}

#[test]
fn kill_issues_a_qdel_for_the_right_job() {
    let spawner = FakeSpawner::new(vec![ScriptedAttempt {
        exit_code: 0,
        stdout: String::new(),
        stderr: String::new(),
    }]);
    let driver = driver_with(spawner.clone());
    let handle = JobHandle::from_raw(777).unwrap();

    driver.kill(&handle);

    let call = &spawner.calls()[0];
    assert_eq!(call.argv, vec!["qdel".to_string(), "777".to_string()]);
}

#[test]
fn get_option_round_trips_set_values() {
    let mut driver = Driver::new();
    assert!(driver.set_option("QUEUE", "normal"));
    assert_eq!(driver.get_option("QUEUE").as_deref(), Some("normal"));
    assert!(driver.set_option("SUBMIT_SLEEP", "1.5"));
    assert_eq!(driver.get_option("SUBMIT_SLEEP").as_deref(), Some("1.5"));
}

#[test]
fn unknown_option_is_rejected() {
    let mut driver = Driver::new();
    assert!(!driver.set_option("NOT_A_REAL_OPTION", "x"));
}

#[test]
fn debug_output_getter_is_always_none() {
    let dir = run_path();
    let mut driver = Driver::new();
    assert!(driver.set_option("DEBUG_OUTPUT", dir.path().join("debug.log").to_str().unwrap()));
    assert_eq!(driver.get_option("DEBUG_OUTPUT"), None);
}
