//! End-to-end exercise of the submit retry/backoff sequence against a
//! scripted spawner, with a fake sleeper recording the exact wait sequence.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use torque_driver::retry::{Jitter, Sleeper};
use torque_driver::spawn::fake::{FakeSpawner, ScriptedAttempt};
use torque_driver::Driver;

#[derive(Default, Clone)]
struct RecordingSleeper {
    durations: Arc<Mutex<Vec<Duration>>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.durations.lock().unwrap().push(duration);
    }
}

struct NoJitter;

impl Jitter for NoJitter {
    fn jitter(&self, _cap: Duration) -> Duration {
        Duration::ZERO
    }
}

#[test]
fn submit_backs_off_through_transient_failures_then_reports_the_final_job_id() {
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
            exit_code: 1,
            stdout: String::new(),
            stderr: "qsub: server busy\n".to_string(),
        },
        ScriptedAttempt {
            exit_code: 0,
            stdout: "55441.cluster1\n".to_string(),
            stderr: String::new(),
        },
    ]);
    let sleeper = RecordingSleeper::default();

    let mut driver = Driver::new();
    assert!(driver.set_option("QUEUE_QUERY_TIMEOUT", "60"));
    let driver = driver.with_collaborators(
        Box::new(spawner.clone()),
        Box::new(sleeper.clone()),
        Box::new(NoJitter),
    );

    let run_path = tempfile::tempdir().unwrap();
    let handle = driver
        .submit("run_forward_model", 1, run_path.path(), "REAL01", &[])
        .expect("submission should eventually succeed");

    assert_eq!(handle.job_id(), 55441);
    assert_eq!(spawner.calls().len(), 4);

    let recorded = sleeper.durations.lock().unwrap();
    let base_intervals: Vec<Duration> = recorded.iter().copied().filter(|d| !d.is_zero()).collect();
    assert_eq!(
        base_intervals,
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
        ]
    );
}

#[test]
fn submit_reports_no_handle_once_the_retry_budget_is_exhausted() {
    let spawner = FakeSpawner::new(vec![ScriptedAttempt {
        exit_code: 1,
        stdout: String::new(),
        stderr: "qsub: server busy\n".to_string(),
    }]);
    let driver = Driver::new().with_collaborators(
        Box::new(spawner.clone()),
        Box::new(RecordingSleeper::default()),
        Box::new(NoJitter),
    );

    let run_path = tempfile::tempdir().unwrap();
    let handle = driver.submit("run_forward_model", 1, run_path.path(), "REAL01", &[]);

    assert!(handle.is_none());
    assert_eq!(spawner.calls().len(), 1);
}
