//! The spawn contract: run an external command with its stdout/stderr
//! redirected to files, blocking the calling thread until it exits.
//!
//! Process spawning is treated as an external collaborator: `Spawner` is
//! the seam through which the driver consumes it, kept narrow so tests can
//! substitute `FakeSpawner` without touching a real shell.

use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

/// Runs `argv` (program + arguments) with stdout/stderr overwritten at the
/// given paths, blocking until the child exits.
pub trait Spawner: Send + Sync {
    fn spawn(
        &self,
        argv: &[String],
        stdout_path: &Path,
        stderr_path: &Path,
    ) -> io::Result<ExitStatus>;
}

/// Spawns a real child process via `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessSpawner;

impl Spawner for ProcessSpawner {
    fn spawn(
        &self,
        argv: &[String],
        stdout_path: &Path,
        stderr_path: &Path,
    ) -> io::Result<ExitStatus> {
        let Some((program, args)) = argv.split_first() else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty argv"));
        };
        let stdout = std::fs::File::create(stdout_path)?;
        let stderr = std::fs::File::create(stderr_path)?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()?;
        child.wait()
    }
}

/// Describes how a child process ended, for debug-trace logging.
///
/// Unix exposes signaled/stopped/continued status via extension traits;
/// on platforms without those the driver still reports exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    Exited(i32),
    Signaled(i32),
    Stopped(i32),
    Continued,
    Unknown,
}

impl SpawnOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            // `ExitStatus` only exposes `code()`/`signal()` as stable accessors;
            // stopped/continued are POSIX wait-status bits `Child::wait()` never
            // actually produces (it doesn't request WUNTRACED/WCONTINUED), so we
            // decode the raw status by hand for parity with the C original's
            // WIFSTOPPED/WIFCONTINUED macros rather than depend on an
            // unstable std API.
            use std::os::unix::process::ExitStatusExt;
            let raw = status.into_raw();
            if let Some(code) = status.code() {
                return SpawnOutcome::Exited(code);
            }
            if let Some(sig) = status.signal() {
                return SpawnOutcome::Signaled(sig);
            }
            if raw & 0xff == 0x7f {
                return SpawnOutcome::Stopped((raw >> 8) & 0xff);
            }
            if raw == 0xffff {
                return SpawnOutcome::Continued;
            }
            SpawnOutcome::Unknown
        }
        #[cfg(not(unix))]
        {
            match status.code() {
                Some(code) => SpawnOutcome::Exited(code),
                None => SpawnOutcome::Unknown,
            }
        }
    }
}

impl std::fmt::Display for SpawnOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpawnOutcome::Exited(code) => write!(f, "exited with status={code}"),
            SpawnOutcome::Signaled(sig) => write!(f, "killed by signal {sig}"),
            SpawnOutcome::Stopped(sig) => write!(f, "stopped by signal {sig}"),
            SpawnOutcome::Continued => write!(f, "continued"),
            SpawnOutcome::Unknown => write!(f, "failed with unknown status"),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! Scripted, in-memory `Spawner` for deterministic retry-loop tests.
    //!
    //! An `Arc<Mutex<..>>` holds scripted outcomes and records every call so
    //! a test can assert on both the final result and the exact sequence of
    //! invocations.
    use super::Spawner;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::process::ExitStatus;
    use std::sync::Arc;

    /// One scripted attempt outcome: exit code plus what to write to stdout.
    #[derive(Debug, Clone)]
    pub struct ScriptedAttempt {
        pub exit_code: i32,
        pub stdout: String,
        pub stderr: String,
    }

    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub argv: Vec<String>,
        pub stdout_path: PathBuf,
        pub stderr_path: PathBuf,
    }

    struct State {
        script: VecDeque<ScriptedAttempt>,
        calls: Vec<RecordedCall>,
    }

    /// A `Spawner` that plays back a fixed sequence of `(exit_code, stdout)`
    /// pairs, repeating the last entry once the script is exhausted.
    #[derive(Clone)]
    pub struct FakeSpawner {
        state: Arc<Mutex<State>>,
    }

    impl FakeSpawner {
        pub fn new(script: Vec<ScriptedAttempt>) -> Self {
            Self {
                state: Arc::new(Mutex::new(State {
                    script: script.into(),
                    calls: Vec::new(),
                })),
            }
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.state.lock().calls.clone()
        }
    }

    #[cfg(unix)]
    fn exit_status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    #[cfg(not(unix))]
    fn exit_status(code: i32) -> ExitStatus {
        use std::os::windows::process::ExitStatusExt;
        ExitStatus::from_raw(code as u32)
    }

    impl Spawner for FakeSpawner {
        fn spawn(
            &self,
            argv: &[String],
            stdout_path: &Path,
            stderr_path: &Path,
        ) -> io::Result<ExitStatus> {
            let mut state = self.state.lock();
            state.calls.push(RecordedCall {
                argv: argv.to_vec(),
                stdout_path: stdout_path.to_path_buf(),
                stderr_path: stderr_path.to_path_buf(),
            });
            let attempt = if state.script.len() > 1 {
                state.script.pop_front().unwrap_or(ScriptedAttempt {
                    exit_code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                })
            } else {
                state
                    .script
                    .front()
                    .cloned()
                    .unwrap_or(ScriptedAttempt {
                        exit_code: 0,
                        stdout: String::new(),
                        stderr: String::new(),
                    })
            };
            std::fs::write(stdout_path, &attempt.stdout)?;
            std::fs::write(stderr_path, &attempt.stderr)?;
            Ok(exit_status(attempt.exit_code))
        }
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
