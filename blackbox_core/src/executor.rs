use crate::target::TargetDescriptor;
use log::{debug, warn};
use std::io::{self, Read, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

/// How often a bounded wait polls the child for termination.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Outcome of running the target once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The target terminated normally with this exit code.
    Exited(i32),
    /// The target was terminated by this signal (Unix only).
    Signaled(i32),
    /// The target exceeded the configured wait bound and was killed.
    Timeout,
    /// The harness itself failed (spawn, stdin delivery, wait).
    Error(String),
}

impl ExecutionStatus {
    /// The exit code as a shell would report it: signals map to `128 + signal`.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionStatus::Exited(code) => Some(*code),
            ExecutionStatus::Signaled(signal) => Some(128 + signal),
            ExecutionStatus::Timeout | ExecutionStatus::Error(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Exited(0))
    }
}

/// Everything observed about one execution.
#[derive(Debug, Clone)]
pub struct Execution {
    pub status: ExecutionStatus,
    /// Combined stdout and stderr of the target.
    pub output: Vec<u8>,
    pub elapsed: Duration,
}

impl Execution {
    fn failed(message: String, started: Instant) -> Self {
        debug!("Harness failure: {message}");
        Self {
            status: ExecutionStatus::Error(message),
            output: Vec::new(),
            elapsed: started.elapsed(),
        }
    }
}

/// Runs the target on one input and reports what happened.
///
/// Implementations never panic on target or harness failure; problems are
/// reported through [`ExecutionStatus::Error`] so the caller can move on to
/// the next candidate.
pub trait Executor {
    fn execute_sync(&mut self, input: &[u8]) -> Execution;
}

/// Runs a Rust function as the target. The return value is the exit code.
///
/// A panic inside the harness function is reported as a harness error.
pub struct InProcessExecutor<F>
where
    F: Fn(&[u8]) -> i32,
{
    harness_fn: F,
}

impl<F> InProcessExecutor<F>
where
    F: Fn(&[u8]) -> i32,
{
    pub fn new(harness_fn: F) -> Self {
        Self { harness_fn }
    }
}

impl<F> Executor for InProcessExecutor<F>
where
    F: Fn(&[u8]) -> i32,
{
    fn execute_sync(&mut self, input: &[u8]) -> Execution {
        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| (self.harness_fn)(input)));

        match result {
            Ok(code) => Execution {
                status: ExecutionStatus::Exited(code),
                output: Vec::new(),
                elapsed: started.elapsed(),
            },
            Err(panic_payload) => {
                let msg = if let Some(s) = panic_payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic type".to_string()
                };
                Execution::failed(format!("Harness panicked: {msg}"), started)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandExecutorConfig {
    pub target: TargetDescriptor,
    /// Upper bound on one whole execution, spawn to drained output. `None`
    /// waits forever.
    pub timeout: Option<Duration>,
}

/// Launches a fresh target process per input and feeds the input over stdin.
pub struct CommandExecutor {
    config: CommandExecutorConfig,
}

impl CommandExecutor {
    pub fn new(config: CommandExecutorConfig) -> Self {
        Self { config }
    }

    pub fn target(&self) -> &TargetDescriptor {
        &self.config.target
    }

    /// Spawns the target with stdin piped and stderr merged into stdout.
    ///
    /// The merged stream is drained on a helper thread so a chatty target
    /// cannot block on a full pipe. The drained bytes arrive on the returned
    /// channel once every holder of the write end has closed it.
    fn spawn_target(&self) -> io::Result<(Child, Receiver<Vec<u8>>)> {
        let (mut reader, writer) = io::pipe()?;

        let mut cmd = self.config.target.command();
        cmd.stdin(Stdio::piped())
            .stdout(writer.try_clone()?)
            .stderr(writer);

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("target-output".to_string())
            .spawn(move || {
                let mut merged = Vec::new();
                if let Err(e) = reader.read_to_end(&mut merged) {
                    debug!("Stopped reading target output: {e}");
                }
                let _ = tx.send(merged);
            })?;

        // `cmd` owns our copies of the write end; they must be closed once the
        // child holds its own, or the drain never sees end-of-stream.
        let child = cmd.spawn();
        drop(cmd);
        Ok((child?, rx))
    }

    /// Writes the whole input and closes stdin on a helper thread, so a
    /// target that never reads cannot stall the caller past its deadline.
    ///
    /// A target that exits or closes stdin without reading everything yields
    /// a broken pipe; that is the target's choice and not a harness failure.
    fn deliver_input(
        child: &mut Child,
        input: &[u8],
    ) -> io::Result<Receiver<io::Result<()>>> {
        let Some(mut stdin) = child.stdin.take() else {
            return Err(io::Error::other("Child stdin was not available after piping"));
        };

        let input = input.to_vec();
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("target-input".to_string())
            .spawn(move || {
                let delivered = match stdin.write_all(&input).and_then(|()| stdin.flush()) {
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        debug!("Target closed stdin before reading all input: {e}");
                        Ok(())
                    }
                    other => other,
                };
                let _ = tx.send(delivered);
            })?;
        Ok(rx)
    }

    /// Kills the child and reaps it.
    ///
    /// If the kill fails the child may already have exited on its own; it is
    /// still reaped when that is the case.
    fn kill_and_reap(child: &mut Child) -> io::Result<ExitStatus> {
        if let Err(e) = child.kill() {
            return match child.try_wait()? {
                Some(status) => Ok(status),
                None => Err(e),
            };
        }
        child.wait()
    }

    fn wait_for_exit(
        child: &mut Child,
        deadline: Option<Instant>,
    ) -> Result<ExitStatus, ExecutionStatus> {
        let Some(deadline) = deadline else {
            return child
                .wait()
                .map_err(|e| ExecutionStatus::Error(format!("Error waiting for child: {e}")));
        };

        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!("Target exceeded its deadline, killing...");
                        return match Self::kill_and_reap(child) {
                            Ok(_) => Err(ExecutionStatus::Timeout),
                            Err(e) => Err(ExecutionStatus::Error(format!(
                                "Failed to kill timed-out process: {e}"
                            ))),
                        };
                    }
                    thread::sleep(WAIT_POLL_INTERVAL);
                }
                Err(e) => {
                    let _ = Self::kill_and_reap(child);
                    return Err(ExecutionStatus::Error(format!(
                        "Error waiting for child: {e}"
                    )));
                }
            }
        }
    }

    /// Receives a helper thread's result, giving up at `deadline`.
    ///
    /// `None` means the deadline passed or the helper died; the helper is
    /// left behind either way.
    fn recv_until<T>(rx: &Receiver<T>, deadline: Option<Instant>) -> Option<T> {
        match deadline {
            None => rx.recv().ok(),
            Some(deadline) => rx
                .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                .ok(),
        }
    }

    fn classify(status: ExitStatus) -> ExecutionStatus {
        if let Some(code) = status.code() {
            return ExecutionStatus::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExecutionStatus::Signaled(signal);
            }
        }
        ExecutionStatus::Error(format!("Target exited abnormally: {status}"))
    }
}

impl Executor for CommandExecutor {
    /// Every blocking step (stdin delivery, the wait, the output drain) shares
    /// one deadline measured from before the spawn.
    fn execute_sync(&mut self, input: &[u8]) -> Execution {
        let started = Instant::now();
        let deadline = self.config.timeout.map(|timeout| started + timeout);

        let (mut child, output_rx) = match self.spawn_target() {
            Ok(spawned) => spawned,
            Err(e) => {
                return Execution::failed(
                    format!(
                        "Failed to spawn command {:?}: {e}",
                        self.config.target.shell_line()
                    ),
                    started,
                );
            }
        };

        let delivery_rx = match Self::deliver_input(&mut child, input) {
            Ok(rx) => rx,
            Err(e) => {
                let _ = Self::kill_and_reap(&mut child);
                return Execution::failed(format!("Failed to write to stdin: {e}"), started);
            }
        };

        let status = match Self::wait_for_exit(&mut child, deadline) {
            Ok(exit_status) => Self::classify(exit_status),
            Err(status) => status,
        };

        // After a kill, a grandchild of the shell may still hold the pipes
        // open; leave the helper threads behind rather than block on them.
        if status == ExecutionStatus::Timeout {
            return Execution {
                status,
                output: Vec::new(),
                elapsed: started.elapsed(),
            };
        }

        match Self::recv_until(&delivery_rx, deadline) {
            Some(Err(e)) => {
                return Execution::failed(format!("Failed to write to stdin: {e}"), started);
            }
            Some(Ok(())) => {}
            None => debug!("Stdin still held open after the target exited, not waiting"),
        }

        let output = Self::recv_until(&output_rx, deadline).unwrap_or_else(|| {
            debug!("Output still held open after the target exited, not waiting");
            Vec::new()
        });

        let elapsed = started.elapsed();
        debug!("Target finished with {status:?} in {elapsed:?}");
        Execution {
            status,
            output,
            elapsed,
        }
    }
}


#[cfg(all(test, unix))]
mod command_executor_tests {
    use super::*;
    use crate::target::Shell;
    use std::path::Path;

    fn executor_for(command: &str, dir: &Path, timeout: Option<Duration>) -> CommandExecutor {
        CommandExecutor::new(CommandExecutorConfig {
            target: TargetDescriptor::new(command, dir).with_shell(Shell::posix()),
            timeout,
        })
    }

    #[test]
    fn cmd_exec_successful_run_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor_for("grep -q hello", dir.path(), None);

        let hit = executor.execute_sync(b"say hello");
        assert_eq!(hit.status, ExecutionStatus::Exited(0));

        let miss = executor.execute_sync(b"goodbye");
        assert_eq!(miss.status, ExecutionStatus::Exited(1));
    }

    #[test]
    fn cmd_exec_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor_for("cat > /dev/null; exit 7", dir.path(), None);
        let execution = executor.execute_sync(b"anything");
        assert_eq!(execution.status, ExecutionStatus::Exited(7));
    }

    #[test]
    fn cmd_exec_merges_stderr_into_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor_for("echo to-out; echo to-err 1>&2", dir.path(), None);
        let execution = executor.execute_sync(b"");
        let output = String::from_utf8_lossy(&execution.output);
        assert!(output.contains("to-out"), "missing stdout in {output:?}");
        assert!(output.contains("to-err"), "missing stderr in {output:?}");
    }

    #[test]
    fn cmd_exec_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let mut executor = executor_for("test -f marker.txt", dir.path(), None);
        assert_eq!(
            executor.execute_sync(b"").status,
            ExecutionStatus::Exited(0)
        );
    }

    #[test]
    fn cmd_exec_crash_detection() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor_for("kill -SEGV $$", dir.path(), None);
        let execution = executor.execute_sync(b"");
        assert_eq!(execution.status, ExecutionStatus::Signaled(11));
        assert_eq!(execution.status.exit_code(), Some(139));
    }

    #[test]
    fn cmd_exec_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor_for(
            "exec sleep 5",
            dir.path(),
            Some(Duration::from_millis(100)),
        );
        let execution = executor.execute_sync(b"");
        assert_eq!(execution.status, ExecutionStatus::Timeout);
        assert!(execution.elapsed < Duration::from_secs(4));
    }

    #[test]
    fn cmd_exec_target_ignoring_stdin_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor_for("exit 0", dir.path(), Some(Duration::from_secs(5)));
        let big_input = vec![b'A'; 1 << 20];
        let execution = executor.execute_sync(&big_input);
        assert_eq!(execution.status, ExecutionStatus::Exited(0));
    }

    #[test]
    fn cmd_exec_timeout_covers_stdin_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor_for(
            "exec sleep 3",
            dir.path(),
            Some(Duration::from_millis(200)),
        );
        let big_input = vec![b'A'; 1 << 20];
        let execution = executor.execute_sync(&big_input);
        assert_eq!(execution.status, ExecutionStatus::Timeout);
        assert!(execution.elapsed < Duration::from_secs(2));
    }

    #[test]
    fn cmd_exec_does_not_wait_on_background_output_holder() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor_for(
            "sleep 3 & exit 1",
            dir.path(),
            Some(Duration::from_millis(200)),
        );
        let execution = executor.execute_sync(b"");
        assert_eq!(execution.status, ExecutionStatus::Exited(1));
        assert!(execution.elapsed < Duration::from_secs(2));
    }

    #[test]
    fn kill_and_reap_collects_child_that_already_exited() {
        let dir = tempfile::tempdir().unwrap();
        let mut child = TargetDescriptor::new("exit 3", dir.path())
            .with_shell(Shell::posix())
            .command()
            .spawn()
            .unwrap();
        std::thread::sleep(Duration::from_millis(200));

        CommandExecutor::kill_and_reap(&mut child).unwrap();
        assert!(child.try_wait().unwrap().is_some());
    }

    #[test]
    fn cmd_exec_invalid_shell() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = CommandExecutor::new(CommandExecutorConfig {
            target: TargetDescriptor::new("true", dir.path()).with_shell(Shell {
                program: "/this/shell/does_not_exist_12345".to_string(),
                flag: "-c".to_string(),
            }),
            timeout: None,
        });
        match executor.execute_sync(b"").status {
            ExecutionStatus::Error(msg) => assert!(msg.contains("Failed to spawn command")),
            other => panic!("Expected Error status for invalid shell, got {other:?}"),
        }
    }

    #[test]
    fn cmd_exec_missing_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");
        let mut executor = executor_for("true", &gone, None);
        assert!(matches!(
            executor.execute_sync(b"").status,
            ExecutionStatus::Error(_)
        ));
    }
}
