use crate::coordinator::RunResult;
use crate::executor::ExecutionStatus;
use crate::generation::Candidate;
use crate::oracle::FailureReport;
use std::io::{self, Write};

/// Receives the events of a fuzzing round as they happen.
///
/// The coordinator calls observers synchronously, in the order events occur,
/// so an observer can print a failure the moment it is found. Every hook has
/// an empty default; implement only what you need.
pub trait RoundObserver {
    fn name(&self) -> &'static str;

    /// The seed did not pass validation. `skipping` is true when the round
    /// will be abandoned because of it.
    fn on_invalid_seed(&mut self, _seed: &str, _status: &ExecutionStatus, _skipping: bool) {}

    /// A candidate made the target exit non-zero.
    fn on_failure(&mut self, _report: &FailureReport) {}

    /// A candidate hit the wait bound and the target was killed.
    fn on_timeout(&mut self, _candidate: &Candidate) {}

    /// The harness could not run a candidate.
    fn on_harness_error(&mut self, _candidate: &Candidate, _message: &str) {}

    /// The whole batch was dispatched. `result` holds the cumulative totals.
    fn on_round_complete(&mut self, _result: &RunResult) {}
}

/// Ignores every event.
#[derive(Default, Debug, Clone, Copy)]
pub struct NoOpObserver;

impl RoundObserver for NoOpObserver {
    fn name(&self) -> &'static str {
        "NoOpObserver"
    }
}

const ROUND_SEPARATOR: &str = "---------------------------------------------";

/// Prints round events for the operator.
///
/// Failures, timeouts and harness errors go to the error writer as they
/// happen; seed warnings and round totals go to the output writer. The
/// default writers are stdout and stderr. Write errors are ignored.
pub struct ConsoleObserver<O: Write = io::Stdout, E: Write = io::Stderr> {
    out: O,
    err: E,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::with_writers(io::stdout(), io::stderr())
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Write, E: Write> ConsoleObserver<O, E> {
    pub fn with_writers(out: O, err: E) -> Self {
        Self { out, err }
    }

    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> RoundObserver for ConsoleObserver<O, E> {
    fn name(&self) -> &'static str {
        "ConsoleObserver"
    }

    fn on_invalid_seed(&mut self, seed: &str, _status: &ExecutionStatus, skipping: bool) {
        if skipping {
            let _ = writeln!(self.err, "INVALID SEED...SKIPPING FUZZER");
        } else {
            let _ = writeln!(self.out, "INVALID SEED: {seed}");
        }
    }

    fn on_failure(&mut self, report: &FailureReport) {
        let _ = writeln!(
            self.err,
            "Command failed with exit code: {} | Used Input: {}",
            report.exit_code, report.input
        );
    }

    fn on_timeout(&mut self, candidate: &Candidate) {
        let _ = writeln!(self.err, "Command timed out | Used Input: {}", candidate.input);
    }

    fn on_harness_error(&mut self, _candidate: &Candidate, message: &str) {
        let _ = writeln!(self.err, "Error running command: {message}");
    }

    fn on_round_complete(&mut self, result: &RunResult) {
        let _ = writeln!(self.out, "{ROUND_SEPARATOR}");
        let _ = writeln!(
            self.out,
            "Found {} non-zero exit codes",
            result.non_zero_exits()
        );
    }
}
