use crate::executor::Execution;
use crate::generation::{Candidate, CandidateOrigin};

/// A candidate that made the target exit with a non-zero status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// The exact input delivered to the target.
    pub input: String,
    pub exit_code: i32,
    pub origin: CandidateOrigin,
    /// MD5 of the input, hex encoded. Lets an operator refer to a failure
    /// without pasting the whole input.
    pub input_hash: String,
}

/// An `Oracle` decides whether an execution is a target failure worth recording.
pub trait Oracle {
    /// Returns `Some(FailureReport)` when `execution` counts as a failure of
    /// the target on `candidate`.
    fn examine(&self, candidate: &Candidate, execution: &Execution) -> Option<FailureReport>;
}

/// Reports every non-zero exit code, including signal terminations
/// (mapped to `128 + signal`).
///
/// Timeouts and harness errors carry no exit code and are never reported here.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonZeroExitOracle;

impl NonZeroExitOracle {
    pub fn new() -> Self {
        NonZeroExitOracle
    }
}

impl Oracle for NonZeroExitOracle {
    fn examine(&self, candidate: &Candidate, execution: &Execution) -> Option<FailureReport> {
        match execution.status.exit_code() {
            Some(code) if code != 0 => Some(FailureReport {
                input: candidate.input.clone(),
                exit_code: code,
                origin: candidate.origin.clone(),
                input_hash: format!("{:x}", md5::compute(candidate.input.as_bytes())),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionStatus;
    use std::time::Duration;

    fn candidate(input: &str) -> Candidate {
        Candidate {
            input: input.to_string(),
            origin: CandidateOrigin::Mutator {
                name: "uppercase".to_string(),
                variant: 0,
            },
        }
    }

    fn execution(status: ExecutionStatus) -> Execution {
        Execution {
            status,
            output: Vec::new(),
            elapsed: Duration::from_millis(1),
        }
    }

    #[test]
    fn non_zero_exit_creates_valid_report() {
        let oracle = NonZeroExitOracle::new();
        let candidate = candidate("<HTML>");
        let report = oracle
            .examine(&candidate, &execution(ExecutionStatus::Exited(2)))
            .expect("non-zero exit should be reported");

        assert_eq!(report.input, "<HTML>");
        assert_eq!(report.exit_code, 2);
        assert_eq!(report.origin, candidate.origin);
        assert_eq!(
            report.input_hash,
            format!("{:x}", md5::compute(b"<HTML>"))
        );
    }

    #[test]
    fn signal_is_reported_with_shell_exit_code() {
        let report = NonZeroExitOracle
            .examine(&candidate("x"), &execution(ExecutionStatus::Signaled(6)))
            .unwrap();
        assert_eq!(report.exit_code, 134);
    }

    #[test]
    fn ignores_zero_exit() {
        assert!(
            NonZeroExitOracle
                .examine(&candidate("x"), &execution(ExecutionStatus::Exited(0)))
                .is_none()
        );
    }

    #[test]
    fn ignores_timeout_and_harness_errors() {
        let oracle = NonZeroExitOracle;
        assert!(
            oracle
                .examine(&candidate("x"), &execution(ExecutionStatus::Timeout))
                .is_none()
        );
        assert!(
            oracle
                .examine(
                    &candidate("x"),
                    &execution(ExecutionStatus::Error("spawn failed".to_string()))
                )
                .is_none()
        );
    }
}
