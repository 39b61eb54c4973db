use crate::executor::{Execution, ExecutionStatus, Executor};
use crate::generation::{self, Candidate};
use crate::mutator::{MutatorError, MutatorSet};
use crate::observer::RoundObserver;
use crate::oracle::{FailureReport, NonZeroExitOracle, Oracle};
use log::{debug, trace};
use rand_core::RngCore;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoundError {
    /// Deletion and substitution need at least one character to work on.
    #[error("Seed input is empty, refusing to start round")]
    EmptySeed,

    #[error("Candidate generation failed: {0}")]
    Generation(#[from] MutatorError),
}

/// What to do with a seed the target rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedPolicy {
    /// Fuzz anyway, warning about the seed.
    #[default]
    FuzzAll,
    /// Abandon the round.
    SkipInvalid,
}

/// Where a round currently is. `Skipped` and `Done` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    ValidatingSeed,
    Skipped,
    Generating,
    Executing { index: usize, total: usize },
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The seed failed validation under [`SeedPolicy::SkipInvalid`].
    Skipped { seed_status: ExecutionStatus },
    /// Every candidate of the batch was dispatched.
    Done {
        candidates: usize,
        new_failures: usize,
        seed_valid: bool,
    },
}

/// Everything found so far, across all rounds it was passed to.
///
/// The caller owns it and hands it to each round; nothing resets it.
#[derive(Debug, Default, Clone)]
pub struct RunResult {
    failures: Vec<FailureReport>,
    timeouts: Vec<String>,
    harness_errors: usize,
    executions: usize,
    rounds_completed: usize,
    rounds_skipped: usize,
}

impl RunResult {
    /// Number of candidates whose target process exited non-zero.
    pub fn non_zero_exits(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[FailureReport] {
        &self.failures
    }

    pub fn failing_inputs(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.input.as_str())
    }

    /// Inputs on which the target was killed for exceeding the wait bound.
    pub fn timeouts(&self) -> &[String] {
        &self.timeouts
    }

    pub fn harness_errors(&self) -> usize {
        self.harness_errors
    }

    /// Candidates dispatched, not counting seed validation runs.
    pub fn executions(&self) -> usize {
        self.executions
    }

    pub fn rounds_completed(&self) -> usize {
        self.rounds_completed
    }

    pub fn rounds_skipped(&self) -> usize {
        self.rounds_skipped
    }
}

/// Drives fuzzing rounds: validate the seed, generate candidates, run each
/// one through the executor in order, and record what failed.
pub struct RunCoordinator {
    executor: Box<dyn Executor>,
    mutators: MutatorSet,
    oracle: Box<dyn Oracle>,
    seed_policy: SeedPolicy,
    state: RoundState,
}

impl RunCoordinator {
    pub fn new(executor: Box<dyn Executor>, mutators: MutatorSet) -> Self {
        Self {
            executor,
            mutators,
            oracle: Box::new(NonZeroExitOracle),
            seed_policy: SeedPolicy::default(),
            state: RoundState::Idle,
        }
    }

    pub fn with_oracle(mut self, oracle: Box<dyn Oracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_seed_policy(mut self, seed_policy: SeedPolicy) -> Self {
        self.seed_policy = seed_policy;
        self
    }

    pub fn mutators(&self) -> &MutatorSet {
        &self.mutators
    }

    /// The last state the most recent round reached.
    pub fn state(&self) -> RoundState {
        self.state
    }

    fn transition(&mut self, next: RoundState) {
        trace!("Round state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Runs one round for `seed`, adding its findings to `result`.
    ///
    /// Target failures, timeouts and harness errors never abort the round.
    /// Only an empty seed or a mutator failure does, and both are reported
    /// before any candidate is dispatched.
    pub fn run_round(
        &mut self,
        seed: &str,
        rng: &mut dyn RngCore,
        result: &mut RunResult,
        observers: &mut [&mut dyn RoundObserver],
    ) -> Result<RoundOutcome, RoundError> {
        self.transition(RoundState::Idle);
        if seed.is_empty() {
            return Err(RoundError::EmptySeed);
        }

        self.transition(RoundState::ValidatingSeed);
        let validation = self.executor.execute_sync(seed.as_bytes());
        let seed_valid = validation.status.is_success();
        if !seed_valid {
            let skipping = self.seed_policy == SeedPolicy::SkipInvalid;
            debug!("Seed failed validation with {:?}: {seed:?}", validation.status);
            for obs in observers.iter_mut() {
                obs.on_invalid_seed(seed, &validation.status, skipping);
            }
            if skipping {
                result.rounds_skipped += 1;
                self.transition(RoundState::Skipped);
                return Ok(RoundOutcome::Skipped {
                    seed_status: validation.status,
                });
            }
        }

        self.transition(RoundState::Generating);
        let batch = generation::generate(seed, &self.mutators, rng)?;

        let total = batch.len();
        let failures_before = result.non_zero_exits();
        for (index, candidate) in batch.into_iter().enumerate() {
            self.transition(RoundState::Executing { index, total });
            let execution = self.executor.execute_sync(candidate.input.as_bytes());
            result.executions += 1;
            self.record(&candidate, &execution, result, observers);
        }

        result.rounds_completed += 1;
        self.transition(RoundState::Done);
        for obs in observers.iter_mut() {
            obs.on_round_complete(result);
        }

        Ok(RoundOutcome::Done {
            candidates: total,
            new_failures: result.non_zero_exits() - failures_before,
            seed_valid,
        })
    }

    fn record(
        &self,
        candidate: &Candidate,
        execution: &Execution,
        result: &mut RunResult,
        observers: &mut [&mut dyn RoundObserver],
    ) {
        if let Some(report) = self.oracle.examine(candidate, execution) {
            debug!(
                "{} failed with exit code {}, output: {}",
                report.origin,
                report.exit_code,
                String::from_utf8_lossy(&execution.output)
            );
            for obs in observers.iter_mut() {
                obs.on_failure(&report);
            }
            result.failures.push(report);
            return;
        }

        match &execution.status {
            ExecutionStatus::Timeout => {
                for obs in observers.iter_mut() {
                    obs.on_timeout(candidate);
                }
                result.timeouts.push(candidate.input.clone());
            }
            ExecutionStatus::Error(message) => {
                for obs in observers.iter_mut() {
                    obs.on_harness_error(candidate, message);
                }
                result.harness_errors += 1;
            }
            ExecutionStatus::Exited(_) | ExecutionStatus::Signaled(_) => {}
        }
    }
}
