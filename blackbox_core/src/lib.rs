pub mod config;
pub mod coordinator;
pub mod executor;
pub mod generation;
pub mod mutator;
pub mod observer;
pub mod oracle;
pub mod target;

pub use config::{BlackboxConfig, MutationSettings, SubstitutionMode};
pub use coordinator::{RoundError, RoundOutcome, RoundState, RunCoordinator, RunResult, SeedPolicy};
pub use executor::{CommandExecutor, CommandExecutorConfig, Execution, ExecutionStatus, Executor};
pub use generation::{Candidate, CandidateBatch, CandidateOrigin, generate};
pub use mutator::{Mutator, MutatorError, MutatorSet, Repeat, VariantMutator};
pub use observer::{ConsoleObserver, NoOpObserver, RoundObserver};
pub use oracle::{FailureReport, NonZeroExitOracle, Oracle};
pub use target::{Shell, TargetDescriptor, TargetError};
