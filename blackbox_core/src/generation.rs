use crate::mutator::{MutatorError, MutatorSet};
use rand_core::RngCore;
use std::fmt;

/// Where a candidate came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOrigin {
    Seed,
    Mutator { name: String, variant: usize },
}

impl fmt::Display for CandidateOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateOrigin::Seed => write!(f, "seed"),
            CandidateOrigin::Mutator { name, variant } => write!(f, "{name}#{variant}"),
        }
    }
}

/// One input delivered to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub input: String,
    pub origin: CandidateOrigin,
}

/// The seed followed by every mutator output, in registration order.
#[derive(Debug, Clone)]
pub struct CandidateBatch {
    candidates: Vec<Candidate>,
}

impl CandidateBatch {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Always `false`: a batch holds at least its seed.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn seed(&self) -> &Candidate {
        &self.candidates[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }
}

impl IntoIterator for CandidateBatch {
    type Item = Candidate;
    type IntoIter = std::vec::IntoIter<Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

/// Applies every mutator to the original seed and flattens the results.
///
/// Mutators are not chained: each one sees `seed`, never another mutator's
/// output. The shape of the batch depends only on the mutator set, not on
/// the random values drawn.
pub fn generate(
    seed: &str,
    mutators: &MutatorSet,
    rng: &mut dyn RngCore,
) -> Result<CandidateBatch, MutatorError> {
    let mut candidates = vec![Candidate {
        input: seed.to_string(),
        origin: CandidateOrigin::Seed,
    }];

    for mutator in mutators.iter() {
        let outputs = mutator.mutate(seed, rng)?;
        candidates.extend(outputs.into_iter().enumerate().map(|(variant, input)| {
            Candidate {
                input,
                origin: CandidateOrigin::Mutator {
                    name: mutator.name().to_string(),
                    variant,
                },
            }
        }));
    }

    Ok(CandidateBatch { candidates })
}
