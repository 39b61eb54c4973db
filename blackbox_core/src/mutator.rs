use crate::config::{MutationSettings, SubstitutionMode};
use rand::Rng;
use rand_core::RngCore;
use thiserror::Error;

/// Letters, digits and the punctuation, whitespace and control characters
/// markup parsers tend to care about.
pub const DEFAULT_ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789<>()[]{}|?\\ \"='\n\t\r";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutatorError {
    /// The mutator needs at least one character to work on.
    #[error("Mutator '{mutator}' requires a non-empty input")]
    EmptyInput { mutator: String },

    /// The mutator was built from settings it cannot work with.
    #[error("Invalid mutator configuration: {0}")]
    InvalidConfig(String),
}

/// The characters random mutations draw from. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    chars: Vec<char>,
}

impl Alphabet {
    pub fn new(chars: &str) -> Result<Self, MutatorError> {
        let chars: Vec<char> = chars.chars().collect();
        if chars.is_empty() {
            return Err(MutatorError::InvalidConfig(
                "alphabet must contain at least one character".to_string(),
            ));
        }
        Ok(Self { chars })
    }

    pub fn pick(&self, rng: &mut dyn RngCore) -> char {
        self.chars[rng.random_range(0..self.chars.len())]
    }

    pub fn contains(&self, c: char) -> bool {
        self.chars.contains(&c)
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self {
            chars: DEFAULT_ALPHABET.chars().collect(),
        }
    }
}

/// A named transformation from one input to one or more candidate inputs.
///
/// Mutators hold no state between calls. Any randomness comes from the `rng`
/// passed in, so a seeded generator reproduces the same outputs.
pub trait Mutator {
    fn name(&self) -> &str;

    fn mutate(&self, input: &str, rng: &mut dyn RngCore) -> Result<Vec<String>, MutatorError>;
}

/// A mutator producing exactly one output per call. Lift it into a
/// [`Mutator`] with [`Repeat`].
pub trait VariantMutator {
    fn name(&self) -> &str;

    fn mutate_once(&self, input: &str, rng: &mut dyn RngCore) -> Result<String, MutatorError>;
}

/// Runs a [`VariantMutator`] `count` times on the same input, yielding
/// `count` independently randomized variants.
#[derive(Debug, Clone)]
pub struct Repeat<M> {
    inner: M,
    count: usize,
}

impl<M: VariantMutator> Repeat<M> {
    pub fn new(inner: M, count: usize) -> Self {
        Self { inner, count }
    }
}

impl<M: VariantMutator> Mutator for Repeat<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn mutate(&self, input: &str, rng: &mut dyn RngCore) -> Result<Vec<String>, MutatorError> {
        (0..self.count)
            .map(|_| self.inner.mutate_once(input, rng))
            .collect()
    }
}

/// Replaces every occurrence of a marker token, once per configured replacement.
///
/// A placeholder for input-aware transforms: it only knows one literal token.
#[derive(Debug, Clone)]
pub struct TokenReplaceMutator {
    token: String,
    replacements: Vec<String>,
}

impl TokenReplaceMutator {
    pub fn new(token: impl Into<String>, replacements: Vec<String>) -> Result<Self, MutatorError> {
        let token = token.into();
        if token.is_empty() {
            return Err(MutatorError::InvalidConfig(
                "marker token must not be empty".to_string(),
            ));
        }
        Ok(Self {
            token,
            replacements,
        })
    }
}

impl Mutator for TokenReplaceMutator {
    fn name(&self) -> &str {
        "token-replace"
    }

    fn mutate(&self, input: &str, _rng: &mut dyn RngCore) -> Result<Vec<String>, MutatorError> {
        Ok(self
            .replacements
            .iter()
            .map(|replacement| input.replace(&self.token, replacement))
            .collect())
    }
}

/// Repeatedly picks a character of the input and swaps it for a random
/// alphabet character.
///
/// In [`SubstitutionMode::AllOccurrences`] every occurrence of the picked
/// character value is replaced, so one round can touch many positions.
/// The length in characters never changes.
#[derive(Debug, Clone)]
pub struct SubstituteCharsMutator {
    rounds: usize,
    mode: SubstitutionMode,
    alphabet: Alphabet,
}

impl SubstituteCharsMutator {
    pub fn new(rounds: usize, mode: SubstitutionMode, alphabet: Alphabet) -> Self {
        Self {
            rounds,
            mode,
            alphabet,
        }
    }
}

impl VariantMutator for SubstituteCharsMutator {
    fn name(&self) -> &str {
        "substitute-chars"
    }

    fn mutate_once(&self, input: &str, rng: &mut dyn RngCore) -> Result<String, MutatorError> {
        if input.is_empty() {
            return Err(MutatorError::EmptyInput {
                mutator: self.name().to_string(),
            });
        }

        let mut chars: Vec<char> = input.chars().collect();
        for _ in 0..self.rounds {
            let replacement = self.alphabet.pick(rng);
            let position = rng.random_range(0..chars.len());
            match self.mode {
                SubstitutionMode::AllOccurrences => {
                    let target = chars[position];
                    for c in chars.iter_mut().filter(|c| **c == target) {
                        *c = replacement;
                    }
                }
                SubstitutionMode::SingleOccurrence => chars[position] = replacement,
            }
        }
        Ok(chars.into_iter().collect())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LowercaseMutator;

impl Mutator for LowercaseMutator {
    fn name(&self) -> &str {
        "lowercase"
    }

    fn mutate(&self, input: &str, _rng: &mut dyn RngCore) -> Result<Vec<String>, MutatorError> {
        Ok(vec![input.to_lowercase()])
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UppercaseMutator;

impl Mutator for UppercaseMutator {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn mutate(&self, input: &str, _rng: &mut dyn RngCore) -> Result<Vec<String>, MutatorError> {
        Ok(vec![input.to_uppercase()])
    }
}

/// Emits the input twice, joined by a separator.
#[derive(Debug, Clone)]
pub struct DuplicateMutator {
    separator: String,
}

impl DuplicateMutator {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }
}

impl Default for DuplicateMutator {
    fn default() -> Self {
        Self::new("\n")
    }
}

impl Mutator for DuplicateMutator {
    fn name(&self) -> &str {
        "duplicate"
    }

    fn mutate(&self, input: &str, _rng: &mut dyn RngCore) -> Result<Vec<String>, MutatorError> {
        Ok(vec![format!("{input}{}{input}", self.separator)])
    }
}

/// Deletes a random number of characters, drawn from `min..=max` and capped
/// at the input length, one random index at a time.
#[derive(Debug, Clone)]
pub struct DeleteCharsMutator {
    min: usize,
    max: usize,
}

impl DeleteCharsMutator {
    pub fn new(min: usize, max: usize) -> Result<Self, MutatorError> {
        if max < min {
            return Err(MutatorError::InvalidConfig(format!(
                "delete range [{min}, {max}] is inverted"
            )));
        }
        Ok(Self { min, max })
    }
}

impl VariantMutator for DeleteCharsMutator {
    fn name(&self) -> &str {
        "delete-chars"
    }

    fn mutate_once(&self, input: &str, rng: &mut dyn RngCore) -> Result<String, MutatorError> {
        if input.is_empty() {
            return Err(MutatorError::EmptyInput {
                mutator: self.name().to_string(),
            });
        }

        let mut chars: Vec<char> = input.chars().collect();
        let to_remove = rng.random_range(self.min..=self.max).min(chars.len());
        for _ in 0..to_remove {
            let index = rng.random_range(0..chars.len());
            chars.remove(index);
        }
        Ok(chars.into_iter().collect())
    }
}

/// Inserts `count` random alphabet characters at random positions.
#[derive(Debug, Clone)]
pub struct InsertCharsMutator {
    count: usize,
    alphabet: Alphabet,
}

impl InsertCharsMutator {
    pub fn new(count: usize, alphabet: Alphabet) -> Self {
        Self { count, alphabet }
    }
}

impl VariantMutator for InsertCharsMutator {
    fn name(&self) -> &str {
        "insert-chars"
    }

    fn mutate_once(&self, input: &str, rng: &mut dyn RngCore) -> Result<String, MutatorError> {
        let mut chars: Vec<char> = input.chars().collect();
        for _ in 0..self.count {
            let c = self.alphabet.pick(rng);
            let position = rng.random_range(0..=chars.len());
            chars.insert(position, c);
        }
        Ok(chars.into_iter().collect())
    }
}

/// An ordered registry of mutators.
///
/// Registration order only decides the order of candidates in a batch.
#[derive(Default)]
pub struct MutatorSet {
    mutators: Vec<Box<dyn Mutator>>,
}

impl MutatorSet {
    pub fn new() -> Self {
        Self {
            mutators: Vec::new(),
        }
    }

    /// The default set: token replacement, character substitution, case
    /// transforms, duplication, deletion and insertion.
    pub fn baseline(settings: &MutationSettings) -> Result<Self, MutatorError> {
        let alphabet = Alphabet::new(&settings.alphabet)?;
        let (delete_min, delete_max) = settings.delete_range;

        let mut set = Self::new();
        set.register(TokenReplaceMutator::new(
            settings.marker_token.clone(),
            settings.marker_replacements.clone(),
        )?)
        .register(Repeat::new(
            SubstituteCharsMutator::new(
                settings.substitution_rounds,
                settings.substitution_mode,
                alphabet.clone(),
            ),
            settings.variant_count,
        ))
        .register(LowercaseMutator)
        .register(UppercaseMutator)
        .register(DuplicateMutator::new(settings.duplicate_separator.clone()))
        .register(Repeat::new(
            DeleteCharsMutator::new(delete_min, delete_max)?,
            settings.variant_count,
        ))
        .register(Repeat::new(
            InsertCharsMutator::new(settings.insert_count, alphabet),
            settings.variant_count,
        ));
        Ok(set)
    }

    pub fn register<M: Mutator + 'static>(&mut self, mutator: M) -> &mut Self {
        self.mutators.push(Box::new(mutator));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.mutators.iter().map(|m| m.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Mutator> {
        self.mutators.iter().map(|m| m.as_ref())
    }

    pub fn len(&self) -> usize {
        self.mutators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutators.is_empty()
    }
}
