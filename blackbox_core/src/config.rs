use crate::coordinator::SeedPolicy;
use crate::mutator::DEFAULT_ALPHABET;
use crate::target::Shell;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SubstitutionMode {
    /// Replace every occurrence of the picked character value.
    #[default]
    AllOccurrences,
    /// Replace only the picked position.
    SingleOccurrence,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct TargetSettings {
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    /// Wait bound per execution in milliseconds; `0` waits forever.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub shell: Option<Shell>,
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("./")
}

fn default_timeout_ms() -> u64 {
    5000
}

impl TargetSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            timeout_ms: default_timeout_ms(),
            shell: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct MutationSettings {
    /// Variants produced by each repeated mutator.
    #[serde(default = "default_ten")]
    pub variant_count: usize,
    #[serde(default = "default_ten")]
    pub substitution_rounds: usize,
    #[serde(default)]
    pub substitution_mode: SubstitutionMode,
    #[serde(default = "default_delete_range")]
    pub delete_range: (usize, usize),
    #[serde(default = "default_ten")]
    pub insert_count: usize,
    #[serde(default = "default_alphabet")]
    pub alphabet: String,
    #[serde(default = "default_marker_token")]
    pub marker_token: String,
    #[serde(default = "default_marker_replacements")]
    pub marker_replacements: Vec<String>,
    #[serde(default = "default_duplicate_separator")]
    pub duplicate_separator: String,
}

fn default_ten() -> usize {
    10
}

fn default_delete_range() -> (usize, usize) {
    (0, 10)
}

fn default_alphabet() -> String {
    DEFAULT_ALPHABET.to_string()
}

fn default_marker_token() -> String {
    "<html".to_string()
}

fn default_marker_replacements() -> Vec<String> {
    vec!["a".to_string(), String::new()]
}

fn default_duplicate_separator() -> String {
    "\n".to_string()
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            variant_count: default_ten(),
            substitution_rounds: default_ten(),
            substitution_mode: SubstitutionMode::default(),
            delete_range: default_delete_range(),
            insert_count: default_ten(),
            alphabet: default_alphabet(),
            marker_token: default_marker_token(),
            marker_replacements: default_marker_replacements(),
            duplicate_separator: default_duplicate_separator(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct FuzzerSettings {
    /// Fuzz a seed even when the target rejects it.
    #[serde(default = "default_fuzz_all")]
    pub fuzz_all: bool,
    #[serde(default)]
    pub rng_seed: Option<u64>,
    #[serde(default)]
    pub seeds: Vec<String>,
}

fn default_fuzz_all() -> bool {
    true
}

impl FuzzerSettings {
    pub fn seed_policy(&self) -> SeedPolicy {
        if self.fuzz_all {
            SeedPolicy::FuzzAll
        } else {
            SeedPolicy::SkipInvalid
        }
    }
}

impl Default for FuzzerSettings {
    fn default() -> Self {
        Self {
            fuzz_all: default_fuzz_all(),
            rng_seed: None,
            seeds: Vec::new(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct BlackboxConfig {
    #[serde(default)]
    pub target: TargetSettings,
    #[serde(default)]
    pub mutation: MutationSettings,
    #[serde(default)]
    pub fuzzer: FuzzerSettings,
}

impl BlackboxConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        Self::from_toml_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Rejects settings the mutators cannot be built from.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let mutation = &self.mutation;
        if mutation.alphabet.is_empty() {
            anyhow::bail!("mutation.alphabet must contain at least one character");
        }
        let (min, max) = mutation.delete_range;
        if max < min {
            anyhow::bail!("mutation.delete-range [{min}, {max}] is inverted");
        }
        if mutation.marker_token.is_empty() {
            anyhow::bail!("mutation.marker-token must not be empty");
        }
        Ok(())
    }
}
