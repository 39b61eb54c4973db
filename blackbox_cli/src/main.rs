mod seeds;

use blackbox_core::config::BlackboxConfig;
use blackbox_core::coordinator::{RunCoordinator, RunResult};
use blackbox_core::executor::{CommandExecutor, CommandExecutorConfig};
use blackbox_core::mutator::MutatorSet;
use blackbox_core::observer::{ConsoleObserver, RoundObserver};
use blackbox_core::target::TargetDescriptor;

use clap::Parser;
use log::{error, info};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};

const DEFAULT_CONFIG_FILE: &str = "blackbox.toml";

/// Black-box mutation fuzzer: feeds mutated inputs to a command over stdin
/// and reports every input that makes it exit non-zero.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Command to fuzz, its program given relative to the working directory.
    command: String,
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    #[clap(short, long)]
    working_dir: Option<PathBuf>,
    /// Per-execution wait bound in milliseconds; 0 waits forever.
    #[clap(short, long)]
    timeout_ms: Option<u64>,
    /// Seed for the mutation RNG, to replay a previous run.
    #[clap(short, long)]
    rng_seed: Option<u64>,
    /// Seed input; may be repeated.
    #[clap(short = 's', long = "seed")]
    seeds: Vec<String>,
    /// File, or directory of files, to read seed inputs from; may be repeated.
    #[clap(long = "seed-file")]
    seed_files: Vec<PathBuf>,
    /// Abandon a round when the target rejects its seed.
    #[clap(long)]
    skip_invalid_seeds: bool,
}

/// Parses arguments, exiting with status 1 on a usage error.
fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    }
}

fn load_config(cli: &Cli) -> Result<BlackboxConfig, anyhow::Error> {
    match &cli.config_file {
        Some(config_path) => {
            info!("Loading configuration from specified path: {config_path:?}");
            BlackboxConfig::load_from_file(config_path)
        }
        None => {
            let default_config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_config_path.exists() {
                info!("No config file specified, loading default: {default_config_path:?}");
                BlackboxConfig::load_from_file(&default_config_path)
            } else {
                info!(
                    "No config file specified and {DEFAULT_CONFIG_FILE} not found, using built-in defaults"
                );
                Ok(BlackboxConfig::default())
            }
        }
    }
}

/// Command-line flags win over the config file.
fn apply_overrides(config: &mut BlackboxConfig, cli: &Cli) {
    if let Some(working_dir) = &cli.working_dir {
        config.target.working_dir = working_dir.clone();
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.target.timeout_ms = timeout_ms;
    }
    if let Some(rng_seed) = cli.rng_seed {
        config.fuzzer.rng_seed = Some(rng_seed);
    }
    if cli.skip_invalid_seeds {
        config.fuzzer.fuzz_all = false;
    }
    config.fuzzer.seeds.extend(cli.seeds.iter().cloned());
}

fn print_summary(result: &RunResult, elapsed: Duration, rng_seed: u64) {
    println!();
    println!("---------------------Summary---------------------");
    println!(
        "Rounds: {} completed, {} skipped",
        result.rounds_completed(),
        result.rounds_skipped()
    );
    println!("Executions: {} in {elapsed:.2?}", result.executions());
    println!("Non-zero exits: {}", result.non_zero_exits());
    println!("Timeouts: {}", result.timeouts().len());
    println!("Harness errors: {}", result.harness_errors());
    for failure in result.failures() {
        println!(
            "  [{}] exit {} ({}): {:?}",
            failure.input_hash, failure.exit_code, failure.origin, failure.input
        );
    }
    println!("RNG seed: {rng_seed}");
    println!("---------------------Bye---------------------");
}

/// Resolves the target, then runs one round per seed.
///
/// A target that cannot be found aborts before any process is launched.
fn run(
    cli: &Cli,
    config: &BlackboxConfig,
    rng_seed: u64,
) -> Result<RunResult, anyhow::Error> {
    let mut target =
        TargetDescriptor::resolve(cli.command.clone(), config.target.working_dir.clone())?;
    if let Some(shell) = &config.target.shell {
        target = target.with_shell(shell.clone());
    }
    println!("Command: {:?}", target.shell_line());

    let seeds = seeds::collect_seeds(&config.fuzzer.seeds, &cli.seed_files)?;

    let mutators = MutatorSet::baseline(&config.mutation)?;
    info!("Registered mutators: {:?}", mutators.names());

    let executor = CommandExecutor::new(CommandExecutorConfig {
        target,
        timeout: config.target.timeout(),
    });
    let mut coordinator = RunCoordinator::new(Box::new(executor), mutators)
        .with_seed_policy(config.fuzzer.seed_policy());

    let mut rng = ChaCha8Rng::seed_from_u64(rng_seed);
    let mut result = RunResult::default();
    let mut console = ConsoleObserver::new();

    for (i, seed) in seeds.iter().enumerate() {
        println!();
        println!("Validating seed {}/{}: {seed:?}", i + 1, seeds.len());
        let mut observers: Vec<&mut dyn RoundObserver> = vec![&mut console];
        if let Err(e) = coordinator.run_round(seed, &mut rng, &mut result, &mut observers) {
            error!("Round for seed {seed:?} aborted: {e}");
        }
    }

    Ok(result)
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = parse_cli();

    let mut config = load_config(&cli)?;
    apply_overrides(&mut config, &cli);
    config.validate()?;
    info!("Effective configuration: {config:?}");

    let rng_seed = config.fuzzer.rng_seed.unwrap_or_else(rand::random);
    info!("Mutation RNG seed: {rng_seed}");

    let start_time = Instant::now();
    let result = run(&cli, &config, rng_seed)?;
    print_summary(&result, start_time.elapsed(), rng_seed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackbox_core::coordinator::SeedPolicy;
    use blackbox_core::target::TargetError;
    use clap::CommandFactory;
    use clap::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn missing_command_is_a_usage_error() {
        let err = Cli::try_parse_from(["blackbox_cli"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.use_stderr());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "blackbox_cli",
            "--timeout-ms",
            "0",
            "-w",
            "/tmp",
            "-r",
            "42",
            "-s",
            "abc",
            "--seed",
            "def",
            "--skip-invalid-seeds",
            "./target",
        ])
        .unwrap();
        assert_eq!(cli.command, "./target");

        let mut config = BlackboxConfig::default();
        config.fuzzer.seeds.push("from-config".to_string());
        apply_overrides(&mut config, &cli);

        assert_eq!(config.target.timeout(), None);
        assert_eq!(config.target.working_dir, PathBuf::from("/tmp"));
        assert_eq!(config.fuzzer.rng_seed, Some(42));
        assert_eq!(config.fuzzer.seeds, vec!["from-config", "abc", "def"]);
        assert_eq!(config.fuzzer.seed_policy(), SeedPolicy::SkipInvalid);
    }

    #[test]
    fn loads_config_file_from_flag() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mutation]\nvariant-count = 2\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from(["blackbox_cli", "-c", &path, "./target"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.mutation.variant_count, 2);
    }

    #[test]
    fn missing_target_aborts_before_any_round() {
        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().to_str().unwrap().to_string();
        let cli = Cli::try_parse_from([
            "blackbox_cli",
            "-w",
            &working_dir,
            "-s",
            "seed",
            "./no_such_target",
        ])
        .unwrap();
        let mut config = BlackboxConfig::default();
        apply_overrides(&mut config, &cli);

        let err = run(&cli, &config, 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TargetError>(),
            Some(TargetError::CommandNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn run_fuzzes_every_seed_against_resolved_target() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("target.sh");
        std::fs::write(&script, "#!/bin/sh\ngrep -q '<html'\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let working_dir = dir.path().to_str().unwrap().to_string();
        let cli = Cli::try_parse_from([
            "blackbox_cli",
            "-w",
            &working_dir,
            "-s",
            "<html atr=\"hello\"> World </html>",
            "./target.sh",
        ])
        .unwrap();
        let mut config = BlackboxConfig::default();
        apply_overrides(&mut config, &cli);

        let result = run(&cli, &config, 11).unwrap();
        assert_eq!(result.rounds_completed(), 1);
        assert_eq!(result.executions(), 36);
        assert!(
            result
                .failing_inputs()
                .any(|input| input == "<HTML ATR=\"HELLO\"> WORLD </HTML>")
        );
        assert_eq!(result.harness_errors(), 0);
    }
}
