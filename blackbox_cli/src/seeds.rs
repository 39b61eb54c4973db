use anyhow::Context;
use log::info;
use std::path::{Path, PathBuf};

pub const HTML_SIMPLE: &str = "<html atr=\"hello\"> World </html>";

/// Seeds used when neither the config nor the command line provides any.
pub const SAMPLE_SEEDS: [&str; 2] = ["<<>", HTML_SIMPLE];

fn read_seed(path: &Path) -> Result<String, anyhow::Error> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read seed file {path:?}"))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Reads every seed file; directories contribute each regular, non-hidden
/// file they contain, in name order.
pub fn load_seed_files(paths: &[PathBuf]) -> Result<Vec<String>, anyhow::Error> {
    let mut seeds = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries = Vec::new();
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("Failed to list seed directory {path:?}"))?
            {
                let file_path = entry?.path();
                let hidden = file_path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with('.'));
                if file_path.is_file() && !hidden {
                    entries.push(file_path);
                }
            }
            entries.sort();
            for file_path in entries {
                seeds.push(read_seed(&file_path)?);
            }
        } else {
            seeds.push(read_seed(path)?);
        }
    }
    Ok(seeds)
}

/// Configured seeds, then seed files, falling back to [`SAMPLE_SEEDS`].
pub fn collect_seeds(
    configured: &[String],
    seed_files: &[PathBuf],
) -> Result<Vec<String>, anyhow::Error> {
    let mut seeds = configured.to_vec();
    seeds.extend(load_seed_files(seed_files)?);
    if seeds.is_empty() {
        info!("No seeds configured, using built-in samples");
        seeds = SAMPLE_SEEDS.iter().map(|s| s.to_string()).collect();
    }
    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_samples() {
        let seeds = collect_seeds(&[], &[]).unwrap();
        assert_eq!(seeds, vec!["<<>", HTML_SIMPLE]);
    }

    #[test]
    fn configured_seeds_come_before_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.txt");
        std::fs::write(&file, "from file").unwrap();

        let seeds = collect_seeds(&["inline".to_string()], &[file]).unwrap();
        assert_eq!(seeds, vec!["inline", "from file"]);
    }

    #[test]
    fn directories_skip_dotfiles_and_sort_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.html"), "second").unwrap();
        std::fs::write(dir.path().join("a.html"), "first").unwrap();
        std::fs::write(dir.path().join(".hidden"), "skipped").unwrap();

        let seeds = load_seed_files(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(seeds, vec!["first", "second"]);
    }

    #[test]
    fn missing_seed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_seed_files(&[dir.path().join("nope.txt")]).unwrap_err();
        assert!(err.to_string().contains("Failed to read seed file"));
    }
}
