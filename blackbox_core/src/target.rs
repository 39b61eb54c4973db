use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Errors raised while building a [`TargetDescriptor`].
///
/// These are configuration errors: they abort the run before any target
/// process is launched.
#[derive(Error, Debug)]
pub enum TargetError {
    /// The command string was empty or only whitespace.
    #[error("Target command is empty")]
    EmptyCommand,

    /// The program named by the command does not exist in the working directory.
    #[error("Could not find command '{command}' in {working_dir:?}")]
    CommandNotFound {
        command: String,
        working_dir: PathBuf,
    },
}

/// The shell a target command is wrapped in, e.g. `sh -c <cmd>`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct Shell {
    pub program: String,
    pub flag: String,
}

impl Shell {
    pub fn posix() -> Self {
        Self {
            program: "sh".to_string(),
            flag: "-c".to_string(),
        }
    }

    pub fn windows() -> Self {
        Self {
            program: "cmd.exe".to_string(),
            flag: "/c".to_string(),
        }
    }

    /// `cmd.exe /c` on Windows, `sh -c` everywhere else.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Self::windows()
        } else {
            Self::posix()
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Everything needed to launch one instance of the program under test.
///
/// A descriptor is immutable once built. Every call to [`TargetDescriptor::command`]
/// produces an independent `Command`, so each candidate gets a fresh process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    command: String,
    working_dir: PathBuf,
    shell: Shell,
}

impl TargetDescriptor {
    /// Builds a descriptor without checking that the command exists.
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
            shell: Shell::platform_default(),
        }
    }

    /// Builds a descriptor after checking that the program exists in `working_dir`.
    ///
    /// Only the first whitespace-separated token of `command` is treated as the
    /// program path, so `./target --strict` resolves `./target`.
    pub fn resolve(
        command: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Result<Self, TargetError> {
        let command = command.into();
        let working_dir = working_dir.into();

        let program = command
            .split_whitespace()
            .next()
            .ok_or(TargetError::EmptyCommand)?;

        if !working_dir.join(program).exists() {
            return Err(TargetError::CommandNotFound {
                command,
                working_dir,
            });
        }

        Ok(Self {
            command,
            working_dir,
            shell: Shell::platform_default(),
        })
    }

    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.shell = shell;
        self
    }

    pub fn command_line(&self) -> &str {
        &self.command
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    /// The full argv used to launch the target, e.g. `["sh", "-c", "./target"]`.
    pub fn shell_line(&self) -> Vec<String> {
        vec![
            self.shell.program.clone(),
            self.shell.flag.clone(),
            self.command.clone(),
        ]
    }

    /// A fresh `Command` for one launch. Stdio is left to the caller.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.shell.program);
        cmd.arg(&self.shell.flag)
            .arg(&self.command)
            .current_dir(&self.working_dir);
        cmd
    }
}
