use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository: {0}")]
    NotARepo(String),

    #[error("Failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {step} failed (exit code {code}): {stderr}")]
    CommandFailed {
        step: String,
        code: i32,
        stderr: String,
    },

    #[error("HEAD is detached in {0}, no branch to sync")]
    DetachedHead(String),
}

/// Output captured from a git invocation
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into [`GitError::CommandFailed`]
    pub fn check(self, step: &str) -> Result<Self, GitError> {
        if self.success() {
            Ok(self)
        } else {
            Err(GitError::CommandFailed {
                step: step.to_string(),
                code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs the git executable inside one working directory
#[derive(Debug, Clone)]
pub struct GitCommand {
    binary: PathBuf,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self::new(PathBuf::from("git"))
    }
}

impl GitCommand {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Run git and capture its output, whatever the exit code.
    ///
    /// The process outlives a dropped future and runs to completion with its
    /// output still read, so a step that writes to the repository never stops
    /// halfway with `index.lock` held or a rebase in progress.
    pub async fn run(&self, working_dir: &Path, args: &[&str]) -> Result<GitOutput, GitError> {
        self.execute(working_dir, args, false).await
    }

    /// Like [`GitCommand::run`], but the process is killed when the future
    /// is dropped. Only for steps that leave the repository untouched.
    pub async fn run_killable(
        &self,
        working_dir: &Path,
        args: &[&str],
    ) -> Result<GitOutput, GitError> {
        self.execute(working_dir, args, true).await
    }

    async fn execute(
        &self,
        working_dir: &Path,
        args: &[&str],
        kill_on_drop: bool,
    ) -> Result<GitOutput, GitError> {
        let start = Instant::now();

        debug!(
            args = ?args,
            working_dir = %working_dir.display(),
            kill_on_drop,
            "Running git"
        );

        let child = Command::new(&self.binary)
            .args(args)
            .current_dir(working_dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null()) // Non-interactive
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(kill_on_drop)
            .spawn()?;

        let output = if kill_on_drop {
            child.wait_with_output().await?
        } else {
            // A detached task keeps draining the pipes, so git never hits a
            // closed stdout or stderr after the caller has gone
            tokio::spawn(child.wait_with_output())
                .await
                .map_err(std::io::Error::other)??
        };

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(
            exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "git completed"
        );

        Ok(GitOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        })
    }
}
