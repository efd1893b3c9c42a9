use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use wikisync_core::{GitService, ServiceError};

use crate::command::{GitCommand, GitError};
use crate::status::GitStatus;

pub const DEFAULT_COMMIT_MESSAGE: &str = "Sync wiki changes";

/// [`GitService`] backed by the git command line
#[derive(Debug, Clone)]
pub struct GitCli {
    git: GitCommand,
    commit_message: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            git: GitCommand::default(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }

    pub fn with_binary(mut self, binary: PathBuf) -> Self {
        self.git = GitCommand::new(binary);
        self
    }

    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = message.into();
        self
    }

    /// Status of the working tree, untracked files listed individually
    pub async fn status(&self, folder: &Path) -> Result<GitStatus, GitError> {
        self.ensure_repo(folder).await?;
        let output = self
            .git
            .run_killable(folder, &["status", "--porcelain=v1", "-z", "-uall"])
            .await?
            .check("status")?;

        let status = GitStatus::parse_porcelain(&output.stdout);
        debug!(
            folder = %folder.display(),
            changes = status.total_changes(),
            "Captured git status"
        );
        Ok(status)
    }

    /// Stage everything, commit if needed, rebase onto the remote and push.
    pub async fn sync(&self, folder: &Path, remote_url: &str) -> Result<(), GitError> {
        self.ensure_repo(folder).await?;

        self.git.run(folder, &["add", "-A"]).await?.check("add")?;

        // Exit code 1 means the index differs from HEAD
        let staged = self
            .git
            .run_killable(folder, &["diff", "--cached", "--quiet"])
            .await?;
        match staged.exit_code {
            0 => debug!(folder = %folder.display(), "Nothing to commit"),
            1 => {
                self.git
                    .run(folder, &["commit", "-m", &self.commit_message])
                    .await?
                    .check("commit")?;
                info!(folder = %folder.display(), "Committed local changes");
            }
            _ => {
                staged.check("diff")?;
            }
        }

        let branch = self.current_branch(folder).await?;

        // Exit code 2 means the remote has no such branch yet
        let head_ref = remote_head_ref(&branch);
        let remote_head = self
            .git
            .run_killable(
                folder,
                &["ls-remote", "--exit-code", remote_url, &head_ref],
            )
            .await?;
        match remote_head.exit_code {
            0 => {
                self.git
                    .run(folder, &["pull", "--rebase", remote_url, &branch])
                    .await?
                    .check("pull")?;
            }
            2 => debug!(branch = %branch, "Remote branch missing, skipping pull"),
            _ => {
                remote_head.check("ls-remote")?;
            }
        }

        let refspec = format!("HEAD:{}", branch);
        self.git
            .run(folder, &["push", remote_url, &refspec])
            .await?
            .check("push")?;

        info!(folder = %folder.display(), branch = %branch, "Pushed to remote");
        Ok(())
    }

    async fn ensure_repo(&self, folder: &Path) -> Result<(), GitError> {
        let output = self
            .git
            .run_killable(folder, &["rev-parse", "--is-inside-work-tree"])
            .await?;
        if output.success() && output.stdout.trim() == "true" {
            Ok(())
        } else {
            Err(GitError::NotARepo(folder.display().to_string()))
        }
    }

    async fn current_branch(&self, folder: &Path) -> Result<String, GitError> {
        let output = self
            .git
            .run_killable(folder, &["symbolic-ref", "--short", "-q", "HEAD"])
            .await?;
        let branch = output.stdout.trim();
        if output.success() && !branch.is_empty() {
            Ok(branch.to_string())
        } else {
            Err(GitError::DetachedHead(folder.display().to_string()))
        }
    }
}

/// Full ref name, so `ls-remote` matches the branch exactly rather than any
/// ref ending in it
fn remote_head_ref(branch: &str) -> String {
    format!("refs/heads/{}", branch)
}

fn unavailable_or(e: GitError, fallback: fn(String) -> ServiceError) -> ServiceError {
    match e {
        GitError::Spawn(err) => ServiceError::Unavailable(format!("Failed to run git: {}", err)),
        other => fallback(other.to_string()),
    }
}

#[async_trait]
impl GitService for GitCli {
    async fn get_modified_file_list(&self, folder: &str) -> Result<Vec<String>, ServiceError> {
        self.status(Path::new(folder))
            .await
            .map(|status| status.paths())
            .map_err(|e| unavailable_or(e, ServiceError::Failed))
    }

    async fn commit_and_sync(&self, folder: &str, remote_url: &str) -> Result<(), ServiceError> {
        self.sync(Path::new(folder), remote_url)
            .await
            .map_err(|e| unavailable_or(e, ServiceError::Sync))
    }
}
