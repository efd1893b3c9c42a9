//! # wikisync-git
//!
//! Git CLI backend for wikisync.
//!
//! [`GitCli`] implements [`wikisync_core::GitService`] by running the `git`
//! executable. It lists modified files with `git status` and syncs a folder
//! by committing, rebasing onto the remote branch and pushing.
//!
//! ## Key Types
//!
//! - [`GitCli`] - The service implementation
//! - [`GitStatus`] - Parsed porcelain status
//! - [`GitError`] - Failures, naming the git step that failed

mod cli;
mod command;
mod status;

pub use cli::{GitCli, DEFAULT_COMMIT_MESSAGE};
pub use command::{GitCommand, GitError, GitOutput};
pub use status::{GitStatus, StatusEntry};
