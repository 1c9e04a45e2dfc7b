//! Hosting platform and mail interfaces
//!
//! The engine never talks to GitHub or a mail server directly. The event
//! adapter, the outcome emitter and the installation reconciler receive these
//! collaborators through their constructors.

pub mod github;
pub mod mailer;

pub use github::GitHubClient;
pub use mailer::LogMailer;

use crate::error::Result;
use crate::snapshot::RepositoryRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Commit status state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Success,
    Error,
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitState::Success => f.write_str("SUCCESS"),
            CommitState::Error => f.write_str("ERROR"),
        }
    }
}

/// A commit status to attach to the PR head
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStatus {
    pub state: CommitState,
    pub target_url: String,
    pub description: String,
    pub context: String,
}

/// A repository the application is installed into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRepository {
    pub repository: RepositoryRef,
    pub default_branch: String,
}

/// Outbound administrator email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Existence check for paths declared in rule scopes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryProbe: Send + Sync {
    /// Whether `path` exists as a file or directory at `git_ref`
    async fn path_exists(&self, repository: &RepositoryRef, path: &str, git_ref: &str)
        -> Result<bool>;
}

/// Hosting platform operations used by the bot
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Platform: Send + Sync {
    /// Raw policy file content at `git_ref`, `None` when the file is absent
    async fn fetch_policy(&self, repository: &RepositoryRef, git_ref: &str)
        -> Result<Option<String>>;

    /// Paths touched by the pull request
    async fn changed_files(&self, repository: &RepositoryRef, number: u64) -> Result<Vec<String>>;

    /// Messages of every commit on the pull request
    async fn commit_messages(&self, repository: &RepositoryRef, number: u64)
        -> Result<Vec<String>>;

    /// Current mergeability, `None` while the platform is still computing it
    async fn mergeable(&self, repository: &RepositoryRef, number: u64) -> Result<Option<bool>>;

    /// Requested reviewers plus users who already submitted a review
    async fn existing_reviewers(&self, repository: &RepositoryRef, number: u64)
        -> Result<Vec<String>>;

    async fn is_collaborator(&self, repository: &RepositoryRef, login: &str) -> Result<bool>;

    /// Repositories accessible to the installation
    async fn list_repositories(&self) -> Result<Vec<InstalledRepository>>;

    async fn create_commit_status(
        &self,
        repository: &RepositoryRef,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<()>;

    async fn comment(&self, repository: &RepositoryRef, number: u64, body: &str) -> Result<()>;

    async fn request_reviewers(
        &self,
        repository: &RepositoryRef,
        number: u64,
        logins: &[String],
    ) -> Result<()>;

    async fn add_label(&self, repository: &RepositoryRef, number: u64, label: &str) -> Result<()>;

    async fn remove_label(&self, repository: &RepositoryRef, number: u64, label: &str)
        -> Result<()>;
}

/// Outbound email delivery
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &Mail) -> Result<()>;
}
