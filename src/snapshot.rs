//! Per-event view of a pull request
//!
//! The snapshot is assembled once by the event adapter from webhook payload
//! data plus platform reads, and is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Repository coordinates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/name`
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Clone URL of the repository, used in administrator messages
    pub fn http_transport_url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Pull request webhook action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrAction {
    Opened,
    Edited,
    Synchronize,
    Reopened,
    ReadyForReview,
    #[serde(other)]
    Other,
}

impl PrAction {
    /// Actions that change title, body, commits or files
    pub fn triggers_evaluation(&self) -> bool {
        !matches!(self, PrAction::Other)
    }
}

/// Immutable view of the pull request being evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSnapshot {
    pub repository: RepositoryRef,
    pub number: u64,
    pub action: PrAction,
    pub head_sha: String,
    pub base_ref: String,
    pub author: String,
    pub title: String,
    pub body: String,
    /// Repository-relative, forward-slash separated paths
    pub changed_files: Vec<String>,
    pub commit_messages: Vec<String>,
    /// Requested reviewers plus users who already reviewed
    pub existing_reviewers: BTreeSet<String>,
    /// Notify targets the platform confirmed as collaborators
    pub collaborators: BTreeSet<String>,
    pub labels: BTreeSet<String>,
    /// `None` while the platform is still computing mergeability
    pub mergeable: Option<bool>,
}

impl PullRequestSnapshot {
    /// Minimal snapshot; the remaining fields are filled by the builder methods
    pub fn new(repository: RepositoryRef, number: u64, head_sha: impl Into<String>) -> Self {
        Self {
            repository,
            number,
            action: PrAction::Opened,
            head_sha: head_sha.into(),
            base_ref: "main".to_string(),
            author: String::new(),
            title: String::new(),
            body: String::new(),
            changed_files: Vec::new(),
            commit_messages: Vec::new(),
            existing_reviewers: BTreeSet::new(),
            collaborators: BTreeSet::new(),
            labels: BTreeSet::new(),
            mergeable: None,
        }
    }

    pub fn with_action(mut self, action: PrAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_changed_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changed_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_commit_messages<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commit_messages = messages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_existing_reviewers<I, S>(mut self, reviewers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.existing_reviewers = reviewers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_collaborators<I, S>(mut self, collaborators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collaborators = collaborators.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mergeable(mut self, mergeable: Option<bool>) -> Self {
        self.mergeable = mergeable;
        self
    }
}
