//! Common test utilities and helpers
//!
//! In-memory recording implementations of the platform, probe and mailer
//! interfaces, shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use wildfly_bot_core::platform::{CommitState, CommitStatus, InstalledRepository, Mail};
use wildfly_bot_core::{
    BotError, DirectoryProbe, EngineSettings, Mailer, Platform, PullRequestHandler,
    PullRequestSnapshot, RepositoryRef, Result,
};

pub const TEST_REPO: &str = "xstefank/wildfly";
pub const HEAD_SHA: &str = "5db0f8e923d84fe05c2ee6bc15c1b4fb2a0ce3d7";
pub const VALID_TITLE: &str = "[WFLY-12345] Valid pull request title";
pub const INVALID_TITLE: &str = "Invalid pull request title";

pub fn repo() -> RepositoryRef {
    RepositoryRef::parse(TEST_REPO).expect("valid repository name")
}

/// An opened PR as the webhook payload describes it
pub fn pr_event() -> PullRequestSnapshot {
    PullRequestSnapshot::new(repo(), 1, HEAD_SHA)
        .with_author("xstefank")
        .with_title(VALID_TITLE)
        .with_body("Pull request body")
}

/// Mutating call recorded by [`FakePlatform`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Status {
        sha: String,
        state: CommitState,
        description: String,
        context: String,
    },
    Comment(String),
    RequestReviewers(Vec<String>),
    AddLabel(String),
    RemoveLabel(String),
}

/// Recording platform backed by fixed data
#[derive(Default)]
pub struct FakePlatform {
    policies: HashMap<String, String>,
    repositories: Vec<InstalledRepository>,
    files: Vec<String>,
    commits: Vec<String>,
    reviewers: Vec<String>,
    collaborators: HashSet<String>,
    mergeable: Option<bool>,
    rejected_reviewers: HashSet<String>,
    policy_refs: Mutex<Vec<String>>,
    calls: Mutex<Vec<Call>>,
}

fn owned<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy served for `TEST_REPO`
    pub fn with_policy(self, yaml: &str) -> Self {
        self.with_repository_policy(TEST_REPO, yaml)
    }

    pub fn with_repository_policy(mut self, full_name: &str, yaml: &str) -> Self {
        self.policies.insert(full_name.to_string(), yaml.to_string());
        self
    }

    pub fn with_installed(mut self, full_name: &str) -> Self {
        self.repositories.push(InstalledRepository {
            repository: RepositoryRef::parse(full_name).expect("valid repository name"),
            default_branch: "main".to_string(),
        });
        self
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = owned(files);
        self
    }

    pub fn with_commits<I, S>(mut self, commits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commits = owned(commits);
        self
    }

    pub fn with_reviewers<I, S>(mut self, reviewers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reviewers = owned(reviewers);
        self
    }

    pub fn with_collaborators<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collaborators = owned(users).into_iter().collect();
        self
    }

    /// Mergeability reported when the event payload leaves it open
    pub fn with_mergeable(mut self, mergeable: bool) -> Self {
        self.mergeable = Some(mergeable);
        self
    }

    pub fn labels_added(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AddLabel(label) => Some(label),
                _ => None,
            })
            .collect()
    }

    pub fn labels_removed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::RemoveLabel(label) => Some(label),
                _ => None,
            })
            .collect()
    }

    /// Logins the platform refuses to add as reviewers
    pub fn rejecting_reviewers<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rejected_reviewers = owned(users).into_iter().collect();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn policy_refs(&self) -> Vec<String> {
        self.policy_refs.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Status { .. }))
            .collect()
    }

    pub fn comments(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Comment(body) => Some(body),
                _ => None,
            })
            .collect()
    }

    /// One entry per review request call
    pub fn review_requests(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::RequestReviewers(logins) => Some(logins),
                _ => None,
            })
            .collect()
    }

    pub fn requested_logins(&self) -> HashSet<String> {
        self.review_requests().into_iter().flatten().collect()
    }

    pub fn has_status(&self, state: CommitState, description: &str, context: &str) -> bool {
        self.statuses().iter().any(|c| {
            matches!(c, Call::Status { sha, state: s, description: d, context: ctx }
                if sha == HEAD_SHA && *s == state && d == description && ctx == context)
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn fetch_policy(&self, repository: &RepositoryRef, git_ref: &str) -> Result<Option<String>> {
        self.policy_refs.lock().unwrap().push(git_ref.to_string());
        Ok(self.policies.get(&repository.full_name()).cloned())
    }

    async fn changed_files(&self, _: &RepositoryRef, _: u64) -> Result<Vec<String>> {
        Ok(self.files.clone())
    }

    async fn commit_messages(&self, _: &RepositoryRef, _: u64) -> Result<Vec<String>> {
        Ok(self.commits.clone())
    }

    async fn mergeable(&self, _: &RepositoryRef, _: u64) -> Result<Option<bool>> {
        Ok(self.mergeable)
    }

    async fn existing_reviewers(&self, _: &RepositoryRef, _: u64) -> Result<Vec<String>> {
        Ok(self.reviewers.clone())
    }

    async fn is_collaborator(&self, _: &RepositoryRef, login: &str) -> Result<bool> {
        Ok(self.collaborators.contains(login))
    }

    async fn list_repositories(&self) -> Result<Vec<InstalledRepository>> {
        Ok(self.repositories.clone())
    }

    async fn create_commit_status(
        &self,
        _: &RepositoryRef,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<()> {
        self.record(Call::Status {
            sha: sha.to_string(),
            state: status.state,
            description: status.description.clone(),
            context: status.context.clone(),
        });
        Ok(())
    }

    async fn comment(&self, _: &RepositoryRef, _: u64, body: &str) -> Result<()> {
        self.record(Call::Comment(body.to_string()));
        Ok(())
    }

    async fn request_reviewers(&self, _: &RepositoryRef, _: u64, logins: &[String]) -> Result<()> {
        if logins.iter().any(|l| self.rejected_reviewers.contains(l)) {
            return Err(BotError::platform(
                "request_reviewers",
                "422: Reviews may only be requested from collaborators",
            ));
        }
        self.record(Call::RequestReviewers(logins.to_vec()));
        Ok(())
    }

    async fn add_label(&self, _: &RepositoryRef, _: u64, label: &str) -> Result<()> {
        self.record(Call::AddLabel(label.to_string()));
        Ok(())
    }

    async fn remove_label(&self, _: &RepositoryRef, _: u64, label: &str) -> Result<()> {
        self.record(Call::RemoveLabel(label.to_string()));
        Ok(())
    }
}

/// Repository tree answering existence queries
#[derive(Default)]
pub struct FakeProbe {
    paths: HashSet<String>,
    queries: Mutex<Vec<(String, String)>>,
}

impl FakeProbe {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: owned(paths).into_iter().collect(),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Queried paths in order
    pub fn queried(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn queried_refs(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, git_ref)| git_ref.clone())
            .collect()
    }
}

#[async_trait]
impl DirectoryProbe for FakeProbe {
    async fn path_exists(&self, _: &RepositoryRef, path: &str, git_ref: &str) -> Result<bool> {
        self.queries
            .lock()
            .unwrap()
            .push((path.to_string(), git_ref.to_string()));
        Ok(self.paths.contains(path))
    }
}

/// Mailbox collecting every sent mail
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Mail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<Mail> {
        self.sent().into_iter().filter(|m| m.to == address).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &Mail) -> Result<()> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

pub fn handler(platform: &Arc<FakePlatform>, probe: &Arc<FakeProbe>, dry_run: bool) -> PullRequestHandler {
    PullRequestHandler::new(
        platform.clone(),
        probe.clone(),
        EngineSettings::default(),
        dry_run,
    )
}
