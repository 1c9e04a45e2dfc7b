//! GitHub REST implementation of the platform interfaces

use super::{CommitStatus, DirectoryProbe, InstalledRepository, Platform};
use crate::config::{EngineSettings, GitHubSettings};
use crate::error::{BotError, Result};
use crate::snapshot::RepositoryRef;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const PER_PAGE: usize = 100;
/// GitHub stops listing PR files after 3000 entries
const MAX_PAGES: usize = 30;
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

/// GitHub REST client
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: Url,
    config_path: String,
}

#[derive(Debug, Deserialize)]
struct PrFile {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct PrCommit {
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestState {
    mergeable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RequestedReviewers {
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct Review {
    user: Option<User>,
}

#[derive(Debug, Deserialize)]
struct InstallationRepositories {
    repositories: Vec<InstallationRepository>,
}

#[derive(Debug, Deserialize)]
struct InstallationRepository {
    full_name: String,
    default_branch: String,
}

#[derive(Debug, Serialize)]
struct StatusRequest<'a> {
    state: super::CommitState,
    target_url: &'a str,
    description: &'a str,
    context: &'a str,
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct ReviewersRequest<'a> {
    reviewers: &'a [String],
}

#[derive(Debug, Serialize)]
struct LabelsRequest<'a> {
    labels: [&'a str; 1],
}

impl GitHubClient {
    /// Create a client for the configured API endpoint
    pub fn new(github: &GitHubSettings, engine: &EngineSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("wildfly-bot"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );

        match github.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| BotError::Other(format!("Invalid GitHub token: {}", e)))?;
                headers.insert(AUTHORIZATION, value);
            }
            None => warn!("No GitHub token configured, requests are unauthenticated"),
        }

        let api_url = Url::parse(&github.api_url)
            .map_err(|e| BotError::Other(format!("Invalid GitHub API URL '{}': {}", github.api_url, e)))?;

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_url,
            config_path: engine.config_path(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| BotError::Other(format!("API URL {} cannot be a base", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn repo_url(&self, repository: &RepositoryRef, rest: &[&str]) -> Result<Url> {
        let mut segments = vec!["repos", repository.owner.as_str(), repository.name.as_str()];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("GitHub {} {}", method, url);
        self.client.request(method, url)
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BotError::platform(operation, format!("{}: {}", status, body)))
    }

    /// Fetch every page of a list endpoint
    async fn get_paged<T: DeserializeOwned>(&self, operation: &str, url: Url) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let request = self.request(Method::GET, url.clone()).query(&[
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ]);
            let batch: Vec<T> = self.send(operation, request).await?.json().await?;
            let done = batch.len() < PER_PAGE;
            items.extend(batch);
            if done {
                break;
            }
        }
        Ok(items)
    }

    /// GET returning `None` on 404
    async fn get_optional(&self, operation: &str, request: RequestBuilder) -> Result<Option<Response>> {
        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response)),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(BotError::platform(operation, format!("{}: {}", status, body)))
            }
        }
    }

    fn contents_url(&self, repository: &RepositoryRef, path: &str) -> Result<Url> {
        let mut rest = vec!["contents"];
        rest.extend(path.split('/').filter(|s| !s.is_empty()));
        self.repo_url(repository, &rest)
    }
}

#[async_trait]
impl DirectoryProbe for GitHubClient {
    async fn path_exists(&self, repository: &RepositoryRef, path: &str, git_ref: &str) -> Result<bool> {
        let url = self.contents_url(repository, path)?;
        let request = self
            .request(Method::GET, url)
            .query(&[("ref", git_ref)]);
        Ok(self.get_optional("get_content", request).await?.is_some())
    }
}

#[async_trait]
impl Platform for GitHubClient {
    async fn fetch_policy(&self, repository: &RepositoryRef, git_ref: &str) -> Result<Option<String>> {
        let url = self.contents_url(repository, &self.config_path)?;
        let request = self
            .request(Method::GET, url)
            .header(ACCEPT, RAW_MEDIA_TYPE)
            .query(&[("ref", git_ref)]);

        match self.get_optional("fetch_policy", request).await? {
            Some(response) => Ok(Some(response.text().await?)),
            None => {
                debug!("No {} in {} at {}", self.config_path, repository, git_ref);
                Ok(None)
            }
        }
    }

    async fn changed_files(&self, repository: &RepositoryRef, number: u64) -> Result<Vec<String>> {
        let number = number.to_string();
        let url = self.repo_url(repository, &["pulls", &number, "files"])?;
        let files: Vec<PrFile> = self.get_paged("list_files", url).await?;
        Ok(files.into_iter().map(|f| f.filename).collect())
    }

    async fn commit_messages(&self, repository: &RepositoryRef, number: u64) -> Result<Vec<String>> {
        let number = number.to_string();
        let url = self.repo_url(repository, &["pulls", &number, "commits"])?;
        let commits: Vec<PrCommit> = self.get_paged("list_commits", url).await?;
        Ok(commits.into_iter().map(|c| c.commit.message).collect())
    }

    async fn mergeable(&self, repository: &RepositoryRef, number: u64) -> Result<Option<bool>> {
        let number = number.to_string();
        let url = self.repo_url(repository, &["pulls", &number])?;
        let state: PullRequestState = self
            .send("get_pull_request", self.request(Method::GET, url))
            .await?
            .json()
            .await?;
        Ok(state.mergeable)
    }

    async fn existing_reviewers(&self, repository: &RepositoryRef, number: u64) -> Result<Vec<String>> {
        let number = number.to_string();

        let url = self.repo_url(repository, &["pulls", &number, "requested_reviewers"])?;
        let requested: RequestedReviewers = self
            .send("list_requested_reviewers", self.request(Method::GET, url))
            .await?
            .json()
            .await?;

        let url = self.repo_url(repository, &["pulls", &number, "reviews"])?;
        let reviews: Vec<Review> = self.get_paged("list_reviews", url).await?;

        let mut logins: Vec<String> = requested.users.into_iter().map(|u| u.login).collect();
        for login in reviews.into_iter().filter_map(|r| r.user.map(|u| u.login)) {
            if !logins.contains(&login) {
                logins.push(login);
            }
        }
        Ok(logins)
    }

    async fn is_collaborator(&self, repository: &RepositoryRef, login: &str) -> Result<bool> {
        let url = self.repo_url(repository, &["collaborators", login])?;
        let request = self.request(Method::GET, url);
        Ok(self.get_optional("check_collaborator", request).await?.is_some())
    }

    async fn list_repositories(&self) -> Result<Vec<InstalledRepository>> {
        let url = self.url(&["installation", "repositories"])?;
        let mut repositories = Vec::new();

        for page in 1..=MAX_PAGES {
            let request = self.request(Method::GET, url.clone()).query(&[
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ]);
            let batch: InstallationRepositories = self
                .send("list_installation_repositories", request)
                .await?
                .json()
                .await?;
            let done = batch.repositories.len() < PER_PAGE;

            for repo in batch.repositories {
                match RepositoryRef::parse(&repo.full_name) {
                    Some(repository) => repositories.push(InstalledRepository {
                        repository,
                        default_branch: repo.default_branch,
                    }),
                    None => warn!("Skipping repository with unexpected name '{}'", repo.full_name),
                }
            }
            if done {
                break;
            }
        }

        Ok(repositories)
    }

    async fn create_commit_status(
        &self,
        repository: &RepositoryRef,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<()> {
        let url = self.repo_url(repository, &["statuses", sha])?;
        let body = StatusRequest {
            state: status.state,
            target_url: &status.target_url,
            description: &status.description,
            context: &status.context,
        };
        self.send("create_commit_status", self.request(Method::POST, url).json(&body))
            .await?;
        Ok(())
    }

    async fn comment(&self, repository: &RepositoryRef, number: u64, body: &str) -> Result<()> {
        let number = number.to_string();
        let url = self.repo_url(repository, &["issues", &number, "comments"])?;
        self.send(
            "comment",
            self.request(Method::POST, url).json(&CommentRequest { body }),
        )
        .await?;
        Ok(())
    }

    async fn request_reviewers(
        &self,
        repository: &RepositoryRef,
        number: u64,
        logins: &[String],
    ) -> Result<()> {
        let number = number.to_string();
        let url = self.repo_url(repository, &["pulls", &number, "requested_reviewers"])?;
        self.send(
            "request_reviewers",
            self.request(Method::POST, url)
                .json(&ReviewersRequest { reviewers: logins }),
        )
        .await?;
        Ok(())
    }

    async fn add_label(&self, repository: &RepositoryRef, number: u64, label: &str) -> Result<()> {
        let number = number.to_string();
        let url = self.repo_url(repository, &["issues", &number, "labels"])?;
        self.send(
            "add_label",
            self.request(Method::POST, url)
                .json(&LabelsRequest { labels: [label] }),
        )
        .await?;
        Ok(())
    }

    async fn remove_label(&self, repository: &RepositoryRef, number: u64, label: &str) -> Result<()> {
        let number = number.to_string();
        let url = self.repo_url(repository, &["issues", &number, "labels", label])?;
        // Already gone is fine
        self.get_optional("remove_label", self.request(Method::DELETE, url))
            .await?;
        Ok(())
    }
}
