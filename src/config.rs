//! Configuration for the WildFly bot
//!
//! Two layers live here:
//! - [`EngineSettings`]: the names, templates and defaults the engine works
//!   with (policy file name, project key, label names, status contexts,
//!   message templates). Everything is overridable so the engine can be
//!   exercised with other naming schemes.
//! - [`BotConfig`]: process configuration (GitHub endpoint and credentials,
//!   webhook listener, dry-run switch) loaded from an optional TOML file and
//!   `WILDFLY_BOT__*` environment variables.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::debug;

/// Environment variable prefix for process configuration
pub const ENV_PREFIX: &str = "WILDFLY_BOT";

/// Runtime names and templates used by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Policy file name inside `config_dir`
    pub config_file_name: String,

    /// Repository directory holding the policy file
    pub config_dir: String,

    /// Project key used when the policy does not declare one
    pub default_project_key: String,

    /// Default title/commit pattern, `{key}` is replaced by the project key
    pub project_pattern: String,

    /// Title failure message, `{pattern}` is replaced by the effective regex
    pub title_message: String,

    /// Commit failure message, `{pattern}` is replaced by the effective regex
    pub commit_message: String,

    /// Description failure message, `{pattern}` is replaced by the regex
    pub description_message: String,

    /// Header of the aggregated format failure comment
    pub format_comment_header: String,

    /// Label added when the PR needs a rebase
    pub rebase_label: String,

    /// Label added while format checks fail
    pub fix_me_label: String,

    /// Accounts that are never notified and whose PRs skip format checks
    pub bot_logins: Vec<String>,

    /// Status context for policy validity
    pub config_status_context: String,

    /// Status context for format compliance
    pub format_status_context: String,

    /// Status description when the policy is valid / format checks pass
    pub valid_description: String,

    /// Status description when rule ids are missing or duplicated
    pub invalid_config_description: String,

    /// Status description when the policy cannot be parsed
    pub unparsable_config_description: String,

    /// Administrator email subject
    pub email_subject: String,

    /// Administrator email body, `{file}`, `{url}` and `{problems}` are replaced
    pub email_template: String,

    /// Prefix of every log line replacing a mutating call in dry-run mode
    pub dry_run_marker: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            config_file_name: "wildfly-bot.yml".to_string(),
            config_dir: ".github".to_string(),
            default_project_key: "WFLY".to_string(),
            project_pattern: "{key}-\\d+".to_string(),
            title_message:
                "Wrong content of the title. It does not satisfy the following regex pattern: [{pattern}]"
                    .to_string(),
            commit_message:
                "None of the commit messages satisfy the following regex pattern: [{pattern}]"
                    .to_string(),
            description_message:
                "The PR description does not satisfy the following regex pattern: [{pattern}]"
                    .to_string(),
            format_comment_header: "The following checks failed:".to_string(),
            rebase_label: "rebase-this".to_string(),
            fix_me_label: "fix-me".to_string(),
            bot_logins: vec!["dependabot[bot]".to_string()],
            config_status_context: "Configuration File".to_string(),
            format_status_context: "Format".to_string(),
            valid_description: "Valid".to_string(),
            invalid_config_description:
                "Rule is missing an id or multiple rules have the same id.".to_string(),
            unparsable_config_description: "Unable to parse the configuration file.".to_string(),
            email_subject: "Unsuccessful installation of Wildfly Bot Application".to_string(),
            email_template: "Hello,\n\nThe configuration file {file} has some invalid rules in the following github repository: {url} . The following problems were detected. {problems}\n\nThis is generated message, please do not respond."
                .to_string(),
            dry_run_marker: "[DRY RUN]".to_string(),
        }
    }
}

impl EngineSettings {
    /// Repository-relative path of the policy file
    pub fn config_path(&self) -> String {
        if self.config_dir.is_empty() {
            self.config_file_name.clone()
        } else {
            format!(
                "{}/{}",
                self.config_dir.trim_end_matches('/'),
                self.config_file_name
            )
        }
    }

    /// Default title/commit pattern for a project key
    pub fn default_pattern(&self, project_key: &str) -> String {
        self.project_pattern
            .replace("{key}", &regex::escape(project_key))
    }

    /// Whether the login belongs to a known bot account
    pub fn is_bot(&self, login: &str) -> bool {
        self.bot_logins.iter().any(|bot| bot == login)
    }

    /// Render the administrator email body
    pub fn render_email(&self, repository_url: &str, problems: &str) -> String {
        self.email_template
            .replace("{file}", &self.config_file_name)
            .replace("{url}", repository_url)
            .replace("{problems}", problems)
    }
}

/// GitHub endpoint and credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    /// REST API base URL
    pub api_url: String,

    /// Installation or personal access token
    pub token: Option<String>,

    /// Shared secret for `X-Hub-Signature-256` verification
    pub webhook_secret: Option<String>,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token: None,
            webhook_secret: None,
        }
    }
}

/// Webhook listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address
    pub addr: SocketAddr,

    /// Validate every installed repository's policy on startup
    pub reconcile_on_startup: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 8080).into(),
            reconcile_on_startup: true,
        }
    }
}

/// Process configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub github: GitHubSettings,
    pub server: ServerSettings,

    /// Log mutating calls instead of performing them
    pub dry_run: bool,

    pub engine: EngineSettings,
}

impl BotConfig {
    /// Load configuration from an optional file plus the environment
    ///
    /// Environment variables win over the file, e.g.
    /// `WILDFLY_BOT__GITHUB__TOKEN` or `WILDFLY_BOT__DRY_RUN=true`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
