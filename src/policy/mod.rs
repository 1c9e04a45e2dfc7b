//! Policy model
//!
//! The per-repository policy lives in `.github/wildfly-bot.yml` under a
//! `wildfly:` root key:
//!
//! ```yaml
//! wildfly:
//!   projectKey: WFCORE
//!   rules:
//!     - id: "jdk-updates"
//!       title: "JDK"
//!       directories: [src/main, pom.xml]
//!       notify: [user1, user2]
//!   format:
//!     title:
//!       enabled: true
//!     commit:
//!       enabled: false
//!   emails:
//!     - admin@example.com
//! ```
//!
//! The YAML is read into loose raw structures and converted into the typed
//! [`Policy`] right away, so defaults are applied once at load time and the
//! engine never deals with absent fields.

pub mod validate;

pub use validate::{validate, ValidationReport};

use crate::config::EngineSettings;
use crate::error::Result;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// A parsed, defaulted policy document
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    /// Issue tracker key used to derive default format patterns
    pub project_key: String,

    /// Rules in declaration order
    pub rules: Vec<Rule>,

    /// Project-wide format checks
    pub format: FormatPolicy,

    /// Administrator addresses notified when the policy is invalid
    pub emails: Vec<String>,

    /// Label names used by the bot
    pub labels: LabelPolicy,
}

/// A named policy entry scoping notifications to repository paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    pub id: Option<String>,
    /// Regex searched in the PR title
    pub title: Option<String>,
    /// Regex searched in the PR body
    pub body: Option<String>,
    /// Regex searched in the title and body joined by a newline
    pub title_body: Option<String>,
    /// Directory prefixes or literal file paths; empty means project-wide
    pub directories: Vec<String>,
    /// Logins to alert when the rule matches
    pub notify: Vec<String>,
}

impl Rule {
    /// The rule id, if present and not blank
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.trim().is_empty())
    }

    /// Whether the rule carries any title/body condition
    pub fn has_text_conditions(&self) -> bool {
        self.title.is_some() || self.body.is_some() || self.title_body.is_some()
    }

    /// Label used in logs
    pub fn display_id(&self) -> &str {
        self.id().unwrap_or("<missing id>")
    }
}

/// Rules render with every field so validation problems can be traced back
/// to the offending YAML entry.
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("null")
        }

        write!(
            f,
            "[id={} title={} body={} titleBody={} directories=[{}] notify=[{}]]",
            opt(&self.id),
            opt(&self.title),
            opt(&self.body),
            opt(&self.title_body),
            self.directories.join(", "),
            self.notify.join(", ")
        )
    }
}

/// Project-wide format checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPolicy {
    pub title: FormatCheck,
    pub commit: FormatCheck,
    /// Patterns the PR description must contain
    pub description: Vec<DescriptionCheck>,
}

/// Title or commit message check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatCheck {
    pub enabled: bool,
    /// Overrides the pattern derived from the project key
    pub pattern: Option<String>,
    /// Overrides the failure message template
    pub message: Option<String>,
}

impl Default for FormatCheck {
    fn default() -> Self {
        Self {
            enabled: true,
            pattern: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionCheck {
    pub pattern: String,
    pub message: Option<String>,
}

/// Label names, defaulted from [`EngineSettings`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPolicy {
    pub rebase: String,
    pub fix_me: String,
}

impl Policy {
    /// Policy used when the document declares nothing
    pub fn empty(settings: &EngineSettings) -> Self {
        Self::from_raw(RawPolicy::default(), settings)
    }

    /// Parse a policy document, applying defaults from `settings`
    pub fn from_yaml(text: &str, settings: &EngineSettings) -> Result<Self> {
        if text.trim().is_empty() {
            debug!("Empty policy document, using defaults");
            return Ok(Self::empty(settings));
        }

        let document: Option<PolicyDocument> = serde_yaml::from_str(text)?;
        let raw = document.and_then(|d| d.wildfly).unwrap_or_default();
        Ok(Self::from_raw(raw, settings))
    }

    /// Logins referenced by the rules accepted by `include`, in first-seen
    /// order
    pub fn notify_targets<F>(&self, include: F) -> Vec<String>
    where
        F: Fn(&Rule) -> bool,
    {
        let mut seen = HashSet::new();
        self.rules
            .iter()
            .filter(|rule| include(rule))
            .flat_map(|rule| rule.notify.iter())
            .filter(|login| seen.insert(login.as_str()))
            .cloned()
            .collect()
    }

    fn from_raw(raw: RawPolicy, settings: &EngineSettings) -> Self {
        let project_key = raw
            .project_key
            .map(ScalarText::into_string)
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| settings.default_project_key.clone());

        let rules = raw
            .rules
            .unwrap_or_default()
            .into_iter()
            .map(RawRule::into_rule)
            .collect();

        let format = raw.format.unwrap_or_default();
        let format = FormatPolicy {
            title: format.title.map(RawFormatCheck::into_check).unwrap_or_default(),
            commit: format.commit.map(RawFormatCheck::into_check).unwrap_or_default(),
            description: format
                .description
                .and_then(|d| d.regexes)
                .unwrap_or_default()
                .into_iter()
                .map(|r| DescriptionCheck {
                    pattern: r.pattern.into_string(),
                    message: r.message.map(ScalarText::into_string),
                })
                .collect(),
        };

        let mut seen = HashSet::new();
        let emails = strings(raw.emails)
            .into_iter()
            .filter(|email| seen.insert(email.clone()))
            .collect();

        let labels = raw.labels.unwrap_or_default();
        let labels = LabelPolicy {
            rebase: labels
                .rebase
                .map(ScalarText::into_string)
                .unwrap_or_else(|| settings.rebase_label.clone()),
            fix_me: labels
                .fix_me
                .map(ScalarText::into_string)
                .unwrap_or_else(|| settings.fix_me_label.clone()),
        };

        Self {
            project_key,
            rules,
            format,
            emails,
            labels,
        }
    }
}

// Raw YAML schema. Everything is optional here; defaults are applied in
// `Policy::from_raw`.

#[derive(Debug, Default, Deserialize)]
struct PolicyDocument {
    wildfly: Option<RawPolicy>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPolicy {
    project_key: Option<ScalarText>,
    rules: Option<Vec<RawRule>>,
    format: Option<RawFormat>,
    emails: Option<Vec<Option<ScalarText>>>,
    labels: Option<RawLabels>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRule {
    id: Option<ScalarText>,
    title: Option<ScalarText>,
    body: Option<ScalarText>,
    title_body: Option<ScalarText>,
    directories: Option<Vec<Option<ScalarText>>>,
    notify: Option<Vec<Option<ScalarText>>>,
}

impl RawRule {
    fn into_rule(self) -> Rule {
        Rule {
            id: self.id.map(ScalarText::into_string),
            title: self.title.map(ScalarText::into_string),
            body: self.body.map(ScalarText::into_string),
            title_body: self.title_body.map(ScalarText::into_string),
            directories: strings(self.directories),
            notify: strings(self.notify),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawFormat {
    title: Option<RawFormatCheck>,
    commit: Option<RawFormatCheck>,
    description: Option<RawDescription>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFormatCheck {
    enabled: Option<bool>,
    pattern: Option<ScalarText>,
    message: Option<ScalarText>,
}

impl RawFormatCheck {
    fn into_check(self) -> FormatCheck {
        FormatCheck {
            enabled: self.enabled.unwrap_or(true),
            pattern: self.pattern.map(ScalarText::into_string),
            message: self.message.map(ScalarText::into_string),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawDescription {
    regexes: Option<Vec<RawDescriptionRegex>>,
}

#[derive(Debug, Deserialize)]
struct RawDescriptionRegex {
    pattern: ScalarText,
    message: Option<ScalarText>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLabels {
    rebase: Option<ScalarText>,
    fix_me: Option<ScalarText>,
}

/// Any YAML scalar kept as its literal text.
///
/// Logins and ids such as `7125767235` are plain YAML numbers; integers keep
/// their digits. Floats are rendered from the parsed value, so `1.50` reads
/// back as `1.5`.
#[derive(Debug)]
struct ScalarText(String);

impl ScalarText {
    fn into_string(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for ScalarText {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_yaml::Value::deserialize(deserializer)? {
            serde_yaml::Value::String(s) => Ok(ScalarText(s)),
            serde_yaml::Value::Number(n) => Ok(ScalarText(n.to_string())),
            serde_yaml::Value::Bool(b) => Ok(ScalarText(b.to_string())),
            other => Err(D::Error::custom(format!(
                "expected a scalar value, found {:?}",
                other
            ))),
        }
    }
}

/// Null list entries are dropped along with blank ones.
fn strings(values: Option<Vec<Option<ScalarText>>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .map(|v| v.0.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
