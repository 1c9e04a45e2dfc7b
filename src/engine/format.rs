//! Title, commit message and description format checks

use crate::config::EngineSettings;
use crate::policy::{FormatCheck, Policy};
use crate::snapshot::PullRequestSnapshot;
use regex::Regex;
use std::fmt;
use tracing::{debug, warn};

/// Whether the title satisfies the pattern (regex found anywhere in it)
pub fn check_title(title: &str, pattern: &Regex) -> bool {
    pattern.is_match(title)
}

/// Whether at least one commit message satisfies the pattern.
///
/// A PR without commits fails: there is nothing that satisfies it.
pub fn check_commits(commits: &[String], pattern: &Regex) -> bool {
    commits.iter().any(|message| pattern.is_match(message))
}

/// Which check produced a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormatKind {
    Title,
    Commit,
    Description,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatKind::Title => "title",
            FormatKind::Commit => "commit",
            FormatKind::Description => "description",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatViolation {
    pub kind: FormatKind,
    pub message: String,
}

/// Result of running every enabled check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatReport {
    /// False when no check was enabled (or the PR was exempt)
    pub checked: bool,
    pub violations: Vec<FormatViolation>,
}

impl FormatReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Distinct failing kinds in check order
    pub fn failed_kinds(&self) -> Vec<FormatKind> {
        let mut kinds: Vec<FormatKind> = self.violations.iter().map(|v| v.kind).collect();
        kinds.dedup();
        kinds
    }
}

#[derive(Debug, Clone)]
struct CompiledCheck {
    regex: Regex,
    message: String,
}

/// Compiled format checks for one policy
#[derive(Debug, Clone, Default)]
pub struct FormatChecker {
    title: Option<CompiledCheck>,
    commit: Option<CompiledCheck>,
    description: Vec<CompiledCheck>,
}

impl FormatChecker {
    /// Compile the enabled checks of a policy.
    ///
    /// Overrides that fail to compile fall back to the pattern derived from
    /// the project key; description regexes that fail to compile are skipped.
    pub fn from_policy(policy: &Policy, settings: &EngineSettings) -> Self {
        let default_pattern = settings.default_pattern(&policy.project_key);

        let title = compile_check(
            "title",
            &policy.format.title,
            &default_pattern,
            &settings.title_message,
        );
        let commit = compile_check(
            "commit",
            &policy.format.commit,
            &default_pattern,
            &settings.commit_message,
        );

        let description = policy
            .format
            .description
            .iter()
            .filter_map(|check| match Regex::new(&check.pattern) {
                Ok(regex) => {
                    let template = check
                        .message
                        .as_deref()
                        .unwrap_or(&settings.description_message);
                    Some(CompiledCheck {
                        message: template.replace("{pattern}", &check.pattern),
                        regex,
                    })
                }
                Err(e) => {
                    warn!("Skipping description pattern '{}': {}", check.pattern, e);
                    None
                }
            })
            .collect();

        Self {
            title,
            commit,
            description,
        }
    }

    /// Whether any check is enabled
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.commit.is_none() && self.description.is_empty()
    }

    /// Effective title pattern, if the title check is enabled
    pub fn title_pattern(&self) -> Option<&str> {
        self.title.as_ref().map(|c| c.regex.as_str())
    }

    /// Effective commit pattern, if the commit check is enabled
    pub fn commit_pattern(&self) -> Option<&str> {
        self.commit.as_ref().map(|c| c.regex.as_str())
    }

    /// Run every enabled check against the snapshot
    pub fn check(&self, snapshot: &PullRequestSnapshot) -> FormatReport {
        let mut report = FormatReport {
            checked: !self.is_empty(),
            violations: Vec::new(),
        };

        if let Some(check) = &self.title {
            if !check_title(&snapshot.title, &check.regex) {
                debug!("Title '{}' does not match {}", snapshot.title, check.regex);
                report.violations.push(FormatViolation {
                    kind: FormatKind::Title,
                    message: check.message.clone(),
                });
            }
        }

        if let Some(check) = &self.commit {
            if !check_commits(&snapshot.commit_messages, &check.regex) {
                debug!(
                    "None of {} commit messages match {}",
                    snapshot.commit_messages.len(),
                    check.regex
                );
                report.violations.push(FormatViolation {
                    kind: FormatKind::Commit,
                    message: check.message.clone(),
                });
            }
        }

        for check in &self.description {
            if !check.regex.is_match(&snapshot.body) {
                report.violations.push(FormatViolation {
                    kind: FormatKind::Description,
                    message: check.message.clone(),
                });
            }
        }

        report
    }
}

fn compile_check(
    name: &str,
    check: &FormatCheck,
    default_pattern: &str,
    default_message: &str,
) -> Option<CompiledCheck> {
    if !check.enabled {
        debug!("Format check '{}' disabled", name);
        return None;
    }

    let regex = match check.pattern.as_deref().map(Regex::new) {
        Some(Ok(regex)) => regex,
        Some(Err(e)) => {
            warn!(
                "Invalid {} pattern override, falling back to {}: {}",
                name, default_pattern, e
            );
            Regex::new(default_pattern).ok()?
        }
        None => match Regex::new(default_pattern) {
            Ok(regex) => regex,
            Err(e) => {
                warn!("Default {} pattern {} does not compile: {}", name, default_pattern, e);
                return None;
            }
        },
    };

    let template = check.message.as_deref().unwrap_or(default_message);
    Some(CompiledCheck {
        message: template.replace("{pattern}", regex.as_str()),
        regex,
    })
}
