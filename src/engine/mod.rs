//! Rule evaluation engine
//!
//! [`evaluate`] is a pure function of a validated policy, a pull request
//! snapshot and the engine settings. It performs no I/O; the caller feeds the
//! result to [`outcome::plan_outcome`] and hands the plan to the
//! [`outcome::OutcomeEmitter`].
//!
//! A rule is *in scope* when its directories match the changed files (a rule
//! without directories is always in scope). An in-scope rule *matches* when
//! it hit through its directories, when one of its title/body regexes is
//! found, or when it is project-wide and has no regex at all. Directory hits
//! turn notify targets into review requests; text-only hits mention them.

pub mod format;
pub mod matcher;
pub mod notify;
pub mod outcome;

pub use format::{FormatChecker, FormatKind, FormatReport, FormatViolation};
pub use notify::{MatchedNotify, NotificationPlan, ReviewBatch};
pub use outcome::{Action, EmissionReport, OutcomeEmitter, OutcomePlan, PolicyState};

use crate::config::EngineSettings;
use crate::policy::{Policy, Rule};
use crate::snapshot::PullRequestSnapshot;
use regex::Regex;
use tracing::{debug, warn};

/// Per-rule evaluation outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub rule_id: String,
    pub matched: bool,
    pub directory_hit: bool,
    pub title_hit: bool,
    /// `body` or `titleBody` regex found
    pub body_hit: bool,
}

/// Everything the engine decided for one event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub matches: Vec<MatchResult>,
    pub format: FormatReport,
    pub notifications: NotificationPlan,
}

impl Evaluation {
    pub fn matched_rule_ids(&self) -> Vec<&str> {
        self.matches
            .iter()
            .filter(|m| m.matched)
            .map(|m| m.rule_id.as_str())
            .collect()
    }
}

/// Evaluate one rule against the snapshot
pub fn evaluate_rule(rule: &Rule, snapshot: &PullRequestSnapshot) -> MatchResult {
    let mut result = MatchResult {
        rule_id: rule.display_id().to_string(),
        ..MatchResult::default()
    };

    if !matcher::matches(&rule.directories, &snapshot.changed_files) {
        return result;
    }

    result.directory_hit = !rule.directories.is_empty();
    result.title_hit = rule_pattern_found(rule, "title", &rule.title, &snapshot.title);
    result.body_hit = rule_pattern_found(rule, "body", &rule.body, &snapshot.body)
        || rule
            .title_body
            .as_ref()
            .is_some_and(|_| {
                let text = format!("{}\n{}", snapshot.title, snapshot.body);
                rule_pattern_found(rule, "titleBody", &rule.title_body, &text)
            });

    let project_wide = rule.directories.is_empty() && !rule.has_text_conditions();
    result.matched = result.directory_hit || result.title_hit || result.body_hit || project_wide;
    result
}

fn rule_pattern_found(rule: &Rule, field: &str, pattern: &Option<String>, text: &str) -> bool {
    let Some(pattern) = pattern else {
        return false;
    };

    match Regex::new(pattern) {
        Ok(regex) => regex.is_match(text),
        Err(e) => {
            warn!(
                "Rule {} has an invalid {} pattern '{}', treating it as not matching: {}",
                rule.display_id(),
                field,
                pattern,
                e
            );
            false
        }
    }
}

/// Evaluate a validated policy against a pull request
pub fn evaluate(
    policy: &Policy,
    snapshot: &PullRequestSnapshot,
    settings: &EngineSettings,
) -> Evaluation {
    let matches: Vec<MatchResult> = policy
        .rules
        .iter()
        .map(|rule| evaluate_rule(rule, snapshot))
        .collect();

    for result in matches.iter().filter(|m| m.matched) {
        debug!(
            "Rule {} matched PR #{} (directories: {}, title: {}, body: {})",
            result.rule_id, snapshot.number, result.directory_hit, result.title_hit, result.body_hit
        );
    }

    let format = if settings.is_bot(&snapshot.author) {
        debug!("Skipping format checks for bot PR by {}", snapshot.author);
        FormatReport::default()
    } else {
        FormatChecker::from_policy(policy, settings).check(snapshot)
    };

    let matched: Vec<MatchedNotify<'_>> = policy
        .rules
        .iter()
        .zip(&matches)
        .filter(|(_, result)| result.matched)
        .map(|(rule, result)| MatchedNotify {
            rule_id: rule.display_id(),
            wants_review: result.directory_hit,
            notify: &rule.notify,
        })
        .collect();

    let notifications = notify::resolve(
        &matched,
        &snapshot.author,
        &snapshot.existing_reviewers,
        &snapshot.collaborators,
        &settings.bot_logins,
    );

    Evaluation {
        matches,
        format,
        notifications,
    }
}
