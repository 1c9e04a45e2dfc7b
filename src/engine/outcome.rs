//! Outcome planning and emission
//!
//! [`plan_outcome`] turns the validation result and the evaluation into an
//! ordered list of [`Action`]s without touching the platform. The
//! [`OutcomeEmitter`] then runs the plan sequentially, best-effort: a failed
//! call is recorded and the remaining actions still run. In dry-run mode no
//! mutating call is made; each action is logged with the dry-run marker.

use super::notify::mention_comment;
use super::Evaluation;
use crate::config::EngineSettings;
use crate::platform::{CommitState, CommitStatus, Platform};
use crate::policy::{Policy, ValidationReport};
use crate::snapshot::{PullRequestSnapshot, RepositoryRef};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What the engine knows about the repository policy for this event
#[derive(Debug, Clone, Copy)]
pub enum PolicyState<'a> {
    /// The policy file exists but could not be parsed
    Unparsable,
    /// Parsed, but rule ids are missing or duplicated
    Invalid(&'a ValidationReport),
    Valid {
        policy: &'a Policy,
        evaluation: &'a Evaluation,
    },
    /// Valid, but the pull request itself could not be read
    Unevaluated,
}

/// One side effect against the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetStatus {
        state: CommitState,
        description: String,
        context: String,
    },
    AddLabel(String),
    RemoveLabel(String),
    Comment(String),
    RequestReviewers {
        rule_id: String,
        logins: Vec<String>,
    },
    /// Rendered as a single `/cc` comment at emission time
    Mention(Vec<String>),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::SetStatus {
                state,
                description,
                context,
            } => write!(f, "set status {} '{}' for '{}'", state, description, context),
            Action::AddLabel(label) => write!(f, "add label '{}'", label),
            Action::RemoveLabel(label) => write!(f, "remove label '{}'", label),
            Action::Comment(body) => write!(f, "comment '{}'", body.replace('\n', "\\n")),
            Action::RequestReviewers { rule_id, logins } => write!(
                f,
                "request reviews from [{}] for rule {}",
                logins.join(", "),
                rule_id
            ),
            Action::Mention(logins) => write!(
                f,
                "comment '{}'",
                mention_comment(logins).unwrap_or_default()
            ),
        }
    }
}

/// Complete set of side effects for one pull request event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomePlan {
    pub repository: RepositoryRef,
    pub number: u64,
    pub sha: String,
    pub actions: Vec<Action>,
}

impl OutcomePlan {
    pub fn statuses(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::SetStatus { .. }))
    }
}

/// Build the ordered action list: statuses, labels, format comment, review
/// requests, mentions.
pub fn plan_outcome(
    snapshot: &PullRequestSnapshot,
    state: PolicyState<'_>,
    settings: &EngineSettings,
) -> OutcomePlan {
    let mut actions = Vec::new();

    let config_status = |state, description: &str| Action::SetStatus {
        state,
        description: description.to_string(),
        context: settings.config_status_context.clone(),
    };

    match state {
        PolicyState::Unparsable => {
            actions.push(config_status(
                CommitState::Error,
                &settings.unparsable_config_description,
            ));
        }
        PolicyState::Invalid(report) => {
            debug!("Policy invalid, only reporting: {}", report);
            actions.push(config_status(
                CommitState::Error,
                &settings.invalid_config_description,
            ));
        }
        PolicyState::Unevaluated => {
            actions.push(config_status(CommitState::Success, &settings.valid_description));
        }
        PolicyState::Valid { policy, evaluation } => {
            actions.push(config_status(CommitState::Success, &settings.valid_description));
            plan_valid(snapshot, policy, evaluation, settings, &mut actions);
        }
    }

    OutcomePlan {
        repository: snapshot.repository.clone(),
        number: snapshot.number,
        sha: snapshot.head_sha.clone(),
        actions,
    }
}

fn plan_valid(
    snapshot: &PullRequestSnapshot,
    policy: &Policy,
    evaluation: &Evaluation,
    settings: &EngineSettings,
    actions: &mut Vec<Action>,
) {
    let format = &evaluation.format;

    if format.checked {
        let (state, description) = if format.passed() {
            (CommitState::Success, settings.valid_description.clone())
        } else {
            let kinds: Vec<String> = format.failed_kinds().iter().map(|k| k.to_string()).collect();
            (
                CommitState::Error,
                format!("Failed checks: {}", kinds.join(", ")),
            )
        };
        actions.push(Action::SetStatus {
            state,
            description,
            context: settings.format_status_context.clone(),
        });
    }

    let fix_me = &policy.labels.fix_me;
    let has_fix_me = snapshot.labels.contains(fix_me);
    if format.checked && !format.passed() && !has_fix_me {
        actions.push(Action::AddLabel(fix_me.clone()));
    } else if format.checked && format.passed() && has_fix_me {
        actions.push(Action::RemoveLabel(fix_me.clone()));
    }

    let rebase = &policy.labels.rebase;
    let has_rebase = snapshot.labels.contains(rebase);
    match snapshot.mergeable {
        Some(false) if !has_rebase => actions.push(Action::AddLabel(rebase.clone())),
        Some(true) if has_rebase => actions.push(Action::RemoveLabel(rebase.clone())),
        _ => {}
    }

    if !format.passed() {
        let bullets: Vec<String> = format
            .violations
            .iter()
            .map(|v| format!("- {}", v.message))
            .collect();
        actions.push(Action::Comment(format!(
            "{}\n\n{}",
            settings.format_comment_header,
            bullets.join("\n")
        )));
    }

    for batch in &evaluation.notifications.review_batches {
        actions.push(Action::RequestReviewers {
            rule_id: batch.rule_id.clone(),
            logins: batch.logins.clone(),
        });
    }

    if !evaluation.notifications.mentions.is_empty() {
        actions.push(Action::Mention(evaluation.notifications.mentions.clone()));
    }
}

/// What happened while running a plan
#[derive(Debug, Default)]
pub struct EmissionReport {
    /// Actions performed against the platform
    pub performed: Vec<Action>,
    /// Actions only logged because of dry-run mode
    pub logged: Vec<Action>,
    /// Actions that failed, with the error text
    pub failures: Vec<(Action, String)>,
}

impl EmissionReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs outcome plans against the platform
pub struct OutcomeEmitter {
    platform: Arc<dyn Platform>,
    dry_run: bool,
    marker: String,
}

impl OutcomeEmitter {
    pub fn new(platform: Arc<dyn Platform>, settings: &EngineSettings, dry_run: bool) -> Self {
        Self {
            platform,
            dry_run,
            marker: settings.dry_run_marker.clone(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run every action of the plan in order.
    ///
    /// Logins already requested during this run are never submitted again.
    /// Logins whose review request the platform rejects are added to the
    /// mention comment instead.
    pub async fn emit(&self, plan: &OutcomePlan) -> EmissionReport {
        let mut report = EmissionReport::default();
        let mut requested: HashSet<String> = HashSet::new();
        let mut downgraded: Vec<String> = Vec::new();
        let mut mentioned = false;

        for action in &plan.actions {
            let action = match action {
                Action::RequestReviewers { rule_id, logins } => {
                    let fresh: Vec<String> = logins
                        .iter()
                        .filter(|login| requested.insert((*login).clone()))
                        .cloned()
                        .collect();
                    if fresh.is_empty() {
                        continue;
                    }
                    Action::RequestReviewers {
                        rule_id: rule_id.clone(),
                        logins: fresh,
                    }
                }
                Action::Mention(logins) => {
                    mentioned = true;
                    Action::Mention(merge_logins(logins, &downgraded))
                }
                other => other.clone(),
            };

            if let Err(e) = self.run(plan, &action, &mut report).await {
                if let Action::RequestReviewers { logins, .. } = &action {
                    warn!(
                        "Review request for [{}] rejected, mentioning instead: {}",
                        logins.join(", "),
                        e
                    );
                    downgraded.extend(logins.iter().cloned());
                }
                error!("Failed to {} on {}#{}: {}", action, plan.repository, plan.number, e);
                report.failures.push((action, e.to_string()));
            }
        }

        if !mentioned && !downgraded.is_empty() {
            let action = Action::Mention(merge_logins(&[], &downgraded));
            if let Err(e) = self.run(plan, &action, &mut report).await {
                error!("Failed to {} on {}#{}: {}", action, plan.repository, plan.number, e);
                report.failures.push((action, e.to_string()));
            }
        }

        report
    }

    async fn run(
        &self,
        plan: &OutcomePlan,
        action: &Action,
        report: &mut EmissionReport,
    ) -> crate::Result<()> {
        if self.dry_run {
            info!(
                "{} {} on {}#{}",
                self.marker, action, plan.repository, plan.number
            );
            report.logged.push(action.clone());
            return Ok(());
        }

        let platform = &self.platform;
        let repo = &plan.repository;
        match action {
            Action::SetStatus {
                state,
                description,
                context,
            } => {
                let status = CommitStatus {
                    state: *state,
                    target_url: String::new(),
                    description: description.clone(),
                    context: context.clone(),
                };
                platform.create_commit_status(repo, &plan.sha, &status).await?;
            }
            Action::AddLabel(label) => platform.add_label(repo, plan.number, label).await?,
            Action::RemoveLabel(label) => platform.remove_label(repo, plan.number, label).await?,
            Action::Comment(body) => platform.comment(repo, plan.number, body).await?,
            Action::RequestReviewers { logins, .. } => {
                platform.request_reviewers(repo, plan.number, logins).await?
            }
            Action::Mention(logins) => {
                if let Some(body) = mention_comment(logins) {
                    platform.comment(repo, plan.number, &body).await?;
                }
            }
        }

        debug!("Performed: {} on {}#{}", action, repo, plan.number);
        report.performed.push(action.clone());
        Ok(())
    }
}

fn merge_logins(first: &[String], second: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    first
        .iter()
        .chain(second)
        .filter(|login| seen.insert(login.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::evaluate;
    use crate::error::BotError;
    use crate::platform::MockPlatform;
    use crate::policy::validate;

    fn settings() -> EngineSettings {
        EngineSettings::default()
    }

    fn pr() -> PullRequestSnapshot {
        PullRequestSnapshot::new(RepositoryRef::new("xstefank", "wildfly"), 7, "abc123")
            .with_author("author")
            .with_title("WFLY-1 title")
            .with_commit_messages(["WFLY-1 commit"])
    }

    fn plan_for(yaml: &str, snapshot: &PullRequestSnapshot) -> OutcomePlan {
        let settings = settings();
        let policy = Policy::from_yaml(yaml, &settings).unwrap();
        let report = validate(&policy);
        if !report.is_valid() {
            return plan_outcome(snapshot, PolicyState::Invalid(&report), &settings);
        }
        let evaluation = evaluate(&policy, snapshot, &settings);
        plan_outcome(
            snapshot,
            PolicyState::Valid {
                policy: &policy,
                evaluation: &evaluation,
            },
            &settings,
        )
    }

    #[test]
    fn test_invalid_policy_only_reports_configuration_error() {
        let plan = plan_for(
            "wildfly:\n  rules:\n    - id: a\n      notify: [x]\n    - id: a\n",
            &pr().with_title("no key"),
        );
        assert_eq!(
            plan.actions,
            vec![Action::SetStatus {
                state: CommitState::Error,
                description: "Rule is missing an id or multiple rules have the same id."
                    .to_string(),
                context: "Configuration File".to_string(),
            }]
        );
    }

    #[test]
    fn test_unparsable_policy() {
        let plan = plan_outcome(&pr(), PolicyState::Unparsable, &settings());
        assert_eq!(plan.actions.len(), 1);
        assert!(matches!(
            &plan.actions[0],
            Action::SetStatus { state: CommitState::Error, description, .. }
                if description == "Unable to parse the configuration file."
        ));
    }

    #[test]
    fn test_unevaluated_policy_reports_configuration_success() {
        let plan = plan_outcome(&pr(), PolicyState::Unevaluated, &settings());
        assert_eq!(
            plan.actions,
            vec![Action::SetStatus {
                state: CommitState::Success,
                description: "Valid".to_string(),
                context: "Configuration File".to_string(),
            }]
        );
    }

    #[test]
    fn test_valid_policy_with_passing_format() {
        let plan = plan_for("wildfly:\n  rules:\n    - id: a\n", &pr());
        assert_eq!(plan.statuses().count(), 2);
        assert_eq!(
            plan.actions[1],
            Action::SetStatus {
                state: CommitState::Success,
                description: "Valid".to_string(),
                context: "Format".to_string(),
            }
        );
        assert_eq!(plan.actions.len(), 2);
    }

    #[test]
    fn test_format_failure_comment_and_label() {
        let plan = plan_for("wildfly:\n  projectKey: WFCORE\n", &pr());
        assert_eq!(
            plan.actions[1],
            Action::SetStatus {
                state: CommitState::Error,
                description: "Failed checks: title, commit".to_string(),
                context: "Format".to_string(),
            }
        );
        assert_eq!(plan.actions[2], Action::AddLabel("fix-me".to_string()));
        assert_eq!(
            plan.actions[3],
            Action::Comment(
                "The following checks failed:\n\n\
                 - Wrong content of the title. It does not satisfy the following regex pattern: [WFCORE-\\d+]\n\
                 - None of the commit messages satisfy the following regex pattern: [WFCORE-\\d+]"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_fix_me_removed_once_format_passes() {
        let plan = plan_for("wildfly:\n  rules: []\n", &pr().with_labels(["fix-me"]));
        assert!(plan.actions.contains(&Action::RemoveLabel("fix-me".to_string())));
    }

    #[test]
    fn test_rebase_label_follows_mergeability() {
        let yaml = "wildfly:\n  rules: []\n";
        let plan = plan_for(yaml, &pr().with_mergeable(Some(false)));
        assert!(plan.actions.contains(&Action::AddLabel("rebase-this".to_string())));

        let plan = plan_for(
            yaml,
            &pr().with_mergeable(Some(true)).with_labels(["rebase-this"]),
        );
        assert!(plan.actions.contains(&Action::RemoveLabel("rebase-this".to_string())));

        let plan = plan_for(yaml, &pr().with_labels(["rebase-this"]));
        assert!(!plan
            .actions
            .iter()
            .any(|a| matches!(a, Action::AddLabel(_) | Action::RemoveLabel(_))));
    }

    #[tokio::test]
    async fn test_emit_runs_every_action() {
        let plan = OutcomePlan {
            repository: RepositoryRef::new("xstefank", "wildfly"),
            number: 7,
            sha: "abc123".to_string(),
            actions: vec![
                Action::SetStatus {
                    state: CommitState::Success,
                    description: "Valid".to_string(),
                    context: "Configuration File".to_string(),
                },
                Action::RequestReviewers {
                    rule_id: "a".to_string(),
                    logins: vec!["user1".to_string()],
                },
                Action::Mention(vec!["user3".to_string()]),
            ],
        };

        let mut platform = MockPlatform::new();
        platform
            .expect_create_commit_status()
            .withf(|_, sha, status| {
                sha == "abc123"
                    && status.state == CommitState::Success
                    && status.target_url.is_empty()
                    && status.context == "Configuration File"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        platform
            .expect_request_reviewers()
            .withf(|_, number, logins| *number == 7 && logins == ["user1".to_string()])
            .times(1)
            .returning(|_, _, _| Ok(()));
        platform
            .expect_comment()
            .withf(|_, number, body| *number == 7 && body == "/cc @user3")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let emitter = OutcomeEmitter::new(Arc::new(platform), &settings(), false);
        let report = emitter.emit(&plan).await;
        assert!(report.is_success());
        assert_eq!(report.performed.len(), 3);
        assert!(report.logged.is_empty());
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_emission_and_rejected_reviews_are_mentioned() {
        let plan = OutcomePlan {
            repository: RepositoryRef::new("xstefank", "wildfly"),
            number: 7,
            sha: "abc123".to_string(),
            actions: vec![
                Action::SetStatus {
                    state: CommitState::Success,
                    description: "Valid".to_string(),
                    context: "Configuration File".to_string(),
                },
                Action::RequestReviewers {
                    rule_id: "a".to_string(),
                    logins: vec!["outsider".to_string()],
                },
                Action::RequestReviewers {
                    rule_id: "b".to_string(),
                    logins: vec!["outsider".to_string()],
                },
            ],
        };

        let mut platform = MockPlatform::new();
        platform
            .expect_create_commit_status()
            .times(1)
            .returning(|_, _, _| Err(BotError::platform("create_commit_status", "502")));
        platform
            .expect_request_reviewers()
            .times(1)
            .returning(|_, _, _| Err(BotError::platform("request_reviewers", "422")));
        platform
            .expect_comment()
            .withf(|_, number, body| *number == 7 && body == "/cc @outsider")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let emitter = OutcomeEmitter::new(Arc::new(platform), &settings(), false);
        let report = emitter.emit(&plan).await;
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.performed, vec![Action::Mention(vec!["outsider".to_string()])]);
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let snapshot = pr()
            .with_title("no key")
            .with_changed_files(["src/A.java"])
            .with_collaborators(["user1"])
            .with_mergeable(Some(false));
        let plan = plan_for(
            "wildfly:\n  rules:\n    - id: a\n      directories: [src]\n      notify: [user1, user2]\n",
            &snapshot,
        );

        // No expectations: any call would panic
        let platform = MockPlatform::new();
        let emitter = OutcomeEmitter::new(Arc::new(platform), &settings(), true);
        let report = emitter.emit(&plan).await;

        assert!(emitter.is_dry_run());
        assert!(report.performed.is_empty());
        assert_eq!(report.logged, plan.actions);
    }
}
