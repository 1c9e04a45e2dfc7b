//! Pull request event adapter
//!
//! Loads the policy at the PR head, validates it, completes the snapshot with
//! platform reads, evaluates and emits. All decisions are delegated to the
//! engine; this module only sequences the I/O around it.

use crate::config::EngineSettings;
use crate::engine::{
    self, matcher, notify::normalize_login, outcome::plan_outcome, EmissionReport,
    OutcomeEmitter, OutcomePlan, PolicyState,
};
use crate::error::{BotError, Result};
use crate::platform::{DirectoryProbe, Platform};
use crate::policy::{validate, Policy};
use crate::snapshot::PullRequestSnapshot;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one pull request event
#[derive(Debug)]
pub enum EventOutcome {
    /// Nothing to do for this event
    Ignored(String),
    /// A plan was built and emitted without failures
    Emitted {
        plan: OutcomePlan,
        report: EmissionReport,
    },
}

/// Handles `pull_request` events for one installation
pub struct PullRequestHandler {
    platform: Arc<dyn Platform>,
    probe: Arc<dyn DirectoryProbe>,
    emitter: OutcomeEmitter,
    settings: EngineSettings,
}

impl PullRequestHandler {
    pub fn new(
        platform: Arc<dyn Platform>,
        probe: Arc<dyn DirectoryProbe>,
        settings: EngineSettings,
        dry_run: bool,
    ) -> Self {
        let emitter = OutcomeEmitter::new(platform.clone(), &settings, dry_run);
        Self {
            platform,
            probe,
            emitter,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Process one event.
    ///
    /// `event` carries what the webhook payload provides (title, body, author,
    /// labels, mergeability); changed files, commits, reviewers and
    /// collaborator checks are read from the platform here, as is
    /// mergeability when the payload leaves it open.
    ///
    /// Fails when a required platform read fails, after still reporting the
    /// configuration status, or after emission when any action could not be
    /// performed.
    pub async fn handle(&self, event: PullRequestSnapshot) -> Result<EventOutcome> {
        let repo = event.repository.clone();

        if !event.action.triggers_evaluation() {
            debug!("Ignoring {:?} on {}#{}", event.action, repo, event.number);
            return Ok(EventOutcome::Ignored(format!("action {:?}", event.action)));
        }

        let Some(text) = self.platform.fetch_policy(&repo, &event.head_sha).await? else {
            debug!(
                "No {} in {} at {}, nothing to enforce",
                self.settings.config_path(),
                repo,
                event.head_sha
            );
            return Ok(EventOutcome::Ignored("no policy file".to_string()));
        };

        let policy = match Policy::from_yaml(&text, &self.settings) {
            Ok(policy) => policy,
            Err(e) => {
                warn!("Unable to parse the policy of {}: {}", repo, e);
                let plan = plan_outcome(&event, PolicyState::Unparsable, &self.settings);
                return self.finish(plan).await;
            }
        };

        let report = validate(&policy);
        if !report.is_valid() {
            warn!(
                "Policy of {} is invalid, skipping evaluation of #{}: {}",
                repo, event.number, report
            );
            let plan = plan_outcome(&event, PolicyState::Invalid(&report), &self.settings);
            return self.finish(plan).await;
        }

        matcher::probe_scopes(&policy, self.probe.as_ref(), &repo, &event.head_sha).await;

        let snapshot = match self.complete_snapshot(event.clone(), &policy).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "Unable to read {}#{}, reporting the configuration status only: {}",
                    repo, event.number, e
                );
                let plan = plan_outcome(&event, PolicyState::Unevaluated, &self.settings);
                if let Err(emit_error) = self.finish(plan).await {
                    warn!("{}", emit_error);
                }
                return Err(e);
            }
        };

        let evaluation = engine::evaluate(&policy, &snapshot, &self.settings);
        let plan = plan_outcome(
            &snapshot,
            PolicyState::Valid {
                policy: &policy,
                evaluation: &evaluation,
            },
            &self.settings,
        );

        self.finish(plan).await
    }

    async fn complete_snapshot(
        &self,
        mut snapshot: PullRequestSnapshot,
        policy: &Policy,
    ) -> Result<PullRequestSnapshot> {
        let repo = snapshot.repository.clone();
        let number = snapshot.number;

        snapshot.changed_files = self.platform.changed_files(&repo, number).await?;
        snapshot.commit_messages = self.platform.commit_messages(&repo, number).await?;
        snapshot.existing_reviewers = self
            .platform
            .existing_reviewers(&repo, number)
            .await?
            .into_iter()
            .collect();

        if snapshot.mergeable.is_none() {
            snapshot.mergeable = self.platform.mergeable(&repo, number).await?;
        }

        // Collaborator status only matters for rules that match; none of the
        // match conditions depend on it.
        let candidates =
            policy.notify_targets(|rule| engine::evaluate_rule(rule, &snapshot).matched);

        let mut collaborators = BTreeSet::new();
        for target in &candidates {
            let login = normalize_login(target);
            if login.is_empty() || collaborators.contains(login) {
                continue;
            }
            match self.platform.is_collaborator(&repo, login).await {
                Ok(true) => {
                    collaborators.insert(login.to_string());
                }
                Ok(false) => debug!("{} is not a collaborator of {}", login, repo),
                Err(e) => warn!(
                    "Unable to check collaborator status of {} in {}, mentioning instead: {}",
                    login, repo, e
                ),
            }
        }

        debug!(
            "PR {}#{}: {} files, {} commits, {} reviewers, {} collaborators, mergeable {:?}",
            repo,
            number,
            snapshot.changed_files.len(),
            snapshot.commit_messages.len(),
            snapshot.existing_reviewers.len(),
            collaborators.len(),
            snapshot.mergeable
        );

        snapshot.collaborators = collaborators;
        Ok(snapshot)
    }

    async fn finish(&self, plan: OutcomePlan) -> Result<EventOutcome> {
        let report = self.emitter.emit(&plan).await;

        if !report.is_success() {
            let failed: Vec<String> = report
                .failures
                .iter()
                .map(|(action, e)| format!("{}: {}", action, e))
                .collect();
            return Err(BotError::platform(
                "emit",
                format!(
                    "{} of {} actions failed on {}#{}: {}",
                    report.failures.len(),
                    plan.actions.len(),
                    plan.repository,
                    plan.number,
                    failed.join("; ")
                ),
            ));
        }

        info!(
            "Handled {}#{}: {} actions {}",
            plan.repository,
            plan.number,
            plan.actions.len(),
            if self.emitter.is_dry_run() {
                "logged"
            } else {
                "performed"
            }
        );
        Ok(EventOutcome::Emitted { plan, report })
    }
}
