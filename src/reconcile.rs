//! Startup validation of every installed repository
//!
//! Each repository's policy is read from its default branch and validated.
//! Invalid policies are reported to the administrators the policy lists.
//! A failure in one repository is logged and the loop moves on.

use crate::config::EngineSettings;
use crate::error::Result;
use crate::platform::{InstalledRepository, Mail, Mailer, Platform};
use crate::policy::{validate, Policy};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Per-run counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Repositories visited
    pub checked: usize,
    pub valid: usize,
    /// Parsed, but rule ids missing or duplicated
    pub invalid: usize,
    /// No policy file on the default branch
    pub skipped: usize,
    /// Unparsable policy or platform error
    pub failed: usize,
    /// Administrator mails delivered (or logged in dry-run mode)
    pub emails: usize,
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} repositories checked: {} valid, {} invalid, {} without policy, {} failed, {} emails",
            self.checked, self.valid, self.invalid, self.skipped, self.failed, self.emails
        )
    }
}

enum RepositoryState {
    Valid,
    Invalid { emails: usize },
    Missing,
}

pub struct InstallationReconciler {
    platform: Arc<dyn Platform>,
    mailer: Arc<dyn Mailer>,
    settings: EngineSettings,
    dry_run: bool,
}

impl InstallationReconciler {
    pub fn new(
        platform: Arc<dyn Platform>,
        mailer: Arc<dyn Mailer>,
        settings: EngineSettings,
        dry_run: bool,
    ) -> Self {
        Self {
            platform,
            mailer,
            settings,
            dry_run,
        }
    }

    /// Validate the policy of every repository the installation can access.
    ///
    /// Only the repository listing itself can fail the run.
    pub async fn run(&self) -> Result<ReconcileSummary> {
        let repositories = self.platform.list_repositories().await?;
        info!("Checking policies of {} repositories", repositories.len());

        let mut summary = ReconcileSummary::default();
        for installed in &repositories {
            summary.checked += 1;
            match self.reconcile_repository(installed).await {
                Ok(RepositoryState::Valid) => summary.valid += 1,
                Ok(RepositoryState::Invalid { emails }) => {
                    summary.invalid += 1;
                    summary.emails += emails;
                }
                Ok(RepositoryState::Missing) => summary.skipped += 1,
                Err(e) => {
                    error!("Unable to check the policy of {}: {}", installed.repository, e);
                    summary.failed += 1;
                }
            }
        }

        info!("{}", summary);
        Ok(summary)
    }

    async fn reconcile_repository(&self, installed: &InstalledRepository) -> Result<RepositoryState> {
        let repo = &installed.repository;
        let Some(text) = self
            .platform
            .fetch_policy(repo, &installed.default_branch)
            .await?
        else {
            debug!(
                "{} has no {} on {}",
                repo,
                self.settings.config_path(),
                installed.default_branch
            );
            return Ok(RepositoryState::Missing);
        };

        let url = repo.http_transport_url();
        let policy = Policy::from_yaml(&text, &self.settings)?;
        let report = validate(&policy);

        if report.is_valid() {
            info!(
                "The configuration file from the repository {} was parsed successfully.",
                url
            );
            return Ok(RepositoryState::Valid);
        }

        let problems = report.problems_text();
        warn!(
            "The configuration file from the repository {} was not parsed successfully due to following problems: {}",
            url, problems
        );

        if policy.emails.is_empty() {
            debug!("No administrator emails configured for {}", repo);
        }

        let body = self.settings.render_email(&url, &problems);
        let mut sent = 0;
        for address in &policy.emails {
            let mail = Mail {
                to: address.clone(),
                subject: self.settings.email_subject.clone(),
                body: body.clone(),
            };

            if self.dry_run {
                info!(
                    "{} send mail '{}' to {}",
                    self.settings.dry_run_marker, mail.subject, mail.to
                );
                sent += 1;
                continue;
            }

            match self.mailer.send(&mail).await {
                Ok(()) => sent += 1,
                Err(e) => error!("Unable to send mail to {} about {}: {}", address, repo, e),
            }
        }

        Ok(RepositoryState::Invalid { emails: sent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::platform::{MockMailer, MockPlatform};
    use crate::snapshot::RepositoryRef;

    fn installed(name: &str) -> InstalledRepository {
        InstalledRepository {
            repository: RepositoryRef::new("xstefank", name),
            default_branch: "main".to_string(),
        }
    }

    #[tokio::test]
    async fn test_every_repository_is_visited() {
        let mut platform = MockPlatform::new();
        platform.expect_list_repositories().returning(|| {
            Ok(vec![
                installed("valid"),
                installed("missing"),
                installed("broken"),
                installed("error"),
                installed("invalid"),
            ])
        });
        platform
            .expect_fetch_policy()
            .withf(|_, git_ref| git_ref == "main")
            .returning(|repo, _| match repo.name.as_str() {
                "valid" => Ok(Some("wildfly:\n  rules:\n    - id: a\n".to_string())),
                "missing" => Ok(None),
                "broken" => Ok(Some("wildfly: [\n".to_string())),
                "error" => Err(BotError::platform("fetch_policy", "502")),
                _ => Ok(Some(
                    "wildfly:\n  rules:\n    - title: x\n  emails: [a@b.c, d@e.f]\n".to_string(),
                )),
            });

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(2)
            .returning(|mail| {
                if mail.to == "a@b.c" {
                    Ok(())
                } else {
                    Err(BotError::Mail("relay down".to_string()))
                }
            });

        let reconciler = InstallationReconciler::new(
            Arc::new(platform),
            Arc::new(mailer),
            EngineSettings::default(),
            false,
        );
        let summary = reconciler.run().await.unwrap();

        assert_eq!(
            summary,
            ReconcileSummary {
                checked: 5,
                valid: 1,
                invalid: 1,
                skipped: 1,
                failed: 2,
                emails: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_listing_failure_fails_the_run() {
        let mut platform = MockPlatform::new();
        platform
            .expect_list_repositories()
            .returning(|| Err(BotError::platform("list_installation_repositories", "401")));

        let reconciler = InstallationReconciler::new(
            Arc::new(platform),
            Arc::new(MockMailer::new()),
            EngineSettings::default(),
            false,
        );
        assert!(reconciler.run().await.is_err());
    }

    #[tokio::test]
    async fn test_dry_run_sends_no_mail() {
        let mut platform = MockPlatform::new();
        platform
            .expect_list_repositories()
            .returning(|| Ok(vec![installed("invalid")]));
        platform.expect_fetch_policy().returning(|_, _| {
            Ok(Some(
                "wildfly:\n  rules:\n    - id: a\n    - id: a\n  emails: [a@b.c]\n".to_string(),
            ))
        });

        let reconciler = InstallationReconciler::new(
            Arc::new(platform),
            Arc::new(MockMailer::new()),
            EngineSettings::default(),
            true,
        );
        let summary = reconciler.run().await.unwrap();
        assert_eq!(summary.invalid, 1);
        assert_eq!(summary.emails, 1);
    }
}
