//! WildFly Bot - pull request policy enforcement for GitHub repositories
//!
//! Each repository carries a `.github/wildfly-bot.yml` policy. On every pull
//! request event the bot:
//! - validates the policy (unique, non-empty rule ids)
//! - matches rules against the changed files, title and description
//! - checks title, commit and description formats
//! - requests reviews or mentions the people the matching rules list
//! - reports the results as commit statuses, labels and comments
//!
//! # Architecture
//!
//! - **Policy**: typed YAML schema and validator
//! - **Engine**: pure evaluation, outcome planning and the emitter
//! - **Platform**: GitHub and mail interfaces plus their adapters
//! - **Handler / Reconcile**: per-event and startup orchestration
//! - **Webhook**: axum endpoint receiving GitHub deliveries
//!
//! # Example
//!
//! ```ignore
//! use wildfly_bot_core::{evaluate, EngineSettings, Policy, PullRequestSnapshot, RepositoryRef};
//!
//! let settings = EngineSettings::default();
//! let policy = Policy::from_yaml(yaml, &settings)?;
//! let snapshot = PullRequestSnapshot::new(RepositoryRef::new("wildfly", "wildfly"), 1, "sha")
//!     .with_title("WFLY-123 Fix")
//!     .with_changed_files(["src/main/java/A.java"]);
//!
//! let evaluation = evaluate(&policy, &snapshot, &settings);
//! println!("matched: {:?}", evaluation.matched_rule_ids());
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod platform;
pub mod policy;
pub mod reconcile;
pub mod snapshot;
pub mod webhook;

// Re-export commonly used types
pub use config::{BotConfig, EngineSettings};
pub use engine::{evaluate, Action, Evaluation, OutcomeEmitter, OutcomePlan, PolicyState};
pub use error::{BotError, Result};
pub use handler::{EventOutcome, PullRequestHandler};
pub use platform::{DirectoryProbe, GitHubClient, LogMailer, Mailer, Platform};
pub use policy::{validate, Policy, Rule, ValidationReport};
pub use reconcile::{InstallationReconciler, ReconcileSummary};
pub use snapshot::{PrAction, PullRequestSnapshot, RepositoryRef};
