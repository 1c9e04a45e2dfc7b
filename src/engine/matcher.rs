//! Path/directory matching of rule scopes against changed files

use crate::platform::DirectoryProbe;
use crate::policy::Policy;
use crate::snapshot::RepositoryRef;
use tracing::{debug, warn};

/// Whether any changed file falls under any declared entry.
///
/// An entry matches a file when both are equal or when the file lives below
/// the entry (`entry + "/"` prefix), at any depth. No entries means the rule
/// is project-wide and matches every change set, including an empty one.
pub fn matches(directories: &[String], changed_files: &[String]) -> bool {
    if directories.is_empty() {
        return true;
    }

    directories.iter().any(|entry| {
        changed_files
            .iter()
            .any(|file| entry_matches(entry, file))
    })
}

fn entry_matches(entry: &str, file: &str) -> bool {
    let entry = entry.trim().trim_end_matches('/');
    if entry.is_empty() {
        return false;
    }

    file == entry
        || file
            .strip_prefix(entry)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Result of one existence query for a declared rule entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeDiagnostic {
    pub rule_id: String,
    pub path: String,
    /// `None` when the query itself failed
    pub exists: Option<bool>,
}

/// Query the repository for every declared entry of every rule.
///
/// Purely observational: the answers are logged and returned, never fed
/// back into matching or validation.
pub async fn probe_scopes(
    policy: &Policy,
    probe: &dyn DirectoryProbe,
    repository: &RepositoryRef,
    git_ref: &str,
) -> Vec<ScopeDiagnostic> {
    let mut diagnostics = Vec::new();

    for rule in &policy.rules {
        for path in &rule.directories {
            let exists = match probe.path_exists(repository, path, git_ref).await {
                Ok(true) => {
                    debug!("Rule {} scope '{}' exists in {}", rule.display_id(), path, repository);
                    Some(true)
                }
                Ok(false) => {
                    warn!(
                        "Rule {} declares '{}' which does not exist in {} at {}",
                        rule.display_id(),
                        path,
                        repository,
                        git_ref
                    );
                    Some(false)
                }
                Err(e) => {
                    warn!("Unable to check '{}' in {}: {}", path, repository, e);
                    None
                }
            };

            diagnostics.push(ScopeDiagnostic {
                rule_id: rule.display_id().to_string(),
                path: path.clone(),
                exists,
            });
        }
    }

    diagnostics
}
