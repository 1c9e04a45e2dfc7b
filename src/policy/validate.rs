//! Structural validation of a policy
//!
//! Problems are accumulated rather than failing on the first one, so the
//! commit status and the administrator email list everything at once.

use super::{Policy, Rule};
use std::fmt;

/// Outcome of validating a policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    problems: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    /// Problems joined into one bracketed line, as embedded in emails and logs
    pub fn problems_text(&self) -> String {
        format!("[{}]", self.problems.join("; "))
    }

    fn missing_id(&mut self, rule: &Rule) {
        self.problems.push(format!("Rule {} is missing an id", rule));
    }

    fn duplicate_id(&mut self, first: &Rule, second: &Rule) {
        self.problems
            .push(format!("Rule {} and {} have the same id", first, second));
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "valid")
        } else {
            write!(f, "{}", self.problems_text())
        }
    }
}

/// Validate rule ids: every rule has one, and no two rules share one.
///
/// Missing ids are reported first, then every colliding pair in declaration
/// order. Rules without an id never collide with each other.
pub fn validate(policy: &Policy) -> ValidationReport {
    let mut report = ValidationReport::default();

    for rule in policy.rules.iter().filter(|rule| rule.id().is_none()) {
        report.missing_id(rule);
    }

    for (i, first) in policy.rules.iter().enumerate() {
        let Some(id) = first.id() else {
            continue;
        };
        for second in &policy.rules[i + 1..] {
            if second.id() == Some(id) {
                report.duplicate_id(first, second);
            }
        }
    }

    report
}
