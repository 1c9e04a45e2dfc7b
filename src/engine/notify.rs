//! Notification resolution across matched rules
//!
//! Every notify target of every matched rule ends up in exactly one of two
//! buckets: a formal review request or a `/cc` mention. A login listed by
//! several rules is handled once.

use std::collections::{BTreeSet, HashMap, HashSet};

/// Notify list of one matched rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedNotify<'a> {
    pub rule_id: &'a str,
    /// The rule matched through its directories, so its targets are asked
    /// for a review rather than mentioned
    pub wants_review: bool,
    pub notify: &'a [String],
}

/// Review requests contributed by one rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewBatch {
    pub rule_id: String,
    pub logins: Vec<String>,
}

/// Who gets a review request and who gets mentioned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationPlan {
    pub review_batches: Vec<ReviewBatch>,
    pub mentions: Vec<String>,
}

impl NotificationPlan {
    /// All review requests in order
    pub fn review_requests(&self) -> Vec<String> {
        self.review_batches
            .iter()
            .flat_map(|batch| batch.logins.iter().cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.review_batches.is_empty() && self.mentions.is_empty()
    }

    /// Single comment pinging every mention target, if there is any
    pub fn mention_comment(&self) -> Option<String> {
        mention_comment(&self.mentions)
    }
}

/// Render `/cc @a, @b`
pub fn mention_comment(logins: &[String]) -> Option<String> {
    if logins.is_empty() {
        return None;
    }
    let handles: Vec<String> = logins.iter().map(|login| format!("@{}", login)).collect();
    Some(format!("/cc {}", handles.join(", ")))
}

/// Strip whitespace and a leading `@` from a policy login
pub fn normalize_login(login: &str) -> &str {
    let login = login.trim();
    login.strip_prefix('@').unwrap_or(login)
}

struct Candidate<'a> {
    login: &'a str,
    /// First rule matched through directories that lists this login
    review_rule: Option<&'a str>,
}

/// Partition notify targets into review requests and mentions.
///
/// 1. Notify lists are unioned in rule order; duplicates collapse.
/// 2. The author and bot accounts are dropped.
/// 3. A login is requested for review when some directory-matched rule lists
///    it, it is a collaborator and it is not already a reviewer. Everybody
///    else is mentioned.
pub fn resolve(
    matched: &[MatchedNotify<'_>],
    author: &str,
    existing_reviewers: &BTreeSet<String>,
    collaborators: &BTreeSet<String>,
    bot_logins: &[String],
) -> NotificationPlan {
    let mut order: Vec<Candidate<'_>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for rule in matched {
        for raw in rule.notify {
            let login = normalize_login(raw);
            if login.is_empty() || login == author || bot_logins.iter().any(|b| b == login) {
                continue;
            }

            let position = *index.entry(login).or_insert_with(|| {
                order.push(Candidate {
                    login,
                    review_rule: None,
                });
                order.len() - 1
            });

            let candidate = &mut order[position];
            if rule.wants_review && candidate.review_rule.is_none() {
                candidate.review_rule = Some(rule.rule_id);
            }
        }
    }

    let mut plan = NotificationPlan::default();
    let mut requested: HashSet<&str> = HashSet::new();

    for candidate in &order {
        let reviewable = candidate.review_rule.is_some()
            && !existing_reviewers.contains(candidate.login)
            && collaborators.contains(candidate.login);

        match candidate.review_rule {
            Some(rule_id) if reviewable && requested.insert(candidate.login) => {
                match plan.review_batches.iter_mut().find(|b| b.rule_id == rule_id) {
                    Some(batch) => batch.logins.push(candidate.login.to_string()),
                    None => plan.review_batches.push(ReviewBatch {
                        rule_id: rule_id.to_string(),
                        logins: vec![candidate.login.to_string()],
                    }),
                }
            }
            _ => plan.mentions.push(candidate.login.to_string()),
        }
    }

    plan
}
