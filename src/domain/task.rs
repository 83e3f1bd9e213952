use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::git::CommitInfo;

/// Unique, lexicographically ordered task identifiers
pub type TaskSet = BTreeSet<String>;

/// Which task identifiers are taken from a commit message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPolicy {
    /// At most one identifier, and only at the very start of the summary
    #[default]
    Anchored,
    /// Every identifier anywhere in the summary
    Any,
}

fn anchored_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z]{2,10}-\d{5,6})\b").expect("valid task regex"))
}

fn any_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z]{2,10}-\d{5,6})\b").expect("valid task regex"))
}

/// Extract task identifiers (`ABC-12345`) from a commit message
///
/// Only the first line is inspected. The identifier must end at a word
/// boundary, so `xy-99999z` is not an identifier.
pub fn extract_task_ids(message: &str, policy: TaskPolicy) -> Vec<String> {
    let summary = message.lines().next().unwrap_or("").trim_start();

    match policy {
        TaskPolicy::Anchored => anchored_regex()
            .captures(summary)
            .and_then(|c| c.get(1))
            .map(|m| vec![m.as_str().to_string()])
            .unwrap_or_default(),
        TaskPolicy::Any => {
            let mut ids: Vec<String> = Vec::new();
            for captures in any_regex().captures_iter(summary) {
                if let Some(m) = captures.get(1) {
                    if !ids.iter().any(|id| id == m.as_str()) {
                        ids.push(m.as_str().to_string());
                    }
                }
            }
            ids
        }
    }
}

/// A commit together with the task identifiers it references
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    pub hash: String,
    pub message: String,
    pub task_ids: Vec<String>,
}

impl CommitRecord {
    pub fn from_commit(commit: &CommitInfo, policy: TaskPolicy) -> Self {
        CommitRecord {
            hash: commit.hash.clone(),
            message: commit.message.clone(),
            task_ids: extract_task_ids(&commit.message, policy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchored_policy_scenario() {
        let messages = ["ABC-12345 fix", "no id here", "xy-99999z more"];
        let found: TaskSet = messages
            .iter()
            .flat_map(|m| extract_task_ids(m, TaskPolicy::Anchored))
            .collect();

        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["ABC-12345"]);
    }

    #[test]
    fn test_anchored_ignores_ids_after_start() {
        assert!(extract_task_ids("fix ABC-12345 again", TaskPolicy::Anchored).is_empty());
    }

    #[test]
    fn test_anchored_takes_only_first_id() {
        assert_eq!(
            extract_task_ids("ABC-12345 ABC-54321 both", TaskPolicy::Anchored),
            vec!["ABC-12345"]
        );
    }

    #[test]
    fn test_digit_count_bounds() {
        assert!(extract_task_ids("AB-1234 short", TaskPolicy::Anchored).is_empty());
        assert_eq!(
            extract_task_ids("AB-123456: six digits", TaskPolicy::Anchored),
            vec!["AB-123456"]
        );
        assert!(extract_task_ids("AB-1234567 too long", TaskPolicy::Anchored).is_empty());
    }

    #[test]
    fn test_prefix_length_bounds() {
        assert!(extract_task_ids("A-12345 one letter", TaskPolicy::Anchored).is_empty());
        assert_eq!(
            extract_task_ids("ABCDEFGHIJ-12345", TaskPolicy::Anchored),
            vec!["ABCDEFGHIJ-12345"]
        );
    }

    #[test]
    fn test_slash_is_not_a_separator() {
        assert!(extract_task_ids("ABC/12345 fix", TaskPolicy::Anchored).is_empty());
    }

    #[test]
    fn test_only_summary_line_is_used() {
        assert!(extract_task_ids("merge branch\n\nABC-12345 body", TaskPolicy::Anchored).is_empty());
    }

    #[test]
    fn test_any_policy_collects_every_occurrence() {
        assert_eq!(
            extract_task_ids("Merge ABC-12345 and XY-99999 (ABC-12345)", TaskPolicy::Any),
            vec!["ABC-12345", "XY-99999"]
        );
    }

    #[test]
    fn test_policy_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: TaskPolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"any\"").unwrap();
        assert_eq!(w.policy, TaskPolicy::Any);
    }

    #[test]
    fn test_commit_record_from_commit() {
        let info = CommitInfo {
            hash: "abc123".to_string(),
            message: "PAY-10001 refund flow".to_string(),
        };
        let record = CommitRecord::from_commit(&info, TaskPolicy::Anchored);
        assert_eq!(record.task_ids, vec!["PAY-10001"]);
        assert_eq!(record.hash, "abc123");
    }
}
