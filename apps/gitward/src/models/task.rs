//! Task-tracker references, staged changes, and commit plans.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Task metadata as owned by the external tracker.
pub struct TaskRef {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub kind: String,
}

impl TaskRef {
    /// A reference built from the identifier alone, used when the tracker is
    /// unreachable but the id is known.
    pub fn id_only(id: &str) -> Self {
        TaskRef {
            id: id.to_string(),
            title: String::new(),
            status: String::new(),
            kind: String::new(),
        }
    }

    pub fn is_bug(&self) -> bool {
        matches!(
            self.kind.to_ascii_lowercase().as_str(),
            "bug" | "defect" | "fix" | "bugfix"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
/// Task association of a commit or PR. `Untracked` is a valid outcome.
pub enum TaskLink {
    Tracked(TaskRef),
    Untracked,
}

impl TaskLink {
    pub fn task(&self) -> Option<&TaskRef> {
        match self {
            TaskLink::Tracked(t) => Some(t),
            TaskLink::Untracked => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeKind {
    /// Parse the status letter of `git diff --name-status` (`R100` -> renamed).
    pub fn from_status(code: &str) -> Option<Self> {
        match code.chars().next()? {
            'A' | 'C' => Some(ChangeKind::Added),
            'M' | 'T' => Some(ChangeKind::Modified),
            'D' => Some(ChangeKind::Deleted),
            'R' => Some(ChangeKind::Renamed),
            _ => None,
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            ChangeKind::Added => "add",
            ChangeKind::Modified => "update",
            ChangeKind::Deleted => "remove",
            ChangeKind::Renamed => "rename",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One entry of the staged diff.
pub struct StagedChange {
    pub path: String,
    pub kind: ChangeKind,
}

impl StagedChange {
    pub fn new(path: &str, kind: ChangeKind) -> Self {
        StagedChange {
            path: path.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
/// Conventional-commit types the generator can emit. Declaration order is
/// the tie-break order of the majority vote.
pub enum CommitType {
    Fix,
    Feat,
    Refactor,
    Test,
    Docs,
    Chore,
}

impl CommitType {
    pub fn as_str(self) -> &'static str {
        match self {
            CommitType::Fix => "fix",
            CommitType::Feat => "feat",
            CommitType::Refactor => "refactor",
            CommitType::Test => "test",
            CommitType::Docs => "docs",
            CommitType::Chore => "chore",
        }
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitPlan {
    #[serde(rename = "type")]
    pub commit_type: CommitType,
    pub scope: Option<String>,
    pub subject: String,
    pub body: String,
    pub task: TaskLink,
}

impl CommitPlan {
    /// `type(scope): subject (task <id>)`; scope and suffix are optional.
    pub fn header(&self) -> String {
        let mut out = self.commit_type.to_string();
        if let Some(scope) = &self.scope {
            out.push_str(&format!("({})", scope));
        }
        out.push_str(": ");
        out.push_str(&self.subject);
        if let Some(task) = self.task.task() {
            out.push_str(&format!(" (task {})", task.id));
        }
        out
    }

    /// Full commit message: header, blank line, body.
    pub fn render(&self) -> String {
        if self.body.trim().is_empty() {
            self.header()
        } else {
            format!("{}\n\n{}", self.header(), self.body.trim_end())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_includes_scope_and_task_suffix() {
        let plan = CommitPlan {
            commit_type: CommitType::Fix,
            scope: Some("cache".into()),
            subject: "fix memory leak".into(),
            body: String::new(),
            task: TaskLink::Tracked(TaskRef::id_only("11")),
        };
        assert_eq!(plan.header(), "fix(cache): fix memory leak (task 11)");
        assert_eq!(plan.render(), plan.header());
    }

    #[test]
    fn untracked_header_omits_suffix() {
        let plan = CommitPlan {
            commit_type: CommitType::Docs,
            scope: None,
            subject: "update readme".into(),
            body: "- modified README.md\n".into(),
            task: TaskLink::Untracked,
        };
        assert_eq!(plan.header(), "docs: update readme");
        assert_eq!(plan.render(), "docs: update readme\n\n- modified README.md");
    }

    #[test]
    fn status_letters_map_to_change_kinds() {
        assert_eq!(ChangeKind::from_status("R087"), Some(ChangeKind::Renamed));
        assert_eq!(ChangeKind::from_status("C100"), Some(ChangeKind::Added));
        assert_eq!(ChangeKind::from_status("M"), Some(ChangeKind::Modified));
        assert_eq!(ChangeKind::from_status("X"), None);
    }
}
