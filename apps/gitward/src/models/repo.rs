//! Repository state, derived sync issues, and auto-fix records.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Live local-vs-upstream state of the current branch. Always queried fresh.
pub struct RepoState {
    pub branch: String,
    pub upstream: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub dirty: bool,
    pub stash_count: u32,
}

impl RepoState {
    pub fn has_upstream(&self) -> bool {
        self.upstream.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
/// Issue kinds. Declaration order is the auto-fix processing order:
/// `Diverged` comes first so a dirty tree on a diverged branch is escalated
/// before anything is stashed.
pub enum IssueKind {
    Diverged,
    Dirty,
    NoUpstream,
    Behind,
    Ahead,
    Stashed,
}

impl IssueKind {
    pub fn auto_fixable(self) -> bool {
        matches!(
            self,
            IssueKind::Dirty | IssueKind::NoUpstream | IssueKind::Behind
        )
    }

    /// Advisory issues are reported but never stop the fixer or count as
    /// unresolved.
    pub fn advisory(self) -> bool {
        matches!(self, IssueKind::Stashed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::Diverged => "diverged",
            IssueKind::Dirty => "dirty",
            IssueKind::NoUpstream => "noUpstream",
            IssueKind::Behind => "behind",
            IssueKind::Ahead => "ahead",
            IssueKind::Stashed => "stashed",
        }
    }

    /// Manual command that resolves this issue.
    pub fn remediation(self, remote: &str, branch: &str) -> String {
        match self {
            IssueKind::Diverged => {
                "git log --oneline --left-right HEAD...@{u}  # then merge or rebase by hand"
                    .to_string()
            }
            IssueKind::Dirty => "git stash push --include-untracked".to_string(),
            IssueKind::NoUpstream => format!("git push -u {} {}", remote, branch),
            IssueKind::Behind => "git merge --ff-only @{u}".to_string(),
            IssueKind::Ahead => "git push".to_string(),
            IssueKind::Stashed => "git stash list".to_string(),
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncIssue {
    pub kind: IssueKind,
    pub auto_fixable: bool,
}

impl SyncIssue {
    pub fn new(kind: IssueKind) -> Self {
        SyncIssue {
            kind,
            auto_fixable: kind.auto_fixable(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
/// The closed set of repair operations. None of them rewrites history or
/// force-overwrites anything.
pub enum FixOperation {
    Stash,
    SetTracking,
    FastForward,
}

impl FixOperation {
    pub fn for_issue(kind: IssueKind) -> Option<Self> {
        match kind {
            IssueKind::Dirty => Some(FixOperation::Stash),
            IssueKind::NoUpstream => Some(FixOperation::SetTracking),
            IssueKind::Behind => Some(FixOperation::FastForward),
            IssueKind::Diverged | IssueKind::Ahead | IssueKind::Stashed => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FixOperation::Stash => "stash",
            FixOperation::SetTracking => "set-tracking",
            FixOperation::FastForward => "fast-forward",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FixResult {
    Applied,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
/// What the fixer did for one issue. Append-only.
pub struct FixAction {
    pub issue_kind: IssueKind,
    pub operation: FixOperation,
    pub result: FixResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
/// An issue the fixer left unresolved, with the command to fix it by hand.
pub struct FixConflict {
    pub kind: IssueKind,
    pub reason: String,
    pub suggestion: String,
}
