//! Auto-fixer: bounded, safe-only repair of sync issues.
//!
//! Issues are processed in `IssueKind` order. The first issue that is not
//! auto-fixable, or whose operation fails, stops the pass; it and every
//! later non-advisory issue are reported as `FixConflict`s. The only
//! operations are stash, set-tracking and fast-forward, none of which
//! rewrites history.

use crate::error::Result;
use crate::models::repo::{
    FixAction, FixConflict, FixOperation, FixResult, IssueKind, RepoState, SyncIssue,
};
use crate::sync::{analyze, derive_issues};
use crate::vcs::Vcs;
use serde::Serialize;
use tracing::{info, warn};

/// Upper bound on analyze/fix rounds per invocation. One repair can expose
/// another (setting tracking reveals `behind`), so a single pass is not
/// always enough to reach a fixed point.
pub const MAX_PASSES: usize = 3;

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixReport {
    /// Issues found before any repair.
    pub issues: Vec<SyncIssue>,
    pub actions: Vec<FixAction>,
    pub unresolved: Vec<FixConflict>,
    /// Reported only; never acted on.
    pub advisories: Vec<SyncIssue>,
    pub passes: usize,
}

impl FixReport {
    pub fn resolved(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub fn applied(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.result == FixResult::Applied)
            .count()
    }
}

pub struct AutoFixer<'a> {
    vcs: &'a dyn Vcs,
    remote: &'a str,
    dry_run: bool,
}

impl<'a> AutoFixer<'a> {
    pub fn new(vcs: &'a dyn Vcs, remote: &'a str, dry_run: bool) -> Self {
        AutoFixer {
            vcs,
            remote,
            dry_run,
        }
    }

    /// Analyze and repair until a pass applies nothing.
    pub fn run(&self, fetch: bool) -> Result<FixReport> {
        let mut report = FixReport::default();
        for pass in 0..MAX_PASSES {
            let state = analyze(self.vcs, self.remote, fetch && pass == 0)?;
            let issues = derive_issues(&state);
            if pass == 0 {
                report.issues = issues.clone();
            }
            let (actions, unresolved, advisories) = self.fix_pass(&state, &issues);
            let applied = actions
                .iter()
                .any(|a| a.result == FixResult::Applied);
            report.actions.extend(actions);
            report.unresolved = unresolved;
            report.advisories = advisories;
            report.passes = pass + 1;
            if !applied || !report.unresolved.is_empty() {
                return Ok(report);
            }
        }
        // Still changing after the last pass: report whatever is left.
        let state = analyze(self.vcs, self.remote, false)?;
        let leftover = derive_issues(&state);
        report.advisories = leftover
            .iter()
            .filter(|i| i.kind.advisory())
            .copied()
            .collect();
        report.unresolved = leftover
            .iter()
            .filter(|i| !i.kind.advisory())
            .map(|i| FixConflict {
                kind: i.kind,
                reason: format!("still present after {} repair passes", MAX_PASSES),
                suggestion: i.kind.remediation(self.remote, &state.branch),
            })
            .collect();
        Ok(report)
    }

    /// One ordered pass over `issues`.
    pub fn fix_pass(
        &self,
        state: &RepoState,
        issues: &[SyncIssue],
    ) -> (Vec<FixAction>, Vec<FixConflict>, Vec<SyncIssue>) {
        let mut ordered = issues.to_vec();
        ordered.sort();

        let mut actions = Vec::new();
        let mut unresolved = Vec::new();
        let mut advisories = Vec::new();
        let mut stopped = false;

        for issue in ordered {
            let kind = issue.kind;
            if kind.advisory() {
                advisories.push(issue);
                continue;
            }
            let suggestion = kind.remediation(self.remote, &state.branch);
            if stopped {
                unresolved.push(FixConflict {
                    kind,
                    reason: "not attempted: an earlier issue is unresolved".into(),
                    suggestion,
                });
                continue;
            }
            let Some(operation) = FixOperation::for_issue(kind) else {
                info!(issue = %kind, "not auto-fixable; stopping");
                unresolved.push(FixConflict {
                    kind,
                    reason: not_fixable_reason(kind).into(),
                    suggestion,
                });
                stopped = true;
                continue;
            };
            if self.dry_run {
                actions.push(FixAction {
                    issue_kind: kind,
                    operation,
                    result: FixResult::Skipped,
                    detail: Some("dry run".into()),
                });
                continue;
            }
            match self.apply(operation, state) {
                Ok(()) => {
                    info!(issue = %kind, op = operation.as_str(), "applied");
                    actions.push(FixAction {
                        issue_kind: kind,
                        operation,
                        result: FixResult::Applied,
                        detail: None,
                    });
                }
                Err(detail) => {
                    warn!(issue = %kind, op = operation.as_str(), %detail, "repair failed");
                    actions.push(FixAction {
                        issue_kind: kind,
                        operation,
                        result: FixResult::Failed,
                        detail: Some(detail.clone()),
                    });
                    unresolved.push(FixConflict {
                        kind,
                        reason: detail,
                        suggestion,
                    });
                    stopped = true;
                }
            }
        }
        (actions, unresolved, advisories)
    }

    fn apply(&self, op: FixOperation, state: &RepoState) -> std::result::Result<(), String> {
        match op {
            FixOperation::Stash => self
                .vcs
                .stash_push(&format!("gitward auto-fix on {}", state.branch))
                .map_err(|e| e.to_string()),
            FixOperation::SetTracking => {
                let exists = self
                    .vcs
                    .remote_branch_exists(self.remote, &state.branch)
                    .map_err(|e| e.to_string())?;
                if !exists {
                    return Err(format!(
                        "{}/{} does not exist; publish the branch first",
                        self.remote, state.branch
                    ));
                }
                self.vcs
                    .set_upstream(self.remote, &state.branch)
                    .map_err(|e| e.to_string())
            }
            FixOperation::FastForward => match &state.upstream {
                Some(up) => self.vcs.fast_forward(up).map_err(|e| e.to_string()),
                None => Err("no upstream to fast-forward to".into()),
            },
        }
    }
}

fn not_fixable_reason(kind: IssueKind) -> &'static str {
    match kind {
        IssueKind::Diverged => {
            "local and upstream both have commits the other lacks; merging or rebasing is a manual decision"
        }
        IssueKind::Ahead => "local commits are not pushed; pushing is a manual decision",
        _ => "no safe automatic repair exists",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::fake::FakeVcs;

    #[test]
    fn diverged_branch_is_reported_and_untouched() {
        let vcs = FakeVcs::new("feature/x").tracking("origin/feature/x", 2, 1);
        let report = AutoFixer::new(&vcs, "origin", false).run(false).unwrap();
        assert!(report.actions.is_empty());
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].kind, IssueKind::Diverged);
        assert!(!report.resolved());
        assert!(vcs.calls().is_empty());
    }

    #[test]
    fn behind_branch_is_fast_forwarded_once() {
        let vcs = FakeVcs::new("feature/x").tracking("origin/feature/x", 0, 3);
        let report = AutoFixer::new(&vcs, "origin", false).run(false).unwrap();
        assert_eq!(
            report.actions,
            vec![FixAction {
                issue_kind: IssueKind::Behind,
                operation: FixOperation::FastForward,
                result: FixResult::Applied,
                detail: None,
            }]
        );
        assert!(report.resolved());
        assert_eq!(vcs.calls(), vec!["merge --ff-only origin/feature/x".to_string()]);
    }

    #[test]
    fn second_run_is_a_no_op() {
        let vcs = FakeVcs::new("feature/x").tracking("origin/feature/x", 0, 3);
        vcs.repo.borrow_mut().dirty = true;
        let fixer = AutoFixer::new(&vcs, "origin", false);
        let first = fixer.run(false).unwrap();
        assert_eq!(first.applied(), 2);
        let second = fixer.run(false).unwrap();
        assert!(second.actions.is_empty());
        assert!(second.resolved());
        // The stash left behind is advisory only.
        assert_eq!(second.advisories.len(), 1);
    }

    #[test]
    fn dirty_and_diverged_escalates_without_stashing() {
        let vcs = FakeVcs::new("feature/x").tracking("origin/feature/x", 1, 1);
        vcs.repo.borrow_mut().dirty = true;
        let report = AutoFixer::new(&vcs, "origin", false).run(false).unwrap();
        assert!(report.actions.is_empty());
        let kinds: Vec<_> = report.unresolved.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![IssueKind::Diverged, IssueKind::Dirty]);
        assert!(vcs.repo.borrow().stashes.is_empty());
    }

    #[test]
    fn tracking_then_fast_forward_across_passes() {
        let vcs = FakeVcs::new("feature/x");
        {
            let mut r = vcs.repo.borrow_mut();
            r.dirty = true;
            r.behind = 2;
            r.remote_branches.insert("origin/feature/x".into());
        }
        let report = AutoFixer::new(&vcs, "origin", false).run(false).unwrap();
        let ops: Vec<_> = report.actions.iter().map(|a| a.operation).collect();
        assert_eq!(
            ops,
            vec![
                FixOperation::Stash,
                FixOperation::SetTracking,
                FixOperation::FastForward
            ]
        );
        assert!(report.resolved());
        assert_eq!(report.passes, 3);
    }

    #[test]
    fn failed_operation_stops_and_reports() {
        let vcs = FakeVcs::new("feature/x").tracking("origin/feature/x", 0, 1);
        vcs.repo.borrow_mut().failing.insert("merge");
        let report = AutoFixer::new(&vcs, "origin", false).run(false).unwrap();
        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.actions[0].result, FixResult::Failed);
        assert_eq!(report.unresolved[0].kind, IssueKind::Behind);
        assert_eq!(report.unresolved[0].suggestion, "git merge --ff-only @{u}");
    }

    #[test]
    fn missing_remote_branch_cannot_be_tracked() {
        let vcs = FakeVcs::new("feature/new");
        let report = AutoFixer::new(&vcs, "origin", false).run(false).unwrap();
        assert_eq!(report.actions[0].operation, FixOperation::SetTracking);
        assert_eq!(report.actions[0].result, FixResult::Failed);
        assert_eq!(
            report.unresolved[0].suggestion,
            "git push -u origin feature/new"
        );
    }

    #[test]
    fn dry_run_plans_without_touching_the_repository() {
        let vcs = FakeVcs::new("feature/x").tracking("origin/feature/x", 0, 3);
        vcs.repo.borrow_mut().dirty = true;
        let report = AutoFixer::new(&vcs, "origin", true).run(false).unwrap();
        assert_eq!(report.actions.len(), 2);
        assert!(report
            .actions
            .iter()
            .all(|a| a.result == FixResult::Skipped));
        assert!(vcs.calls().is_empty());
        assert_eq!(report.passes, 1);
    }
}
