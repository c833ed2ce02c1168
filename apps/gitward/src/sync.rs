//! Sync status analysis: local branch vs. its upstream.
//!
//! `analyze` queries live repository state (never cached); `derive_issues`
//! maps a `RepoState` to the issues it exhibits through a fixed decision
//! table:
//!
//! | ahead | behind | dirty | issues            |
//! |-------|--------|-------|-------------------|
//! | 0     | 0      | false | none              |
//! | 0     | >0     | any   | `behind`          |
//! | >0    | 0      | any   | `ahead`           |
//! | >0    | >0     | any   | `diverged`        |
//! | any   | any    | true  | `dirty` (in addition) |
//!
//! Without an upstream the counts are meaningless and `noUpstream` replaces
//! the ahead/behind row. A non-empty stash list adds the advisory `stashed`.

use crate::error::Result;
use crate::models::repo::{IssueKind, RepoState, SyncIssue};
use crate::vcs::Vcs;
use tracing::debug;

/// Query the current repository state. With `fetch`, remote-tracking refs are
/// refreshed from `remote` first.
pub fn analyze(vcs: &dyn Vcs, remote: &str, fetch: bool) -> Result<RepoState> {
    if fetch {
        vcs.fetch(remote)?;
    }
    let branch = vcs.current_branch()?;
    let upstream = vcs.upstream()?;
    let (ahead, behind) = match &upstream {
        Some(up) => vcs.ahead_behind(up)?,
        None => (0, 0),
    };
    let state = RepoState {
        branch,
        upstream,
        ahead,
        behind,
        dirty: vcs.is_dirty()?,
        stash_count: vcs.stash_count()?,
    };
    debug!(?state, "repository state");
    Ok(state)
}

/// Total, deterministic mapping from state to issues, sorted in fixer order.
pub fn derive_issues(state: &RepoState) -> Vec<SyncIssue> {
    let mut kinds = Vec::new();
    if !state.has_upstream() {
        kinds.push(IssueKind::NoUpstream);
    } else {
        match (state.ahead > 0, state.behind > 0) {
            (false, false) => {}
            (false, true) => kinds.push(IssueKind::Behind),
            (true, false) => kinds.push(IssueKind::Ahead),
            (true, true) => kinds.push(IssueKind::Diverged),
        }
    }
    if state.dirty {
        kinds.push(IssueKind::Dirty);
    }
    if state.stash_count > 0 {
        kinds.push(IssueKind::Stashed);
    }
    kinds.sort();
    kinds.into_iter().map(SyncIssue::new).collect()
}

/// One-line human summary, e.g. `feature/x -> origin/feature/x: 2 ahead, 1 behind, dirty`.
pub fn describe(state: &RepoState) -> String {
    let target = state.upstream.as_deref().unwrap_or("(no upstream)");
    let mut parts = vec![format!("{} ahead", state.ahead), format!("{} behind", state.behind)];
    if state.dirty {
        parts.push("dirty".into());
    }
    if state.stash_count > 0 {
        parts.push(format!("{} stashed", state.stash_count));
    }
    format!("{} -> {}: {}", state.branch, target, parts.join(", "))
}
