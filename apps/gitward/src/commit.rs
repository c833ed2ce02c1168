//! Smart commit generation.
//!
//! A `CommitPlan` is a pure function of the staged changes and the resolved
//! task link. Each staged path casts one vote for a commit type; the scope
//! is the deepest directory shared by every path.

use crate::branch::task_id_from_branch;
use crate::models::task::{ChangeKind, CommitPlan, CommitType, StagedChange, TaskLink, TaskRef};
use crate::tracker::TaskTracker;
use std::collections::BTreeMap;
use tracing::{debug, warn};

const BODY_MAX_ENTRIES: usize = 20;

/// Directory names too generic to serve as a scope.
const GENERIC_DIRS: &[&str] = &["src", "lib", "app", "apps", "crates", "packages", "pkg"];

const CHORE_FILES: &[&str] = &[
    "Cargo.toml",
    "Cargo.lock",
    "build.rs",
    "package.json",
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "Makefile",
    "Dockerfile",
    "rust-toolchain.toml",
    ".gitignore",
    ".gitattributes",
    ".editorconfig",
];

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn dir_segments(path: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    parts.pop();
    parts
}

fn is_test_path(path: &str) -> bool {
    let name = file_name(path);
    let stem = name.split('.').next().unwrap_or(name);
    dir_segments(path)
        .iter()
        .any(|d| matches!(*d, "test" | "tests" | "__tests__" | "spec" | "benches"))
        || stem.ends_with("_test")
        || stem.starts_with("test_")
        || name.contains(".test.")
        || name.contains(".spec.")
}

fn is_docs_path(path: &str) -> bool {
    let name = file_name(path);
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    dir_segments(path).first() == Some(&"docs")
        || matches!(ext.as_deref(), Some("md" | "rst" | "adoc"))
        || name.starts_with("LICENSE")
}

fn is_chore_path(path: &str) -> bool {
    let name = file_name(path);
    CHORE_FILES.contains(&name)
        || dir_segments(path)
            .first()
            .is_some_and(|d| matches!(*d, ".github" | ".gitlab" | ".circleci" | "ci"))
}

/// The type one staged change votes for.
pub fn vote(change: &StagedChange, bug_task: bool) -> CommitType {
    let path = change.path.as_str();
    if is_test_path(path) {
        CommitType::Test
    } else if is_docs_path(path) {
        CommitType::Docs
    } else if is_chore_path(path) {
        CommitType::Chore
    } else {
        match change.kind {
            ChangeKind::Added => CommitType::Feat,
            ChangeKind::Deleted | ChangeKind::Renamed => CommitType::Refactor,
            ChangeKind::Modified if bug_task => CommitType::Fix,
            ChangeKind::Modified => CommitType::Feat,
        }
    }
}

/// Majority vote; ties go to the type declared first in `CommitType`.
pub fn classify(changes: &[StagedChange], bug_task: bool) -> CommitType {
    let mut tally: BTreeMap<CommitType, usize> = BTreeMap::new();
    for c in changes {
        *tally.entry(vote(c, bug_task)).or_default() += 1;
    }
    debug!(?tally, "commit type votes");
    tally
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(t, _)| t)
        .unwrap_or(CommitType::Chore)
}

/// Deepest non-generic directory common to every path.
pub fn scope(changes: &[StagedChange]) -> Option<String> {
    let mut iter = changes.iter().map(|c| dir_segments(&c.path));
    let mut common = iter.next()?;
    for segs in iter {
        let n = common
            .iter()
            .zip(segs.iter())
            .take_while(|(a, b)| a == b)
            .count();
        common.truncate(n);
    }
    common
        .iter()
        .rev()
        .find(|s| !GENERIC_DIRS.contains(*s))
        .map(|s| {
            s.chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|s| !s.is_empty())
}

fn subject_from_changes(changes: &[StagedChange]) -> String {
    if let [only] = changes {
        return format!("{} {}", only.kind.verb(), file_name(&only.path));
    }
    let first = changes.first().map(|c| c.kind);
    let verb = match first {
        Some(k) if changes.iter().all(|c| c.kind == k) => k.verb(),
        _ => ChangeKind::Modified.verb(),
    };
    format!("{} {} files", verb, changes.len())
}

fn subject_from_title(title: &str) -> Option<String> {
    let t = title.trim().trim_end_matches('.').trim();
    let mut chars = t.chars();
    let first = chars.next()?;
    Some(first.to_lowercase().chain(chars).collect())
}

fn body(changes: &[StagedChange]) -> String {
    let mut lines: Vec<String> = changes
        .iter()
        .take(BODY_MAX_ENTRIES)
        .map(|c| format!("- {} {}", c.kind.verb(), c.path))
        .collect();
    if changes.len() > BODY_MAX_ENTRIES {
        lines.push(format!(
            "- ... and {} more",
            changes.len() - BODY_MAX_ENTRIES
        ));
    }
    lines.join("\n")
}

/// Build the plan for `changes`. `None` when nothing is staged.
pub fn plan_commit(
    changes: &[StagedChange],
    task: TaskLink,
    max_header: usize,
) -> Option<CommitPlan> {
    if changes.is_empty() {
        return None;
    }
    let bug = task.task().is_some_and(TaskRef::is_bug);
    let subject = task
        .task()
        .and_then(|t| subject_from_title(&t.title))
        .unwrap_or_else(|| subject_from_changes(changes));
    let mut plan = CommitPlan {
        commit_type: classify(changes, bug),
        scope: scope(changes),
        subject,
        body: body(changes),
        task,
    };
    fit_header(&mut plan, max_header);
    Some(plan)
}

/// Shorten the subject (with `...`) until the header fits `max_header`.
fn fit_header(plan: &mut CommitPlan, max_header: usize) {
    if plan.header().chars().count() <= max_header {
        return;
    }
    let overhead = |p: &CommitPlan| p.header().chars().count() - p.subject.chars().count();
    // A scope that leaves no room for a readable subject is dropped first.
    if max_header.saturating_sub(overhead(plan)) < 8 {
        plan.scope = None;
    }
    let room = max_header.saturating_sub(overhead(plan)).max(4);
    plan.subject = shorten(&plan.subject, room);
}

fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect::<String>().trim_end().to_string();
    out.push_str("...");
    out
}

/// Resolve the task a commit belongs to.
///
/// An explicit id wins over the branch name. No id means `Untracked` and no
/// tracker call at all; a tracker failure keeps the id without a title.
pub fn resolve_task(
    branch: &str,
    explicit: Option<&str>,
    tracker: Option<&dyn TaskTracker>,
) -> TaskLink {
    let id = explicit
        .map(str::to_string)
        .or_else(|| task_id_from_branch(branch));
    let Some(id) = id else {
        debug!(%branch, "no task id in branch name; untracked");
        return TaskLink::Untracked;
    };
    let Some(tracker) = tracker else {
        return TaskLink::Tracked(TaskRef::id_only(&id));
    };
    match tracker.fetch_task(&id) {
        Ok(task) => TaskLink::Tracked(task),
        Err(e) => {
            warn!("{}; using task id {} without details", e, id);
            TaskLink::Tracked(TaskRef::id_only(&id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::fake::FakeTracker;

    fn change(path: &str, kind: ChangeKind) -> StagedChange {
        StagedChange::new(path, kind)
    }

    #[test]
    fn path_categories_vote_before_change_kind() {
        let m = ChangeKind::Modified;
        assert_eq!(vote(&change("tests/cli.rs", m), false), CommitType::Test);
        assert_eq!(vote(&change("src/cache_test.go", m), false), CommitType::Test);
        assert_eq!(vote(&change("web/app.spec.ts", m), false), CommitType::Test);
        assert_eq!(vote(&change("docs/guide/intro.txt", m), false), CommitType::Docs);
        assert_eq!(vote(&change("README.md", m), false), CommitType::Docs);
        assert_eq!(vote(&change("crates/a/Cargo.toml", m), false), CommitType::Chore);
        assert_eq!(vote(&change(".github/workflows/ci.yml", m), false), CommitType::Chore);
        assert_eq!(vote(&change("src/lib.rs", ChangeKind::Added), false), CommitType::Feat);
        assert_eq!(vote(&change("src/lib.rs", ChangeKind::Deleted), false), CommitType::Refactor);
        assert_eq!(vote(&change("src/lib.rs", m), true), CommitType::Fix);
        assert_eq!(vote(&change("src/lib.rs", m), false), CommitType::Feat);
    }

    #[test]
    fn majority_wins_and_ties_break_by_declaration_order() {
        let changes = vec![
            change("tests/a.rs", ChangeKind::Added),
            change("tests/b.rs", ChangeKind::Added),
            change("src/a.rs", ChangeKind::Modified),
        ];
        assert_eq!(classify(&changes, true), CommitType::Test);
        let tie = vec![
            change("README.md", ChangeKind::Modified),
            change("src/a.rs", ChangeKind::Modified),
        ];
        assert_eq!(classify(&tie, true), CommitType::Fix);
        assert_eq!(classify(&tie, false), CommitType::Feat);
    }

    #[test]
    fn scope_is_deepest_common_meaningful_directory() {
        let changes = vec![
            change("src/cache/lru.rs", ChangeKind::Modified),
            change("src/cache/mod.rs", ChangeKind::Modified),
        ];
        assert_eq!(scope(&changes).as_deref(), Some("cache"));
        let changes = vec![
            change("crates/core/src/a.rs", ChangeKind::Modified),
            change("crates/core/src/b/c.rs", ChangeKind::Modified),
        ];
        assert_eq!(scope(&changes).as_deref(), Some("core"));
        let changes = vec![
            change("src/a.rs", ChangeKind::Modified),
            change("docs/b.md", ChangeKind::Modified),
        ];
        assert_eq!(scope(&changes), None);
        assert_eq!(scope(&[change("main.rs", ChangeKind::Added)]), None);
    }

    #[test]
    fn tracked_plan_uses_task_title_and_suffix() {
        let task = TaskRef {
            id: "11".into(),
            title: "Fix memory leak.".into(),
            status: "in-progress".into(),
            kind: "bug".into(),
        };
        let changes = vec![
            change("src/cache/lru.rs", ChangeKind::Modified),
            change("src/cache/mod.rs", ChangeKind::Modified),
        ];
        let plan = plan_commit(&changes, TaskLink::Tracked(task), 100).unwrap();
        assert_eq!(plan.header(), "fix(cache): fix memory leak (task 11)");
        assert_eq!(
            plan.render(),
            "fix(cache): fix memory leak (task 11)\n\n- update src/cache/lru.rs\n- update src/cache/mod.rs"
        );
    }

    #[test]
    fn untracked_plan_is_valid_and_has_no_suffix() {
        let plan = plan_commit(
            &[change("README.md", ChangeKind::Modified)],
            TaskLink::Untracked,
            100,
        )
        .unwrap();
        assert_eq!(plan.header(), "docs: update README.md");
        assert!(plan_commit(&[], TaskLink::Untracked, 100).is_none());
    }

    #[test]
    fn long_headers_are_shortened_and_bodies_capped() {
        let task = TaskRef {
            title: "x".repeat(200),
            ..TaskRef::id_only("7")
        };
        let changes: Vec<_> = (0..25)
            .map(|i| change(&format!("src/net/f{i}.rs"), ChangeKind::Added))
            .collect();
        let plan = plan_commit(&changes, TaskLink::Tracked(task), 72).unwrap();
        assert_eq!(plan.header().chars().count(), 72);
        assert!(plan.subject.ends_with("..."));
        assert!(plan.header().ends_with("(task 7)"));
        assert_eq!(plan.body.lines().count(), BODY_MAX_ENTRIES + 1);
        assert!(plan.body.ends_with("- ... and 5 more"));
    }

    #[test]
    fn task_resolution_degrades_without_failing() {
        let tracker = FakeTracker::with_task("11", "Fix memory leak", "bug");
        match resolve_task("feature/task-11-fix-memory-leak", None, Some(&tracker)) {
            TaskLink::Tracked(t) => assert_eq!(t.title, "Fix memory leak"),
            other => panic!("expected tracked, got {other:?}"),
        }

        let outage = FakeTracker::outage();
        assert_eq!(
            resolve_task("feature/task-11", None, Some(&outage)),
            TaskLink::Tracked(TaskRef::id_only("11"))
        );

        let quiet = FakeTracker::default();
        assert_eq!(resolve_task("main", None, Some(&quiet)), TaskLink::Untracked);
        assert_eq!(*quiet.lookups.borrow(), 0);

        assert_eq!(
            resolve_task("main", Some("42"), None),
            TaskLink::Tracked(TaskRef::id_only("42"))
        );
    }
}
