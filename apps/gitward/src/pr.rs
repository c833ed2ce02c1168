//! Pull-request rendering and submission.
//!
//! Content is rendered from the task link and the branch's diff statistics
//! against the integration branch. Submission is delegated to a `PrHost`
//! (the `gh` CLI by default); the resulting URL is then recorded on the task
//! tracker when one is linked.

use crate::commit::resolve_task;
use crate::error::{Error, Result};
use crate::models::task::TaskLink;
use crate::tracker::TaskTracker;
use crate::vcs::{DiffStat, Vcs};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};
use xshell::{cmd, Shell};

const FILE_LIST_MAX: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrContent {
    pub title: String,
    pub body: String,
    pub base: String,
    pub head: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrOutcome {
    pub content: PrContent,
    pub task: TaskLink,
    /// `None` for dry runs.
    pub url: Option<String>,
    pub linked: bool,
}

pub trait PrHost {
    /// Open the pull request and return its URL.
    fn create(&self, pr: &PrContent) -> Result<String>;
}

/// Opens pull requests with `gh pr create`.
pub struct GhCli {
    sh: Shell,
}

impl GhCli {
    pub fn open(root: &Path) -> Result<Self> {
        let sh = Shell::new().map_err(|e| Error::Vcs {
            command: "shell".into(),
            stderr: e.to_string(),
        })?;
        sh.change_dir(root);
        Ok(GhCli { sh })
    }
}

impl PrHost for GhCli {
    fn create(&self, pr: &PrContent) -> Result<String> {
        let (base, head, title, body) = (&pr.base, &pr.head, &pr.title, &pr.body);
        let out = cmd!(
            self.sh,
            "gh pr create --base {base} --head {head} --title {title} --body {body}"
        )
        .quiet()
        .ignore_status()
        .output()
        .map_err(|e| Error::Vcs {
            command: "gh pr create".into(),
            stderr: e.to_string(),
        })?;
        if !out.status.success() {
            return Err(Error::Vcs {
                command: "gh pr create".into(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&out.stdout);
        Ok(stdout
            .lines()
            .rev()
            .find(|l| l.starts_with("http"))
            .unwrap_or(stdout.trim())
            .to_string())
    }
}

/// `Task <id>: <title>`; `fallback` (usually the last commit subject) stands
/// in for a missing title or a missing task.
pub fn render_title(task: &TaskLink, fallback: &str) -> String {
    match task.task() {
        Some(t) if !t.title.trim().is_empty() => format!("Task {}: {}", t.id, t.title.trim()),
        Some(t) => format!("Task {}: {}", t.id, fallback),
        None => fallback.to_string(),
    }
}

pub fn render_body(task: &TaskLink, stat: &DiffStat) -> String {
    let mut out = String::from("## Task\n\n");
    match task.task() {
        Some(t) => {
            out.push_str(&format!("- ID: {}\n", t.id));
            for (label, value) in [("Title", &t.title), ("Status", &t.status), ("Type", &t.kind)] {
                if !value.is_empty() {
                    out.push_str(&format!("- {}: {}\n", label, value));
                }
            }
        }
        None => out.push_str("No linked task.\n"),
    }

    out.push_str("\n## Checklist\n\n");
    for item in [
        "Tests added or updated",
        "Documentation updated",
        "`gitward scan` and `gitward gate` pass",
        "No breaking changes, or they are described above",
    ] {
        out.push_str(&format!("- [ ] {}\n", item));
    }

    out.push_str("\n## Changes\n\n");
    out.push_str(&stat.summary());
    out.push('\n');
    if !stat.files.is_empty() {
        out.push('\n');
    }
    for f in stat.files.iter().take(FILE_LIST_MAX) {
        match (f.insertions, f.deletions) {
            (Some(i), Some(d)) => out.push_str(&format!("- `{}` (+{}/-{})\n", f.path, i, d)),
            _ => out.push_str(&format!("- `{}` (binary)\n", f.path)),
        }
    }
    if stat.files.len() > FILE_LIST_MAX {
        out.push_str(&format!(
            "- ... and {} more\n",
            stat.files.len() - FILE_LIST_MAX
        ));
    }
    out
}

pub struct PrRequest<'a> {
    pub task_id: Option<&'a str>,
    pub base: &'a str,
    pub remote: &'a str,
    pub dry_run: bool,
}

/// Render the pull request for the current branch and, unless dry-running,
/// submit it through `host`.
pub fn create_pr(
    vcs: &dyn Vcs,
    tracker: Option<&dyn TaskTracker>,
    host: &dyn PrHost,
    req: &PrRequest<'_>,
) -> Result<PrOutcome> {
    let head = vcs.current_branch()?;
    if head == req.base {
        return Err(Error::config(format!(
            "current branch is the integration branch '{}'; switch to a task branch first",
            req.base
        )));
    }
    let task = resolve_task(&head, req.task_id, tracker);
    let stat = vcs.diff_stat(req.base)?;
    let fallback = vcs.last_commit_subject()?;
    let content = PrContent {
        title: render_title(&task, &fallback),
        body: render_body(&task, &stat),
        base: req.base.to_string(),
        head: head.clone(),
    };
    if req.dry_run {
        return Ok(PrOutcome {
            content,
            task,
            url: None,
            linked: false,
        });
    }

    if !vcs.remote_branch_exists(req.remote, &head)? {
        return Err(Error::config(format!(
            "{}/{} does not exist; publish it with `git push -u {} {}`",
            req.remote, head, req.remote, head
        )));
    }
    let url = host.create(&content)?;
    info!(%url, "pull request created");

    let mut linked = false;
    if let (Some(t), Some(tracker)) = (task.task(), tracker) {
        match tracker.link_pull_request(&t.id, &url, &head) {
            Ok(()) => linked = true,
            Err(e) => warn!("pull request not linked to task {}: {}", t.id, e),
        }
    }
    Ok(PrOutcome {
        content,
        task,
        url: Some(url),
        linked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::TaskRef;
    use crate::tracker::fake::FakeTracker;
    use crate::vcs::fake::FakeVcs;
    use crate::vcs::FileStat;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeHost {
        created: RefCell<Vec<PrContent>>,
        fail: bool,
    }

    impl PrHost for FakeHost {
        fn create(&self, pr: &PrContent) -> Result<String> {
            if self.fail {
                return Err(Error::Vcs {
                    command: "gh pr create".into(),
                    stderr: "HTTP 422".into(),
                });
            }
            self.created.borrow_mut().push(pr.clone());
            Ok("https://example.test/pull/7".into())
        }
    }

    fn stat() -> DiffStat {
        DiffStat {
            files: vec![
                FileStat {
                    path: "src/cache.rs".into(),
                    insertions: Some(10),
                    deletions: Some(2),
                },
                FileStat {
                    path: "logo.png".into(),
                    insertions: None,
                    deletions: None,
                },
            ],
        }
    }

    fn task_branch() -> FakeVcs {
        let vcs = FakeVcs::new("feature/task-11-fix-memory-leak");
        {
            let mut r = vcs.repo.borrow_mut();
            r.diff = stat();
            r.commits.push("fix(cache): fix memory leak (task 11)".into());
            r.remote_branches
                .insert("origin/feature/task-11-fix-memory-leak".into());
        }
        vcs
    }

    fn req(dry_run: bool) -> PrRequest<'static> {
        PrRequest {
            task_id: None,
            base: "main",
            remote: "origin",
            dry_run,
        }
    }

    #[test]
    fn title_forms() {
        let full = TaskLink::Tracked(TaskRef {
            title: "Fix memory leak".into(),
            ..TaskRef::id_only("11")
        });
        assert_eq!(render_title(&full, "x"), "Task 11: Fix memory leak");
        let bare = TaskLink::Tracked(TaskRef::id_only("11"));
        assert_eq!(render_title(&bare, "fix leak"), "Task 11: fix leak");
        assert_eq!(render_title(&TaskLink::Untracked, "fix leak"), "fix leak");
    }

    #[test]
    fn body_has_task_checklist_and_stats() {
        let task = TaskLink::Tracked(TaskRef {
            title: "Fix memory leak".into(),
            kind: "bug".into(),
            ..TaskRef::id_only("11")
        });
        let body = render_body(&task, &stat());
        assert!(body.contains("- ID: 11\n- Title: Fix memory leak\n- Type: bug\n"));
        assert!(!body.contains("Status"));
        assert_eq!(body.matches("- [ ] ").count(), 4);
        assert!(body.contains("2 files changed, 10 insertions(+), 2 deletions(-)"));
        assert!(body.contains("- `src/cache.rs` (+10/-2)"));
        assert!(body.contains("- `logo.png` (binary)"));
        assert!(
            render_body(&TaskLink::Untracked, &DiffStat::default()).contains("No linked task.")
        );
    }

    #[test]
    fn creates_and_links_pull_request() {
        let vcs = task_branch();
        let tracker = FakeTracker::with_task("11", "Fix memory leak", "bug");
        let host = FakeHost::default();
        let out = create_pr(&vcs, Some(&tracker), &host, &req(false)).unwrap();
        assert_eq!(out.content.title, "Task 11: Fix memory leak");
        assert_eq!(out.content.head, "feature/task-11-fix-memory-leak");
        assert_eq!(out.url.as_deref(), Some("https://example.test/pull/7"));
        assert!(out.linked);
        assert_eq!(tracker.links.borrow().len(), 1);
        assert_eq!(host.created.borrow().len(), 1);
    }

    #[test]
    fn dry_run_renders_without_submitting() {
        let vcs = task_branch();
        let host = FakeHost::default();
        let out = create_pr(&vcs, None, &host, &req(true)).unwrap();
        assert!(out.url.is_none());
        assert!(host.created.borrow().is_empty());
        assert_eq!(out.content.title, "Task 11: fix(cache): fix memory leak (task 11)");
    }

    #[test]
    fn tracker_outage_still_creates_the_pull_request() {
        let vcs = task_branch();
        let tracker = FakeTracker::outage();
        let host = FakeHost::default();
        let out = create_pr(&vcs, Some(&tracker), &host, &req(false)).unwrap();
        assert!(out.url.is_some());
        assert!(!out.linked);
    }

    #[test]
    fn creation_failures_surface() {
        let host = FakeHost {
            fail: true,
            ..Default::default()
        };
        assert!(matches!(
            create_pr(&task_branch(), None, &host, &req(false)),
            Err(Error::Vcs { .. })
        ));

        let unpublished = FakeVcs::new("feature/task-12");
        assert!(matches!(
            create_pr(&unpublished, None, &FakeHost::default(), &req(false)),
            Err(Error::Config(_))
        ));

        let on_main = FakeVcs::new("main");
        assert!(create_pr(&on_main, None, &FakeHost::default(), &req(true)).is_err());
    }
}
