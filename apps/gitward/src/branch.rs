//! Task branch creation.
//!
//! `feature/task-<id>-<slug>` is derived from the tracker's task title. A
//! tracker outage never blocks branching: the name falls back to
//! `feature/task-<id>` and the status transition is skipped with a warning.

use crate::error::{Error, Result};
use crate::models::task::TaskRef;
use crate::tracker::{TaskTracker, STATUS_IN_PROGRESS};
use crate::vcs::Vcs;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::{info, warn};

const SLUG_MAX: usize = 50;

static TASK_IN_BRANCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|/)task-([A-Za-z0-9]+)(?:-|$)").expect("valid task branch regex")
});

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchOutcome {
    pub branch: String,
    /// `false` when the branch already existed and was only switched to.
    pub created: bool,
    pub task: Option<TaskRef>,
    pub status_updated: bool,
}

/// Lowercase, ASCII alphanumerics joined by single dashes, capped at a word
/// boundary.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for word in title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let word = word.to_ascii_lowercase();
        let extra = if slug.is_empty() { word.len() } else { word.len() + 1 };
        if !slug.is_empty() && slug.len() + extra > SLUG_MAX {
            break;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word);
    }
    slug.truncate(SLUG_MAX);
    slug
}

pub fn branch_name(id: &str, title: Option<&str>) -> String {
    match title.map(slugify).filter(|s| !s.is_empty()) {
        Some(slug) => format!("feature/task-{}-{}", id, slug),
        None => format!("feature/task-{}", id),
    }
}

/// Task id embedded in a branch name such as `feature/task-11-fix-leak`.
pub fn task_id_from_branch(branch: &str) -> Option<String> {
    TASK_IN_BRANCH
        .captures(branch)
        .map(|c| c[1].to_string())
}

fn valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Resolve the task, then create (or switch to) its branch off `base`.
pub fn create_task_branch(
    vcs: &dyn Vcs,
    tracker: Option<&dyn TaskTracker>,
    id: &str,
    base: &str,
) -> Result<BranchOutcome> {
    if !valid_id(id) {
        return Err(Error::config(format!(
            "task id '{}' must be ASCII letters and digits",
            id
        )));
    }
    let task = match tracker {
        Some(t) => match t.fetch_task(id) {
            Ok(task) => Some(task),
            Err(e) => {
                warn!("{}; naming the branch from the id only", e);
                None
            }
        },
        None => {
            warn!("no task tracker configured; naming the branch from the id only");
            None
        }
    };
    let name = branch_name(id, task.as_ref().map(|t| t.title.as_str()));

    let created = if vcs.branch_exists(&name)? {
        info!(branch = %name, "branch exists; switching");
        vcs.switch_branch(&name)?;
        false
    } else {
        info!(branch = %name, base, "creating branch");
        vcs.create_branch(&name, base)?;
        true
    };

    let mut status_updated = false;
    if let (Some(t), Some(_)) = (tracker, task.as_ref()) {
        match t.set_status(id, STATUS_IN_PROGRESS) {
            Ok(()) => status_updated = true,
            Err(e) => warn!("could not mark task {} {}: {}", id, STATUS_IN_PROGRESS, e),
        }
    }

    Ok(BranchOutcome {
        branch: name,
        created,
        task,
        status_updated,
    })
}
