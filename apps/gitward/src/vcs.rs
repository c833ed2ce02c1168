//! Version-control seam.
//!
//! `Vcs` lists exactly the git operations the pipeline relies on. `GitCli`
//! drives the `git` binary through `xshell`; any non-zero exit becomes
//! `Error::Vcs` with git's own stderr. Nothing here passes history-rewriting
//! or force flags.

use crate::error::{Error, Result};
use crate::models::task::{ChangeKind, StagedChange};
use std::path::Path;
use tracing::debug;
use xshell::{cmd, Shell};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStat {
    pub path: String,
    /// `None` for binary files.
    pub insertions: Option<u64>,
    pub deletions: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Diff statistics of the current branch against a base ref.
pub struct DiffStat {
    pub files: Vec<FileStat>,
}

impl DiffStat {
    pub fn insertions(&self) -> u64 {
        self.files.iter().filter_map(|f| f.insertions).sum()
    }

    pub fn deletions(&self) -> u64 {
        self.files.iter().filter_map(|f| f.deletions).sum()
    }

    /// `3 files changed, 10 insertions(+), 2 deletions(-)`
    pub fn summary(&self) -> String {
        let n = self.files.len();
        format!(
            "{} file{} changed, {} insertions(+), {} deletions(-)",
            n,
            if n == 1 { "" } else { "s" },
            self.insertions(),
            self.deletions()
        )
    }
}

pub trait Vcs {
    /// Staged changes (index vs HEAD), rename-aware.
    fn staged_changes(&self) -> Result<Vec<StagedChange>>;
    /// Content of `path` as recorded in the index.
    fn staged_content(&self, path: &str) -> Result<Vec<u8>>;
    /// Current branch; detached HEAD is an error.
    fn current_branch(&self) -> Result<String>;
    fn branch_exists(&self, name: &str) -> Result<bool>;
    /// Create `name` from `base` and switch to it.
    fn create_branch(&self, name: &str, base: &str) -> Result<()>;
    fn switch_branch(&self, name: &str) -> Result<()>;
    /// Upstream of the current branch, e.g. `origin/main`.
    fn upstream(&self) -> Result<Option<String>>;
    /// Commits only on HEAD and commits only on `upstream`.
    fn ahead_behind(&self, upstream: &str) -> Result<(u32, u32)>;
    /// Tracked modifications or untracked files present.
    fn is_dirty(&self) -> Result<bool>;
    fn stash_count(&self) -> Result<u32>;
    fn fetch(&self, remote: &str) -> Result<()>;
    fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool>;
    /// Stash tracked and untracked changes.
    fn stash_push(&self, message: &str) -> Result<()>;
    fn set_upstream(&self, remote: &str, branch: &str) -> Result<()>;
    /// `merge --ff-only`; fails instead of creating a merge commit.
    fn fast_forward(&self, upstream: &str) -> Result<()>;
    fn commit(&self, message: &str) -> Result<()>;
    fn diff_stat(&self, base: &str) -> Result<DiffStat>;
    fn last_commit_subject(&self) -> Result<String>;
}

/// `git` invoked through the command line.
pub struct GitCli {
    sh: Shell,
}

impl GitCli {
    pub fn open(root: &Path) -> Result<Self> {
        let sh = Shell::new().map_err(|e| Error::Vcs {
            command: "shell".into(),
            stderr: e.to_string(),
        })?;
        sh.change_dir(root);
        Ok(GitCli { sh })
    }

    /// Run git and return its raw output regardless of exit status.
    fn raw(&self, args: &[&str]) -> Result<std::process::Output> {
        debug!(args = ?args, "git");
        cmd!(self.sh, "git {args...}")
            .quiet()
            .ignore_status()
            .output()
            .map_err(|e| Error::Vcs {
                command: format!("git {}", args.join(" ")),
                stderr: e.to_string(),
            })
    }

    /// Run git, failing with git's stderr on a non-zero exit.
    fn git(&self, args: &[&str]) -> Result<Vec<u8>> {
        let out = self.raw(args)?;
        if !out.status.success() {
            return Err(Error::Vcs {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(out.stdout)
    }

    fn git_text(&self, args: &[&str]) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.git(args)?).trim_end().to_string())
    }

    fn succeeds(&self, args: &[&str]) -> Result<bool> {
        Ok(self.raw(args)?.status.success())
    }
}

impl Vcs for GitCli {
    fn staged_changes(&self) -> Result<Vec<StagedChange>> {
        let out = self.git(&["diff", "--cached", "--name-status", "-z", "-M"])?;
        Ok(parse_name_status(&String::from_utf8_lossy(&out)))
    }

    fn staged_content(&self, path: &str) -> Result<Vec<u8>> {
        let spec = format!(":{}", path);
        self.git(&["show", &spec])
    }

    fn current_branch(&self) -> Result<String> {
        let branch = self.git_text(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        if branch == "HEAD" {
            return Err(Error::Vcs {
                command: "git rev-parse --abbrev-ref HEAD".into(),
                stderr: "not on a branch (detached HEAD state)".into(),
            });
        }
        Ok(branch)
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        let r = format!("refs/heads/{}", name);
        self.succeeds(&["show-ref", "--verify", "--quiet", &r])
    }

    fn create_branch(&self, name: &str, base: &str) -> Result<()> {
        self.git(&["switch", "-c", name, base]).map(|_| ())
    }

    fn switch_branch(&self, name: &str) -> Result<()> {
        self.git(&["switch", name]).map(|_| ())
    }

    fn upstream(&self) -> Result<Option<String>> {
        let branch = self.current_branch()?;
        let r = format!("refs/heads/{}", branch);
        let up = self.git_text(&["for-each-ref", "--format=%(upstream:short)", &r])?;
        let up = up.trim();
        Ok(if up.is_empty() {
            None
        } else {
            Some(up.to_string())
        })
    }

    fn ahead_behind(&self, upstream: &str) -> Result<(u32, u32)> {
        let range = format!("HEAD...{}", upstream);
        let out = self.git_text(&["rev-list", "--left-right", "--count", &range])?;
        parse_left_right(&out).ok_or_else(|| Error::Vcs {
            command: format!("git rev-list --left-right --count {}", range),
            stderr: format!("unexpected output: {}", out),
        })
    }

    fn is_dirty(&self) -> Result<bool> {
        Ok(!self.git_text(&["status", "--porcelain"])?.trim().is_empty())
    }

    fn stash_count(&self) -> Result<u32> {
        let out = self.git_text(&["stash", "list"])?;
        Ok(out.lines().filter(|l| !l.trim().is_empty()).count() as u32)
    }

    fn fetch(&self, remote: &str) -> Result<()> {
        self.git(&["fetch", "--quiet", remote]).map(|_| ())
    }

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool> {
        let r = format!("refs/remotes/{}/{}", remote, branch);
        self.succeeds(&["show-ref", "--verify", "--quiet", &r])
    }

    fn stash_push(&self, message: &str) -> Result<()> {
        self.git(&["stash", "push", "--include-untracked", "-m", message])
            .map(|_| ())
    }

    fn set_upstream(&self, remote: &str, branch: &str) -> Result<()> {
        let target = format!("--set-upstream-to={}/{}", remote, branch);
        self.git(&["branch", &target]).map(|_| ())
    }

    fn fast_forward(&self, upstream: &str) -> Result<()> {
        self.git(&["merge", "--ff-only", upstream]).map(|_| ())
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.git(&["commit", "-m", message]).map(|_| ())
    }

    fn diff_stat(&self, base: &str) -> Result<DiffStat> {
        let range = format!("{}...HEAD", base);
        let out = self.git_text(&["diff", "--numstat", &range])?;
        Ok(parse_numstat(&out))
    }

    fn last_commit_subject(&self) -> Result<String> {
        self.git_text(&["log", "-1", "--format=%s"])
    }
}

/// Parse `git diff --name-status -z` output: NUL-separated status and path
/// fields, unquoted. Renames and copies carry two paths; the new one is kept.
pub fn parse_name_status(out: &str) -> Vec<StagedChange> {
    let mut fields = out.split('\0').filter(|f| !f.is_empty());
    let mut changes = Vec::new();
    while let Some(code) = fields.next() {
        let Some(mut path) = fields.next() else {
            break;
        };
        if code.starts_with(['R', 'C']) {
            match fields.next() {
                Some(new_path) => path = new_path,
                None => break,
            }
        }
        if let Some(kind) = ChangeKind::from_status(code) {
            changes.push(StagedChange::new(path, kind));
        }
    }
    changes
}

/// Parse `git rev-list --left-right --count` output (`<left>\t<right>`).
pub fn parse_left_right(out: &str) -> Option<(u32, u32)> {
    let mut it = out.split_whitespace();
    let ahead = it.next()?.parse().ok()?;
    let behind = it.next()?.parse().ok()?;
    Some((ahead, behind))
}

/// Parse `git diff --numstat` output; binary files report `-`.
pub fn parse_numstat(out: &str) -> DiffStat {
    let files = out
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let ins = parts.next()?;
            let del = parts.next()?;
            let path = parts.next()?;
            Some(FileStat {
                path: path.to_string(),
                insertions: ins.parse().ok(),
                deletions: del.parse().ok(),
            })
        })
        .collect();
    DiffStat { files }
}
