//! Git lifecycle hooks: installation and commit-message validation.
//!
//! Each installed hook is a two-line shell shim that `exec`s
//! `gitward hook <kind>`, so the hook's exit code is gitward's exit code.
//! Installation is idempotent: without `force` an existing file is left
//! byte-for-byte untouched; with `force` the file is rewritten with exactly
//! one shim.

use crate::error::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::info;

const MARKER: &str = "# managed by gitward";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HookKind {
    PreCommit,
    CommitMsg,
    PrePush,
}

impl HookKind {
    pub const ALL: [HookKind; 3] = [HookKind::PreCommit, HookKind::CommitMsg, HookKind::PrePush];

    pub fn file_name(self) -> &'static str {
        match self {
            HookKind::PreCommit => "pre-commit",
            HookKind::CommitMsg => "commit-msg",
            HookKind::PrePush => "pre-push",
        }
    }

    /// Shim content for this hook.
    pub fn script(self, command: &str) -> String {
        format!(
            "#!/bin/sh\n{} ({})\nexec {} hook {} \"$@\"\n",
            MARKER,
            self.file_name(),
            command,
            self.file_name()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallStatus {
    Installed,
    AlreadyInstalled,
    Replaced,
    /// A hook not written by gitward exists; left alone without `--force`.
    SkippedForeign,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    pub hook: HookKind,
    pub path: PathBuf,
    pub status: InstallStatus,
}

/// Install all hooks into `hooks_dir`.
///
/// The directory must already exist; its absence means the root is not a
/// repository.
pub fn install_hooks(hooks_dir: &Path, command: &str, force: bool) -> Result<Vec<InstallOutcome>> {
    if !hooks_dir.is_dir() {
        return Err(Error::config(format!(
            "not a repository: hook directory {} does not exist",
            hooks_dir.display()
        )));
    }
    let mut out = Vec::new();
    for hook in HookKind::ALL {
        let path = hooks_dir.join(hook.file_name());
        let status = if path.exists() {
            if !force {
                let existing = fs::read_to_string(&path).unwrap_or_default();
                if existing.contains(MARKER) {
                    InstallStatus::AlreadyInstalled
                } else {
                    InstallStatus::SkippedForeign
                }
            } else {
                write_hook(&path, &hook.script(command))?;
                InstallStatus::Replaced
            }
        } else {
            write_hook(&path, &hook.script(command))?;
            InstallStatus::Installed
        };
        info!(hook = hook.file_name(), ?status, "hook install");
        out.push(InstallOutcome { hook, path, status });
    }
    Ok(out)
}

fn write_hook(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(feat|fix|docs|style|refactor|perf|test|build|ci|chore|revert)(\([a-zA-Z0-9._/\-]+\))?!?: \S.*$",
    )
    .expect("valid header regex")
});

/// Validate a commit message against the conventional-commit grammar.
///
/// Returns the list of problems; empty means valid. Comment lines are
/// ignored and git-generated merge/revert/fixup/squash messages pass.
pub fn validate_commit_message(message: &str, max_header: usize) -> Vec<String> {
    let mut lines = message
        .lines()
        .filter(|l| !l.starts_with('#'))
        .skip_while(|l| l.trim().is_empty());
    let Some(header) = lines.next() else {
        return vec!["commit message is empty".to_string()];
    };
    let header = header.trim_end();
    if ["Merge ", "Revert \"", "fixup! ", "squash! ", "amend! "]
        .iter()
        .any(|p| header.starts_with(p))
    {
        return Vec::new();
    }
    let mut problems = Vec::new();
    if !HEADER_RE.is_match(header) {
        problems.push(format!(
            "header '{}' does not match `type(scope): subject` (types: feat, fix, docs, style, refactor, perf, test, build, ci, chore, revert)",
            header
        ));
    }
    let len = header.chars().count();
    if len > max_header {
        problems.push(format!(
            "header is {} characters; the limit is {}",
            len, max_header
        ));
    }
    if let Some(second) = lines.next() {
        if !second.trim().is_empty() {
            problems.push("the header must be followed by a blank line".to_string());
        }
    }
    problems
}
