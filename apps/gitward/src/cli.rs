//! CLI argument parsing via `clap`.

use crate::hooks::HookKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gitward",
    version,
    about = "Commit safety gates, task branches, and upstream sync repair",
    long_about = "gitward blocks commits that leak credentials or break performance budgets, derives branches, commits, and pull requests from your task tracker, and keeps a branch in sync with its upstream using safe repairs only.\n\nConfiguration precedence: CLI > gitward.toml > defaults.\nTask tracker: GITWARD_TRACKER_URL / GITWARD_TRACKER_TOKEN (optional).",
    after_help = "Examples:\n  gitward install-hooks\n  gitward branch 11\n  gitward commit --yes\n  gitward pr --dry-run\n  gitward status --fetch --detailed\n  gitward auto-fix --dry-run",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[arg(long, global = true, help = "Repository root (default: current dir)")]
    pub repo_root: Option<String>,
    #[arg(
        long,
        global = true,
        help = "Log filter, e.g. debug or gitward=trace (default: $GITWARD_LOG, else warn)"
    )]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current gitward version.")]
    Version,
    /// Scan staged content for secrets
    #[command(
        about = "Scan staged files for secrets",
        long_about = "Check staged (index) content against the pattern registry. Exits 1 when any finding or blocked file is present.",
        after_help = "Examples:\n  gitward scan\n  gitward scan --output json"
    )]
    Scan {
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Evaluate performance budgets
    #[command(
        about = "Run the performance gate",
        long_about = "Evaluate [[gate.budgets]] when a staged file matches a gate trigger. Exits 1 when any budget fails, 2 when metrics are unavailable."
    )]
    Gate {
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Install git hooks
    #[command(
        about = "Install lifecycle hooks",
        long_about = "Write pre-commit, commit-msg, and pre-push hooks that call back into gitward. Existing hooks are left untouched unless --force is given. Seeds the pattern registry when missing."
    )]
    InstallHooks {
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Replace existing hooks")]
        force: bool,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Create or switch to a task branch
    #[command(
        about = "Create or switch to a task branch",
        long_about = "Resolve the task on the tracker and switch to feature/task-<id>-<slug>, creating it from the integration branch when needed. Marks the task in progress."
    )]
    Branch {
        #[arg(help = "Task identifier")]
        task_id: String,
    },
    /// Generate a conventional commit
    #[command(
        about = "Commit staged changes with a generated message",
        long_about = "Classify staged changes, resolve the task from the branch name (or --task), and create a conventional commit after confirmation."
    )]
    Commit {
        #[arg(long, short = 'y', action = clap::ArgAction::SetTrue, help = "Commit without asking for confirmation")]
        yes: bool,
        #[arg(long, help = "Task identifier (default: inferred from the branch name)")]
        task: Option<String>,
    },
    /// Open a pull request
    #[command(
        about = "Open a pull request for the current branch",
        long_about = "Render a title and body from the task and the diff against the integration branch, open it with `gh`, and link it on the task tracker."
    )]
    Pr {
        #[arg(help = "Task identifier (default: inferred from the branch name)")]
        task_id: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Print the pull request without creating it")]
        dry_run: bool,
    },
    /// Show sync status
    #[command(
        about = "Show sync status against the upstream",
        long_about = "Report ahead/behind counts, working tree dirtiness, stashes, and the derived sync issues. Always exits 0 unless git itself fails."
    )]
    Status {
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Fetch the remote before comparing")]
        fetch: bool,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Show the manual command for every issue")]
        detailed: bool,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Apply safe sync repairs
    #[command(
        about = "Apply safe repairs",
        long_about = "Stash local changes, set upstream tracking, and fast-forward. Never merges, rebases, or force-pushes. Exits 1 when an issue remains unresolved."
    )]
    AutoFix {
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Plan repairs without applying them")]
        dry_run: bool,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Fetch the remote before analyzing")]
        fetch: bool,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Monitor sync status
    #[command(
        about = "Watch sync status",
        long_about = "Poll sync status on an interval and print an alert whenever the set of issues changes. Runs until interrupted; never repairs anything."
    )]
    Watch {
        #[arg(long, help = "Seconds between polls (default: [watch] interval_secs or 60)")]
        interval: Option<u64>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Validate a commit message file
    #[command(
        about = "Validate a commit message",
        long_about = "Check a commit message file against the conventional-commit grammar. Used by the commit-msg hook."
    )]
    CheckMsg {
        #[arg(help = "Path to the commit message file")]
        file: PathBuf,
    },
    /// Entry point for installed hooks
    #[command(
        about = "Run a lifecycle hook",
        long_about = "Invoked by the installed git hooks. pre-commit and pre-push run scan then gate; commit-msg validates the message file."
    )]
    Hook {
        #[arg(value_enum)]
        kind: HookKind,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, help = "Arguments passed by git")]
        args: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_hook_invocations_and_global_flags() {
        let cli = Cli::try_parse_from([
            "gitward",
            "--repo-root",
            "/tmp/x",
            "hook",
            "commit-msg",
            ".git/COMMIT_EDITMSG",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.repo_root.as_deref(), Some("/tmp/x"));
        match cli.cmd {
            Commands::Hook { kind, args } => {
                assert_eq!(kind, HookKind::CommitMsg);
                assert_eq!(args, vec![".git/COMMIT_EDITMSG".to_string(), "-v".to_string()]);
            }
            _ => panic!("expected hook"),
        }
    }

    #[test]
    fn parses_sync_flags() {
        let cli =
            Cli::try_parse_from(["gitward", "auto-fix", "--dry-run", "--output", "json"]).unwrap();
        match cli.cmd {
            Commands::AutoFix {
                dry_run,
                fetch,
                output,
            } => {
                assert!(dry_run);
                assert!(!fetch);
                assert_eq!(output.as_deref(), Some("json"));
            }
            _ => panic!("expected auto-fix"),
        }
    }
}
