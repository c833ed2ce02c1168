//! Command implementations behind the CLI.
//!
//! Each command returns an `Outcome` (exit code, journal label, details).
//! `run` resolves the context, dispatches, writes exactly one journal event,
//! and maps errors to the fatal exit code.

use crate::branch::create_task_branch;
use crate::cli::{Cli, Commands};
use crate::commit::{plan_commit, resolve_task};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::fix::AutoFixer;
use crate::gate::run_gate;
use crate::hooks::{install_hooks, validate_commit_message, HookKind};
use crate::models::repo::IssueKind;
use crate::models::task::TaskLink;
use crate::output;
use crate::pr::{create_pr, GhCli, PrRequest};
use crate::registry;
use crate::scan::run_scan;
use crate::sync::{analyze, derive_issues, describe};
use crate::tracker::TaskTracker;
use crate::utils::{error_prefix, note_prefix, warn_prefix};
use crate::vcs::Vcs;
use crate::watch::{Alert, Monitor};
use serde_json::{json, Value as JsonVal};
use std::fs;
use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub const EXIT_OK: i32 = 0;
pub const EXIT_BLOCKED: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug)]
pub struct Outcome {
    pub code: i32,
    pub label: &'static str,
    pub details: JsonVal,
}

impl Outcome {
    fn ok(details: JsonVal) -> Self {
        Outcome {
            code: EXIT_OK,
            label: "ok",
            details,
        }
    }

    fn blocked(label: &'static str, details: JsonVal) -> Self {
        Outcome {
            code: EXIT_BLOCKED,
            label,
            details,
        }
    }
}

fn command_name(cmd: &Commands) -> &'static str {
    match cmd {
        Commands::Version => "version",
        Commands::Scan { .. } => "scan",
        Commands::Gate { .. } => "gate",
        Commands::InstallHooks { .. } => "install-hooks",
        Commands::Branch { .. } => "branch",
        Commands::Commit { .. } => "commit",
        Commands::Pr { .. } => "pr",
        Commands::Status { .. } => "status",
        Commands::AutoFix { .. } => "auto-fix",
        Commands::Watch { .. } => "watch",
        Commands::CheckMsg { .. } => "check-msg",
        Commands::Hook { kind, .. } => match kind {
            HookKind::PreCommit => "hook-pre-commit",
            HookKind::CommitMsg => "hook-commit-msg",
            HookKind::PrePush => "hook-pre-push",
        },
    }
}

fn output_override(cmd: &Commands) -> Option<&str> {
    match cmd {
        Commands::Scan { output }
        | Commands::Gate { output }
        | Commands::InstallHooks { output, .. }
        | Commands::Status { output, .. }
        | Commands::AutoFix { output, .. }
        | Commands::Watch { output, .. } => output.as_deref(),
        _ => None,
    }
}

/// Run the parsed command line and return the process exit code.
pub fn run(cli: &Cli) -> i32 {
    if let Commands::Version = cli.cmd {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return EXIT_OK;
    }
    let name = command_name(&cli.cmd);
    let ctx = match Context::resolve(cli.repo_root.as_deref(), output_override(&cli.cmd)) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{} {}", error_prefix(), e);
            return EXIT_FATAL;
        }
    };
    if !ctx.eff.config_found {
        debug!("no gitward.toml found; using defaults");
    }
    match dispatch(&ctx, &cli.cmd) {
        Ok(outcome) => {
            ctx.journal.record(name, outcome.label, outcome.details);
            outcome.code
        }
        Err(e) => {
            ctx.journal
                .record(name, "error", json!({ "error": e.to_string() }));
            eprintln!("{} {}", error_prefix(), e);
            EXIT_FATAL
        }
    }
}

fn dispatch(ctx: &Context, cmd: &Commands) -> Result<Outcome> {
    match cmd {
        Commands::Version => Ok(Outcome::ok(JsonVal::Null)),
        Commands::Scan { .. } => scan(ctx, &ctx.vcs()?),
        Commands::Gate { .. } => gate(ctx, &ctx.vcs()?),
        Commands::InstallHooks { force, .. } => install(ctx, *force),
        Commands::Branch { task_id } => branch(ctx, task_id),
        Commands::Commit { yes, task } => commit(ctx, *yes, task.as_deref()),
        Commands::Pr { task_id, dry_run } => pr(ctx, task_id.as_deref(), *dry_run),
        Commands::Status {
            fetch, detailed, ..
        } => status(ctx, *fetch, *detailed),
        Commands::AutoFix { dry_run, fetch, .. } => auto_fix(ctx, *dry_run, *fetch),
        Commands::Watch { interval, .. } => watch(ctx, *interval),
        Commands::CheckMsg { file } => check_msg(ctx, Path::new(file)),
        Commands::Hook { kind, args } => hook(ctx, &ctx.vcs()?, *kind, args),
    }
}

fn tracker_ref<T: TaskTracker>(t: &Option<T>) -> Option<&dyn TaskTracker> {
    t.as_ref().map(|t| t as &dyn TaskTracker)
}

fn scan(ctx: &Context, vcs: &dyn Vcs) -> Result<Outcome> {
    let registry = ctx.registry()?;
    if registry.is_empty() {
        warn!(
            path = %ctx.eff.registry_path.display(),
            "pattern registry is empty; nothing will be flagged"
        );
    }
    let report = run_scan(vcs, &registry)?;
    output::print_scan(&report, ctx.output());
    let details = output::compose_scan_json(&report)["summary"].clone();
    Ok(if report.is_clean() {
        Outcome::ok(details)
    } else {
        Outcome::blocked("blocked", details)
    })
}

fn gate(ctx: &Context, vcs: &dyn Vcs) -> Result<Outcome> {
    let staged: Vec<String> = vcs
        .staged_changes()?
        .into_iter()
        .map(|c| c.path)
        .collect();
    let triggers = ctx.triggers()?;
    let source = ctx.metrics_source();
    let report = run_gate(&staged, &triggers, &ctx.eff.budgets, source.as_deref())?;
    output::print_gate(&report, ctx.output());
    let details = output::compose_gate_json(&report);
    Ok(if report.passed {
        Outcome::ok(details)
    } else {
        Outcome::blocked("blocked", details)
    })
}

fn install(ctx: &Context, force: bool) -> Result<Outcome> {
    let outcomes = install_hooks(&ctx.eff.hooks_dir, &ctx.eff.hook_command, force)?;
    let seeded = registry::seed(&ctx.eff.registry_path)?;
    let seeded_path = seeded.then_some(ctx.eff.registry_path.as_path());
    output::print_hooks(&outcomes, seeded_path, ctx.output());
    Ok(Outcome::ok(output::compose_hooks_json(&outcomes, seeded_path)))
}

fn branch(ctx: &Context, task_id: &str) -> Result<Outcome> {
    let vcs = ctx.vcs()?;
    let tracker = ctx.tracker();
    let out = create_task_branch(
        &vcs,
        tracker_ref(&tracker),
        task_id,
        &ctx.eff.integration_branch,
    )?;
    if out.created {
        println!(
            "✔ created {} from {}",
            out.branch, ctx.eff.integration_branch
        );
    } else {
        println!("✔ switched to existing branch {}", out.branch);
    }
    if out.task.is_some() && !out.status_updated {
        eprintln!(
            "{} task {} status was not updated",
            warn_prefix(),
            task_id
        );
    }
    Ok(Outcome::ok(serde_json::to_value(&out)?))
}

/// Ask a yes/no question on the terminal. Non-interactive stdin declines.
fn confirm(question: &str) -> Result<bool> {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        eprintln!(
            "{} stdin is not a terminal; pass --yes to commit without confirmation",
            note_prefix()
        );
        return Ok(false);
    }
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn commit(ctx: &Context, yes: bool, task: Option<&str>) -> Result<Outcome> {
    let vcs = ctx.vcs()?;
    let changes = vcs.staged_changes()?;
    let branch = vcs.current_branch()?;
    let tracker = ctx.tracker();
    let link = if changes.is_empty() {
        TaskLink::Untracked
    } else {
        resolve_task(&branch, task, tracker_ref(&tracker))
    };
    let Some(plan) = plan_commit(&changes, link, ctx.eff.max_header) else {
        eprintln!(
            "{} nothing is staged; stage changes with `git add` first",
            error_prefix()
        );
        return Ok(Outcome::blocked("aborted", json!({ "reason": "nothing staged" })));
    };
    let message = plan.render();
    println!("{}\n", message);
    if !yes && !confirm("Create this commit?")? {
        println!("aborted; nothing was committed");
        return Ok(Outcome::blocked("aborted", json!({ "header": plan.header() })));
    }
    vcs.commit(&message)?;
    println!("✔ committed: {}", plan.header());
    Ok(Outcome::ok(serde_json::to_value(&plan)?))
}

fn pr(ctx: &Context, task_id: Option<&str>, dry_run: bool) -> Result<Outcome> {
    let vcs = ctx.vcs()?;
    let tracker = ctx.tracker();
    let host = GhCli::open(&ctx.eff.repo_root)?;
    let req = PrRequest {
        task_id,
        base: &ctx.eff.integration_branch,
        remote: &ctx.eff.remote,
        dry_run,
    };
    let out = create_pr(&vcs, tracker_ref(&tracker), &host, &req)?;
    match &out.url {
        None => {
            println!("{}\n", out.content.title);
            println!("{}", out.content.body);
        }
        Some(url) => {
            println!("✔ pull request created: {}", url);
            if out.task.task().is_some() && !out.linked {
                eprintln!(
                    "{} the pull request was not linked on the task tracker",
                    warn_prefix()
                );
            }
        }
    }
    Ok(Outcome::ok(json!({
        "title": out.content.title,
        "head": out.content.head,
        "base": out.content.base,
        "url": out.url,
        "linked": out.linked,
    })))
}

fn status(ctx: &Context, fetch: bool, detailed: bool) -> Result<Outcome> {
    let vcs = ctx.vcs()?;
    let state = analyze(&vcs, &ctx.eff.remote, fetch)?;
    let issues = derive_issues(&state);
    output::print_status(&state, &issues, &ctx.eff.remote, detailed, ctx.output());
    Ok(Outcome::ok(output::compose_status_json(
        &state,
        &issues,
        &ctx.eff.remote,
    )))
}

fn auto_fix(ctx: &Context, dry_run: bool, fetch: bool) -> Result<Outcome> {
    let vcs = ctx.vcs()?;
    let report = AutoFixer::new(&vcs, &ctx.eff.remote, dry_run).run(fetch)?;
    output::print_fix(&report, ctx.output());
    let details = output::compose_fix_json(&report);
    Ok(if report.resolved() {
        Outcome::ok(details)
    } else {
        Outcome::blocked("unresolved", details)
    })
}

fn kind_list(kinds: &[IssueKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_alert(alert: &Alert, output: &str) {
    if output == "json" {
        println!("{}", serde_json::to_string(alert).unwrap_or_default());
        return;
    }
    let mut parts = Vec::new();
    if !alert.appeared.is_empty() {
        parts.push(format!("▲ new: {}", kind_list(&alert.appeared)));
    }
    if !alert.resolved.is_empty() {
        parts.push(format!("✔ cleared: {}", kind_list(&alert.resolved)));
    }
    println!(
        "[{}] {} ({})",
        alert.at.format("%Y-%m-%d %H:%M:%S"),
        parts.join("; "),
        describe(&alert.state)
    );
}

fn watch(ctx: &Context, interval: Option<u64>) -> Result<Outcome> {
    let vcs = ctx.vcs()?;
    let every = interval
        .map(|s| Duration::from_secs(s.max(1)))
        .unwrap_or(ctx.eff.watch_interval);
    eprintln!(
        "{} watching {} every {}s (Ctrl-C to stop)",
        note_prefix(),
        ctx.eff.repo_root.display(),
        every.as_secs()
    );
    let mut monitor = Monitor::new(&vcs, &ctx.eff.remote, ctx.eff.watch_fetch);
    monitor.run(every, None, |alert| {
        print_alert(alert, ctx.output());
        let details = serde_json::to_value(alert).unwrap_or(JsonVal::Null);
        ctx.journal.record("watch", "alert", details);
    });
    Ok(Outcome::ok(JsonVal::Null))
}

fn check_msg(ctx: &Context, file: &Path) -> Result<Outcome> {
    let text = fs::read_to_string(file)?;
    let problems = validate_commit_message(&text, ctx.eff.max_header);
    if problems.is_empty() {
        return Ok(Outcome::ok(JsonVal::Null));
    }
    for p in &problems {
        eprintln!("{} {}", error_prefix(), p);
    }
    eprintln!(
        "{} expected e.g. `fix(cache): release buffers on drop (task 11)`",
        note_prefix()
    );
    Ok(Outcome::blocked("rejected", json!({ "problems": problems })))
}

fn hook(ctx: &Context, vcs: &dyn Vcs, kind: HookKind, args: &[String]) -> Result<Outcome> {
    match kind {
        // TODO: pre-push should scan the outgoing `<remote_sha>..<local_sha>`
        // ranges git writes to the hook's stdin instead of the index.
        HookKind::PreCommit | HookKind::PrePush => {
            let scanned = scan(ctx, vcs)?;
            if scanned.code != EXIT_OK {
                return Ok(scanned);
            }
            let gated = gate(ctx, vcs)?;
            Ok(Outcome {
                code: gated.code,
                label: gated.label,
                details: json!({ "scan": scanned.details, "gate": gated.details }),
            })
        }
        HookKind::CommitMsg => {
            let file = args.first().ok_or_else(|| {
                Error::config("commit-msg hook was invoked without a message file")
            })?;
            check_msg(ctx, Path::new(file))
        }
    }
}
