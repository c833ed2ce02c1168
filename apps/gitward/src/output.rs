//! Output rendering for scan, gate, status, auto-fix, and install-hooks.
//!
//! Supports `human` (default) and `json` outputs. The JSON form carries the
//! report models plus a top-level summary; `compose_*_json` are pure so the
//! shapes can be asserted in tests.

use crate::fix::FixReport;
use crate::hooks::{InstallOutcome, InstallStatus};
use crate::models::repo::{FixResult, RepoState, SyncIssue};
use crate::models::{Comparison, GateReport, ScanReport};
use crate::sync::describe;
use crate::utils::rel_to_wd;
use owo_colors::{OwoColorize, Style};
use serde_json::json;
use serde_json::Value as JsonVal;
use std::path::Path;

fn use_colors(output: &str) -> bool {
    output != "json" && crate::utils::colors_enabled()
}

fn paint(color: bool, s: &str, style: Style) -> String {
    if color {
        s.style(style).to_string()
    } else {
        s.to_string()
    }
}

fn red() -> Style {
    Style::new().red().bold()
}
fn yellow() -> Style {
    Style::new().yellow().bold()
}
fn green() -> Style {
    Style::new().green().bold()
}
fn blue() -> Style {
    Style::new().blue().bold()
}
fn bold() -> Style {
    Style::new().bold()
}
fn dim() -> Style {
    Style::new().bright_black()
}

fn print_json(v: &JsonVal) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}

fn summary_line(color: bool, text: String) {
    println!("{}", paint(color, &format!("— Summary — {}", text), bold()));
}

/// Print scanner findings with per-file remediation.
pub fn print_scan(report: &ScanReport, output: &str) {
    if output == "json" {
        return print_json(&compose_scan_json(report));
    }
    let color = use_colors(output);
    for f in &report.findings {
        let loc = match f.line {
            Some(l) => format!("{}:{}", f.file, l),
            None => f.file.clone(),
        };
        println!(
            "{} {} ❲{}❳ — {}",
            paint(color, "✖", red()),
            paint(color, &loc, bold()),
            f.label,
            f.snippet
        );
    }
    if !report.is_clean() {
        let mut files: Vec<&str> = report.findings.iter().map(|f| f.file.as_str()).collect();
        files.dedup();
        println!();
        println!("Remove the secret from the file or unstage it:");
        for file in files {
            println!("  git restore --staged {}", file);
        }
        if !report.blocked_files.is_empty() {
            println!("Blocked files should be listed in .gitignore.");
        }
    }
    summary_line(
        color,
        format!(
            "findings={} blocked={} files={}",
            report.findings.len(),
            report.blocked_files.len(),
            report.files_scanned
        ),
    );
}

pub fn compose_scan_json(report: &ScanReport) -> JsonVal {
    json!({
        "findings": report.findings,
        "blockedFiles": report.blocked_files,
        "summary": {
            "findings": report.findings.len(),
            "blocked": report.blocked_files.len(),
            "files": report.files_scanned,
            "passed": report.is_clean(),
        }
    })
}

/// Print gate metrics; failing budgets are marked and explained.
pub fn print_gate(report: &GateReport, output: &str) {
    if output == "json" {
        return print_json(&compose_gate_json(report));
    }
    let color = use_colors(output);
    if !report.triggered {
        println!(
            "{}",
            paint(
                color,
                "performance gate not triggered (no staged build-affecting files)",
                dim()
            )
        );
        return;
    }
    for m in &report.metrics {
        let bound = match m.comparison {
            Comparison::Max => "max",
            Comparison::Min => "min",
        };
        let icon = if m.pass() {
            paint(color, "✔", green())
        } else {
            paint(color, "✖", red())
        };
        println!(
            "{} {} {}{} ({} {}{})",
            icon,
            paint(color, &m.name, bold()),
            m.measured,
            m.unit,
            bound,
            m.threshold,
            m.unit
        );
    }
    if !report.passed {
        println!();
        println!(
            "Bring the failing metrics back within budget, or adjust [[gate.budgets]] in gitward.toml."
        );
    }
    summary_line(
        color,
        format!(
            "passed={} failing={} metrics={}",
            report.passed,
            report.failing().count(),
            report.metrics.len()
        ),
    );
}

pub fn compose_gate_json(report: &GateReport) -> JsonVal {
    let metrics: Vec<_> = report
        .metrics
        .iter()
        .map(|m| {
            let mut v = serde_json::to_value(m).unwrap_or(JsonVal::Null);
            if let Some(obj) = v.as_object_mut() {
                obj.insert("pass".into(), json!(m.pass()));
            }
            v
        })
        .collect();
    json!({
        "passed": report.passed,
        "triggered": report.triggered,
        "metrics": metrics,
        "summary": {
            "failing": report.failing().count(),
            "total": report.metrics.len(),
        }
    })
}

/// Print sync status. `detailed` adds the manual command for every issue.
pub fn print_status(
    state: &RepoState,
    issues: &[SyncIssue],
    remote: &str,
    detailed: bool,
    output: &str,
) {
    if output == "json" {
        return print_json(&compose_status_json(state, issues, remote));
    }
    let color = use_colors(output);
    println!("{}", paint(color, &describe(state), bold()));
    if issues.is_empty() {
        println!("{} in sync", paint(color, "✔", green()));
        return;
    }
    for i in issues {
        let (icon, f): (&str, Style) = if i.kind.advisory() {
            ("◆", blue())
        } else if i.auto_fixable {
            ("▲", yellow())
        } else {
            ("✖", red())
        };
        let note = if i.kind.advisory() {
            "advisory"
        } else if i.auto_fixable {
            "auto-fixable"
        } else {
            "manual"
        };
        println!("{} {} ({})", paint(color, icon, f), i.kind, note);
        if detailed {
            println!("    {}", paint(color, &i.kind.remediation(remote, &state.branch), dim()));
        }
    }
    if issues.iter().any(|i| i.auto_fixable) {
        println!();
        println!("Run `gitward auto-fix` to apply the safe repairs.");
    }
}

pub fn compose_status_json(state: &RepoState, issues: &[SyncIssue], remote: &str) -> JsonVal {
    let issues_json: Vec<_> = issues
        .iter()
        .map(|i| {
            json!({
                "kind": i.kind,
                "autoFixable": i.auto_fixable,
                "remediation": i.kind.remediation(remote, &state.branch),
            })
        })
        .collect();
    json!({
        "state": state,
        "issues": issues_json,
        "summary": {
            "issues": issues.len(),
            "autoFixable": issues.iter().filter(|i| i.auto_fixable).count(),
            "clean": issues.is_empty(),
        }
    })
}

/// Print auto-fix actions, unresolved conflicts, and advisories.
pub fn print_fix(report: &FixReport, output: &str) {
    if output == "json" {
        return print_json(&compose_fix_json(report));
    }
    let color = use_colors(output);
    for a in &report.actions {
        let (icon, label, f): (&str, &str, Style) = match a.result {
            FixResult::Applied => ("✔", "applied", green()),
            FixResult::Skipped => ("⏭", "skipped", yellow()),
            FixResult::Failed => ("✖", "failed", red()),
        };
        let detail = a
            .detail
            .as_deref()
            .map(|d| format!(" — {}", d))
            .unwrap_or_default();
        println!(
            "{} {} {} ({}){}",
            paint(color, icon, f),
            label,
            a.operation.as_str(),
            a.issue_kind,
            detail
        );
    }
    for c in &report.unresolved {
        println!(
            "{} {} — {}",
            paint(color, "✖", red()),
            paint(color, c.kind.as_str(), bold()),
            c.reason
        );
        println!("    run: {}", c.suggestion);
    }
    for a in &report.advisories {
        println!("{} {} (advisory, left as is)", paint(color, "◆", blue()), a.kind);
    }
    if report.issues.is_empty() {
        println!("{} nothing to fix", paint(color, "✔", green()));
    }
    summary_line(
        color,
        format!(
            "applied={} unresolved={} passes={}",
            report.applied(),
            report.unresolved.len(),
            report.passes
        ),
    );
}

pub fn compose_fix_json(report: &FixReport) -> JsonVal {
    json!({
        "issues": report.issues,
        "actions": report.actions,
        "unresolved": report.unresolved,
        "advisories": report.advisories,
        "summary": {
            "applied": report.applied(),
            "unresolved": report.unresolved.len(),
            "resolved": report.resolved(),
            "passes": report.passes,
        }
    })
}

/// Print per-hook install status; `seeded` is the registry path when one
/// was created.
pub fn print_hooks(outcomes: &[InstallOutcome], seeded: Option<&Path>, output: &str) {
    if output == "json" {
        return print_json(&compose_hooks_json(outcomes, seeded));
    }
    let color = use_colors(output);
    for o in outcomes {
        let (icon, label, f): (&str, &str, Style) = match o.status {
            InstallStatus::Installed => ("✔", "installed", green()),
            InstallStatus::AlreadyInstalled => ("◆", "already installed", blue()),
            InstallStatus::Replaced => ("✏️ ", "replaced", green()),
            InstallStatus::SkippedForeign => (
                "▲",
                "skipped (existing hook; use --force to replace)",
                yellow(),
            ),
        };
        println!(
            "{} {}: {} {}",
            paint(color, icon, f),
            o.hook.file_name(),
            label,
            paint(color, &rel_to_wd(&o.path), dim())
        );
    }
    if let Some(p) = seeded {
        println!(
            "{} {}",
            crate::utils::note_prefix(),
            format!("seeded pattern registry at {}", rel_to_wd(p))
        );
    }
}

pub fn compose_hooks_json(outcomes: &[InstallOutcome], seeded: Option<&Path>) -> JsonVal {
    json!({
        "hooks": outcomes,
        "registrySeeded": seeded.map(|p| p.display().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookKind;
    use crate::models::repo::{FixAction, FixConflict, FixOperation, IssueKind};
    use crate::models::{BudgetMetric, ScanFinding};
    use std::path::PathBuf;

    #[test]
    fn scan_json_shape() {
        let report = ScanReport {
            findings: vec![ScanFinding {
                file: "src/config.rs".into(),
                line: Some(2),
                label: "API_KEY".into(),
                snippet: "API_KEY=[REDACTED]".into(),
            }],
            blocked_files: vec![],
            files_scanned: 1,
        };
        let out = compose_scan_json(&report);
        assert_eq!(out["summary"]["findings"], 1);
        assert_eq!(out["summary"]["passed"], false);
        assert_eq!(out["findings"][0]["line"], 2);
        assert_eq!(out["findings"][0]["label"], "API_KEY");
    }

    #[test]
    fn gate_json_marks_each_metric() {
        let report = GateReport {
            passed: false,
            triggered: true,
            metrics: vec![BudgetMetric {
                name: "startup".into(),
                unit: "ms".into(),
                threshold: 2000.0,
                comparison: Comparison::Max,
                measured: 2100.0,
            }],
        };
        let out = compose_gate_json(&report);
        assert_eq!(out["metrics"][0]["pass"], false);
        assert_eq!(out["metrics"][0]["comparison"], "max");
        assert_eq!(out["summary"]["failing"], 1);
    }

    #[test]
    fn status_json_includes_remediation() {
        let state = RepoState {
            branch: "feature/x".into(),
            upstream: None,
            ahead: 0,
            behind: 0,
            dirty: false,
            stash_count: 0,
        };
        let issues = vec![SyncIssue::new(IssueKind::NoUpstream)];
        let out = compose_status_json(&state, &issues, "origin");
        assert_eq!(out["issues"][0]["kind"], "noUpstream");
        assert_eq!(out["issues"][0]["remediation"], "git push -u origin feature/x");
        assert_eq!(out["summary"]["clean"], false);
        assert!(out["state"]["upstream"].is_null());
    }

    #[test]
    fn fix_and_hooks_json_shapes() {
        let report = FixReport {
            issues: vec![SyncIssue::new(IssueKind::Behind), SyncIssue::new(IssueKind::Ahead)],
            actions: vec![FixAction {
                issue_kind: IssueKind::Behind,
                operation: FixOperation::FastForward,
                result: FixResult::Applied,
                detail: None,
            }],
            unresolved: vec![FixConflict {
                kind: IssueKind::Ahead,
                reason: "push is manual".into(),
                suggestion: "git push".into(),
            }],
            advisories: vec![],
            passes: 1,
        };
        let out = compose_fix_json(&report);
        assert_eq!(out["actions"][0]["operation"], "fast-forward");
        assert_eq!(out["unresolved"][0]["kind"], "ahead");
        assert_eq!(out["summary"]["resolved"], false);

        let hooks = vec![InstallOutcome {
            hook: HookKind::CommitMsg,
            path: PathBuf::from(".git/hooks/commit-msg"),
            status: InstallStatus::AlreadyInstalled,
        }];
        let out = compose_hooks_json(&hooks, None);
        assert_eq!(out["hooks"][0]["hook"], "commit-msg");
        assert_eq!(out["hooks"][0]["status"], "already-installed");
        assert!(out["registrySeeded"].is_null());
    }
}
