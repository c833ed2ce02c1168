//! Configuration discovery and effective settings resolution.
//!
//! Gitward reads `gitward.toml|yaml|yml` from the repository root (or closest
//! ancestor) and merges it with CLI flags to produce an `Effective` config.
//! Defaults:
//! - `integration_branch`: `main`, `remote`: `origin`, `output`: `human`
//! - `secrets.registry`: `.gitward/secrets.json`
//! - `gate.triggers`: `*.rs`, `Cargo.toml`, `Cargo.lock`, `build.rs`
//! - `hooks.dir`: `.git/hooks`, `hooks.command`: `gitward`
//! - `commit.max_header`: 100
//! - `tracker.timeout_secs`: 5
//! - `watch.interval_secs`: 60, `watch.fetch`: true
//! - `journal.enabled`: true, `journal.dir`: `.git/gitward/events`
//!
//! Overrides precedence: CLI > config file > defaults. A config file that
//! exists but fails to parse is a `ConfigError`; nothing is partially applied.

use crate::error::{Error, Result};
use crate::models::Comparison;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REGISTRY: &str = ".gitward/secrets.json";
const DEFAULT_TRIGGERS: [&str; 4] = ["*.rs", "Cargo.toml", "Cargo.lock", "build.rs"];

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `gitward.toml|yaml`.
pub struct GitwardConfig {
    pub integration_branch: Option<String>,
    pub remote: Option<String>,
    pub output: Option<String>,
    #[serde(default)]
    pub secrets: Option<SecretsCfg>,
    #[serde(default)]
    pub gate: Option<GateCfg>,
    #[serde(default)]
    pub hooks: Option<HooksCfg>,
    #[serde(default)]
    pub commit: Option<CommitCfg>,
    #[serde(default)]
    pub tracker: Option<TrackerCfg>,
    #[serde(default)]
    pub watch: Option<WatchCfg>,
    #[serde(default)]
    pub journal: Option<JournalCfg>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct SecretsCfg {
    /// Pattern registry JSON, relative to the repository root.
    pub registry: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Performance gate section under `[gate]`.
pub struct GateCfg {
    pub triggers: Option<Vec<String>>,
    pub metrics_file: Option<String>,
    pub metrics_command: Option<String>,
    #[serde(default)]
    pub budgets: Vec<BudgetCfg>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
/// A declared budget (`[[gate.budgets]]`).
pub struct BudgetCfg {
    pub name: String,
    #[serde(default)]
    pub unit: String,
    pub threshold: f64,
    #[serde(default = "default_comparison")]
    pub comparison: Comparison,
}

fn default_comparison() -> Comparison {
    Comparison::Max
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct HooksCfg {
    pub dir: Option<String>,
    /// Executable the installed hook scripts `exec`.
    pub command: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct CommitCfg {
    pub max_header: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct TrackerCfg {
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct WatchCfg {
    pub interval_secs: Option<u64>,
    pub fetch: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct JournalCfg {
    pub enabled: Option<bool>,
    pub dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
/// Where the gate reads measured values from.
pub enum MetricsSpec {
    File(PathBuf),
    Command(String),
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub config_found: bool,
    pub integration_branch: String,
    pub remote: String,
    pub output: String,
    pub registry_path: PathBuf,
    pub gate_triggers: Vec<String>,
    pub metrics: Option<MetricsSpec>,
    pub budgets: Vec<BudgetCfg>,
    pub hooks_dir: PathBuf,
    pub hook_command: String,
    pub max_header: usize,
    pub tracker_timeout: Duration,
    pub watch_interval: Duration,
    pub watch_fetch: bool,
    pub journal_enabled: bool,
    pub journal_dir: PathBuf,
}

/// Walk upward from `start` to detect the repository root.
///
/// Stops when a `gitward.toml|yaml|yml` or a `.git` entry is found. A
/// relative `start` is made absolute first so the walk can climb past it.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let start = std::path::absolute(start).unwrap_or_else(|_| start.to_path_buf());
    let mut cur = start.as_path();
    loop {
        if config_candidates(cur).iter().any(|p| p.exists()) || cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start,
        }
    }
}

fn config_candidates(root: &Path) -> [PathBuf; 3] {
    [
        root.join("gitward.toml"),
        root.join("gitward.yaml"),
        root.join("gitward.yml"),
    ]
}

/// Load `GitwardConfig` from `gitward.toml` or `gitward.yaml|yml` if present.
pub fn load_config(root: &Path) -> Result<Option<GitwardConfig>> {
    let toml_path = root.join("gitward.toml");
    if toml_path.exists() {
        let s = fs::read_to_string(&toml_path)?;
        let cfg: GitwardConfig = toml::from_str(&s)
            .map_err(|e| Error::config(format!("{}: {}", toml_path.display(), e)))?;
        return Ok(Some(cfg));
    }
    for yml in ["gitward.yaml", "gitward.yml"] {
        let p = root.join(yml);
        if p.exists() {
            let s = fs::read_to_string(&p)?;
            let cfg: GitwardConfig = serde_yaml::from_str(&s)
                .map_err(|e| Error::config(format!("{}: {}", p.display(), e)))?;
            return Ok(Some(cfg));
        }
    }
    Ok(None)
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(
    cli_repo_root: Option<&str>,
    cli_output: Option<&str>,
) -> Result<Effective> {
    let start = PathBuf::from(cli_repo_root.unwrap_or("."));
    let repo_root = detect_repo_root(&start);
    let loaded = load_config(&repo_root)?;
    let config_found = loaded.is_some();
    let cfg = loaded.unwrap_or_default();

    let output = cli_output
        .map(|s| s.to_string())
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());
    if output != "human" && output != "json" {
        return Err(Error::config(format!(
            "unknown output mode '{}' (expected human|json)",
            output
        )));
    }

    let registry = cfg
        .secrets
        .as_ref()
        .and_then(|s| s.registry.clone())
        .unwrap_or_else(|| DEFAULT_REGISTRY.to_string());

    let gate = cfg.gate.unwrap_or_default();
    let gate_triggers = gate
        .triggers
        .unwrap_or_else(|| DEFAULT_TRIGGERS.iter().map(|s| s.to_string()).collect());
    let metrics = match (gate.metrics_file, gate.metrics_command) {
        (Some(_), Some(_)) => {
            return Err(Error::config(
                "[gate] sets both metrics_file and metrics_command; pick one",
            ))
        }
        (Some(f), None) => Some(MetricsSpec::File(repo_root.join(f))),
        (None, Some(c)) => Some(MetricsSpec::Command(c)),
        (None, None) => None,
    };

    let hooks_dir = cfg
        .hooks
        .as_ref()
        .and_then(|h| h.dir.clone())
        .unwrap_or_else(|| ".git/hooks".to_string());
    let hook_command = cfg
        .hooks
        .as_ref()
        .and_then(|h| h.command.clone())
        .unwrap_or_else(|| "gitward".to_string());

    let max_header = cfg
        .commit
        .as_ref()
        .and_then(|c| c.max_header)
        .unwrap_or(100);
    let tracker_timeout = Duration::from_secs(
        cfg.tracker
            .as_ref()
            .and_then(|t| t.timeout_secs)
            .unwrap_or(5),
    );
    let watch_interval = Duration::from_secs(
        cfg.watch
            .as_ref()
            .and_then(|w| w.interval_secs)
            .unwrap_or(60)
            .max(1),
    );
    let watch_fetch = cfg.watch.as_ref().and_then(|w| w.fetch).unwrap_or(true);
    let journal_enabled = cfg
        .journal
        .as_ref()
        .and_then(|j| j.enabled)
        .unwrap_or(true);
    let journal_dir = cfg
        .journal
        .as_ref()
        .and_then(|j| j.dir.clone())
        .unwrap_or_else(|| ".git/gitward/events".to_string());

    Ok(Effective {
        integration_branch: cfg
            .integration_branch
            .unwrap_or_else(|| "main".to_string()),
        remote: cfg.remote.unwrap_or_else(|| "origin".to_string()),
        output,
        registry_path: repo_root.join(registry),
        gate_triggers,
        metrics,
        budgets: gate.budgets,
        hooks_dir: repo_root.join(hooks_dir),
        hook_command,
        max_header,
        tracker_timeout,
        watch_interval,
        watch_fetch,
        journal_enabled,
        journal_dir: repo_root.join(journal_dir),
        config_found,
        repo_root,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_detect_and_load_toml() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut f = fs::File::create(root.join("gitward.toml")).unwrap();
        writeln!(
            f,
            "{}",
            r#"
integration_branch = "develop"
output = "json"
[gate]
triggers = ["*.ts"]
metrics_file = "target/metrics.json"
[[gate.budgets]]
name = "startup"
unit = "ms"
threshold = 2000
[[gate.budgets]]
name = "fps"
threshold = 60
comparison = "min"
    "#
        )
        .unwrap();

        // Resolve using explicit repo_root to avoid global CWD races
        let eff = resolve_effective(root.to_str(), None).unwrap();
        assert!(eff.config_found);
        assert_eq!(eff.integration_branch, "develop");
        assert_eq!(eff.remote, "origin");
        assert_eq!(eff.output, "json");
        assert_eq!(eff.gate_triggers, vec!["*.ts".to_string()]);
        assert_eq!(
            eff.metrics,
            Some(MetricsSpec::File(root.join("target/metrics.json")))
        );
        assert_eq!(eff.budgets.len(), 2);
        assert_eq!(eff.budgets[0].comparison, Comparison::Max);
        assert_eq!(eff.budgets[1].comparison, Comparison::Min);
    }

    #[test]
    fn test_load_yaml_and_defaults() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut f = fs::File::create(root.join("gitward.yaml")).unwrap();
        writeln!(
            f,
            "{}",
            r#"
remote: upstream
watch:
  interval_secs: 15
            "#
        )
        .unwrap();

        let eff = resolve_effective(root.to_str(), None).unwrap();
        assert_eq!(eff.remote, "upstream");
        assert_eq!(eff.watch_interval, Duration::from_secs(15));
        assert!(eff.watch_fetch);
        assert_eq!(eff.output, "human");
        assert_eq!(eff.registry_path, root.join(".gitward/secrets.json"));
        assert_eq!(eff.hooks_dir, root.join(".git/hooks"));
        assert_eq!(eff.max_header, 100);
        assert!(eff.gate_triggers.contains(&"Cargo.toml".to_string()));
        assert!(eff.metrics.is_none());
    }

    #[test]
    fn test_cli_output_takes_precedence() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("gitward.toml"), "output = \"json\"\n").unwrap();
        let eff = resolve_effective(root.to_str(), Some("human")).unwrap();
        assert_eq!(eff.output, "human");
    }

    #[test]
    fn test_malformed_config_is_fatal() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("gitward.toml"), "remote = [unterminated").unwrap();
        let err = resolve_effective(root.to_str(), None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_both_metrics_sources_rejected() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("gitward.toml"),
            "[gate]\nmetrics_file = \"m.json\"\nmetrics_command = \"bench\"\n",
        )
        .unwrap();
        assert!(matches!(
            resolve_effective(root.to_str(), None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_detect_walks_up_to_git_dir() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("a/b")).unwrap();
        assert_eq!(detect_repo_root(&root.join("a/b")), root.to_path_buf());
    }

    #[test]
    fn test_relative_start_climbs_to_enclosing_repo() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(".git/hooks")).unwrap();
        fs::create_dir_all(root.join("src/deep")).unwrap();
        fs::write(root.join("gitward.toml"), "remote = \"upstream\"\n").unwrap();

        let cwd = std::env::current_dir().unwrap();
        let rel = pathdiff::diff_paths(root.join("src/deep"), &cwd).unwrap();
        assert!(rel.is_relative());
        let eff = resolve_effective(rel.to_str(), None).unwrap();
        assert!(eff.config_found);
        assert_eq!(eff.remote, "upstream");
        assert_eq!(
            fs::canonicalize(&eff.repo_root).unwrap(),
            fs::canonicalize(root).unwrap()
        );
        assert!(eff.hooks_dir.is_dir());
    }
}
