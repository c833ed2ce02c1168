//! Performance gate: declared budgets checked against measured values.
//!
//! The gate only runs when a staged file matches one of the trigger globs;
//! otherwise it passes without touching the metrics source. A metrics source
//! that cannot answer is fatal (`MetricsUnavailable`) so regressions never
//! slip through silently.

use crate::config::{BudgetCfg, MetricsSpec};
use crate::error::{Error, Result};
use crate::models::{BudgetMetric, GateReport};
use glob::{MatchOptions, Pattern};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};
use xshell::{cmd, Shell};

pub trait MetricsSource {
    /// Current measured value for every name in `names`.
    fn measure(&self, names: &[String]) -> Result<BTreeMap<String, f64>>;
}

/// Metrics written as a JSON object (`{"startup": 1800}`) by a build or
/// profiling step.
pub struct JsonFileMetrics {
    pub path: PathBuf,
}

/// Metrics printed as a JSON object on stdout by a shell command.
pub struct CommandMetrics {
    pub command: String,
    pub cwd: PathBuf,
}

impl MetricsSource for JsonFileMetrics {
    fn measure(&self, names: &[String]) -> Result<BTreeMap<String, f64>> {
        let s = fs::read_to_string(&self.path).map_err(|e| {
            Error::MetricsUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        pick(&s, names)
    }
}

impl MetricsSource for CommandMetrics {
    fn measure(&self, names: &[String]) -> Result<BTreeMap<String, f64>> {
        let sh = Shell::new().map_err(|e| Error::MetricsUnavailable(e.to_string()))?;
        sh.change_dir(&self.cwd);
        let command = &self.command;
        debug!(%command, "collecting metrics");
        let out = cmd!(sh, "sh -c {command}")
            .quiet()
            .read()
            .map_err(|e| Error::MetricsUnavailable(format!("`{}`: {}", command, e)))?;
        pick(&out, names)
    }
}

/// Extract the requested names from a JSON object of numbers.
fn pick(raw: &str, names: &[String]) -> Result<BTreeMap<String, f64>> {
    let json: Json = serde_json::from_str(raw)
        .map_err(|e| Error::MetricsUnavailable(format!("metrics are not valid JSON: {}", e)))?;
    let obj = json
        .as_object()
        .ok_or_else(|| Error::MetricsUnavailable("metrics must be a JSON object".into()))?;
    let mut out = BTreeMap::new();
    for name in names {
        let v = obj
            .get(name)
            .and_then(Json::as_f64)
            .ok_or_else(|| Error::MetricsUnavailable(format!("no numeric value for '{}'", name)))?;
        out.insert(name.clone(), v);
    }
    Ok(out)
}

/// Build the configured metrics source, if any.
pub fn source_from_spec(spec: &MetricsSpec, cwd: PathBuf) -> Box<dyn MetricsSource> {
    match spec {
        MetricsSpec::File(path) => Box::new(JsonFileMetrics { path: path.clone() }),
        MetricsSpec::Command(command) => Box::new(CommandMetrics {
            command: command.clone(),
            cwd,
        }),
    }
}

/// Compiled trigger globs.
pub struct Triggers {
    patterns: Vec<Pattern>,
}

impl Triggers {
    pub fn compile(globs: &[String]) -> Result<Self> {
        let patterns = globs
            .iter()
            .map(|g| {
                Pattern::new(g)
                    .map_err(|e| Error::config(format!("invalid gate trigger '{}': {}", g, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Triggers { patterns })
    }

    /// A path triggers when a glob matches it or its final component.
    pub fn matches(&self, path: &str) -> bool {
        let opts = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        let name = path.rsplit('/').next().unwrap_or(path);
        self.patterns
            .iter()
            .any(|p| p.matches_with(path, opts) || p.matches_with(name, opts))
    }
}

/// Evaluate budgets for a set of staged paths.
///
/// `source` is only consulted when at least one path triggers the gate.
pub fn run_gate(
    staged: &[String],
    triggers: &Triggers,
    budgets: &[BudgetCfg],
    source: Option<&dyn MetricsSource>,
) -> Result<GateReport> {
    let hit = staged.iter().find(|p| triggers.matches(p));
    let Some(hit) = hit else {
        debug!("no staged file matches a gate trigger");
        return Ok(GateReport {
            passed: true,
            triggered: false,
            metrics: Vec::new(),
        });
    };
    info!(file = %hit, "performance gate triggered");
    if budgets.is_empty() {
        return Ok(GateReport {
            passed: true,
            triggered: true,
            metrics: Vec::new(),
        });
    }
    let source = source.ok_or_else(|| {
        Error::MetricsUnavailable(
            "budgets are declared but no [gate] metrics_file or metrics_command is configured"
                .into(),
        )
    })?;
    let names: Vec<String> = budgets.iter().map(|b| b.name.clone()).collect();
    let measured = source.measure(&names)?;
    let metrics = budgets
        .iter()
        .map(|b| {
            let value = measured.get(&b.name).copied().ok_or_else(|| {
                Error::MetricsUnavailable(format!("no measurement reported for '{}'", b.name))
            })?;
            Ok(BudgetMetric {
                name: b.name.clone(),
                unit: b.unit.clone(),
                threshold: b.threshold,
                comparison: b.comparison,
                measured: value,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(GateReport {
        passed: metrics.iter().all(BudgetMetric::pass),
        triggered: true,
        metrics,
    })
}
