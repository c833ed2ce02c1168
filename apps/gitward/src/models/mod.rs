//! Shared data models for scan/gate reports, plus the task and
//! repository-state submodules.

pub mod repo;
pub mod task;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A single secrets match, attributable to exactly one staged file.
pub struct ScanFinding {
    pub file: String,
    /// 1-based line number; `None` for filename-rule matches.
    pub line: Option<usize>,
    pub label: String,
    pub snippet: String,
}

#[derive(Debug, Default, Serialize)]
/// Scanner output: every finding plus the files blocked by filename rules.
pub struct ScanReport {
    pub findings: Vec<ScanFinding>,
    pub blocked_files: Vec<String>,
    pub files_scanned: usize,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty() && self.blocked_files.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Direction of a budget threshold.
pub enum Comparison {
    /// Measured value must not exceed the threshold.
    Max,
    /// Measured value must not fall below the threshold.
    Min,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// A declared budget together with its measured value.
pub struct BudgetMetric {
    pub name: String,
    pub unit: String,
    pub threshold: f64,
    pub comparison: Comparison,
    pub measured: f64,
}

impl BudgetMetric {
    /// Boundary-equal passes in both directions.
    pub fn pass(&self) -> bool {
        match self.comparison {
            Comparison::Max => self.measured <= self.threshold,
            Comparison::Min => self.measured >= self.threshold,
        }
    }
}

#[derive(Debug, Default, Serialize)]
/// Gate result. `triggered = false` means no staged file matched a trigger
/// and no metrics were collected.
pub struct GateReport {
    pub passed: bool,
    pub triggered: bool,
    pub metrics: Vec<BudgetMetric>,
}

impl GateReport {
    pub fn failing(&self) -> impl Iterator<Item = &BudgetMetric> {
        self.metrics.iter().filter(|m| !m.pass())
    }
}
