//! Per-invocation context.
//!
//! Built once from the resolved configuration and passed by reference to
//! every command. Nothing in it changes after construction; collaborators
//! (git, tracker, metrics) are opened on demand from it.

use crate::config::{resolve_effective, Effective};
use crate::error::Result;
use crate::gate::{source_from_spec, MetricsSource, Triggers};
use crate::journal::Journal;
use crate::registry::PatternRegistry;
use crate::tracker::HttpTracker;
use crate::vcs::GitCli;

pub struct Context {
    pub eff: Effective,
    pub journal: Journal,
}

impl Context {
    /// The journal stays off outside a git work tree so that a stray
    /// `.git/` directory is never created.
    pub fn new(eff: Effective) -> Self {
        let enabled = eff.journal_enabled && eff.repo_root.join(".git").is_dir();
        let journal = Journal::new(eff.journal_dir.clone(), enabled);
        Context { eff, journal }
    }

    /// Resolve configuration for `repo_root` with an optional output override.
    pub fn resolve(repo_root: Option<&str>, output: Option<&str>) -> Result<Self> {
        Ok(Context::new(resolve_effective(repo_root, output)?))
    }

    pub fn output(&self) -> &str {
        &self.eff.output
    }

    pub fn vcs(&self) -> Result<GitCli> {
        GitCli::open(&self.eff.repo_root)
    }

    /// `None` when no tracker endpoint is configured in the environment.
    pub fn tracker(&self) -> Option<HttpTracker> {
        HttpTracker::from_env(self.eff.tracker_timeout)
    }

    pub fn registry(&self) -> Result<PatternRegistry> {
        PatternRegistry::load(&self.eff.registry_path)
    }

    pub fn triggers(&self) -> Result<Triggers> {
        Triggers::compile(&self.eff.gate_triggers)
    }

    pub fn metrics_source(&self) -> Option<Box<dyn MetricsSource>> {
        self.eff
            .metrics
            .as_ref()
            .map(|spec| source_from_spec(spec, self.eff.repo_root.clone()))
    }
}
