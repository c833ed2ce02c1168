//! Watch monitor: periodic sync analysis with change alerts.
//!
//! The monitor only observes. It never calls the auto-fixer.

use crate::error::Result;
use crate::models::repo::{IssueKind, RepoState};
use crate::sync::{analyze, derive_issues};
use crate::vcs::Vcs;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
/// Emitted when the issue set differs from the previous poll.
pub struct Alert {
    pub at: DateTime<Utc>,
    pub appeared: Vec<IssueKind>,
    pub resolved: Vec<IssueKind>,
    pub state: RepoState,
}

pub struct Monitor<'a> {
    vcs: &'a dyn Vcs,
    remote: &'a str,
    fetch: bool,
    previous: BTreeSet<IssueKind>,
}

impl<'a> Monitor<'a> {
    /// The baseline is the empty issue set, so issues present at startup
    /// are announced on the first poll.
    pub fn new(vcs: &'a dyn Vcs, remote: &'a str, fetch: bool) -> Self {
        Monitor {
            vcs,
            remote,
            fetch,
            previous: BTreeSet::new(),
        }
    }

    pub fn poll_once(&mut self) -> Result<Option<Alert>> {
        let state = analyze(self.vcs, self.remote, self.fetch)?;
        let current: BTreeSet<IssueKind> = derive_issues(&state)
            .into_iter()
            .map(|i| i.kind)
            .collect();
        if current == self.previous {
            debug!("no change in sync issues");
            return Ok(None);
        }
        let alert = Alert {
            at: Utc::now(),
            appeared: current.difference(&self.previous).copied().collect(),
            resolved: self.previous.difference(&current).copied().collect(),
            state,
        };
        self.previous = current;
        Ok(Some(alert))
    }

    /// Poll every `interval` until `max_polls` is reached (forever when
    /// `None`). A failed poll is logged and the loop continues.
    pub fn run(
        &mut self,
        interval: Duration,
        max_polls: Option<usize>,
        mut on_alert: impl FnMut(&Alert),
    ) {
        let mut polls = 0usize;
        loop {
            match self.poll_once() {
                Ok(Some(alert)) => on_alert(&alert),
                Ok(None) => {}
                Err(e) => error!("sync poll failed: {}", e),
            }
            polls += 1;
            if max_polls.is_some_and(|m| polls >= m) {
                return;
            }
            std::thread::sleep(interval);
        }
    }
}
