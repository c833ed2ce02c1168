//! Append-only event journal.
//!
//! Every invocation records one event as its own JSON file, written to a
//! `*.tmp` sibling and renamed into place so readers never observe a
//! partial write. Files are never rewritten. Journal failures are logged
//! and otherwise ignored.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonVal;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

static SEQ: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub command: String,
    pub at: DateTime<Utc>,
    pub outcome: String,
    pub details: JsonVal,
}

#[derive(Debug, Clone)]
pub struct Journal {
    dir: PathBuf,
    enabled: bool,
}

impl Journal {
    pub fn new(dir: PathBuf, enabled: bool) -> Self {
        Journal { dir, enabled }
    }

    /// Record an event; returns the written path when journaling is on and
    /// the write succeeded.
    pub fn record(&self, command: &str, outcome: &str, details: JsonVal) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        let event = Event {
            command: command.to_string(),
            at: Utc::now(),
            outcome: outcome.to_string(),
            details,
        };
        match self.write(&event) {
            Ok(p) => {
                debug!(path = %p.display(), "journal event written");
                Some(p)
            }
            Err(e) => {
                warn!("journal write failed: {}", e);
                None
            }
        }
    }

    fn write(&self, event: &Event) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{}-{}-{:04}-{}.json",
            event.at.format("%Y%m%dT%H%M%S%.6fZ"),
            std::process::id(),
            seq,
            event.command
        );
        let path = self.dir.join(&name);
        let tmp = self.dir.join(format!("{}.tmp", name));
        fs::write(&tmp, serde_json::to_vec_pretty(event)?)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }
}
