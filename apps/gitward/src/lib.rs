//! gitward core library.
//!
//! This crate exposes programmatic APIs for gating commits (secrets scan and
//! performance budgets), deriving branches, commits, and pull requests from a
//! task tracker, and keeping a branch in sync with its upstream.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `commands`: Subcommand dispatch, exit codes, and journaling.
//! - `config`: Discovery and effective configuration resolution.
//! - `vcs`: The `Vcs` seam and its git CLI implementation.
//! - `tracker`: The `TaskTracker` seam and its HTTP implementation.
//! - `registry`, `scan`: Pattern registry and the staged-content scanner.
//! - `gate`: Trigger matching, metrics sources, and budget evaluation.
//! - `hooks`: Hook installation and commit-message validation.
//! - `branch`, `commit`, `pr`: Task-aware branch, commit, and PR workflows.
//! - `sync`, `fix`, `watch`: Sync analysis, safe repairs, and monitoring.
//! - `journal`: Per-invocation event records.
//! - `models`: Data models shared by reports and printers.
//! - `output`: Human/JSON printers.
//! - `utils`: Supporting helpers.
//!
//! Note: All documentation comments are written in English by convention.
pub mod branch;
pub mod cli;
pub mod commands;
pub mod commit;
pub mod config;
pub mod context;
pub mod error;
pub mod fix;
pub mod gate;
pub mod hooks;
pub mod journal;
pub mod models;
pub mod output;
pub mod pr;
pub mod registry;
pub mod scan;
pub mod sync;
pub mod tracker;
pub mod utils;
pub mod vcs;
pub mod watch;
