//! Pattern registry: literal tokens, regexes, and blocked filename globs.
//!
//! The registry file is a JSON object with three arrays:
//!
//! ```json
//! {
//!   "patterns": ["API_KEY", "SECRET_KEY"],
//!   "regex_patterns": ["sk-[A-Za-z0-9]{20,}"],
//!   "files": [".env", "*.pem"]
//! }
//! ```
//!
//! Loaded once per invocation and immutable afterwards. A missing or
//! malformed file, or an invalid regex/glob, is a `ConfigError`.

use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
/// On-disk schema of the registry file.
pub struct RegistryFile {
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub regex_patterns: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

impl RegistryFile {
    /// Seed written by `install-hooks` when no registry exists yet.
    pub fn starter() -> Self {
        RegistryFile {
            patterns: [
                "API_KEY",
                "SECRET_KEY",
                "ACCESS_TOKEN",
                "AUTH_TOKEN",
                "PRIVATE_KEY",
                "PASSWORD",
                "CLIENT_SECRET",
                "AWS_SECRET_ACCESS_KEY",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            regex_patterns: [
                r"sk-[A-Za-z0-9]{20,}",
                r"AKIA[0-9A-Z]{16}",
                r"gh[pousr]_[A-Za-z0-9]{36,}",
                r"-----BEGIN [A-Z ]*PRIVATE KEY-----",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            files: [".env", ".env.*", "*.pem", "*.key", "id_rsa", "id_ed25519", "*.p12"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Matcher {
    /// Escaped token compiled case-insensitively, so match offsets refer to
    /// the original line.
    Literal(Regex),
    Regex(Regex),
    Glob(Pattern),
}

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub matcher: Matcher,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
/// Compiled registry, split by scope: literal and regex rules apply to
/// content, globs to file names.
pub struct PatternRegistry {
    pub literals: Vec<PatternRule>,
    pub regexes: Vec<PatternRule>,
    pub filenames: Vec<PatternRule>,
}

const GLOB_OPTS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

impl PatternRegistry {
    /// Read and compile the registry file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "pattern registry not readable at {}: {} (run `gitward install-hooks` to seed one)",
                path.display(),
                e
            ))
        })?;
        let file: RegistryFile = serde_json::from_str(&s).map_err(|e| {
            Error::config(format!("pattern registry {} is not valid: {}", path.display(), e))
        })?;
        Self::compile(&file)
    }

    /// Compile every entry; the first invalid one aborts the whole load.
    pub fn compile(file: &RegistryFile) -> Result<Self> {
        let mut reg = PatternRegistry::default();
        for lit in &file.patterns {
            let token = lit.trim();
            if token.is_empty() {
                continue;
            }
            let re = Regex::new(&format!("(?i){}", regex::escape(token)))
                .map_err(|e| Error::config(format!("invalid literal pattern '{}': {}", token, e)))?;
            reg.literals.push(PatternRule {
                matcher: Matcher::Literal(re),
                label: token.to_string(),
            });
        }
        for src in &file.regex_patterns {
            let re = Regex::new(src)
                .map_err(|e| Error::config(format!("invalid regex pattern '{}': {}", src, e)))?;
            reg.regexes.push(PatternRule {
                matcher: Matcher::Regex(re),
                label: src.clone(),
            });
        }
        for g in &file.files {
            let pat = Pattern::new(g)
                .map_err(|e| Error::config(format!("invalid file glob '{}': {}", g, e)))?;
            reg.filenames.push(PatternRule {
                matcher: Matcher::Glob(pat),
                label: g.clone(),
            });
        }
        Ok(reg)
    }

    /// First filename rule matching `path` (tested against the full path and
    /// the final component).
    pub fn blocked_by(&self, path: &str) -> Option<&PatternRule> {
        let name = path.rsplit('/').next().unwrap_or(path);
        self.filenames.iter().find(|rule| match &rule.matcher {
            Matcher::Glob(p) => p.matches_with(name, GLOB_OPTS) || p.matches_with(path, GLOB_OPTS),
            _ => false,
        })
    }

    pub fn len(&self) -> usize {
        self.literals.len() + self.regexes.len() + self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write the starter registry to `path` unless a file already exists there.
/// Returns whether a file was written.
pub fn seed(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(&RegistryFile::starter())?;
    fs::write(path, body + "\n")?;
    Ok(true)
}
