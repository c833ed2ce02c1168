//! Secrets scanner over staged (index) content.
//!
//! Produces a `ScanReport` with every finding and the files blocked by
//! filename rules. Findings are ordered by file, then line. The scanner
//! never short-circuits and never writes; deciding to block is left to the
//! caller.

use crate::error::Result;
use crate::models::task::ChangeKind;
use crate::models::{ScanFinding, ScanReport};
use crate::registry::{Matcher, PatternRegistry};
use crate::vcs::Vcs;
use tracing::debug;

const SNIPPET_MAX: usize = 100;
const REDACTED: &str = "[REDACTED]";

/// Extensions whose content is never inspected.
const SKIP_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "psd", "pdf", "zip", "gz", "tgz",
    "bz2", "xz", "7z", "rar", "tar", "jar", "war", "class", "exe", "dll", "so", "dylib", "o", "a",
    "wasm", "bin", "mp3", "mp4", "mov", "avi", "mkv", "wav", "flac", "ogg", "woff", "woff2", "ttf",
    "otf", "eot",
];

/// Scan every staged file that will be part of the next commit.
pub fn run_scan(vcs: &dyn Vcs, registry: &PatternRegistry) -> Result<ScanReport> {
    let mut staged: Vec<String> = vcs
        .staged_changes()?
        .into_iter()
        .filter(|c| c.kind != ChangeKind::Deleted)
        .map(|c| c.path)
        .collect();
    staged.sort();
    staged.dedup();

    let mut report = ScanReport::default();
    for path in staged {
        report.files_scanned += 1;
        if let Some(rule) = registry.blocked_by(&path) {
            report.findings.push(ScanFinding {
                file: path.clone(),
                line: None,
                label: rule.label.clone(),
                snippet: format!("filename matches blocked pattern '{}'", rule.label),
            });
            report.blocked_files.push(path);
            continue;
        }
        if has_skipped_extension(&path) {
            debug!(file = %path, "skipping binary/media file");
            continue;
        }
        let bytes = vcs.staged_content(&path)?;
        if bytes.contains(&0) {
            debug!(file = %path, "skipping binary content");
            continue;
        }
        let text = String::from_utf8_lossy(&bytes);
        report
            .findings
            .extend(scan_content(&path, &text, registry));
    }
    Ok(report)
}

fn has_skipped_extension(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            SKIP_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        }
        _ => false,
    }
}

/// Scan one file's text. At most one finding per line: literal rules are
/// tried first, then regex rules in registry order.
pub fn scan_content(file: &str, text: &str, registry: &PatternRegistry) -> Vec<ScanFinding> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some(f) = match_line(line, registry) {
            out.push(ScanFinding {
                file: file.to_string(),
                line: Some(idx + 1),
                label: f.0,
                snippet: truncate(f.1.trim()),
            });
        }
    }
    out
}

/// Returns `(label, redacted line)` for the first rule that fires. Every
/// regex rule is applied to the snippet as well, so a secret elsewhere on a
/// literal's line never survives redaction.
fn match_line(line: &str, registry: &PatternRegistry) -> Option<(String, String)> {
    let mut hit = None;
    if has_assignment(line) {
        hit = registry.literals.iter().find_map(|rule| match &rule.matcher {
            Matcher::Literal(re) => re
                .find(line)
                .map(|m| (rule.label.clone(), redact_assignment(line, m.end()))),
            _ => None,
        });
    }
    if hit.is_none() {
        hit = registry.regexes.iter().find_map(|rule| match &rule.matcher {
            Matcher::Regex(re) if re.is_match(line) => {
                Some((rule.label.clone(), line.to_string()))
            }
            _ => None,
        });
    }
    let (label, mut snippet) = hit?;
    for rule in &registry.regexes {
        if let Matcher::Regex(re) = &rule.matcher {
            snippet = re.replace_all(&snippet, REDACTED).into_owned();
        }
    }
    Some((label, snippet))
}

fn has_assignment(line: &str) -> bool {
    line.contains('=') || line.contains(':')
}

/// Replace the value after the first assignment marker following `from`.
/// Without a later marker everything after `from` is redacted.
fn redact_assignment(line: &str, from: usize) -> String {
    let cut = match line[from..].find(['=', ':']) {
        Some(i) => from + i + 1,
        None => from,
    };
    format!("{}{}", &line[..cut], REDACTED)
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= SNIPPET_MAX {
        return s.to_string();
    }
    let mut out: String = s.chars().take(SNIPPET_MAX - 3).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryFile;
    use crate::vcs::fake::{git, git_repo, FakeVcs};
    use crate::vcs::GitCli;
    use std::fs;
    use tempfile::tempdir;

    fn registry() -> PatternRegistry {
        PatternRegistry::compile(&RegistryFile {
            patterns: vec!["API_KEY".into(), "PASSWORD".into()],
            regex_patterns: vec![r"ghp_[A-Za-z0-9]{8,}".into()],
            files: vec![".env".into(), "*.pem".into()],
        })
        .unwrap()
    }

    #[test]
    fn literal_with_assignment_yields_one_redacted_finding() {
        let vcs = FakeVcs::new("main");
        vcs.stage("src/config.rs", ChangeKind::Added, b"fn main() {}\nAPI_KEY=sk-12345\n");
        let report = run_scan(&vcs, &registry()).unwrap();
        assert_eq!(report.findings.len(), 1);
        let f = &report.findings[0];
        assert_eq!(f.file, "src/config.rs");
        assert_eq!(f.line, Some(2));
        assert_eq!(f.label, "API_KEY");
        assert_eq!(f.snippet, "API_KEY=[REDACTED]");
        assert!(!report.is_clean());
    }

    #[test]
    fn literal_without_assignment_is_ignored() {
        let reg = registry();
        let found = scan_content("a.md", "Remember to rotate the api_key monthly", &reg);
        assert!(found.is_empty());
        let found = scan_content("a.yml", "  password: hunter2", &reg);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label, "PASSWORD");
        assert_eq!(found[0].snippet, "password:[REDACTED]");
    }

    #[test]
    fn one_finding_per_line_even_when_rules_overlap() {
        let reg = registry();
        let found = scan_content("x", "API_KEY = ghp_abcdefghijkl PASSWORD=1", &reg);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label, "API_KEY");
    }

    #[test]
    fn regex_matches_unconditionally_and_is_redacted() {
        let found = scan_content(
            "deploy.sh",
            "curl -H \"token ghp_abcdefghijkl\" https://api",
            &registry(),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].snippet, "curl -H \"token [REDACTED]\" https://api");
        assert!(!found[0].snippet.contains("ghp_"));
    }

    #[test]
    fn blocked_filename_skips_content_scan() {
        let vcs = FakeVcs::new("main");
        vcs.stage(".env", ChangeKind::Added, b"API_KEY=abc\n");
        let report = run_scan(&vcs, &registry()).unwrap();
        assert_eq!(report.blocked_files, vec![".env".to_string()]);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].line, None);
        assert!(!vcs.calls().iter().any(|c| c == "show :.env"));
    }

    #[test]
    fn binary_extensions_and_deleted_files_are_not_read() {
        let vcs = FakeVcs::new("main");
        vcs.stage("assets/logo.png", ChangeKind::Added, b"API_KEY=1");
        vcs.stage("old.rs", ChangeKind::Deleted, b"");
        vcs.stage("data.txt", ChangeKind::Added, b"PASSWORD=\0binary");
        let report = run_scan(&vcs, &registry()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.files_scanned, 2);
        let calls = vcs.calls();
        assert!(!calls.iter().any(|c| c.contains("logo.png")));
        assert!(!calls.iter().any(|c| c.contains("old.rs")));
    }

    #[test]
    fn findings_are_ordered_by_file_then_line() {
        let vcs = FakeVcs::new("main");
        vcs.stage("z.rs", ChangeKind::Added, b"PASSWORD=1\n");
        vcs.stage("a.rs", ChangeKind::Added, b"x\nPASSWORD=2\nAPI_KEY: 3\n");
        let report = run_scan(&vcs, &registry()).unwrap();
        let order: Vec<_> = report
            .findings
            .iter()
            .map(|f| (f.file.as_str(), f.line))
            .collect();
        assert_eq!(
            order,
            vec![("a.rs", Some(2)), ("a.rs", Some(3)), ("z.rs", Some(1))]
        );
    }

    #[test]
    fn regex_secrets_on_a_literal_line_are_redacted() {
        let reg = registry();
        let found = scan_content("ci.yml", "token: API_KEY ghp_abcdefghijkl", &reg);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label, "API_KEY");
        assert_eq!(found[0].snippet, "token: API_KEY[REDACTED]");

        let found = scan_content("ci.yml", "ghp_abcdefghijkl # API_KEY=1", &reg);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label, "API_KEY");
        assert!(!found[0].snippet.contains("ghp_"));
        assert!(found[0].snippet.ends_with("API_KEY=[REDACTED]"));
    }

    #[test]
    fn literal_offsets_survive_non_ascii_prefixes() {
        // U+0149 uppercases to two chars, so offsets into an uppercased
        // copy would drift.
        let found = scan_content("f", "\u{149}\u{149} api_key=secret", &registry());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].snippet, "\u{149}\u{149} api_key=[REDACTED]");
        assert!(!found[0].snippet.contains("secret"));
    }

    #[test]
    fn non_ascii_index_paths_are_read_and_blocked() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        if !git_repo(root) {
            return;
        }
        fs::write(root.join("café.txt"), "API_KEY=sk-12345\n").unwrap();
        fs::create_dir_all(root.join("données")).unwrap();
        fs::write(root.join("données/.env"), "x=1\n").unwrap();
        git(root, &["add", "."]);

        let vcs = GitCli::open(root).unwrap();
        let report = run_scan(&vcs, &registry()).unwrap();
        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.blocked_files, vec!["données/.env".to_string()]);
        let content: Vec<_> = report.findings.iter().filter(|f| f.line.is_some()).collect();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0].file, "café.txt");
        assert_eq!(content[0].snippet, "API_KEY=[REDACTED]");
    }

    #[test]
    fn long_snippets_are_truncated() {
        let line = format!("{} PASSWORD=1", "x".repeat(300));
        let found = scan_content("f", &line, &registry());
        assert_eq!(found[0].snippet.chars().count(), SNIPPET_MAX);
        assert!(found[0].snippet.ends_with("..."));
    }
}
