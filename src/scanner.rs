//! Source-root discovery and per-root class indexing.

use crate::config::Config;
use crate::java_source::{self, ClassRecord, SourceKind, SOURCE_EXTENSION};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Every directory under `root` whose path ends with `suffix` (e.g. `src/main/java`).
///
/// `root` itself counts when it matches. Directories named in `pruned` are never
/// entered, and a match is not searched further.
pub fn find_matching_dirs(root: &Path, suffix: &str, pruned: &[String]) -> Vec<PathBuf> {
    let suffix = suffix.replace('\\', "/");
    let suffix = Path::new(suffix.trim_matches('/'));
    if suffix.as_os_str().is_empty() {
        return Vec::new();
    }

    let mut found = Vec::new();
    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !pruned.iter().any(|p| e.file_name() == p.as_str())
        });

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("skipping unreadable path: {err}");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry.path().ends_with(suffix) {
            found.push(entry.path().to_path_buf());
            walker.skip_current_dir();
        }
    }

    found.sort();
    found
}

fn source_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == SOURCE_EXTENSION)
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub source_roots: usize,
    pub test_roots: usize,
    pub files_parsed: usize,
    pub parse_failures: usize,
    pub duplicates: usize,
}

/// All production and test classes found under one search root.
#[derive(Debug, Default)]
pub struct SourceIndex {
    production: BTreeMap<String, ClassRecord>,
    tests: BTreeMap<String, ClassRecord>,
    tests_by_simple: BTreeMap<String, Vec<String>>,
    stats: ScanStats,
}

struct ParseJob {
    path: PathBuf,
    fqn: String,
    kind: SourceKind,
}

impl SourceIndex {
    /// Scan `root` for the configured source and test dirs and parse every file found.
    ///
    /// Unreadable or unparsable files are logged and skipped. When two files map to
    /// the same FQN the first in sorted path order is kept.
    pub fn build(root: &Path, config: &Config) -> Self {
        let mut stats = ScanStats::default();
        let mut jobs = Vec::new();

        for (dirs, kind) in [
            (&config.source_dirs, SourceKind::Production),
            (&config.test_dirs, SourceKind::Test),
        ] {
            for suffix in dirs {
                for source_root in find_matching_dirs(root, suffix, &config.pruned_dirs) {
                    match kind {
                        SourceKind::Production => stats.source_roots += 1,
                        SourceKind::Test => stats.test_roots += 1,
                    }
                    for path in source_files(&source_root) {
                        let fqn = path
                            .strip_prefix(&source_root)
                            .ok()
                            .and_then(java_source::fqn_from_relative);
                        if let Some(fqn) = fqn {
                            jobs.push(ParseJob { path, fqn, kind });
                        }
                    }
                }
            }
        }

        let parsed: Vec<Option<ClassRecord>> = jobs
            .par_iter()
            .map(|job| {
                let content = match std::fs::read_to_string(&job.path) {
                    Ok(content) => content,
                    Err(err) => {
                        warn!("cannot read {}: {err}", job.path.display());
                        return None;
                    }
                };
                match java_source::parse_source(&content, &job.path, &job.fqn, job.kind) {
                    Ok(record) => Some(record),
                    Err(err) => {
                        warn!("skipping unparsable source {err}");
                        None
                    }
                }
            })
            .collect();

        stats.files_parsed = parsed.iter().filter(|r| r.is_some()).count();
        stats.parse_failures = parsed.len() - stats.files_parsed;

        let mut index = Self::from_records(parsed.into_iter().flatten());
        index.stats.source_roots = stats.source_roots;
        index.stats.test_roots = stats.test_roots;
        index.stats.files_parsed = stats.files_parsed;
        index.stats.parse_failures = stats.parse_failures;

        let stats = index.stats;
        debug!(
            root = %root.display(),
            source_roots = stats.source_roots,
            test_roots = stats.test_roots,
            parsed = stats.files_parsed,
            failed = stats.parse_failures,
            duplicates = stats.duplicates,
            production = index.production.len(),
            tests = index.tests.len(),
            "indexed search root"
        );
        index
    }

    pub fn from_records(records: impl IntoIterator<Item = ClassRecord>) -> Self {
        let mut index = Self::default();
        for record in records {
            let target = match record.kind {
                SourceKind::Production => &mut index.production,
                SourceKind::Test => &mut index.tests,
            };
            if let Some(existing) = target.get(&record.fqn) {
                debug!(
                    "duplicate class {}: keeping {}, ignoring {}",
                    record.fqn,
                    existing.path.display(),
                    record.path.display()
                );
                index.stats.duplicates += 1;
                continue;
            }
            if record.kind == SourceKind::Test {
                index
                    .tests_by_simple
                    .entry(record.simple_name.clone())
                    .or_default()
                    .push(record.fqn.clone());
            }
            target.insert(record.fqn.clone(), record);
        }
        index
    }

    pub fn production(&self, fqn: &str) -> Option<&ClassRecord> {
        self.production.get(fqn)
    }

    pub fn contains_production(&self, fqn: &str) -> bool {
        self.production.contains_key(fqn)
    }

    pub fn production_classes(&self) -> impl Iterator<Item = &ClassRecord> {
        self.production.values()
    }

    pub fn test_classes(&self) -> impl Iterator<Item = &ClassRecord> {
        self.tests.values()
    }

    /// FQNs of test classes with the given simple name.
    pub fn tests_named(&self, simple: &str) -> impl Iterator<Item = &str> {
        self.tests_by_simple
            .get(simple)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
