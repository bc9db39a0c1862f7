//! Changed path → class FQN classification.

use crate::config::Config;
use crate::error::ConfigError;
use crate::java_source::{SourceKind, SOURCE_EXTENSION};
use globset::GlobSet;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Repository-relative paths considered modified for one run.
pub type ChangeSet = BTreeSet<String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingResult {
    pub production_classes: BTreeSet<String>,
    pub test_classes: BTreeSet<String>,
    pub changed_production_files: BTreeSet<String>,
    pub changed_test_files: BTreeSet<String>,
}

pub struct PathClassMapper {
    source_dirs: Vec<Vec<String>>,
    test_dirs: Vec<Vec<String>>,
    excludes: GlobSet,
}

fn segments(path: &str) -> Vec<String> {
    path.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect()
}

/// Index of the first whole-segment occurrence of `needle` in `haystack`.
fn find_segments(haystack: &[String], needle: &[String]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl PathClassMapper {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            source_dirs: config.source_dirs.iter().map(|d| segments(d)).collect(),
            test_dirs: config.test_dirs.iter().map(|d| segments(d)).collect(),
            excludes: config.exclude_globs()?,
        })
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.excludes.is_match(path.replace('\\', "/"))
    }

    /// Test dirs are tried before source dirs; the FQN is whatever follows the matched dir.
    pub fn classify(&self, path: &str) -> Option<(SourceKind, String)> {
        let parts = segments(path);
        for (dirs, kind) in [
            (&self.test_dirs, SourceKind::Test),
            (&self.source_dirs, SourceKind::Production),
        ] {
            for dir in dirs {
                let Some(at) = find_segments(&parts, dir) else {
                    continue;
                };
                let rest = &parts[at + dir.len()..];
                let Some((file, packages)) = rest.split_last() else {
                    continue;
                };
                let Some(stem) = file.strip_suffix(&format!(".{SOURCE_EXTENSION}")) else {
                    continue;
                };
                let mut fqn: Vec<&str> = packages.iter().map(String::as_str).collect();
                fqn.push(stem);
                return Some((kind, fqn.join(".")));
            }
        }
        None
    }

    /// Module prefix of a path: everything before the first source or test dir.
    ///
    /// `someapi/src/main/java/X.java` → `someapi`; a root-level source tree → `""`.
    pub fn extract_module(&self, path: &str) -> String {
        let parts = segments(path);
        self.source_dirs
            .iter()
            .chain(&self.test_dirs)
            .find_map(|dir| find_segments(&parts, dir))
            .map(|at| parts[..at].join("/"))
            .unwrap_or_default()
    }

    pub fn map_changed_files(&self, changed: &ChangeSet) -> MappingResult {
        let mut result = MappingResult::default();

        for path in changed {
            if !path.ends_with(&format!(".{SOURCE_EXTENSION}")) {
                debug!("skipping non-source file: {path}");
                continue;
            }
            if self.is_excluded(path) {
                debug!("excluded by pattern: {path}");
                continue;
            }
            match self.classify(path) {
                Some((SourceKind::Test, fqn)) => {
                    debug!("mapped test file: {path} -> {fqn}");
                    result.test_classes.insert(fqn);
                    result.changed_test_files.insert(path.clone());
                }
                Some((SourceKind::Production, fqn)) => {
                    debug!("mapped production file: {path} -> {fqn}");
                    result.production_classes.insert(fqn);
                    result.changed_production_files.insert(path.clone());
                }
                None => debug!("not under any known source dir: {path}"),
            }
        }

        info!(
            "mapped {} production and {} test classes from {} changed files",
            result.production_classes.len(),
            result.test_classes.len(),
            changed.len()
        );
        result
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
