//! Orchestration: ChangeSet → MappingResult → strategies per search root → AffectedResult.

use crate::config::Config;
use crate::discovery::{build_strategies, TestDiscoveryStrategy};
use crate::error::{AnalysisError, ConfigError, PathSafetyError};
use crate::git;
use crate::mapping::{ChangeSet, MappingResult, PathClassMapper};
use crate::scanner::SourceIndex;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedResult {
    pub test_fqns: BTreeSet<String>,
    pub changed_files: BTreeSet<String>,
    pub changed_production_classes: BTreeSet<String>,
    pub changed_test_classes: BTreeSet<String>,
    pub run_all: bool,
}

/// Directories to index, plus the mapping entries that were refused.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SearchRoots {
    pub roots: Vec<PathBuf>,
    pub rejected: Vec<PathSafetyError>,
}

/// Lexical `..`/`.` folding; does not touch the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn mapping_target<'m>(module: &str, mapping: &'m BTreeMap<String, String>) -> Option<&'m String> {
    let gradle = format!(":{}", module.replace('/', ":"));
    [format!(":{module}"), module.to_string(), gradle]
        .iter()
        .find_map(|key| mapping.get(key))
}

/// Project root plus the mapped directory of every changed module with a mapping entry.
///
/// Targets resolving outside the project root, lexically or through symlinks, are
/// rejected. Missing target directories are skipped with a warning.
pub fn resolve_search_roots(
    project_root: &Path,
    changed: &ChangeSet,
    mapper: &PathClassMapper,
    mapping: &BTreeMap<String, String>,
) -> SearchRoots {
    let root = project_root
        .canonicalize()
        .unwrap_or_else(|_| normalize(project_root));
    let mut out = SearchRoots {
        roots: vec![root.clone()],
        rejected: Vec::new(),
    };
    if mapping.is_empty() {
        return out;
    }

    let modules: BTreeSet<String> = changed
        .iter()
        .map(|path| mapper.extract_module(path))
        .filter(|module| !module.is_empty())
        .collect();

    for module in &modules {
        let Some(target) = mapping_target(module, mapping) else {
            continue;
        };
        let relative = target.trim_start_matches(':').replace(':', "/");
        let candidate = normalize(&root.join(&relative));

        let resolved = if candidate.starts_with(&root) {
            match candidate.canonicalize() {
                Ok(real) if real.starts_with(&root) => Some(real),
                Ok(_) => None,
                Err(_) => {
                    warn!(module = %module, target = %target, path = %candidate.display(), "mapped test directory does not exist");
                    continue;
                }
            }
        } else {
            None
        };

        match resolved {
            Some(path) if path.is_dir() => {
                info!(module = %module, target = %target, path = %path.display(), "cross-module mapping");
                if !out.roots.contains(&path) {
                    out.roots.push(path);
                }
            }
            Some(path) => {
                warn!(path = %path.display(), "mapped test path is not a directory");
            }
            None => {
                let err = PathSafetyError {
                    module: module.clone(),
                    target: target.clone(),
                };
                error!("{err}; ignoring this mapping");
                out.rejected.push(err);
            }
        }
    }
    out
}

pub struct AnalysisEngine {
    config: Config,
    project_root: PathBuf,
    mapper: PathClassMapper,
}

impl AnalysisEngine {
    /// Validates `config` up front so nothing is scanned with a bad configuration.
    pub fn new(config: Config, project_root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        config.validate()?;
        let mapper = PathClassMapper::new(&config)?;
        Ok(Self {
            config,
            project_root: project_root.into(),
            mapper,
        })
    }

    /// Detect changes with git, then analyze them.
    pub fn run(&self) -> Result<AffectedResult, AnalysisError> {
        info!(
            project = %self.project_root.display(),
            base_ref = %self.config.base_ref,
            "starting affected test analysis"
        );
        let changes = git::detect_changed_files(&self.project_root, &self.config)?;
        Ok(self.analyze(&changes))
    }

    pub fn analyze(&self, changes: &ChangeSet) -> AffectedResult {
        if changes.is_empty() {
            info!("no changed files detected");
            return AffectedResult {
                run_all: self.config.run_all_if_no_matches,
                ..AffectedResult::default()
            };
        }

        let mapping = self.mapper.map_changed_files(changes);
        let mut tests = mapping.test_classes.clone();
        debug!(tests = tests.len(), "directly changed test classes");

        if !mapping.production_classes.is_empty() {
            tests.extend(self.discover(changes, &mapping));
        }

        let run_all = tests.is_empty() && self.config.run_all_if_no_matches;
        if run_all {
            warn!("no affected tests found; falling back to the full suite");
        } else if tests.is_empty() {
            info!("no affected tests found, nothing to run");
        } else {
            info!(tests = tests.len(), "affected test classes");
        }

        AffectedResult {
            test_fqns: tests,
            changed_files: changes.clone(),
            changed_production_classes: mapping.production_classes,
            changed_test_classes: mapping.test_classes,
            run_all,
        }
    }

    fn discover(&self, changes: &ChangeSet, mapping: &MappingResult) -> BTreeSet<String> {
        let strategies = build_strategies(&self.config);
        let search = resolve_search_roots(
            &self.project_root,
            changes,
            &self.mapper,
            &self.config.test_project_mapping,
        );
        debug!(
            roots = ?search.roots,
            rejected = search.rejected.len(),
            "test search roots"
        );

        search
            .roots
            .par_iter()
            .map(|root| {
                let index = SourceIndex::build(root, &self.config);
                run_strategies(&strategies, &mapping.production_classes, &index, root)
            })
            .reduce(BTreeSet::new, |mut acc, found| {
                acc.extend(found);
                acc
            })
    }
}

fn run_strategies(
    strategies: &[Box<dyn TestDiscoveryStrategy>],
    changed: &BTreeSet<String>,
    index: &SourceIndex,
    root: &Path,
) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for strategy in strategies {
        let hits = strategy.discover(changed, index);
        debug!(
            strategy = strategy.name(),
            root = %root.display(),
            tests = hits.len(),
            "strategy finished"
        );
        found.extend(hits);
    }
    found
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyKind;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    fn changes(paths: &[&str]) -> ChangeSet {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn seed(root: &Path) {
        write(root, "core/src/main/java/com/acme/Svc.java", "package com.acme; public interface Svc {}");
        write(
            root,
            "core/src/main/java/com/acme/SvcImpl.java",
            "package com.acme; public class SvcImpl implements Svc { private Repo repo; }",
        );
        write(root, "core/src/main/java/com/acme/Repo.java", "package com.acme; public class Repo {}");
        write(root, "core/src/test/java/com/acme/SvcImplTest.java", "package com.acme; class SvcImplTest {}");
        write(root, "core/src/test/java/com/acme/RepoTest.java", "package com.acme; class RepoTest {}");
        write(
            root,
            "web/src/test/java/com/acme/web/ControllerTest.java",
            "package com.acme.web; import com.acme.Repo; class ControllerTest { void t() { helper(); } }",
        );
    }

    #[test]
    fn empty_change_set_honours_fallback_flag() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut cfg = Config::default();
        let engine = AnalysisEngine::new(cfg.clone(), tmp.path()).expect("engine");
        assert_eq!(engine.analyze(&ChangeSet::new()), AffectedResult::default());

        cfg.run_all_if_no_matches = true;
        let engine = AnalysisEngine::new(cfg, tmp.path()).expect("engine");
        let result = engine.analyze(&ChangeSet::new());
        assert!(result.run_all);
        assert!(result.test_fqns.is_empty());
    }

    #[test]
    fn unions_strategies_and_keeps_changed_tests() {
        let tmp = tempfile::tempdir().expect("tempdir");
        seed(tmp.path());
        let engine = AnalysisEngine::new(Config::default(), tmp.path()).expect("engine");

        let result = engine.analyze(&changes(&[
            "core/src/main/java/com/acme/Repo.java",
            "core/src/test/java/com/acme/SvcImplTest.java",
            "docs/notes.md",
        ]));
        assert_eq!(
            result.changed_production_classes,
            BTreeSet::from(["com.acme.Repo".to_string()])
        );
        assert!(result.changed_test_classes.is_subset(&result.test_fqns));
        for expected in ["com.acme.RepoTest", "com.acme.web.ControllerTest", "com.acme.SvcImplTest"] {
            assert!(result.test_fqns.contains(expected), "missing {expected}");
        }
        assert_eq!(result.changed_files.len(), 3);
        assert!(!result.run_all);
    }

    #[test]
    fn implementation_tests_follow_interface_changes() {
        let tmp = tempfile::tempdir().expect("tempdir");
        seed(tmp.path());
        let mut cfg = Config::default();
        cfg.strategies = vec![StrategyKind::Naming, StrategyKind::Impl];
        let engine = AnalysisEngine::new(cfg, tmp.path()).expect("engine");

        let result = engine.analyze(&changes(&["core/src/main/java/com/acme/Svc.java"]));
        assert_eq!(
            result.test_fqns,
            BTreeSet::from(["com.acme.SvcImplTest".to_string()])
        );
    }

    #[test]
    fn no_match_sets_run_all_when_configured() {
        let tmp = tempfile::tempdir().expect("tempdir");
        seed(tmp.path());
        let mut cfg = Config::default();
        cfg.run_all_if_no_matches = true;
        let engine = AnalysisEngine::new(cfg, tmp.path()).expect("engine");

        let result = engine.analyze(&changes(&["build.gradle"]));
        assert!(result.test_fqns.is_empty());
        assert!(result.run_all);
    }

    #[test]
    fn analysis_is_idempotent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        seed(tmp.path());
        let engine = AnalysisEngine::new(Config::default(), tmp.path()).expect("engine");
        let input = changes(&["core/src/main/java/com/acme/Repo.java"]);
        assert_eq!(engine.analyze(&input), engine.analyze(&input));
    }

    #[test]
    fn invalid_config_fails_before_scanning() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut cfg = Config::default();
        cfg.base_ref = "../../etc/passwd".into();
        assert!(matches!(
            AnalysisEngine::new(cfg, tmp.path()),
            Err(ConfigError::SuspiciousBaseRef(_))
        ));
    }

    #[test]
    fn search_roots_follow_module_mapping() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path();
        fs::create_dir_all(root.join("application")).expect("mkdir");
        fs::create_dir_all(root.join("services/payment-tests")).expect("mkdir");
        let mapper = PathClassMapper::new(&Config::default()).expect("mapper");
        let mapping = BTreeMap::from([
            (":api".to_string(), ":application".to_string()),
            (":services:payment".to_string(), "services/payment-tests".to_string()),
            ("someapi".to_string(), "missing".to_string()),
        ]);

        let search = resolve_search_roots(
            root,
            &changes(&[
                "api/src/main/java/a/A.java",
                "services/payment/src/main/java/b/B.java",
                "someapi/src/main/java/c/C.java",
            ]),
            &mapper,
            &mapping,
        );
        let canonical = root.canonicalize().expect("canonical");
        assert_eq!(
            search.roots,
            vec![
                canonical.clone(),
                canonical.join("application"),
                canonical.join("services/payment-tests"),
            ]
        );
        assert!(search.rejected.is_empty());
    }

    #[test]
    fn malicious_mapping_is_rejected_without_failing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("project");
        fs::create_dir_all(&root).expect("mkdir");
        let mapper = PathClassMapper::new(&Config::default()).expect("mapper");
        let mapping = BTreeMap::from([
            ("api".to_string(), "../../etc".to_string()),
            ("web".to_string(), "/etc".to_string()),
        ]);

        let search = resolve_search_roots(
            &root,
            &changes(&["api/src/main/java/A.java", "web/src/main/java/B.java"]),
            &mapper,
            &mapping,
        );
        assert_eq!(search.roots, vec![root.canonicalize().expect("canonical")]);
        assert_eq!(search.rejected.len(), 2);
        assert_eq!(search.rejected[0].module, "api");
    }

    #[cfg(unix)]
    #[test]
    fn mapping_through_symlink_must_stay_inside_project() {
        use std::os::unix::fs::symlink;

        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("project");
        let outside = tmp.path().join("outside");
        fs::create_dir_all(root.join("web-tests")).expect("mkdir");
        fs::create_dir_all(&outside).expect("mkdir");
        symlink(&outside, root.join("link")).expect("symlink out");
        symlink(root.join("web-tests"), root.join("alias")).expect("symlink in");

        let mapper = PathClassMapper::new(&Config::default()).expect("mapper");
        let mapping = BTreeMap::from([
            ("api".to_string(), "link".to_string()),
            ("web".to_string(), "alias".to_string()),
        ]);
        let search = resolve_search_roots(
            &root,
            &changes(&["api/src/main/java/A.java", "web/src/main/java/B.java"]),
            &mapper,
            &mapping,
        );

        let canonical = root.canonicalize().expect("canonical");
        assert_eq!(
            search.roots,
            vec![canonical.clone(), canonical.join("web-tests")]
        );
        assert_eq!(
            search.rejected,
            vec![PathSafetyError {
                module: "api".to_string(),
                target: "link".to_string(),
            }]
        );
    }

    #[test]
    fn transitive_reaches_dependents_through_engine() {
        let tmp = tempfile::tempdir().expect("tempdir");
        seed(tmp.path());
        let mut cfg = Config::default();
        cfg.strategies = vec![StrategyKind::Transitive];
        cfg.transitive_depth = 1;
        let engine = AnalysisEngine::new(cfg, tmp.path()).expect("engine");

        let result = engine.analyze(&changes(&["core/src/main/java/com/acme/Repo.java"]));
        assert_eq!(
            result.test_fqns,
            BTreeSet::from(["com.acme.SvcImplTest".to_string()])
        );
    }
}
