use crate::error::ConfigError;
use clap::ValueEnum;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "affected-tests.toml";
pub const MAX_TRANSITIVE_DEPTH: i32 = 5;

/// One of the four discovery strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Naming,
    Usage,
    Impl,
    Transitive,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Naming => "naming",
            StrategyKind::Usage => "usage",
            StrategyKind::Impl => "impl",
            StrategyKind::Transitive => "transitive",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Branch, tag or SHA the current HEAD is compared against.
    pub base_ref: String,
    pub include_uncommitted: bool,
    pub include_staged: bool,
    /// Ask for the full suite when nothing matched (or nothing changed).
    pub run_all_if_no_matches: bool,
    pub strategies: Vec<StrategyKind>,
    /// Reverse-dependency depth; clamped to 0..=5, 0 disables the transitive strategy.
    pub transitive_depth: i32,
    pub test_suffixes: Vec<String>,
    pub source_dirs: Vec<String>,
    pub test_dirs: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub include_implementation_tests: bool,
    pub implementation_naming: Vec<String>,
    /// Directory names never descended into while looking for source roots.
    pub pruned_dirs: Vec<String>,
    /// Changed module -> module whose tests should also be searched.
    pub test_project_mapping: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_ref: "origin/master".into(),
            include_uncommitted: true,
            include_staged: true,
            run_all_if_no_matches: false,
            strategies: vec![
                StrategyKind::Naming,
                StrategyKind::Usage,
                StrategyKind::Impl,
                StrategyKind::Transitive,
            ],
            transitive_depth: 2,
            test_suffixes: vec![
                "Test".into(),
                "IT".into(),
                "ITTest".into(),
                "IntegrationTest".into(),
            ],
            source_dirs: vec!["src/main/java".into()],
            test_dirs: vec!["src/test/java".into()],
            exclude_paths: vec!["**/generated/**".into()],
            include_implementation_tests: true,
            implementation_naming: vec!["Impl".into()],
            pruned_dirs: vec![
                ".git".into(),
                ".gradle".into(),
                ".idea".into(),
                ".mvn".into(),
                "build".into(),
                "out".into(),
                "target".into(),
                "node_modules".into(),
            ],
            test_project_mapping: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load `explicit` if given, else `<project>/affected-tests.toml` if present, else defaults.
    pub fn load(project_dir: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = project_dir.join(CONFIG_FILE_NAME);
                if !candidate.is_file() {
                    return Ok(Config::default());
                }
                candidate
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&content, &path)
    }

    pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Fail fast on values that would make the run meaningless or unsafe.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_ref = self.base_ref.trim();
        if base_ref.is_empty() {
            return Err(ConfigError::BlankBaseRef);
        }
        if base_ref.starts_with('-') {
            return Err(ConfigError::OptionLikeBaseRef(self.base_ref.clone()));
        }
        // Refs like "origin/master" or "HEAD~3" are fine, "../../etc/passwd" is not.
        let normalized = base_ref.replace('\\', "/");
        if normalized.contains("../") || normalized.starts_with('/') {
            return Err(ConfigError::SuspiciousBaseRef(self.base_ref.clone()));
        }
        self.exclude_globs()?;
        Ok(())
    }

    pub fn effective_transitive_depth(&self) -> usize {
        self.transitive_depth.clamp(0, MAX_TRANSITIVE_DEPTH) as usize
    }

    pub fn is_enabled(&self, kind: StrategyKind) -> bool {
        self.strategies.contains(&kind)
    }

    /// Enabled strategies in configured order, without duplicates.
    pub fn enabled_strategies(&self) -> Vec<StrategyKind> {
        let mut out: Vec<StrategyKind> = Vec::new();
        for kind in &self.strategies {
            if !out.contains(kind) {
                out.push(*kind);
            }
        }
        out
    }

    /// `*` stays within one path segment, `**` crosses directories.
    pub fn exclude_globs(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_paths {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|source| ConfigError::InvalidGlob {
                    pattern: pattern.clone(),
                    source,
                })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| ConfigError::InvalidGlob {
            pattern: self.exclude_paths.join(", "),
            source,
        })
    }
}

pub fn config_path_for(project_dir: &Path, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project_dir.join(CONFIG_FILE_NAME))
}

pub fn show_config(project_dir: &Path, explicit: Option<&Path>) -> anyhow::Result<()> {
    let path = config_path_for(project_dir, explicit);
    println!("Config: {}", path.display());
    if !path.exists() {
        println!("(default config, file not created)");
    }
    println!();

    let config = Config::load(project_dir, explicit)?;
    config.validate()?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_conventional_layout() {
        let cfg = Config::default();
        assert_eq!(cfg.base_ref, "origin/master");
        assert_eq!(cfg.source_dirs, vec!["src/main/java"]);
        assert_eq!(cfg.test_dirs, vec!["src/test/java"]);
        assert_eq!(cfg.effective_transitive_depth(), 2);
        assert!(cfg.include_implementation_tests);
        assert!(!cfg.run_all_if_no_matches);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn transitive_depth_is_clamped() {
        let mut cfg = Config::default();
        cfg.transitive_depth = 42;
        assert_eq!(cfg.effective_transitive_depth(), 5);
        cfg.transitive_depth = -3;
        assert_eq!(cfg.effective_transitive_depth(), 0);
    }

    #[test]
    fn blank_base_ref_rejected() {
        let mut cfg = Config::default();
        cfg.base_ref = "   ".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::BlankBaseRef)));
    }

    #[test]
    fn traversal_base_ref_rejected() {
        for bad in ["../../etc/passwd", "origin/../../x", "..\\..\\secret"] {
            let mut cfg = Config::default();
            cfg.base_ref = bad.into();
            assert!(
                matches!(cfg.validate(), Err(ConfigError::SuspiciousBaseRef(_))),
                "{bad} should be rejected"
            );
        }
        for good in ["origin/main", "HEAD~3", "v1.2.0", "a1b2c3d"] {
            let mut cfg = Config::default();
            cfg.base_ref = good.into();
            assert!(cfg.validate().is_ok(), "{good} should be accepted");
        }
    }

    #[test]
    fn option_like_base_ref_rejected() {
        for bad in ["--output=/tmp/x", "-h", " --all"] {
            let mut cfg = Config::default();
            cfg.base_ref = bad.into();
            assert!(
                matches!(cfg.validate(), Err(ConfigError::OptionLikeBaseRef(_))),
                "{bad} should be rejected"
            );
        }
        let mut cfg = Config::default();
        cfg.base_ref = "feature-x".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn invalid_glob_rejected() {
        let mut cfg = Config::default();
        cfg.exclude_paths = vec!["src/[".into()];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidGlob { .. })
        ));
    }

    #[test]
    fn toml_overrides_and_keeps_defaults() {
        let cfg = Config::from_toml(
            r#"
base_ref = "origin/main"
strategies = ["naming", "transitive"]
transitive_depth = 1

[test_project_mapping]
":api" = ":application"
"#,
            Path::new("affected-tests.toml"),
        )
        .expect("parse");
        assert_eq!(cfg.base_ref, "origin/main");
        assert_eq!(
            cfg.enabled_strategies(),
            vec![StrategyKind::Naming, StrategyKind::Transitive]
        );
        assert_eq!(cfg.effective_transitive_depth(), 1);
        assert_eq!(
            cfg.test_project_mapping.get(":api").map(String::as_str),
            Some(":application")
        );
        assert_eq!(cfg.test_suffixes.len(), 4);
    }

    #[test]
    fn unknown_strategy_is_a_parse_error() {
        let err = Config::from_toml(r#"strategies = ["magic"]"#, Path::new("x.toml"));
        assert!(matches!(err, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn enabled_strategies_deduplicates_in_order() {
        let mut cfg = Config::default();
        cfg.strategies = vec![
            StrategyKind::Usage,
            StrategyKind::Naming,
            StrategyKind::Usage,
        ];
        assert_eq!(
            cfg.enabled_strategies(),
            vec![StrategyKind::Usage, StrategyKind::Naming]
        );
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load(dir.path(), None).expect("load");
        assert_eq!(cfg.base_ref, "origin/master");
    }

    #[test]
    fn load_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load(dir.path(), Some(&dir.path().join("nope.toml")));
        assert!(matches!(err, Err(ConfigError::Read { .. })));
    }
}
