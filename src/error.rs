//! Error taxonomy for the analysis pipeline.
//!
//! Two kinds of failure exist. `ConfigError` and `ChangeDetectionError` abort
//! the run and carry a remediation hint. `ParseError` and `PathSafetyError`
//! are reported through `tracing` and the run continues without the offending
//! file or mapping entry.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("base_ref must not be blank (set base_ref in affected-tests.toml or pass --base-ref)")]
    BlankBaseRef,

    #[error("base_ref '{0}' looks like a path traversal; use a branch, tag or commit SHA")]
    SuspiciousBaseRef(String),

    #[error("base_ref '{0}' starts with '-' and would be read as a git option; use a branch, tag or commit SHA")]
    OptionLikeBaseRef(String),

    #[error("exclude pattern '{pattern}' is not a valid glob: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ChangeDetectionError {
    #[error("failed to run git ({0}); is git installed and on PATH?")]
    Spawn(#[source] std::io::Error),

    #[error("{} is not inside a git repository; run the analysis from a checkout", .0.display())]
    NotARepository(PathBuf),

    #[error("base ref '{0}' could not be resolved; make sure it exists locally (e.g. run 'git fetch origin' in CI)")]
    UnresolvedRef(String),

    #[error("git {args} failed: {stderr}")]
    GitFailed { args: String, stderr: String },
}

/// A single source file could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {reason}", path.display())]
pub struct ParseError {
    pub path: PathBuf,
    pub reason: String,
}

/// A `test_project_mapping` target escaped the project root.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("mapping '{module}' -> '{target}' resolves outside the project root")]
pub struct PathSafetyError {
    pub module: String,
    pub target: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("change detection error: {0}")]
    ChangeDetection(#[from] ChangeDetectionError),
}
