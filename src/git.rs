//! Change detection through the `git` CLI.

use crate::config::Config;
use crate::error::ChangeDetectionError;
use crate::mapping::ChangeSet;
use std::path::Path;
use std::process::{Command, Output};
use tracing::{debug, info, warn};

fn git(project_dir: &Path, args: &[&str]) -> Result<Output, ChangeDetectionError> {
    Command::new("git")
        .args(["-c", "core.quotepath=off"])
        .arg("-C")
        .arg(project_dir)
        .args(args)
        .output()
        .map_err(ChangeDetectionError::Spawn)
}

fn git_ok(project_dir: &Path, args: &[&str]) -> Result<String, ChangeDetectionError> {
    let output = git(project_dir, args)?;
    if !output.status.success() {
        return Err(ChangeDetectionError::GitFailed {
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn ensure_work_tree(project_dir: &Path) -> Result<(), ChangeDetectionError> {
    let output = git(project_dir, &["rev-parse", "--is-inside-work-tree"])?;
    if output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true" {
        Ok(())
    } else {
        Err(ChangeDetectionError::NotARepository(project_dir.to_path_buf()))
    }
}

fn verify_commit(project_dir: &Path, rev: &str) -> Result<Option<String>, ChangeDetectionError> {
    let revspec = format!("{rev}^{{commit}}");
    let output = git(project_dir, &["rev-parse", "--verify", "--quiet", &revspec])?;
    if !output.status.success() {
        return Ok(None);
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok((!sha.is_empty()).then_some(sha))
}

/// `base_ref` as given, else as a remote-tracking ref (`refs/remotes/<base_ref>`).
pub fn resolve_base_ref(project_dir: &Path, base_ref: &str) -> Result<String, ChangeDetectionError> {
    if let Some(sha) = verify_commit(project_dir, base_ref)? {
        return Ok(sha);
    }
    let remote = format!("refs/remotes/{base_ref}");
    if let Some(sha) = verify_commit(project_dir, &remote)? {
        debug!(base_ref, resolved = %remote, "resolved base ref as remote-tracking ref");
        return Ok(sha);
    }
    Err(ChangeDetectionError::UnresolvedRef(base_ref.to_string()))
}

/// Paths from `git diff --name-status` output. Renames and copies contribute both
/// sides, deletions the removed path.
pub fn parse_name_status(stdout: &str) -> Vec<String> {
    let mut paths = Vec::new();
    for line in stdout.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 {
            continue;
        }
        let status = fields[0];
        if status.starts_with('R') || status.starts_with('C') {
            if fields.len() < 3 {
                continue;
            }
            if status.starts_with('R') {
                paths.push(fields[1].to_string());
            }
            paths.push(fields[2].to_string());
        } else if status.starts_with(|c: char| matches!(c, 'A' | 'M' | 'D' | 'T')) {
            paths.push(fields[1].to_string());
        }
    }
    paths
}

fn name_status(project_dir: &Path, extra: &[&str]) -> Result<Vec<String>, ChangeDetectionError> {
    let mut args = vec!["diff", "--name-status", "--find-renames", "--relative"];
    args.extend_from_slice(extra);
    args.push("--");
    Ok(parse_name_status(&git_ok(project_dir, &args)?))
}

/// Committed changes since `base_ref` plus, per config, unstaged and staged ones.
///
/// Paths are relative to `project_dir`.
pub fn detect_changed_files(
    project_dir: &Path,
    config: &Config,
) -> Result<ChangeSet, ChangeDetectionError> {
    ensure_work_tree(project_dir)?;
    let mut changes = ChangeSet::new();

    if verify_commit(project_dir, "HEAD")?.is_some() {
        let base = resolve_base_ref(project_dir, &config.base_ref)?;
        let range = format!("{base}..HEAD");
        let committed = name_status(project_dir, &[range.as_str()])?;
        debug!(base_ref = %config.base_ref, files = committed.len(), "committed changes");
        changes.extend(committed);
    } else {
        warn!("repository has no commits yet; only working tree changes are considered");
    }

    if config.include_uncommitted {
        let unstaged = name_status(project_dir, &[])?;
        debug!(files = unstaged.len(), "unstaged changes");
        changes.extend(unstaged);
    }
    if config.include_staged {
        let staged = name_status(project_dir, &["--cached"])?;
        debug!(files = staged.len(), "staged changes");
        changes.extend(staged);
    }

    info!(files = changes.len(), base_ref = %config.base_ref, "detected changed files");
    Ok(changes)
}
