use crate::engine::AffectedResult;
use anyhow::Result;
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    /// One `--tests <FQN>` filter per line.
    Gradle,
}

pub fn render(result: &AffectedResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(result)),
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(result)?)),
        OutputFormat::Gradle => Ok(render_gradle(result)),
    }
}

fn render_text(result: &AffectedResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "changed: {} files ({} production, {} test classes)\n",
        result.changed_files.len(),
        result.changed_production_classes.len(),
        result.changed_test_classes.len()
    ));

    if result.run_all {
        out.push_str("no affected tests matched: run the full suite\n");
        return out;
    }
    if result.test_fqns.is_empty() {
        out.push_str("no affected tests\n");
        return out;
    }

    out.push_str(&format!("affected tests ({}):\n", result.test_fqns.len()));
    for fqn in &result.test_fqns {
        out.push_str(&format!("  {fqn}\n"));
    }
    out
}

/// Empty for `run_all` as well; the caller then runs the unfiltered task.
fn render_gradle(result: &AffectedResult) -> String {
    if result.run_all {
        return String::new();
    }
    result
        .test_fqns
        .iter()
        .map(|fqn| format!("--tests {fqn}\n"))
        .collect()
}
