//! Test discovery strategies.
//!
//! Each strategy maps a set of changed production FQNs to the test FQNs it
//! believes are affected, reading only the [`SourceIndex`]. The orchestrator
//! runs the enabled ones in configured order and unions their output.

pub mod implementation;
pub mod naming;
pub mod resolver;
pub mod transitive;
pub mod usage;

use crate::config::{Config, StrategyKind};
use crate::scanner::SourceIndex;
use std::collections::BTreeSet;
use tracing::debug;

pub use implementation::ImplementationStrategy;
pub use naming::NamingStrategy;
pub use transitive::TransitiveStrategy;
pub use usage::UsageStrategy;

pub trait TestDiscoveryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pure function of `(changed, index)`.
    fn discover(&self, changed: &BTreeSet<String>, index: &SourceIndex) -> BTreeSet<String>;
}

/// Enabled strategies in configured order.
pub fn build_strategies(config: &Config) -> Vec<Box<dyn TestDiscoveryStrategy>> {
    let naming = NamingStrategy::new(config.test_suffixes.clone());
    let mut out: Vec<Box<dyn TestDiscoveryStrategy>> = Vec::new();

    for kind in config.enabled_strategies() {
        match kind {
            StrategyKind::Naming => out.push(Box::new(naming.clone())),
            StrategyKind::Usage => out.push(Box::new(UsageStrategy)),
            StrategyKind::Impl => out.push(Box::new(ImplementationStrategy::new(
                config.include_implementation_tests,
                config.implementation_naming.clone(),
                config.is_enabled(StrategyKind::Naming).then(|| naming.clone()),
                config.is_enabled(StrategyKind::Usage).then_some(UsageStrategy),
            ))),
            StrategyKind::Transitive => {
                let depth = config.effective_transitive_depth();
                if depth == 0 {
                    debug!("transitive depth is 0, strategy disabled");
                    continue;
                }
                out.push(Box::new(TransitiveStrategy::new(
                    depth,
                    naming.clone(),
                    UsageStrategy,
                )));
            }
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::java_source::{parse_source, SourceKind};
    use crate::scanner::SourceIndex;
    use std::collections::BTreeSet;
    use std::path::Path;

    pub fn prod(fqn: &str, src: &str) -> (String, SourceKind, String) {
        (fqn.to_string(), SourceKind::Production, src.to_string())
    }

    pub fn test(fqn: &str, src: &str) -> (String, SourceKind, String) {
        (fqn.to_string(), SourceKind::Test, src.to_string())
    }

    pub fn index(files: &[(String, SourceKind, String)]) -> SourceIndex {
        SourceIndex::from_records(files.iter().map(|(fqn, kind, src)| {
            let path = format!("{}.java", fqn.replace('.', "/"));
            parse_source(src, Path::new(&path), fqn, *kind).expect("fixture parses")
        }))
    }

    pub fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }
}
