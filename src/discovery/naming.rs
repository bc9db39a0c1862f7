use super::TestDiscoveryStrategy;
use crate::java_source::simple_name;
use crate::scanner::SourceIndex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// `Foo` → `FooTest`, `FooIT`, ... for every configured suffix.
#[derive(Debug, Clone)]
pub struct NamingStrategy {
    suffixes: Vec<String>,
}

impl NamingStrategy {
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }
}

impl TestDiscoveryStrategy for NamingStrategy {
    fn name(&self) -> &'static str {
        "naming"
    }

    fn discover(&self, changed: &BTreeSet<String>, index: &SourceIndex) -> BTreeSet<String> {
        // candidate simple name → changed classes asking for it
        let mut wanted: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for fqn in changed {
            let simple = simple_name(fqn);
            for suffix in &self.suffixes {
                wanted
                    .entry(format!("{simple}{suffix}"))
                    .or_default()
                    .push(fqn);
            }
        }

        let mut found = BTreeSet::new();
        for (candidate, requesters) in &wanted {
            for test in index.tests_named(candidate) {
                debug!(test, changed = ?requesters, "naming match");
                found.insert(test.to_string());
            }
        }
        found
    }
}
