use super::TestDiscoveryStrategy;
use crate::java_source::{package_of, simple_name, ClassRecord};
use crate::scanner::SourceIndex;
use std::collections::BTreeSet;
use tracing::debug;

/// How a test reaches a changed class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageTier {
    DirectImport,
    WildcardImport,
    SamePackage,
}

/// Tests that import or otherwise reference a changed class.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageStrategy;

/// First tier through which `test` sees `changed_fqn`, if any.
///
/// Wildcard and same-package tiers only count when the simple name also appears
/// in type position; two classes sharing a simple name across packages may
/// still collide there.
pub fn usage_tier(test: &ClassRecord, changed_fqn: &str) -> Option<UsageTier> {
    if test.imports_fqn(changed_fqn) {
        return Some(UsageTier::DirectImport);
    }
    let package = package_of(changed_fqn);
    let simple = simple_name(changed_fqn);
    if test.wildcard_imports.contains(package) && test.references_type(simple) {
        return Some(UsageTier::WildcardImport);
    }
    if test.package == package && test.references_type(simple) {
        return Some(UsageTier::SamePackage);
    }
    None
}

impl TestDiscoveryStrategy for UsageStrategy {
    fn name(&self) -> &'static str {
        "usage"
    }

    fn discover(&self, changed: &BTreeSet<String>, index: &SourceIndex) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        if changed.is_empty() {
            return found;
        }

        for test in index.test_classes() {
            if changed.contains(&test.fqn) {
                continue;
            }
            let hit = changed
                .iter()
                .find_map(|fqn| usage_tier(test, fqn).map(|tier| (fqn, tier)));
            if let Some((fqn, tier)) = hit {
                debug!(test = %test.fqn, changed = %fqn, ?tier, "usage match");
                found.insert(test.fqn.clone());
            }
        }
        found
    }
}
