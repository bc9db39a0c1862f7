use super::{NamingStrategy, TestDiscoveryStrategy, UsageStrategy};
use crate::java_source::{simple_name, strip_generics};
use crate::scanner::SourceIndex;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Finds implementations and subclasses of changed types, then the tests of those.
///
/// Supertypes are compared by simple name only, so `a.Repo` and `b.Repo` are
/// treated as the same parent.
#[derive(Debug, Clone)]
pub struct ImplementationStrategy {
    enabled: bool,
    impl_suffixes: Vec<String>,
    naming: Option<NamingStrategy>,
    usage: Option<UsageStrategy>,
}

impl ImplementationStrategy {
    pub fn new(
        enabled: bool,
        impl_suffixes: Vec<String>,
        naming: Option<NamingStrategy>,
        usage: Option<UsageStrategy>,
    ) -> Self {
        Self {
            enabled,
            impl_suffixes,
            naming,
            usage,
        }
    }

    /// Production classes named `<Changed><suffix>` or declaring a changed type as supertype.
    pub fn find_implementations(
        &self,
        changed: &BTreeSet<String>,
        index: &SourceIndex,
    ) -> BTreeSet<String> {
        let changed_simple: BTreeSet<&str> = changed.iter().map(|f| simple_name(f)).collect();
        let wanted_names: BTreeSet<String> = changed_simple
            .iter()
            .flat_map(|simple| {
                self.impl_suffixes
                    .iter()
                    .map(move |suffix| format!("{simple}{suffix}"))
            })
            .collect();

        let mut found = BTreeSet::new();
        for record in index.production_classes() {
            if wanted_names.contains(&record.simple_name) {
                debug!(class = %record.fqn, "implementation by name");
                found.insert(record.fqn.clone());
            }
            for decl in &record.declarations {
                let parent = decl
                    .supertypes
                    .iter()
                    .map(|raw| simple_name(strip_generics(raw)))
                    .find(|parent| changed_simple.contains(parent));
                if let Some(parent) = parent {
                    let fqn = record.declared_fqn(decl);
                    debug!(class = %fqn, parent, "implementation by supertype");
                    found.insert(fqn);
                }
            }
        }
        found
    }
}

impl TestDiscoveryStrategy for ImplementationStrategy {
    fn name(&self) -> &'static str {
        "impl"
    }

    fn discover(&self, changed: &BTreeSet<String>, index: &SourceIndex) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        if !self.enabled {
            debug!("implementation test discovery disabled");
            return found;
        }

        let implementations = self.find_implementations(changed, index);
        if implementations.is_empty() {
            return found;
        }
        info!(
            implementations = implementations.len(),
            changed = changed.len(),
            "found implementation classes"
        );

        if let Some(naming) = &self.naming {
            found.extend(naming.discover(&implementations, index));
        }
        if let Some(usage) = &self.usage {
            found.extend(usage.discover(&implementations, index));
        }
        found
    }
}
