use super::resolver::TypeResolver;
use super::{NamingStrategy, TestDiscoveryStrategy, UsageStrategy};
use crate::java_source::generic_arguments;
use crate::scanner::SourceIndex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Reverse "used-by" edges between production classes, derived from field types.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Field `Foo foo;` in `Bar` yields `Foo → Bar`. Type arguments (`List<Foo>`)
    /// count as well. Unresolvable types and self-references add nothing.
    pub fn build(index: &SourceIndex) -> Self {
        let resolver = TypeResolver::new(index);
        let mut graph = Self::default();

        for record in index.production_classes() {
            for raw in &record.field_types {
                let nested = generic_arguments(raw);
                let candidates = std::iter::once(raw.as_str()).chain(nested.iter().map(String::as_str));
                for candidate in candidates {
                    let Some(used) = resolver.resolve(candidate, record) else {
                        continue;
                    };
                    if used != record.fqn {
                        graph
                            .dependents
                            .entry(used)
                            .or_default()
                            .insert(record.fqn.clone());
                    }
                }
            }
        }

        debug!(
            used = graph.dependents.len(),
            edges = graph.edge_count(),
            "built dependency graph"
        );
        graph
    }

    pub fn dependents_of(&self, fqn: &str) -> impl Iterator<Item = &String> {
        self.dependents.get(fqn).into_iter().flatten()
    }

    pub fn edge_count(&self) -> usize {
        self.dependents.values().map(BTreeSet::len).sum()
    }
}

/// Tests of classes that depend on a changed class, up to `max_depth` hops away.
#[derive(Debug, Clone)]
pub struct TransitiveStrategy {
    max_depth: usize,
    naming: NamingStrategy,
    usage: UsageStrategy,
}

impl TransitiveStrategy {
    pub fn new(max_depth: usize, naming: NamingStrategy, usage: UsageStrategy) -> Self {
        Self {
            max_depth,
            naming,
            usage,
        }
    }
}

impl TestDiscoveryStrategy for TransitiveStrategy {
    fn name(&self) -> &'static str {
        "transitive"
    }

    fn discover(&self, changed: &BTreeSet<String>, index: &SourceIndex) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        if self.max_depth == 0 || changed.is_empty() {
            return found;
        }

        let graph = DependencyGraph::build(index);
        let mut visited = changed.clone();
        let mut frontier = changed.clone();
        let mut depth = 0;

        while depth < self.max_depth && !frontier.is_empty() {
            depth += 1;
            let next: BTreeSet<String> = frontier
                .iter()
                .flat_map(|fqn| graph.dependents_of(fqn))
                .filter(|dependent| !visited.contains(*dependent))
                .cloned()
                .collect();
            visited.extend(next.iter().cloned());

            if !next.is_empty() {
                debug!(depth, dependents = next.len(), "transitive frontier");
                found.extend(self.naming.discover(&next, index));
                found.extend(self.usage.discover(&next, index));
            }
            frontier = next;
        }

        info!(
            tests = found.len(),
            depth = self.max_depth,
            "transitive discovery finished"
        );
        found
    }
}
