use crate::java_source::{strip_generics, ClassRecord};
use crate::scanner::SourceIndex;

/// Resolves a raw type identifier written in one file to a known production FQN.
///
/// Order: explicit import, same package, wildcard imports. An explicit import
/// that names an unknown class ends the search; it shadows anything the other
/// two would find.
pub struct TypeResolver<'a> {
    index: &'a SourceIndex,
}

impl<'a> TypeResolver<'a> {
    pub fn new(index: &'a SourceIndex) -> Self {
        Self { index }
    }

    pub fn resolve(&self, raw: &str, context: &ClassRecord) -> Option<String> {
        let name = strip_generics(raw);
        if name.is_empty() {
            return None;
        }
        if name.contains('.') {
            return self.known(name.to_string());
        }

        if let Some(imported) = context.imports.get(name) {
            return self.known(imported.clone());
        }

        let same_package = if context.package.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", context.package, name)
        };
        if let Some(fqn) = self.known(same_package) {
            return Some(fqn);
        }

        context
            .wildcard_imports
            .iter()
            .find_map(|package| self.known(format!("{package}.{name}")))
    }

    fn known(&self, fqn: String) -> Option<String> {
        self.index.contains_production(&fqn).then_some(fqn)
    }
}
