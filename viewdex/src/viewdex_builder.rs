//! Builder used to configure and open a [`Viewdex`] database.

use std::sync::Arc;

use crate::docstore::DocumentStore;
use crate::mapreduce::{CompilerRegistry, NativeCompiler, ViewCompiler};
use crate::viewdex::Viewdex;

/// Configures view compilers before opening the database.
///
/// A [`NativeCompiler`] is always registered under the `native` language
/// tag; [`ViewdexBuilder::with_compiler`] adds compilers for further
/// definition languages.
pub struct ViewdexBuilder {
    compilers: CompilerRegistry,
    native: NativeCompiler,
}

impl ViewdexBuilder {
    pub(crate) fn new() -> Self {
        ViewdexBuilder {
            compilers: CompilerRegistry::new(),
            native: NativeCompiler::new(),
        }
    }

    /// Registers a compiler for a definition language.
    pub fn with_compiler(self, language: &str, compiler: Arc<dyn ViewCompiler>) -> Self {
        self.compilers.register(language, compiler);
        self
    }

    /// The built-in native compiler, for registering Rust map and reduce
    /// functions before the database opens.
    pub fn native_compiler(&self) -> &NativeCompiler {
        &self.native
    }

    /// Opens a database over the given document store.
    pub fn open(self, doc_store: Arc<dyn DocumentStore>) -> Viewdex {
        self.compilers
            .register("native", Arc::new(self.native.clone()));
        Viewdex::open_internal(doc_store, self.compilers)
    }
}

impl Default for ViewdexBuilder {
    fn default() -> Self {
        ViewdexBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::MemoryDocumentStore;
    use crate::mapreduce::{MapEmission, ViewDefinition};

    #[test]
    fn test_native_compiler_is_preregistered() {
        let builder = ViewdexBuilder::new();
        builder
            .native_compiler()
            .register_map("by_name", |_, _| Ok(vec![MapEmission::new("k", 1)]));
        let db = builder.open(Arc::new(MemoryDocumentStore::new()));
        let view = db
            .compile_view("design/by_name", &ViewDefinition::new("native", "by_name", "1"))
            .unwrap();
        assert!(!view.has_reduce());
    }
}
