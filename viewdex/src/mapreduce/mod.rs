//! Map/reduce definitions and the pluggable compiler registry.
//!
//! The engine holds only compiled definitions; compilers for concrete
//! definition languages register themselves in a [`CompilerRegistry`] keyed
//! by language tag. The built-in [`NativeCompiler`] resolves definitions to
//! registered Rust closures.

mod registry;

pub use registry::{CompilerRegistry, NativeCompiler};

use std::sync::Arc;

use crate::collation::Collation;
use crate::common::{Document, Key};
use crate::errors::{ErrorKind, ViewdexError, ViewdexResult};

/// One row emitted by a map invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct MapEmission {
    pub key: Key,
    /// `None` is the whole-document placeholder: the row carries no payload
    /// beyond the document body.
    pub value: Option<Key>,
    /// Raw text to index for later snippet retrieval via the full-text
    /// accessor. Addressed by the emission's ordinal within the document.
    pub full_text: Option<String>,
}

impl MapEmission {
    pub fn new(key: impl Into<Key>, value: impl Into<Key>) -> Self {
        MapEmission {
            key: key.into(),
            value: Some(value.into()),
            full_text: None,
        }
    }

    /// Emission whose row value is the whole-document placeholder.
    pub fn whole_doc(key: impl Into<Key>) -> Self {
        MapEmission {
            key: key.into(),
            value: None,
            full_text: None,
        }
    }

    pub fn with_full_text(mut self, text: impl Into<String>) -> Self {
        self.full_text = Some(text.into());
        self
    }
}

/// A map step: document in, emissions out.
pub type MapFn = dyn Fn(&str, &Document) -> ViewdexResult<Vec<MapEmission>> + Send + Sync;

/// A reduce step: a group of (key, value) pairs in, one folded value out.
pub type ReduceFn = dyn Fn(&[(Key, Key)]) -> ViewdexResult<Key> + Send + Sync;

/// A source-form view definition, prior to compilation.
///
/// `language` selects the compiler; `map_source` and `reduce_source` are
/// opaque to the engine (the native compiler treats them as registered
/// function names). `version` is the map-function version tag: a mismatch
/// against a persisted index's stored version invalidates that index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewDefinition {
    pub language: String,
    pub map_source: String,
    pub reduce_source: Option<String>,
    pub version: String,
    /// Ordering policy of the view's emitted keys.
    pub collation: Collation,
}

impl ViewDefinition {
    pub fn new(language: &str, map_source: &str, version: &str) -> Self {
        ViewDefinition {
            language: language.to_string(),
            map_source: map_source.to_string(),
            reduce_source: None,
            version: version.to_string(),
            collation: Collation::default(),
        }
    }

    pub fn with_reduce(mut self, reduce_source: &str) -> Self {
        self.reduce_source = Some(reduce_source.to_string());
        self
    }

    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    pub(crate) fn validate(&self) -> ViewdexResult<()> {
        if self.map_source.is_empty() {
            return Err(ViewdexError::new(
                "view definition has an empty map function",
                ErrorKind::CompileError,
            ));
        }
        if self.version.is_empty() {
            return Err(ViewdexError::new(
                "view definition has an empty version tag",
                ErrorKind::CompileError,
            ));
        }
        Ok(())
    }
}

/// A compiled map/reduce definition, ready to invoke.
#[derive(Clone)]
pub struct CompiledView {
    version: String,
    map: Arc<MapFn>,
    reduce: Option<Arc<ReduceFn>>,
}

impl CompiledView {
    pub fn new(version: &str, map: Arc<MapFn>) -> Self {
        CompiledView {
            version: version.to_string(),
            map,
            reduce: None,
        }
    }

    pub fn with_reduce(mut self, reduce: Arc<ReduceFn>) -> Self {
        self.reduce = Some(reduce);
        self
    }

    /// The map-function version tag stored alongside the index.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn has_reduce(&self) -> bool {
        self.reduce.is_some()
    }

    pub fn invoke_map(&self, doc_id: &str, body: &Document) -> ViewdexResult<Vec<MapEmission>> {
        (self.map)(doc_id, body)
    }

    pub fn invoke_reduce(&self, group: &[(Key, Key)]) -> ViewdexResult<Key> {
        match &self.reduce {
            Some(reduce) => (reduce)(group),
            None => Err(ViewdexError::new(
                "view has no reduce function",
                ErrorKind::InvalidQuery,
            )),
        }
    }
}

// Closures have no useful Debug form; show the recorded metadata.
impl std::fmt::Debug for CompiledView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledView")
            .field("version", &self.version)
            .field("has_reduce", &self.reduce.is_some())
            .finish_non_exhaustive()
    }
}

/// A compiler for one definition language, registered under its tag.
pub trait ViewCompiler: Send + Sync {
    fn compile(&self, definition: &ViewDefinition) -> ViewdexResult<CompiledView>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, key};

    #[test]
    fn test_emission_constructors() {
        let emission = MapEmission::new("k", 1);
        assert_eq!(emission.key, key!("k"));
        assert_eq!(emission.value, Some(key!(1)));
        assert!(emission.full_text.is_none());

        let placeholder = MapEmission::whole_doc("k").with_full_text("some words");
        assert_eq!(placeholder.value, None);
        assert_eq!(placeholder.full_text.as_deref(), Some("some words"));
    }

    #[test]
    fn test_definition_validation() {
        let ok = ViewDefinition::new("native", "by_name", "1");
        assert!(ok.validate().is_ok());

        let no_map = ViewDefinition::new("native", "", "1");
        assert_eq!(no_map.validate().unwrap_err().kind(), &ErrorKind::CompileError);

        let no_version = ViewDefinition::new("native", "by_name", "");
        assert_eq!(
            no_version.validate().unwrap_err().kind(),
            &ErrorKind::CompileError
        );
    }

    #[test]
    fn test_compiled_view_invocations() {
        let compiled = CompiledView::new(
            "1",
            Arc::new(|_, body: &Document| {
                Ok(vec![MapEmission::new(body.get("name").cloned().unwrap(), 1)])
            }),
        );
        let emissions = compiled
            .invoke_map("doc1", &doc! { "name": "apple" })
            .unwrap();
        assert_eq!(emissions[0].key, key!("apple"));

        assert!(!compiled.has_reduce());
        let err = compiled.invoke_reduce(&[]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
    }

    #[test]
    fn test_compiled_view_debug_is_opaque() {
        let compiled = CompiledView::new("7", Arc::new(|_: &str, _: &Document| Ok(vec![])));
        let formatted = format!("{:?}", compiled);
        assert!(formatted.contains("CompiledView"));
        assert!(formatted.contains("\"7\""));
    }
}
