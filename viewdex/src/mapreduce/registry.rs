use std::sync::Arc;

use dashmap::DashMap;

use crate::common::Key;
use crate::errors::{ErrorKind, ViewdexError, ViewdexResult};
use crate::mapreduce::{CompiledView, MapFn, ReduceFn, ViewCompiler, ViewDefinition};

/// Registry mapping a language tag to the compiler for that language.
///
/// The engine core never holds a compiler; views resolve one here at
/// compile time and keep only the resulting [`CompiledView`].
#[derive(Clone, Default)]
pub struct CompilerRegistry {
    compilers: Arc<DashMap<String, Arc<dyn ViewCompiler>>>,
}

impl CompilerRegistry {
    pub fn new() -> Self {
        CompilerRegistry::default()
    }

    pub fn register(&self, language: &str, compiler: Arc<dyn ViewCompiler>) {
        self.compilers.insert(language.to_string(), compiler);
    }

    pub fn get(&self, language: &str) -> ViewdexResult<Arc<dyn ViewCompiler>> {
        self.compilers
            .get(language)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                ViewdexError::new(
                    &format!("no view compiler registered for language '{}'", language),
                    ErrorKind::CompileError,
                )
            })
    }
}

/// Compiler for native Rust map/reduce functions.
///
/// A definition's `map_source` and `reduce_source` name closures previously
/// registered here. Reduce names starting with `_` are built in: `_sum`
/// folds numeric values into their sum, `_count` into the row count.
#[derive(Clone, Default)]
pub struct NativeCompiler {
    maps: Arc<DashMap<String, Arc<MapFn>>>,
    reduces: Arc<DashMap<String, Arc<ReduceFn>>>,
}

impl NativeCompiler {
    pub fn new() -> Self {
        NativeCompiler::default()
    }

    pub fn register_map<F>(&self, name: &str, map: F)
    where
        F: Fn(&str, &crate::common::Document) -> ViewdexResult<Vec<crate::mapreduce::MapEmission>>
            + Send
            + Sync
            + 'static,
    {
        self.maps.insert(name.to_string(), Arc::new(map));
    }

    pub fn register_reduce<F>(&self, name: &str, reduce: F)
    where
        F: Fn(&[(Key, Key)]) -> ViewdexResult<Key> + Send + Sync + 'static,
    {
        self.reduces.insert(name.to_string(), Arc::new(reduce));
    }

    fn resolve_reduce(&self, name: &str) -> ViewdexResult<Arc<ReduceFn>> {
        match name {
            "_sum" => Ok(Arc::new(reduce_sum)),
            "_count" => Ok(Arc::new(reduce_count)),
            _ => self
                .reduces
                .get(name)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| {
                    ViewdexError::new(
                        &format!("no native reduce function registered as '{}'", name),
                        ErrorKind::CompileError,
                    )
                }),
        }
    }
}

impl ViewCompiler for NativeCompiler {
    fn compile(&self, definition: &ViewDefinition) -> ViewdexResult<CompiledView> {
        definition.validate()?;
        let map = self
            .maps
            .get(&definition.map_source)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                ViewdexError::new(
                    &format!(
                        "no native map function registered as '{}'",
                        definition.map_source
                    ),
                    ErrorKind::CompileError,
                )
            })?;
        let mut compiled = CompiledView::new(&definition.version, map);
        if let Some(reduce_name) = &definition.reduce_source {
            compiled = compiled.with_reduce(self.resolve_reduce(reduce_name)?);
        }
        Ok(compiled)
    }
}

fn reduce_sum(group: &[(Key, Key)]) -> ViewdexResult<Key> {
    let mut total = 0.0;
    for (_, value) in group {
        match value {
            Key::Number(n) => total += n,
            Key::Null => {}
            other => {
                return Err(ViewdexError::new(
                    &format!("_sum cannot add non-numeric value {}", other),
                    ErrorKind::IndexError,
                ))
            }
        }
    }
    Ok(Key::Number(total))
}

fn reduce_count(group: &[(Key, Key)]) -> ViewdexResult<Key> {
    Ok(Key::Number(group.len() as f64))
}
