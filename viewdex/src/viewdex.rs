//! The database facade tying views, groups and compilers together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::common::SequenceNumber;
use crate::docstore::DocumentStore;
use crate::errors::{ErrorKind, ViewdexError, ViewdexResult};
use crate::mapreduce::{CompilerRegistry, ViewDefinition};
use crate::query::{QueryCursor, QueryOptions};
use crate::store::GroupStore;
use crate::view::{group_of, update_indexes, UpdateOutcome, View};
use crate::viewdex_builder::ViewdexBuilder;

/// An open view-index database over one document store.
///
/// Handles are cheap to clone and share one underlying instance. Dropping
/// the last handle (or calling [`Viewdex::close`]) invalidates every view
/// handle that was created from it.
#[derive(Clone)]
pub struct Viewdex {
    inner: Arc<ViewdexInner>,
}

pub(crate) struct ViewdexInner {
    pub(crate) doc_store: Arc<dyn DocumentStore>,
    pub(crate) compilers: CompilerRegistry,
    views: DashMap<String, View>,
    groups: DashMap<String, GroupStore>,
    closed: AtomicBool,
}

impl ViewdexInner {
    pub(crate) fn check_open(&self) -> ViewdexResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ViewdexError::new(
                "viewdex database is closed",
                ErrorKind::DatabaseClosed,
            ));
        }
        Ok(())
    }

    /// Every registered view whose name carries the given group prefix.
    pub(crate) fn views_in_group(&self, group: &str) -> Vec<View> {
        self.views
            .iter()
            .filter(|entry| entry.value().group_name() == group)
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl Viewdex {
    pub fn builder() -> ViewdexBuilder {
        ViewdexBuilder::new()
    }

    pub(crate) fn open_internal(
        doc_store: Arc<dyn DocumentStore>,
        compilers: CompilerRegistry,
    ) -> Viewdex {
        log::debug!("opened viewdex database");
        Viewdex {
            inner: Arc::new(ViewdexInner {
                doc_store,
                compilers,
                views: DashMap::new(),
                groups: DashMap::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the named view, registering it on first access. Views in
    /// the same group share one physical index store.
    pub fn view(&self, name: &str) -> ViewdexResult<View> {
        self.inner.check_open()?;
        if name.is_empty() {
            return Err(ViewdexError::new(
                "view name cannot be empty",
                ErrorKind::InvalidQuery,
            ));
        }
        let view = self
            .inner
            .views
            .entry(name.to_string())
            .or_insert_with(|| {
                let store = self
                    .inner
                    .groups
                    .entry(group_of(name).to_string())
                    .or_insert_with(|| GroupStore::new(group_of(name)))
                    .clone();
                View::new(name, &self.inner, store)
            })
            .clone();
        Ok(view)
    }

    /// Registers the named view and compiles a definition onto it in one
    /// step.
    pub fn compile_view(&self, name: &str, definition: &ViewDefinition) -> ViewdexResult<View> {
        let view = self.view(name)?;
        view.compile(definition)?;
        Ok(view)
    }

    /// Brings the named views up to date, batched per group.
    pub fn update_indexes(&self, names: &[&str], alone: bool) -> ViewdexResult<UpdateOutcome> {
        let mut views = Vec::with_capacity(names.len());
        for name in names {
            views.push(self.view(name)?);
        }
        update_indexes(&views, alone)
    }

    /// Runs a query against the named view.
    pub fn query(&self, name: &str, options: QueryOptions) -> ViewdexResult<QueryCursor> {
        self.view(name)?.query(options)
    }

    /// Fetches the raw text behind a full-text query row of the named view.
    pub fn full_text(
        &self,
        name: &str,
        doc_id: &str,
        sequence: SequenceNumber,
        field_id: u64,
    ) -> ViewdexResult<Vec<u8>> {
        self.view(name)?.full_text(doc_id, sequence, field_id)
    }

    /// Discards the named view's index rows, keeping the view registered.
    pub fn delete_index(&self, name: &str) -> ViewdexResult<()> {
        self.view(name)?.delete_index()
    }

    /// Unregisters a view and removes its slice of the group index.
    /// Outstanding handles to the view keep working against empty storage.
    pub fn delete_view(&self, name: &str) -> ViewdexResult<()> {
        self.inner.check_open()?;
        if let Some((_, view)) = self.inner.views.remove(name) {
            view.remove_storage();
            log::debug!("deleted view '{}'", name);
        }
        Ok(())
    }

    /// Names of the registered views in a group, unordered.
    pub fn views_in_group(&self, group: &str) -> ViewdexResult<Vec<String>> {
        self.inner.check_open()?;
        Ok(self
            .inner
            .views_in_group(group)
            .iter()
            .map(|view| view.name().to_string())
            .collect())
    }

    pub fn document_store(&self) -> Arc<dyn DocumentStore> {
        self.inner.doc_store.clone()
    }

    /// The newest committed sequence of the underlying document store.
    pub fn latest_sequence(&self) -> ViewdexResult<SequenceNumber> {
        self.inner.check_open()?;
        self.inner.doc_store.latest_sequence()
    }

    /// Closes the database. Every operation on this handle or any view
    /// handle fails with [`ErrorKind::DatabaseClosed`] afterwards.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            self.inner.views.clear();
            self.inner.groups.clear();
            log::debug!("closed viewdex database");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}
