//! Views: named, versioned map/reduce indexes over a document store.
//!
//! A [`View`] is a handle; the rows live in the [`GroupStore`] shared by
//! every view whose name carries the same group prefix (the part before the
//! first `/`). Handles are cheap to clone and hold only a weak reference to
//! the owning database, so a handle kept past `close` fails instead of
//! keeping the database alive.

mod diagnostics;
mod updater;

pub use diagnostics::ViewDiagnostics;
pub use updater::{update_indexes, UpdateOutcome};

use std::sync::{Arc, Weak};

use crate::collation::Collation;
use crate::common::{atomic, Atomic, ReadExecutor, SequenceNumber, WriteExecutor};
use crate::errors::{ErrorKind, ViewdexError, ViewdexResult};
use crate::mapreduce::{CompiledView, ViewDefinition};
use crate::query::{QueryCursor, QueryOptions};
use crate::store::GroupStore;
use crate::viewdex::ViewdexInner;

/// The group prefix of a view name: everything before the first `/`, or the
/// whole name when there is no slash.
pub(crate) fn group_of(view_name: &str) -> &str {
    match view_name.split_once('/') {
        Some((group, _)) => group,
        None => view_name,
    }
}

/// A handle to one named view.
#[derive(Clone)]
pub struct View {
    inner: Arc<ViewInner>,
}

pub(crate) struct ViewInner {
    name: String,
    group: String,
    database: Weak<ViewdexInner>,
    store: GroupStore,
    compiled: Atomic<Option<CompiledView>>,
    collation: Atomic<Collation>,
    last_changed_at: Atomic<SequenceNumber>,
}

impl View {
    pub(crate) fn new(name: &str, database: &Arc<ViewdexInner>, store: GroupStore) -> View {
        View {
            inner: Arc::new(ViewInner {
                name: name.to_string(),
                group: group_of(name).to_string(),
                database: Arc::downgrade(database),
                store,
                compiled: atomic(None),
                collation: atomic(Collation::default()),
                last_changed_at: atomic(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The view group this view's index is batched with.
    pub fn group_name(&self) -> &str {
        &self.inner.group
    }

    pub(crate) fn store(&self) -> &GroupStore {
        &self.inner.store
    }

    pub(crate) fn database(&self) -> ViewdexResult<Arc<ViewdexInner>> {
        match self.inner.database.upgrade() {
            Some(database) => {
                database.check_open()?;
                Ok(database)
            }
            None => Err(ViewdexError::new(
                &format!("database owning view '{}' is closed", self.inner.name),
                ErrorKind::DatabaseClosed,
            )),
        }
    }

    /// Compiles `definition` and installs the result on this view.
    ///
    /// If the view's index was built by a different map-function version,
    /// the persisted rows are discarded and the checkpoint resets to zero,
    /// so the next update rebuilds from scratch.
    pub fn compile(&self, definition: &ViewDefinition) -> ViewdexResult<()> {
        definition.validate()?;
        let database = self.database()?;
        let compiler = database.compilers.get(&definition.language)?;
        let compiled = compiler.compile(definition)?;
        let version = compiled.version().to_string();

        let mut txn = self.inner.store.transaction();
        if let Some(meta) = txn.meta(&self.inner.name) {
            if !meta.map_version.is_empty() && meta.map_version != version {
                log::debug!(
                    "view '{}' changed from version '{}' to '{}', invalidating index",
                    self.inner.name,
                    meta.map_version,
                    version
                );
                txn.clear_view(&self.inner.name);
            }
        }
        let collation = definition.collation;
        txn.update_meta(&self.inner.name, |meta| {
            meta.map_version = version;
            meta.collation = collation;
        });
        txn.commit();

        self.inner
            .collation
            .write_with(|current| *current = collation);
        self.inner
            .compiled
            .write_with(|current| *current = Some(compiled));
        Ok(())
    }

    /// Records a new map-function version without recompiling. Returns
    /// `true` if the version changed, which also invalidates the index.
    pub fn set_map_version(&self, version: &str) -> ViewdexResult<bool> {
        if version.is_empty() {
            return Err(ViewdexError::new(
                "map-function version tag cannot be empty",
                ErrorKind::CompileError,
            ));
        }
        let mut txn = self.inner.store.transaction();
        if let Some(meta) = txn.meta(&self.inner.name) {
            if meta.map_version == version {
                return Ok(false);
            }
            if !meta.map_version.is_empty() {
                txn.clear_view(&self.inner.name);
            }
        }
        txn.update_meta(&self.inner.name, |meta| {
            meta.map_version = version.to_string();
        });
        txn.commit();
        // Any previously installed functions belong to the old version.
        self.inner.compiled.write_with(|current| *current = None);
        Ok(true)
    }

    pub(crate) fn compiled(&self) -> ViewdexResult<CompiledView> {
        self.inner
            .compiled
            .read_with(|compiled| compiled.clone())
            .ok_or_else(|| {
                ViewdexError::new(
                    &format!("view '{}' has no compiled map function", self.inner.name),
                    ErrorKind::ViewNotReady,
                )
            })
    }

    pub(crate) fn compiled_opt(&self) -> Option<CompiledView> {
        self.inner.compiled.read_with(|compiled| compiled.clone())
    }

    pub fn has_reduce(&self) -> bool {
        self.inner
            .compiled
            .read_with(|compiled| compiled.as_ref().map(CompiledView::has_reduce))
            .unwrap_or(false)
    }

    pub fn collation(&self) -> Collation {
        self.inner.collation.read_with(|collation| *collation)
    }

    pub(crate) fn set_collation_internal(&self, collation: Collation) {
        self.inner
            .collation
            .write_with(|current| *current = collation);
        let mut txn = self.inner.store.transaction();
        txn.update_meta(&self.inner.name, |meta| meta.collation = collation);
        txn.commit();
    }

    pub(crate) fn forget_compiled_internal(&self) {
        self.inner.compiled.write_with(|current| *current = None);
    }

    /// The last document-log sequence fully folded into this view's index.
    pub fn checkpoint(&self) -> SequenceNumber {
        self.inner
            .store
            .view_meta(&self.inner.name)
            .map(|meta| meta.checkpoint)
            .unwrap_or(0)
    }

    /// Number of rows currently in the index.
    pub fn total_rows(&self) -> u64 {
        self.inner
            .store
            .view_meta(&self.inner.name)
            .map(|meta| meta.row_count)
            .unwrap_or(0)
    }

    /// Whether the index lags behind the document log.
    pub fn is_stale(&self) -> ViewdexResult<bool> {
        let database = self.database()?;
        Ok(self.checkpoint() < database.doc_store.latest_sequence()?)
    }

    /// Records that the document log moved past this view's checkpoint.
    /// Purely advisory; queries consult the log directly.
    pub fn mark_stale(&self) -> ViewdexResult<()> {
        let database = self.database()?;
        let latest = database.doc_store.latest_sequence()?;
        self.inner.last_changed_at.write_with(|at| {
            if latest > *at {
                *at = latest;
            }
        });
        Ok(())
    }

    /// The sequence recorded by the most recent [`View::mark_stale`], zero
    /// if never marked.
    pub fn last_sequence_changed_at(&self) -> SequenceNumber {
        self.inner.last_changed_at.read_with(|at| *at)
    }

    /// Brings this view's whole group up to date with the document log.
    pub fn update_index(&self) -> ViewdexResult<UpdateOutcome> {
        update_indexes(std::slice::from_ref(self), false)
    }

    /// Brings only this view up to date, leaving stale siblings alone.
    pub fn update_index_alone(&self) -> ViewdexResult<UpdateOutcome> {
        update_indexes(std::slice::from_ref(self), true)
    }

    /// Discards all index rows and resets the checkpoint to zero. The view
    /// and its compiled functions survive. Idempotent.
    pub fn delete_index(&self) -> ViewdexResult<()> {
        self.database()?;
        let mut txn = self.inner.store.transaction();
        txn.clear_view(&self.inner.name);
        txn.commit();
        log::debug!("deleted index of view '{}'", self.inner.name);
        Ok(())
    }

    /// Removes the view's slice from the group store entirely.
    pub(crate) fn remove_storage(&self) {
        let mut txn = self.inner.store.transaction();
        txn.remove_view(&self.inner.name);
        txn.commit();
    }

    /// Runs a query against this view's index.
    pub fn query(&self, options: QueryOptions) -> ViewdexResult<QueryCursor> {
        crate::query::execute(self, options)
    }

    /// Retrieves the raw text of a full-text emission previously surfaced
    /// by a full-text query row.
    pub fn full_text(
        &self,
        doc_id: &str,
        sequence: SequenceNumber,
        field_id: u64,
    ) -> ViewdexResult<Vec<u8>> {
        crate::fulltext::lookup(self, doc_id, sequence, field_id)
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("name", &self.inner.name)
            .field("group", &self.inner.group)
            .finish_non_exhaustive()
    }
}
