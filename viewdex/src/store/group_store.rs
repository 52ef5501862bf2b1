use std::sync::Arc;

use im::ordmap::OrdMap;
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::common::SequenceNumber;
use crate::store::ViewMeta;

/// Primary key of one index row inside a view's row map.
///
/// Ordering is lexicographic on the encoded key bytes, then docID, then
/// sequence, which is exactly the scan order queries need: rows with equal
/// emitted keys come back grouped and docID-ordered.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey {
    pub encoded_key: Vec<u8>,
    pub doc_id: String,
    pub sequence: SequenceNumber,
}

impl RowKey {
    pub fn new(encoded_key: Vec<u8>, doc_id: &str, sequence: SequenceNumber) -> Self {
        RowKey {
            encoded_key,
            doc_id: doc_id.to_string(),
            sequence,
        }
    }

    /// Smallest possible row key for an encoded emitted key; used to seed
    /// range scans.
    pub(crate) fn scan_start(encoded_key: Vec<u8>) -> Self {
        RowKey {
            encoded_key,
            doc_id: String::new(),
            sequence: 0,
        }
    }
}

/// Addresses one full-text payload: the emitting document, the sequence it
/// was indexed at, and the emission ordinal within that document.
pub type FullTextKey = (String, SequenceNumber, u64);

/// One view's slice of the group's physical index.
#[derive(Clone, Default)]
pub(crate) struct ViewSlice {
    pub meta: ViewMeta,
    pub rows: OrdMap<RowKey, Vec<u8>>,
    // docID -> row keys, so delete-then-remap need not scan the row map
    pub by_doc: im::HashMap<String, Vec<RowKey>>,
    pub full_text: OrdMap<FullTextKey, Vec<u8>>,
}

#[derive(Clone, Default)]
pub(crate) struct GroupState {
    views: im::HashMap<String, ViewSlice>,
}

/// The physical index shared by one view group.
///
/// Single-writer, multiple-reader: [`GroupStore::transaction`] serializes
/// writers on the group's mutex and stages against a copy of the state;
/// commit swaps the copy in atomically. Readers clone the current state
/// (cheap, the maps are persistent) and scan a consistent snapshot that no
/// in-flight writer can tear.
#[derive(Clone)]
pub struct GroupStore {
    inner: Arc<GroupStoreInner>,
}

struct GroupStoreInner {
    name: String,
    state: RwLock<GroupState>,
    write_lock: Mutex<()>,
}

impl GroupStore {
    pub fn new(name: &str) -> Self {
        GroupStore {
            inner: Arc::new(GroupStoreInner {
                name: name.to_string(),
                state: RwLock::new(GroupState::default()),
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// A consistent snapshot of the whole group as of some committed state.
    pub fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            state: self.inner.state.read().clone(),
        }
    }

    /// Current metadata of one view, or `None` if the view has no slice yet.
    pub fn view_meta(&self, view: &str) -> Option<ViewMeta> {
        self.inner
            .state
            .read()
            .views
            .get(view)
            .map(|slice| slice.meta.clone())
    }

    /// Opens the group's exclusive write transaction. Blocks while another
    /// transaction is in flight; the caller re-checks staleness afterwards
    /// so coalesced updaters do no duplicate work.
    pub fn transaction(&self) -> IndexTransaction<'_> {
        let guard = self.inner.write_lock.lock();
        let staged = self.inner.state.read().clone();
        IndexTransaction {
            inner: &self.inner,
            _guard: guard,
            staged,
        }
    }
}

/// Read snapshot of a group's state.
pub struct GroupSnapshot {
    state: GroupState,
}

impl GroupSnapshot {
    pub fn view_meta(&self, view: &str) -> Option<ViewMeta> {
        self.state.views.get(view).map(|slice| slice.meta.clone())
    }

    /// The view's row map. Cloning the persistent map is O(1); the returned
    /// map stays valid however long a cursor holds it.
    pub fn view_rows(&self, view: &str) -> Option<OrdMap<RowKey, Vec<u8>>> {
        self.state.views.get(view).map(|slice| slice.rows.clone())
    }

    pub fn view_full_text(&self, view: &str) -> Option<OrdMap<FullTextKey, Vec<u8>>> {
        self.state
            .views
            .get(view)
            .map(|slice| slice.full_text.clone())
    }
}

/// Exclusive write transaction over a group's index.
///
/// All mutations land in a staged copy; [`IndexTransaction::commit`]
/// publishes everything at once, dropping the transaction discards
/// everything. There is no partial-commit state.
pub struct IndexTransaction<'a> {
    inner: &'a GroupStoreInner,
    _guard: MutexGuard<'a, ()>,
    staged: GroupState,
}

impl IndexTransaction<'_> {
    fn slice_mut(&mut self, view: &str) -> &mut ViewSlice {
        self.staged
            .views
            .entry(view.to_string())
            .or_insert_with(ViewSlice::default)
    }

    pub fn meta(&self, view: &str) -> Option<ViewMeta> {
        self.staged.views.get(view).map(|slice| slice.meta.clone())
    }

    pub fn update_meta(&mut self, view: &str, update: impl FnOnce(&mut ViewMeta)) {
        update(&mut self.slice_mut(view).meta);
    }

    pub fn set_checkpoint(&mut self, view: &str, checkpoint: SequenceNumber) {
        self.slice_mut(view).meta.checkpoint = checkpoint;
    }

    /// Removes every row and full-text payload the view holds for a docID.
    /// Returns the number of rows removed.
    pub fn delete_doc_rows(&mut self, view: &str, doc_id: &str) -> u64 {
        let slice = self.slice_mut(view);
        let row_keys = match slice.by_doc.remove(doc_id) {
            Some(keys) => keys,
            None => return 0,
        };
        for row_key in &row_keys {
            slice.rows.remove(row_key);
        }
        let stale_text: Vec<FullTextKey> = slice
            .full_text
            .range((doc_id.to_string(), 0, 0)..)
            .take_while(|(key, _)| key.0 == doc_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale_text {
            slice.full_text.remove(&key);
        }
        row_keys.len() as u64
    }

    pub fn insert_row(
        &mut self,
        view: &str,
        row_key: RowKey,
        value: Vec<u8>,
        full_text: Option<(u64, Vec<u8>)>,
    ) {
        let slice = self.slice_mut(view);
        if let Some((field_id, text)) = full_text {
            slice
                .full_text
                .insert((row_key.doc_id.clone(), row_key.sequence, field_id), text);
        }
        slice
            .by_doc
            .entry(row_key.doc_id.clone())
            .or_insert_with(Vec::new)
            .push(row_key.clone());
        slice.rows.insert(row_key, value);
    }

    /// Drops all of a view's rows and resets its checkpoint to zero; the
    /// metadata record itself survives. Idempotent.
    pub fn clear_view(&mut self, view: &str) {
        let slice = self.slice_mut(view);
        slice.rows = OrdMap::new();
        slice.by_doc = im::HashMap::new();
        slice.full_text = OrdMap::new();
        slice.meta.checkpoint = 0;
        slice.meta.row_count = 0;
    }

    /// Removes the view's slice from the group entirely.
    pub fn remove_view(&mut self, view: &str) {
        self.staged.views.remove(view);
    }

    /// Atomically publishes every staged mutation.
    pub fn commit(mut self) {
        let names: Vec<String> = self.staged.views.keys().cloned().collect();
        for name in names {
            if let Some(slice) = self.staged.views.get_mut(&name) {
                slice.meta.row_count = slice.rows.len() as u64;
            }
        }
        *self.inner.state.write() = self.staged;
    }
}
