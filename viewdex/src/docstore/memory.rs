use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{Document, SequenceNumber};
use crate::docstore::{ChangeStream, DocumentChange, DocumentStore};
use crate::errors::ViewdexResult;

/// In-memory document store.
///
/// Backs tests and embedders that keep their corpus in memory. Every write
/// is assigned the next sequence number; the change log keeps one entry per
/// document (the latest change), matching the exactly-once contract of
/// [`DocumentStore::changes_since`].
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<MemoryStoreState>>,
}

#[derive(Default)]
struct MemoryStoreState {
    last_sequence: SequenceNumber,
    // doc id -> (sequence of latest change, body or deletion)
    docs: BTreeMap<String, (SequenceNumber, Option<Document>)>,
    // sequence -> doc id, pruned so each doc appears at its latest sequence
    by_sequence: BTreeMap<SequenceNumber, String>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        MemoryDocumentStore::default()
    }

    /// Inserts or replaces a document, returning the committed sequence.
    pub fn put(&self, doc_id: &str, body: Document) -> SequenceNumber {
        self.record(doc_id, Some(body))
    }

    /// Marks a document deleted, returning the committed sequence.
    pub fn delete(&self, doc_id: &str) -> SequenceNumber {
        self.record(doc_id, None)
    }

    fn record(&self, doc_id: &str, body: Option<Document>) -> SequenceNumber {
        let mut state = self.inner.write();
        state.last_sequence += 1;
        let sequence = state.last_sequence;
        if let Some((old_sequence, _)) = state.docs.get(doc_id) {
            let old_sequence = *old_sequence;
            state.by_sequence.remove(&old_sequence);
        }
        state.docs.insert(doc_id.to_string(), (sequence, body));
        state.by_sequence.insert(sequence, doc_id.to_string());
        sequence
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn latest_sequence(&self) -> ViewdexResult<SequenceNumber> {
        Ok(self.inner.read().last_sequence)
    }

    fn changes_since(&self, since: SequenceNumber) -> ViewdexResult<ChangeStream> {
        let state = self.inner.read();
        let changes: Vec<ViewdexResult<DocumentChange>> = state
            .by_sequence
            .range(since + 1..)
            .map(|(sequence, doc_id)| {
                let (_, body) = &state.docs[doc_id];
                Ok(DocumentChange {
                    doc_id: doc_id.clone(),
                    sequence: *sequence,
                    body: body.clone(),
                })
            })
            .collect();
        Ok(Box::new(changes.into_iter()))
    }

    fn get_document(&self, doc_id: &str) -> ViewdexResult<Option<Document>> {
        Ok(self
            .inner
            .read()
            .docs
            .get(doc_id)
            .and_then(|(_, body)| body.clone()))
    }
}
