//! The document store interface consumed by the indexing engine.
//!
//! viewdex never owns documents; it folds the store's committed change log
//! into view indexes. The store contract it relies on: `changes_since`
//! yields committed changes in sequence order, exactly once per change,
//! and `latest_sequence` is the newest committed sequence at call time.

mod memory;

pub use memory::MemoryDocumentStore;

use crate::common::{Document, SequenceNumber};
use crate::errors::ViewdexResult;

/// One committed change from the document log.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentChange {
    pub doc_id: String,
    pub sequence: SequenceNumber,
    /// The revision body, or `None` when the change is a deletion.
    pub body: Option<Document>,
}

impl DocumentChange {
    pub fn is_deletion(&self) -> bool {
        self.body.is_none()
    }
}

/// Lazy, sequence-ordered stream of committed changes.
pub type ChangeStream = Box<dyn Iterator<Item = ViewdexResult<DocumentChange>> + Send>;

/// Contract a document store must provide for its views to be indexable.
///
/// Implementers must be `Send + Sync`; the indexer runs on a thread of its
/// own while queries read concurrently.
pub trait DocumentStore: Send + Sync {
    /// The newest committed sequence number.
    fn latest_sequence(&self) -> ViewdexResult<SequenceNumber>;

    /// Streams committed changes with sequence strictly greater than `since`,
    /// ordered by sequence, exactly once per committed change.
    fn changes_since(&self, since: SequenceNumber) -> ViewdexResult<ChangeStream>;

    /// Fetches the current body of a document, or `None` if it does not
    /// exist or is deleted. Used by the row filter's document accessor.
    fn get_document(&self, doc_id: &str) -> ViewdexResult<Option<Document>>;
}
