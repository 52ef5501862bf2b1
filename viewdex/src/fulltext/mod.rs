//! Full-text payload storage access.
//!
//! Map functions may attach raw text to an emission; the index stores it
//! addressed by `(docID, sequence, fieldID)`, where the field ID is the
//! emission's ordinal within its document. Full-text query rows surface a
//! [`FullTextRef`] instead of the text itself; the text is fetched on
//! demand through [`View::full_text`].
//!
//! [`View::full_text`]: crate::view::View::full_text

use im::ordmap::OrdMap;

use crate::common::SequenceNumber;
use crate::errors::{ErrorKind, ViewdexError, ViewdexResult};
use crate::query::QueryRow;
use crate::store::FullTextKey;
use crate::view::View;

/// Address of one indexed full-text payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FullTextRef {
    pub doc_id: String,
    /// Sequence the payload was indexed at. A reference goes stale when
    /// the document is re-indexed at a later sequence.
    pub sequence: SequenceNumber,
    /// Ordinal of the emission within its document's map output.
    pub field_id: u64,
}

/// Fetches the raw text behind a full-text reference.
///
/// Fails with [`ErrorKind::NotFound`] when the reference no longer matches
/// an indexed payload, typically because the document was re-indexed or
/// deleted after the reference was handed out.
pub(crate) fn lookup(
    view: &View,
    doc_id: &str,
    sequence: SequenceNumber,
    field_id: u64,
) -> ViewdexResult<Vec<u8>> {
    let snapshot = view.store().snapshot();
    let payload = snapshot
        .view_full_text(view.name())
        .and_then(|texts| texts.get(&(doc_id.to_string(), sequence, field_id)).cloned());
    payload.ok_or_else(|| {
        ViewdexError::new(
            &format!(
                "no full-text payload for document '{}' at sequence {} (field {}) in view '{}'",
                doc_id,
                sequence,
                field_id,
                view.name()
            ),
            ErrorKind::NotFound,
        )
    })
}

/// Scans a view's full-text store for payloads containing a term,
/// case-insensitively, yielding one reference row per hit in
/// `(docID, sequence, fieldID)` order.
pub(crate) struct FullTextScan {
    entries: OrdMap<FullTextKey, Vec<u8>>,
    position: Option<FullTextKey>,
    term: String,
}

impl FullTextScan {
    pub(crate) fn new(entries: OrdMap<FullTextKey, Vec<u8>>, term: &str) -> Self {
        FullTextScan {
            entries,
            position: None,
            term: term.to_lowercase(),
        }
    }
}

impl Iterator for FullTextScan {
    type Item = ViewdexResult<QueryRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match &self.position {
                None => self.entries.iter().next(),
                Some(last) => self
                    .entries
                    .range((std::ops::Bound::Excluded(last.clone()), std::ops::Bound::Unbounded))
                    .next(),
            };
            let (key, payload) = match entry {
                Some((key, payload)) => (key.clone(), payload.clone()),
                None => return None,
            };
            self.position = Some(key.clone());
            let text = String::from_utf8_lossy(&payload);
            if text.to_lowercase().contains(&self.term) {
                let (doc_id, sequence, field_id) = key;
                return Some(Ok(QueryRow::full_text_row(FullTextRef {
                    doc_id,
                    sequence,
                    field_id,
                })));
            }
        }
    }
}
