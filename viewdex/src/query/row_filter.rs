//! Post-scan row filters.
//!
//! Filters run between the index scan and reduction, against the row's
//! value or the current body of the emitting document. Document bodies are
//! fetched lazily and at most once per row.

use regex::Regex;

use crate::common::{Document, Key};
use crate::docstore::DocumentStore;
use crate::errors::{ErrorKind, ViewdexError, ViewdexResult};
use crate::query::QueryRow;

/// A predicate over query rows.
#[derive(Clone, Debug)]
pub enum RowFilter {
    /// Row value equals the given key.
    ValueEq(Key),
    /// Row value differs from the given key.
    ValueNe(Key),
    /// Named field of the emitting document equals the given key.
    FieldEq(String, Key),
    /// Named field of the emitting document is one of the given keys.
    FieldIn(String, Vec<Key>),
    /// Named field is a string matching the regular expression.
    FieldMatches(String, Regex),
    And(Box<RowFilter>, Box<RowFilter>),
    Or(Box<RowFilter>, Box<RowFilter>),
    Not(Box<RowFilter>),
}

impl RowFilter {
    pub fn value_eq(value: impl Into<Key>) -> Self {
        RowFilter::ValueEq(value.into())
    }

    pub fn value_ne(value: impl Into<Key>) -> Self {
        RowFilter::ValueNe(value.into())
    }

    pub fn field_eq(field: &str, value: impl Into<Key>) -> Self {
        RowFilter::FieldEq(field.to_string(), value.into())
    }

    pub fn field_in(field: &str, values: Vec<Key>) -> Self {
        RowFilter::FieldIn(field.to_string(), values)
    }

    /// Fails with [`ErrorKind::InvalidQuery`] on an invalid pattern, so a
    /// bad filter is rejected before the query runs.
    pub fn field_matches(field: &str, pattern: &str) -> ViewdexResult<Self> {
        let regex = Regex::new(pattern).map_err(|err| {
            ViewdexError::new(
                &format!("invalid row filter pattern '{}': {}", pattern, err),
                ErrorKind::InvalidQuery,
            )
        })?;
        Ok(RowFilter::FieldMatches(field.to_string(), regex))
    }

    pub fn and(self, other: RowFilter) -> Self {
        RowFilter::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: RowFilter) -> Self {
        RowFilter::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        RowFilter::Not(Box::new(self))
    }

    pub(crate) fn passes(
        &self,
        row: &QueryRow,
        accessor: &mut DocumentAccessor<'_>,
    ) -> ViewdexResult<bool> {
        match self {
            RowFilter::ValueEq(expected) => Ok(row.value.as_ref() == Some(expected)),
            RowFilter::ValueNe(expected) => Ok(row.value.as_ref() != Some(expected)),
            RowFilter::FieldEq(field, expected) => {
                Ok(accessor.field(field)? == Some(expected))
            }
            RowFilter::FieldIn(field, values) => match accessor.field(field)? {
                Some(actual) => Ok(values.contains(actual)),
                None => Ok(false),
            },
            RowFilter::FieldMatches(field, regex) => Ok(accessor
                .field(field)?
                .and_then(Key::as_string)
                .map(|text| regex.is_match(text))
                .unwrap_or(false)),
            RowFilter::And(a, b) => Ok(a.passes(row, accessor)? && b.passes(row, accessor)?),
            RowFilter::Or(a, b) => Ok(a.passes(row, accessor)? || b.passes(row, accessor)?),
            RowFilter::Not(inner) => Ok(!inner.passes(row, accessor)?),
        }
    }
}

/// Lazily fetches and caches the emitting document of one row.
pub(crate) struct DocumentAccessor<'a> {
    store: &'a dyn DocumentStore,
    doc_id: Option<&'a str>,
    cached: Option<Option<Document>>,
}

impl<'a> DocumentAccessor<'a> {
    pub(crate) fn new(store: &'a dyn DocumentStore, doc_id: Option<&'a str>) -> Self {
        DocumentAccessor {
            store,
            doc_id,
            cached: None,
        }
    }

    fn document(&mut self) -> ViewdexResult<Option<&Document>> {
        if self.cached.is_none() {
            let body = match self.doc_id {
                Some(doc_id) => self.store.get_document(doc_id)?,
                None => None,
            };
            self.cached = Some(body);
        }
        match &self.cached {
            Some(body) => Ok(body.as_ref()),
            None => Err(ViewdexError::new(
                "document accessor lost its cached body",
                ErrorKind::InternalError,
            )),
        }
    }

    fn field(&mut self, field: &str) -> ViewdexResult<Option<&Key>> {
        Ok(self.document()?.and_then(|body| body.get(field)))
    }
}
