//! Query options and the snapshot query pipeline.
//!
//! Queries run entirely against a group-store snapshot: scan, filter,
//! reduce/group, then skip/limit, each stage a lazy iterator over the one
//! below it. Writers never block a running cursor and a cursor never sees
//! half a commit.

mod cursor;
mod executor;
mod row_filter;

pub use cursor::{QueryCursor, QueryRow};
pub use row_filter::RowFilter;

pub(crate) use executor::execute;

use crate::common::Key;
use crate::errors::{ErrorKind, ViewdexError, ViewdexResult};

/// How a query treats an index that lags the document log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StalePolicy {
    /// Update the index before answering. The default.
    #[default]
    UpdateBefore,
    /// Answer from whatever is indexed, however stale.
    AllowStale,
    /// Answer from the current snapshot, then update the index so the next
    /// query is fresher.
    UpdateAfter,
}

/// Options shaping one view query.
#[derive(Clone, Debug)]
pub struct QueryOptions {
    pub(crate) start_key: Option<Key>,
    pub(crate) end_key: Option<Key>,
    pub(crate) inclusive_start: bool,
    pub(crate) inclusive_end: bool,
    pub(crate) keys: Option<Vec<Key>>,
    pub(crate) descending: bool,
    pub(crate) skip: u64,
    pub(crate) limit: Option<u64>,
    pub(crate) reduce: Option<bool>,
    pub(crate) group_level: u32,
    pub(crate) stale: StalePolicy,
    pub(crate) full_text_query: Option<String>,
    pub(crate) filter: Option<RowFilter>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            start_key: None,
            end_key: None,
            inclusive_start: true,
            inclusive_end: true,
            keys: None,
            descending: false,
            skip: 0,
            limit: None,
            reduce: None,
            group_level: 0,
            stale: StalePolicy::default(),
            full_text_query: None,
            filter: None,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        QueryOptions::default()
    }

    /// First key of the scan range (last, when descending).
    pub fn start_key(mut self, key: impl Into<Key>) -> Self {
        self.start_key = Some(key.into());
        self
    }

    /// Last key of the scan range (first, when descending).
    pub fn end_key(mut self, key: impl Into<Key>) -> Self {
        self.end_key = Some(key.into());
        self
    }

    pub fn inclusive_start(mut self, inclusive: bool) -> Self {
        self.inclusive_start = inclusive;
        self
    }

    pub fn inclusive_end(mut self, inclusive: bool) -> Self {
        self.inclusive_end = inclusive;
        self
    }

    /// Point-lookup mode: return only rows whose key equals one of `keys`,
    /// in the order given. Mutually exclusive with the range bounds.
    pub fn keys(mut self, keys: Vec<Key>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    /// Rows to drop before the first returned row.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Maximum number of rows to return.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Forces reduction on or off. When unset, a view with a reduce
    /// function reduces and one without returns plain index rows.
    pub fn reduce(mut self, reduce: bool) -> Self {
        self.reduce = Some(reduce);
        self
    }

    /// Groups reduced rows by key prefix. Level N groups array keys by
    /// their first N elements; scalar keys each form their own group.
    /// Level 0 reduces the whole result to a single row.
    pub fn group_level(mut self, level: u32) -> Self {
        self.group_level = level;
        self
    }

    pub fn stale(mut self, stale: StalePolicy) -> Self {
        self.stale = stale;
        self
    }

    /// Full-text mode: return one row per indexed text payload containing
    /// `term` (case-insensitive). Mutually exclusive with key ranges,
    /// `keys` and reduction.
    pub fn full_text(mut self, term: impl Into<String>) -> Self {
        self.full_text_query = Some(term.into());
        self
    }

    /// Post-scan row filter. Runs on the view's own rows before reduction.
    pub fn filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub(crate) fn wants_reduce(&self, view_has_reduce: bool) -> bool {
        self.reduce.unwrap_or(view_has_reduce)
    }

    pub(crate) fn validate(&self, view_has_reduce: bool) -> ViewdexResult<()> {
        if self.keys.is_some() && (self.start_key.is_some() || self.end_key.is_some()) {
            return Err(invalid("cannot combine 'keys' with a start or end key"));
        }
        if self.full_text_query.is_some() {
            if self.keys.is_some() || self.start_key.is_some() || self.end_key.is_some() {
                return Err(invalid("cannot combine a full-text query with key bounds"));
            }
            // Implicit reduction is suspended in full-text mode; only an
            // explicit request is an error.
            if self.reduce == Some(true) {
                return Err(invalid("cannot reduce a full-text query"));
            }
            if self.group_level > 0 {
                return Err(invalid("cannot group a full-text query"));
            }
        }
        if self.reduce == Some(true) && !view_has_reduce {
            return Err(invalid("view has no reduce function"));
        }
        if self.group_level > 0 && !self.wants_reduce(view_has_reduce) {
            return Err(invalid("grouping requires reduction"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ViewdexError {
    ViewdexError::new(message, ErrorKind::InvalidQuery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key;

    #[test]
    fn test_defaults() {
        let options = QueryOptions::new();
        assert!(options.inclusive_start);
        assert!(options.inclusive_end);
        assert_eq!(options.stale, StalePolicy::UpdateBefore);
        assert_eq!(options.limit, None);
    }

    #[test]
    fn test_keys_excludes_range_bounds() {
        let options = QueryOptions::new().keys(vec![key!("a")]).start_key("b");
        let err = options.validate(false).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
    }

    #[test]
    fn test_full_text_excludes_reduce_and_keys() {
        let err = QueryOptions::new()
            .full_text("apple")
            .keys(vec![key!("a")])
            .validate(false)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);

        let err = QueryOptions::new()
            .full_text("apple")
            .reduce(true)
            .validate(true)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);

        // Implicit reduction is suspended in full-text mode.
        assert!(QueryOptions::new().full_text("apple").validate(true).is_ok());
    }

    #[test]
    fn test_reduce_requires_reduce_function() {
        let err = QueryOptions::new().reduce(true).validate(false).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
    }

    #[test]
    fn test_grouping_requires_reduction() {
        let err = QueryOptions::new()
            .group_level(1)
            .validate(false)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
        assert!(QueryOptions::new().group_level(1).validate(true).is_ok());
    }
}
