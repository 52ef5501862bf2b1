//! Assembles the query pipeline for one view.

use crate::errors::ViewdexResult;
use crate::fulltext::FullTextScan;
use crate::query::cursor::{
    FilteredRows, GroupedReduce, KeyBound, KeysScan, QueryCursor, RangeScan, RowStream, SkipLimit,
};
use crate::query::{QueryOptions, StalePolicy};
use crate::view::{update_indexes, View};

pub(crate) fn execute(view: &View, mut options: QueryOptions) -> ViewdexResult<QueryCursor> {
    let compiled = view.compiled()?;
    options.validate(compiled.has_reduce())?;
    let database = view.database()?;

    if options.stale == StalePolicy::UpdateBefore {
        update_indexes(std::slice::from_ref(view), false)?;
    }

    let snapshot = view.store().snapshot();

    if options.stale == StalePolicy::UpdateAfter {
        // The snapshot is already taken; a failed refresh degrades the next
        // query, not this one.
        if let Err(err) = update_indexes(std::slice::from_ref(view), false) {
            log::warn!(
                "deferred index update of view '{}' failed: {}",
                view.name(),
                err
            );
        }
    }

    if let Some(term) = &options.full_text_query {
        let texts = snapshot.view_full_text(view.name()).unwrap_or_default();
        let mut stream: RowStream = Box::new(FullTextScan::new(texts, term));
        if let Some(filter) = options.filter.take() {
            stream = Box::new(FilteredRows::new(stream, filter, database.doc_store.clone()));
        }
        if options.skip > 0 || options.limit.is_some() {
            stream = Box::new(SkipLimit::new(stream, options.skip, options.limit));
        }
        return Ok(QueryCursor::new(stream));
    }

    let rows = snapshot.view_rows(view.name()).unwrap_or_default();
    let collation = view.collation();

    let mut stream: RowStream = match options.keys.take() {
        Some(keys) => Box::new(KeysScan::new(rows, collation, keys)),
        None => {
            let start = match &options.start_key {
                Some(key) => Some((collation.encode(key)?, options.inclusive_start)),
                None => None,
            };
            let end = match &options.end_key {
                Some(key) => Some((collation.encode(key)?, options.inclusive_end)),
                None => None,
            };
            // A descending scan runs from start key down to end key, so the
            // start key is the upper byte bound.
            let (lower, upper): (Option<KeyBound>, Option<KeyBound>) = if options.descending {
                (end, start)
            } else {
                (start, end)
            };
            Box::new(RangeScan::new(
                rows,
                collation,
                lower,
                upper,
                options.descending,
            ))
        }
    };

    if let Some(filter) = options.filter.take() {
        stream = Box::new(FilteredRows::new(stream, filter, database.doc_store.clone()));
    }
    if options.wants_reduce(compiled.has_reduce()) {
        stream = Box::new(GroupedReduce::new(stream, compiled, options.group_level));
    }
    if options.skip > 0 || options.limit.is_some() {
        stream = Box::new(SkipLimit::new(stream, options.skip, options.limit));
    }
    Ok(QueryCursor::new(stream))
}
