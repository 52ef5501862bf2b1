//! Lazy row streams making up the query pipeline.

use std::iter::Peekable;
use std::ops::Bound;

use im::ordmap::OrdMap;

use crate::collation::{decode_row_value, Collation};
use crate::common::{Key, SequenceNumber};
use crate::errors::{ErrorKind, ViewdexError, ViewdexResult};
use crate::fulltext::FullTextRef;
use crate::mapreduce::CompiledView;
use crate::store::RowKey;

/// One row of a query result.
///
/// Plain index rows carry `doc_id` and `sequence`; reduced rows carry only
/// the (possibly truncated) group key and the folded value; full-text rows
/// carry a [`FullTextRef`] for later text retrieval.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryRow {
    pub key: Key,
    /// The emitted row value. `None` is the whole-document placeholder.
    pub value: Option<Key>,
    pub doc_id: Option<String>,
    pub sequence: SequenceNumber,
    pub full_text: Option<FullTextRef>,
}

impl QueryRow {
    pub(crate) fn index_row(
        key: Key,
        value: Option<Key>,
        doc_id: String,
        sequence: SequenceNumber,
    ) -> Self {
        QueryRow {
            key,
            value,
            doc_id: Some(doc_id),
            sequence,
            full_text: None,
        }
    }

    pub(crate) fn reduced(key: Key, value: Key) -> Self {
        QueryRow {
            key,
            value: Some(value),
            doc_id: None,
            sequence: 0,
            full_text: None,
        }
    }

    pub(crate) fn full_text_row(reference: FullTextRef) -> Self {
        QueryRow {
            key: Key::Null,
            value: None,
            doc_id: Some(reference.doc_id.clone()),
            sequence: reference.sequence,
            full_text: Some(reference),
        }
    }
}

pub(crate) type RowStream = Box<dyn Iterator<Item = ViewdexResult<QueryRow>> + Send>;

/// An inclusive-or-exclusive bound on encoded key bytes.
pub(crate) type KeyBound = (Vec<u8>, bool);

/// Scans one view's row map over an encoded-key range.
///
/// The seeded map range only narrows where iteration starts; inclusivity is
/// still enforced per row against the encoded key bytes, because one key's
/// encoding may be a strict byte prefix of another's.
pub(crate) struct RangeScan {
    rows: OrdMap<RowKey, Vec<u8>>,
    lo: Bound<RowKey>,
    hi: Bound<RowKey>,
    lower: Option<KeyBound>,
    upper: Option<KeyBound>,
    descending: bool,
    collation: Collation,
    done: bool,
}

impl RangeScan {
    pub(crate) fn new(
        rows: OrdMap<RowKey, Vec<u8>>,
        collation: Collation,
        lower: Option<KeyBound>,
        upper: Option<KeyBound>,
        descending: bool,
    ) -> Self {
        // Ascending scans seed at the lower bound. Descending scans seed just
        // past the upper bound: appending 0x00 gives the smallest byte string
        // strictly greater than the upper key's encoding, so every row key
        // equal to the upper key still falls inside the seeded range.
        let lo = match (&lower, descending) {
            (Some((encoded, _)), false) => {
                Bound::Included(RowKey::scan_start(encoded.clone()))
            }
            _ => Bound::Unbounded,
        };
        let hi = match (&upper, descending) {
            (Some((encoded, _)), true) => {
                let mut successor = encoded.clone();
                successor.push(0x00);
                Bound::Excluded(RowKey::scan_start(successor))
            }
            _ => Bound::Unbounded,
        };
        RangeScan {
            rows,
            lo,
            hi,
            lower,
            upper,
            descending,
            collation,
            done: false,
        }
    }

    fn step(&mut self) -> Option<(RowKey, Vec<u8>)> {
        let mut range = self.rows.range((self.lo.clone(), self.hi.clone()));
        let entry = if self.descending {
            range.next_back()
        } else {
            range.next()
        };
        let (row_key, value) = entry?;
        let (row_key, value) = (row_key.clone(), value.clone());
        if self.descending {
            self.hi = Bound::Excluded(row_key.clone());
        } else {
            self.lo = Bound::Excluded(row_key.clone());
        }
        Some((row_key, value))
    }
}

impl Iterator for RangeScan {
    type Item = ViewdexResult<QueryRow>;

    fn next(&mut self) -> Option<Self::Item> {
        use std::cmp::Ordering;
        loop {
            if self.done {
                return None;
            }
            let (row_key, value) = match self.step() {
                Some(entry) => entry,
                None => {
                    self.done = true;
                    return None;
                }
            };
            if let Some((lower, inclusive)) = &self.lower {
                match row_key.encoded_key.cmp(lower) {
                    Ordering::Less => {
                        if self.descending {
                            self.done = true;
                            return None;
                        }
                        continue;
                    }
                    Ordering::Equal if !inclusive => continue,
                    _ => {}
                }
            }
            if let Some((upper, inclusive)) = &self.upper {
                match row_key.encoded_key.cmp(upper) {
                    Ordering::Greater => {
                        if self.descending {
                            continue;
                        }
                        self.done = true;
                        return None;
                    }
                    Ordering::Equal if !inclusive => continue,
                    _ => {}
                }
            }
            self.done = true; // assume failure; cleared on success
            let key = match self.collation.decode(&row_key.encoded_key) {
                Ok(key) => key,
                Err(err) => return Some(Err(corrupt_row(&row_key.doc_id, err))),
            };
            let row_value = match decode_row_value(&value) {
                Ok(row_value) => row_value,
                Err(err) => return Some(Err(corrupt_row(&row_key.doc_id, err))),
            };
            self.done = false;
            return Some(Ok(QueryRow::index_row(
                key,
                row_value,
                row_key.doc_id,
                row_key.sequence,
            )));
        }
    }
}

fn corrupt_row(doc_id: &str, cause: ViewdexError) -> ViewdexError {
    ViewdexError::new_with_cause(
        &format!("failed to decode index row of document '{}'", doc_id),
        ErrorKind::IndexError,
        cause,
    )
}

/// Point-lookup scan: one equality sub-scan per requested key, in the order
/// the keys were given.
pub(crate) struct KeysScan {
    rows: OrdMap<RowKey, Vec<u8>>,
    collation: Collation,
    keys: std::vec::IntoIter<Key>,
    active: Option<RangeScan>,
    done: bool,
}

impl KeysScan {
    pub(crate) fn new(rows: OrdMap<RowKey, Vec<u8>>, collation: Collation, keys: Vec<Key>) -> Self {
        KeysScan {
            rows,
            collation,
            keys: keys.into_iter(),
            active: None,
            done: false,
        }
    }
}

impl Iterator for KeysScan {
    type Item = ViewdexResult<QueryRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(scan) = &mut self.active {
                if let Some(item) = scan.next() {
                    if item.is_err() {
                        self.done = true;
                    }
                    return Some(item);
                }
                self.active = None;
            }
            let key = match self.keys.next() {
                Some(key) => key,
                None => {
                    self.done = true;
                    return None;
                }
            };
            let encoded = match self.collation.encode(&key) {
                Ok(encoded) => encoded,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };
            self.active = Some(RangeScan::new(
                self.rows.clone(),
                self.collation,
                Some((encoded.clone(), true)),
                Some((encoded, true)),
                false,
            ));
        }
    }
}

/// Drops rows the filter rejects; errors from the filter or the underlying
/// stream pass through and end the stream.
pub(crate) struct FilteredRows {
    inner: RowStream,
    filter: super::RowFilter,
    store: std::sync::Arc<dyn crate::docstore::DocumentStore>,
    done: bool,
}

impl FilteredRows {
    pub(crate) fn new(
        inner: RowStream,
        filter: super::RowFilter,
        store: std::sync::Arc<dyn crate::docstore::DocumentStore>,
    ) -> Self {
        FilteredRows {
            inner,
            filter,
            store,
            done: false,
        }
    }
}

impl Iterator for FilteredRows {
    type Item = ViewdexResult<QueryRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            let row = match self.inner.next()? {
                Ok(row) => row,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };
            let mut accessor =
                super::row_filter::DocumentAccessor::new(&*self.store, row.doc_id.as_deref());
            match self.filter.passes(&row, &mut accessor) {
                Ok(true) => return Some(Ok(row)),
                Ok(false) => continue,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Groups adjacent rows by truncated key and folds each group through the
/// view's reduce function.
pub(crate) struct GroupedReduce {
    inner: Peekable<RowStream>,
    compiled: CompiledView,
    group_level: u32,
    done: bool,
}

impl GroupedReduce {
    pub(crate) fn new(inner: RowStream, compiled: CompiledView, group_level: u32) -> Self {
        GroupedReduce {
            inner: inner.peekable(),
            compiled,
            group_level,
            done: false,
        }
    }
}

/// The grouping key of a row at a given level. Level 0 collapses every key
/// into one group; otherwise array keys group by their first N elements and
/// scalar keys stand for themselves.
pub(crate) fn truncate_key(key: &Key, level: u32) -> Key {
    if level == 0 {
        return Key::Null;
    }
    match key {
        Key::Array(elements) => {
            Key::Array(elements.iter().take(level as usize).cloned().collect())
        }
        other => other.clone(),
    }
}

impl Iterator for GroupedReduce {
    type Item = ViewdexResult<QueryRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let first = match self.inner.next()? {
            Ok(row) => row,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        let group_key = truncate_key(&first.key, self.group_level);
        // Placeholder values fold as null.
        let mut group = vec![(first.key, first.value.unwrap_or(Key::Null))];
        loop {
            match self.inner.peek() {
                Some(Ok(row)) if truncate_key(&row.key, self.group_level) == group_key => {}
                Some(Err(_)) => {
                    self.done = true;
                    return self.inner.next();
                }
                _ => break,
            }
            if let Some(Ok(row)) = self.inner.next() {
                group.push((row.key, row.value.unwrap_or(Key::Null)));
            }
        }
        match self.compiled.invoke_reduce(&group) {
            Ok(value) => Some(Ok(QueryRow::reduced(group_key, value))),
            Err(err) => {
                self.done = true;
                Some(Err(ViewdexError::new_with_cause(
                    "reduce function failed during query",
                    ErrorKind::IndexError,
                    err,
                )))
            }
        }
    }
}

/// Applies skip and limit. Skipped rows still surface their errors; once
/// the limit is exhausted the underlying stream is not polled again.
pub(crate) struct SkipLimit {
    inner: RowStream,
    skip: u64,
    remaining: Option<u64>,
}

impl SkipLimit {
    pub(crate) fn new(inner: RowStream, skip: u64, limit: Option<u64>) -> Self {
        SkipLimit {
            inner,
            skip,
            remaining: limit,
        }
    }
}

impl Iterator for SkipLimit {
    type Item = ViewdexResult<QueryRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        loop {
            let item = self.inner.next()?;
            if item.is_err() {
                self.remaining = Some(0);
                return Some(item);
            }
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            if let Some(remaining) = &mut self.remaining {
                *remaining -= 1;
            }
            return Some(item);
        }
    }
}

/// The handle a query returns: a lazy, snapshot-consistent row stream.
///
/// An `Err` item terminates the stream; rows already yielded remain valid.
pub struct QueryCursor {
    rows: RowStream,
}

impl QueryCursor {
    pub(crate) fn new(rows: RowStream) -> Self {
        QueryCursor { rows }
    }

    /// Collects every remaining row, failing on the first error.
    pub fn collect_rows(self) -> ViewdexResult<Vec<QueryRow>> {
        self.collect()
    }
}

impl Iterator for QueryCursor {
    type Item = ViewdexResult<QueryRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

// The stream is a trait object with no Debug form of its own.
impl std::fmt::Debug for QueryCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCursor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key;

    fn rows_from(entries: &[(&str, &str, SequenceNumber)]) -> OrdMap<RowKey, Vec<u8>> {
        let collation = Collation::Unicode;
        let mut rows = OrdMap::new();
        for (key, doc_id, sequence) in entries {
            let encoded = collation.encode(&key!(*key)).unwrap();
            rows.insert(
                RowKey::new(encoded, doc_id, *sequence),
                crate::collation::encode_row_value(Some(&key!(1))).unwrap(),
            );
        }
        rows
    }

    fn scan_keys(scan: RangeScan) -> Vec<Key> {
        scan.map(|row| row.unwrap().key).collect()
    }

    #[test]
    fn test_unbounded_scan_in_both_directions() {
        let rows = rows_from(&[("a", "d1", 1), ("b", "d2", 2), ("c", "d3", 3)]);
        let ascending = RangeScan::new(rows.clone(), Collation::Unicode, None, None, false);
        assert_eq!(scan_keys(ascending), vec![key!("a"), key!("b"), key!("c")]);
        let descending = RangeScan::new(rows, Collation::Unicode, None, None, true);
        assert_eq!(scan_keys(descending), vec![key!("c"), key!("b"), key!("a")]);
    }

    #[test]
    fn test_bounds_and_inclusivity() {
        let rows = rows_from(&[("a", "d1", 1), ("b", "d2", 2), ("c", "d3", 3)]);
        let collation = Collation::Unicode;
        let enc = |k: &Key| collation.encode(k).unwrap();

        let scan = RangeScan::new(
            rows.clone(),
            collation,
            Some((enc(&key!("a")), false)),
            Some((enc(&key!("c")), true)),
            false,
        );
        assert_eq!(scan_keys(scan), vec![key!("b"), key!("c")]);

        let scan = RangeScan::new(
            rows,
            collation,
            Some((enc(&key!("a")), true)),
            Some((enc(&key!("c")), false)),
            true,
        );
        assert_eq!(scan_keys(scan), vec![key!("b"), key!("a")]);
    }

    #[test]
    fn test_descending_upper_bound_with_duplicate_keys() {
        // Several documents share the bound key; rows above the bound exist.
        let rows = rows_from(&[("a", "d1", 1), ("b", "d2", 2), ("b", "d3", 3), ("c", "d4", 4)]);
        let collation = Collation::Unicode;
        let upper = collation.encode(&key!("b")).unwrap();

        let scan = RangeScan::new(rows.clone(), collation, None, Some((upper.clone(), true)), true);
        let rows_out: Vec<QueryRow> = scan.map(|row| row.unwrap()).collect();
        let ids: Vec<&str> = rows_out.iter().map(|r| r.doc_id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["d3", "d2", "d1"]);

        let scan = RangeScan::new(rows, collation, None, Some((upper, false)), true);
        assert_eq!(scan_keys(scan), vec![key!("a")]);
    }

    #[test]
    fn test_descending_upper_bound_excludes_prefix_extensions() {
        // "ab" encodes with "a" as a strict byte prefix and must stay above
        // an upper bound of "a" even when the scan is seeded at that bound.
        let rows = rows_from(&[("a", "d1", 1), ("ab", "d2", 2)]);
        let collation = Collation::Unicode;
        let scan = RangeScan::new(
            rows,
            collation,
            None,
            Some((collation.encode(&key!("a")).unwrap(), true)),
            true,
        );
        assert_eq!(scan_keys(scan), vec![key!("a")]);
    }

    #[test]
    fn test_prefix_key_is_not_swallowed_by_bounds() {
        // "a" encodes as a strict byte prefix of "ab"; an end key of "a"
        // must still exclude "ab".
        let rows = rows_from(&[("a", "d1", 1), ("ab", "d2", 2)]);
        let collation = Collation::Unicode;
        let scan = RangeScan::new(
            rows,
            collation,
            None,
            Some((collation.encode(&key!("a")).unwrap(), true)),
            false,
        );
        assert_eq!(scan_keys(scan), vec![key!("a")]);
    }

    #[test]
    fn test_keys_scan_preserves_given_order() {
        let rows = rows_from(&[("a", "d1", 1), ("b", "d2", 2), ("c", "d3", 3)]);
        let scan = KeysScan::new(
            rows,
            Collation::Unicode,
            vec![key!("c"), key!("missing"), key!("a")],
        );
        let keys: Vec<Key> = scan.map(|row| row.unwrap().key).collect();
        assert_eq!(keys, vec![key!("c"), key!("a")]);
    }

    #[test]
    fn test_grouped_reduce_levels() {
        let rows: Vec<ViewdexResult<QueryRow>> = vec![
            Ok(QueryRow::index_row(key!(["a", 1]), Some(key!(1)), "d1".into(), 1)),
            Ok(QueryRow::index_row(key!(["a", 2]), Some(key!(2)), "d2".into(), 2)),
            Ok(QueryRow::index_row(key!(["b", 1]), Some(key!(4)), "d3".into(), 3)),
        ];
        let compiled = CompiledView::new(
            "1",
            std::sync::Arc::new(|_: &str, _: &crate::common::Document| Ok(vec![])),
        )
            .with_reduce(std::sync::Arc::new(|group: &[(Key, Key)]| {
                Ok(Key::Number(
                    group.iter().filter_map(|(_, v)| v.as_number()).sum(),
                ))
            }));

        let grouped = GroupedReduce::new(
            Box::new(rows.clone().into_iter()),
            compiled.clone(),
            1,
        );
        let reduced: Vec<QueryRow> = grouped.map(|r| r.unwrap()).collect();
        assert_eq!(reduced.len(), 2);
        assert_eq!(reduced[0].key, key!(["a"]));
        assert_eq!(reduced[0].value, Some(key!(3)));
        assert_eq!(reduced[1].key, key!(["b"]));
        assert_eq!(reduced[1].value, Some(key!(4)));

        let whole = GroupedReduce::new(Box::new(rows.into_iter()), compiled, 0);
        let reduced: Vec<QueryRow> = whole.map(|r| r.unwrap()).collect();
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced[0].key, key!(null));
        assert_eq!(reduced[0].value, Some(key!(7)));
    }

    #[test]
    fn test_skip_limit() {
        let rows: Vec<ViewdexResult<QueryRow>> = (0..5)
            .map(|i| Ok(QueryRow::index_row(key!(i as f64), None, format!("d{}", i), i + 1)))
            .collect();
        let stream = SkipLimit::new(Box::new(rows.into_iter()), 1, Some(2));
        let keys: Vec<Key> = stream.map(|row| row.unwrap().key).collect();
        assert_eq!(keys, vec![key!(1), key!(2)]);
    }
}
