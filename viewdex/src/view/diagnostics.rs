//! Debug-oriented hooks on views.

use crate::collation::{decode_row_value, Collation};
use crate::common::{Key, SequenceNumber};
use crate::errors::ViewdexResult;
use crate::view::View;

/// Introspection hooks for tests and debugging tools. Not part of the
/// stable query surface.
pub trait ViewDiagnostics {
    /// Dumps every index row as `(key, value, sequence)` in index order.
    fn dump(&self) -> ViewdexResult<Vec<(Key, Option<Key>, SequenceNumber)>>;

    /// Overrides the view's collation without recompiling. Rows already
    /// indexed keep their old encoding; callers are expected to rebuild.
    fn set_collation(&self, collation: Collation);

    /// Drops the installed compiled functions, as if the view had never
    /// been compiled in this session.
    fn forget_compiled(&self);
}

impl ViewDiagnostics for View {
    fn dump(&self) -> ViewdexResult<Vec<(Key, Option<Key>, SequenceNumber)>> {
        let snapshot = self.store().snapshot();
        let rows = match snapshot.view_rows(self.name()) {
            Some(rows) => rows,
            None => return Ok(Vec::new()),
        };
        let collation = self.collation();
        let mut dumped = Vec::with_capacity(rows.len());
        for (row_key, value) in rows.iter() {
            dumped.push((
                collation.decode(&row_key.encoded_key)?,
                decode_row_value(value)?,
                row_key.sequence,
            ));
        }
        Ok(dumped)
    }

    fn set_collation(&self, collation: Collation) {
        self.set_collation_internal(collation);
    }

    fn forget_compiled(&self) {
        self.forget_compiled_internal();
    }
}
