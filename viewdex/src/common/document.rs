use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};

use crate::common::Key;

/// A document body as seen by map functions and the row filter.
///
/// Documents are flat-to-nested field maps; field values use the same
/// [`Key`] value model as emitted keys, so a map function can pass fields
/// through to the index unchanged. The document store owns revision
/// bookkeeping; viewdex only ever sees the current body of a revision (or
/// its absence, for a deletion).
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    fields: BTreeMap<String, Key>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            fields: BTreeMap::new(),
        }
    }

    /// Sets a field, replacing any previous value. Returns `self` for
    /// chaining.
    pub fn put(&mut self, field: &str, value: impl Into<Key>) -> &mut Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Returns the value of a field, or `None` if absent.
    pub fn get(&self, field: &str) -> Option<&Key> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Key)> {
        self.fields.iter()
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Constructs a [`Document`] from field/value pairs.
///
/// # Examples
///
/// ```rust
/// use viewdex::doc;
///
/// let doc = doc! {
///     "name": "apple",
///     "count": 3,
/// };
/// assert_eq!(doc.get("count").and_then(|k| k.as_number()), Some(3.0));
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::common::Document::new()
    };

    ($($name:literal : $value:tt),* $(,)?) => {
        {
            let mut doc = $crate::common::Document::new();
            $(
                doc.put($name, $crate::key!($value));
            )*
            doc
        }
    };
}
