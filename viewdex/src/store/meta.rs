use crate::collation::Collation;
use crate::common::SequenceNumber;

/// Per-view metadata record persisted alongside the index rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewMeta {
    /// Version tag of the map function that produced the rows. A compile
    /// with a different tag invalidates the index.
    pub map_version: String,
    pub collation: Collation,
    /// Last document-log sequence fully folded into the index.
    pub checkpoint: SequenceNumber,
    pub row_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_meta_is_unindexed() {
        let meta = ViewMeta::default();
        assert_eq!(meta.checkpoint, 0);
        assert_eq!(meta.row_count, 0);
        assert_eq!(meta.collation, Collation::Unicode);
        assert!(meta.map_version.is_empty());
    }
}
