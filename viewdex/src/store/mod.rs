//! Physical index storage for view groups.
//!
//! One [`GroupStore`] holds the index slices of every view in a group:
//! rows keyed `(encoded key, docID, sequence)`, a full-text side store, and
//! per-view metadata. Readers get O(1) consistent snapshots; writers run
//! one exclusive transaction per group at a time.

mod group_store;
mod meta;

pub use group_store::*;
pub use meta::*;
