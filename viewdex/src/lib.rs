//! # Viewdex - Embedded Map/Reduce View Indexing
//!
//! Viewdex is a lightweight, embeddable secondary-index engine for document
//! databases, written in Rust. It maintains named map/reduce views over a
//! document store's change log and answers ordered, grouped and reduced
//! queries against them.
//!
//! ## Key Features
//!
//! - **Incremental indexing**: views fold the document log from a
//!   persisted checkpoint, never from scratch
//! - **View groups**: views sharing a name prefix are indexed together in
//!   one pass over the change log
//! - **Structured keys**: emitted keys are JSON-like values ordered by a
//!   deterministic cross-type collation
//! - **Snapshot queries**: cursors read a consistent snapshot; writers
//!   never block readers
//! - **Reduce and grouping**: built-in `_sum`/`_count` plus custom reduce
//!   functions, grouped by key prefix
//! - **Full text**: map emissions can attach raw text, retrievable later
//!   and searchable by substring
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use viewdex::docstore::MemoryDocumentStore;
//! use viewdex::mapreduce::{MapEmission, ViewDefinition};
//! use viewdex::query::QueryOptions;
//! use viewdex::viewdex::Viewdex;
//!
//! # fn main() -> viewdex::errors::ViewdexResult<()> {
//! let store = Arc::new(MemoryDocumentStore::new());
//! store.put("doc1", viewdex::doc! { "name": "apple", "qty": 3 });
//!
//! let builder = Viewdex::builder();
//! builder.native_compiler().register_map("by_name", |_, body| {
//!     Ok(match body.get("name") {
//!         Some(name) => vec![MapEmission::new(name.clone(), 1)],
//!         None => vec![],
//!     })
//! });
//! let db = builder.open(store);
//!
//! let view = db.compile_view(
//!     "design/by_name",
//!     &ViewDefinition::new("native", "by_name", "1"),
//! )?;
//! for row in view.query(QueryOptions::new())? {
//!     let row = row?;
//!     println!("{} -> {:?}", row.key, row.value);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`collation`] - The order-preserving key codec
//! - [`common`] - Structured keys, document bodies, concurrency helpers
//! - [`docstore`] - The document store contract and an in-memory store
//! - [`errors`] - Error types and result definitions
//! - [`fulltext`] - Full-text payload addressing and retrieval
//! - [`mapreduce`] - View definitions, compilers, map/reduce functions
//! - [`query`] - Query options and the snapshot query pipeline
//! - [`store`] - Physical group-index storage
//! - [`view`] - View handles and the group index updater
//! - [`viewdex`] - Core database interface
//! - [`viewdex_builder`] - Database builder for initialization

pub mod collation;
pub mod common;
pub mod docstore;
pub mod errors;
pub mod fulltext;
pub mod mapreduce;
pub mod query;
pub mod store;
pub mod view;
pub mod viewdex;
pub mod viewdex_builder;
