//! Common types shared across the engine: the structured key/value model,
//! document bodies, and concurrency helpers.

mod document;
mod key;
mod util;

pub use document::*;
pub use key::*;
pub use util::*;
