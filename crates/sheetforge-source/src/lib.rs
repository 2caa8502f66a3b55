//! The extraction source: turns one spreadsheet into a stream of tap
//! messages.
//!
//! Pipeline, outermost first: [`sync`] sequences the fixed stream order and
//! the has-the-file-changed short circuit; [`pager`] walks one worksheet in
//! row batches between activate-version boundaries; [`transform`] turns raw
//! rows into schema-conformant records; [`streams`] holds the static
//! definitions of the four built-in streams.

pub mod pager;
pub mod streams;
pub mod sync;
pub mod transform;

pub use pager::WorksheetLoad;
pub use sync::{SyncRunner, SyncSummary};
pub use transform::RowTransformer;
