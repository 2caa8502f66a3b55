//! Schema inference for worksheet streams.
//!
//! Given one worksheet's header row and first data row, this crate decides
//! a logical type per column and assembles the JSON Schema published on the
//! stream, together with the column descriptors the row transformer and the
//! catalog stream consume. Inference happens once per worksheet per sync;
//! the result is immutable afterward.

pub mod build;
pub mod classify;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use build::build_sheet_schema;
pub use classify::{ColumnKind, SchemaBuildError};

/// One classified worksheet column.
///
/// Serialized verbatim into the catalog stream's per-worksheet record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    /// 1-based position in the header row.
    pub column_index: u32,

    /// Spreadsheet column label (A, B, ..., Z, AA, ...).
    pub column_letter: String,

    /// Header text, or the synthesized placeholder name for a blank header.
    pub column_name: String,

    pub column_type: ColumnKind,

    /// Blank header; the column's raw values are ignored at transform time.
    pub column_skipped: bool,

    /// Set on the first of two consecutive blank headers; forces the
    /// column's catalog inclusion to "unsupported".
    pub prior_column_skipped: bool,
}

/// The inferred schema and descriptor list for one worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct WorksheetSchema {
    /// JSON Schema object: synthetic fields first, then one property per
    /// surviving column in header order.
    pub schema: Value,

    /// Every scanned column in header order, skipped placeholders included.
    pub columns: Vec<ColumnDescriptor>,
}

/// Spreadsheet column label for a 1-based index: 1 → A, 26 → Z, 27 → AA.
pub fn column_letter(index: u32) -> String {
    let mut n = index;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    letters.reverse();
    // letters holds ASCII uppercase only
    String::from_utf8(letters).unwrap_or_default()
}
