//! Per-column type classification.
//!
//! A column's logical type is decided from a single sample: the first data
//! row's cell beneath the header, plus that cell's number-format category.
//! The published schema keeps a plain-string alternative on every inferred
//! shape so the row transformer can always fall back without violating it.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sheets_client::models::{CellData, EffectiveValueKind, NumberFormatType};
use thiserror::Error;
use tracing::warn;

/// Logical column types. Exhaustively matched at every consumption site
/// so adding a type is a compile-time-visible change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    String,
    Boolean,
    Number,
    Date,
    Time,
    DateTime,
    /// Blank-header placeholder; excluded from selection, ignored at
    /// transform time.
    Unsupported,
}

/// Conditions that abandon the whole worksheet build.
#[derive(Debug, Error)]
pub enum SchemaBuildError {
    #[error("duplicate header '{name}' at column {letter}")]
    DuplicateHeader { name: String, letter: String },

    #[error("sample cell at column {letter} is a {kind} value; cannot infer a type")]
    InvalidSample {
        letter: String,
        kind: &'static str,
    },
}

/// Classify one column from its sample cell.
///
/// The header has already been checked for displayable text; blank headers
/// never reach this function.
pub fn classify_column(
    sheet_title: &str,
    letter: &str,
    sample: &CellData,
) -> Result<(ColumnKind, Value), SchemaBuildError> {
    let kind = match sample.effective_kind() {
        EffectiveValueKind::Error(_) => {
            return Err(SchemaBuildError::InvalidSample {
                letter: letter.to_string(),
                kind: "error",
            });
        }
        EffectiveValueKind::Formula => {
            return Err(SchemaBuildError::InvalidSample {
                letter: letter.to_string(),
                kind: "formula",
            });
        }
        EffectiveValueKind::Bool(_) => ColumnKind::Boolean,
        EffectiveValueKind::Text(_) => ColumnKind::String,
        EffectiveValueKind::Number(_) => numeric_kind(sample.number_format_type()),
        EffectiveValueKind::Empty => match sample.number_format_type() {
            // An empty sample still carries display intent; use it.
            Some(format) => numeric_kind(Some(format)),
            None => {
                warn!(
                    sheet = sheet_title,
                    column = letter,
                    "empty sample cell with no format metadata, defaulting to string"
                );
                ColumnKind::String
            }
        },
    };

    Ok((kind, schema_fragment(kind)))
}

/// Map a numeric cell's format category to a logical type.
///
/// Currency- and text-formatted numbers stay strings: the display string
/// is the only unambiguous representation across locales.
fn numeric_kind(format: Option<NumberFormatType>) -> ColumnKind {
    match format {
        Some(NumberFormatType::Date) => ColumnKind::Date,
        Some(NumberFormatType::DateTime) => ColumnKind::DateTime,
        Some(NumberFormatType::Time) => ColumnKind::Time,
        Some(NumberFormatType::Text) | Some(NumberFormatType::Currency) => {
            ColumnKind::String
        }
        Some(NumberFormatType::Number)
        | Some(NumberFormatType::Percent)
        | Some(NumberFormatType::Scientific)
        | Some(NumberFormatType::Unspecified)
        | None => ColumnKind::Number,
    }
}

/// The JSON Schema fragment published for a column of the given kind.
pub fn schema_fragment(kind: ColumnKind) -> Value {
    match kind {
        ColumnKind::String | ColumnKind::Unsupported => {
            json!({"type": ["null", "string"]})
        }
        // String stays in the union as the coercion-failure escape hatch.
        ColumnKind::Boolean => json!({"type": ["null", "boolean", "string"]}),
        ColumnKind::Number => json!({
            "anyOf": [
                {"type": ["null", "string"], "format": "decimal"},
                {"type": ["null", "string"]}
            ]
        }),
        ColumnKind::Date => json!({
            "anyOf": [
                {"type": ["null", "string"], "format": "date"},
                {"type": ["null", "string"]}
            ]
        }),
        ColumnKind::Time => json!({
            "anyOf": [
                {"type": ["null", "string"], "format": "time"},
                {"type": ["null", "string"]}
            ]
        }),
        ColumnKind::DateTime => json!({
            "anyOf": [
                {"type": ["null", "string"], "format": "date-time"},
                {"type": ["null", "string"]}
            ]
        }),
    }
}

/// Fragment for a blank-header placeholder column.
pub fn skip_fragment(letter: &str) -> Value {
    json!({
        "type": ["null", "string"],
        "description": format!(
            "Unsupported column at {letter}: blank header, values not replicated"
        )
    })
}
