//! Row-to-record transformation.
//!
//! The classifier decided each column's logical type from one sample; the
//! transformer re-derives every cell's actual runtime kind per row, because
//! human-edited worksheets drift. A cell that will not coerce falls back to
//! its string form with a warning; transformation itself never fails.

use serde_json::{Map, Number, Value};
use sheetforge_core::{SDC_ROW, SDC_SHEET_ID, SDC_SPREADSHEET_ID};
use sheetforge_schema::{ColumnDescriptor, ColumnKind};
use tracing::warn;

use common::serial_time::{
    serial_to_date_string, serial_to_datetime_string, serial_to_duration_string,
};

/// Transforms raw row batches for one worksheet.
pub struct RowTransformer {
    spreadsheet_id: String,
    sheet_id: i64,
    sheet_title: String,
    /// Sorted by column index once at construction.
    columns: Vec<ColumnDescriptor>,
}

impl RowTransformer {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        sheet_id: i64,
        sheet_title: impl Into<String>,
        columns: &[ColumnDescriptor],
    ) -> Self {
        let mut columns = columns.to_vec();
        columns.sort_by_key(|c| c.column_index);
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            sheet_id,
            sheet_title: sheet_title.into(),
            columns,
        }
    }

    /// Transform one batch of raw rows.
    ///
    /// `start_row` is the 1-based worksheet row number of the batch's first
    /// raw row. Returns the typed records plus the next unconsumed row
    /// number. Every raw row advances the counter, including entirely empty
    /// rows, which are dropped without emitting a record so the counter
    /// stays aligned with true worksheet positions.
    pub fn transform_batch(
        &self,
        raw_rows: &[Vec<Value>],
        start_row: u64,
    ) -> (Vec<Value>, u64) {
        let mut records = Vec::with_capacity(raw_rows.len());
        let mut row_number = start_row;

        for raw_row in raw_rows {
            if raw_row.is_empty() {
                row_number += 1;
                continue;
            }
            records.push(self.transform_row(raw_row, row_number));
            row_number += 1;
        }

        (records, row_number)
    }

    fn transform_row(&self, raw_row: &[Value], row_number: u64) -> Value {
        let mut record = Map::new();
        record.insert(
            SDC_SPREADSHEET_ID.to_string(),
            Value::String(self.spreadsheet_id.clone()),
        );
        record.insert(SDC_SHEET_ID.to_string(), Value::from(self.sheet_id));
        record.insert(SDC_ROW.to_string(), Value::from(row_number));

        for column in &self.columns {
            if column.column_skipped {
                continue;
            }
            let raw = raw_row
                .get((column.column_index - 1) as usize)
                .unwrap_or(&Value::Null);
            let typed = self.coerce(column, raw, row_number);
            record.insert(column.column_name.clone(), typed);
        }

        Value::Object(record)
    }

    fn coerce(&self, column: &ColumnDescriptor, raw: &Value, row: u64) -> Value {
        if raw.is_null() {
            return Value::Null;
        }
        if matches!(raw, Value::String(s) if s.is_empty()) {
            return Value::Null;
        }

        match column.column_type {
            ColumnKind::String => Value::String(stringify(raw)),

            ColumnKind::DateTime => match raw.as_f64() {
                Some(serial) => Value::String(serial_to_datetime_string(serial)),
                None => Value::String(stringify(raw)),
            },

            ColumnKind::Date => match raw.as_f64() {
                Some(serial) => Value::String(serial_to_date_string(serial)),
                None => Value::String(stringify(raw)),
            },

            ColumnKind::Time => match raw.as_f64() {
                Some(serial) => Value::String(serial_to_duration_string(serial)),
                None => Value::String(stringify(raw)),
            },

            ColumnKind::Number => match self.coerce_number(raw) {
                Some(value) => value,
                None => self.fallback(column, raw, row, "number"),
            },

            ColumnKind::Boolean => match coerce_boolean(raw) {
                Some(flag) => Value::Bool(flag),
                None => self.fallback(column, raw, row, "boolean"),
            },

            // Skipped columns never get here; a descriptor that does is a
            // drifted catalog, handled like any other coercion failure.
            ColumnKind::Unsupported => self.fallback(column, raw, row, "unsupported"),
        }
    }

    fn coerce_number(&self, raw: &Value) -> Option<Value> {
        match raw {
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    return Some(raw.clone());
                }
                let f = n.as_f64()?;
                Number::from_f64(round_significant(f, 15)).map(Value::Number)
            }
            Value::String(s) => {
                // Accept human-entered thousands separators.
                let cleaned = s.trim().replace(',', "");
                if let Ok(i) = cleaned.parse::<i64>() {
                    return Some(Value::from(i));
                }
                let f: f64 = cleaned.parse().ok()?;
                if !f.is_finite() {
                    return None;
                }
                Number::from_f64(round_significant(f, 15)).map(Value::Number)
            }
            _ => None,
        }
    }

    fn fallback(
        &self,
        column: &ColumnDescriptor,
        raw: &Value,
        row: u64,
        expected: &'static str,
    ) -> Value {
        let rendered = stringify(raw);
        warn!(
            sheet = %self.sheet_title,
            column = %column.column_name,
            cell = format!("{}{}", column.column_letter, row),
            row,
            value = %rendered,
            expected,
            "value does not match inferred type, emitting string"
        );
        Value::String(rendered)
    }
}

/// Lossless string form of any scalar cell value.
fn stringify(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Round to at most `digits` significant decimal digits.
fn round_significant(f: f64, digits: usize) -> f64 {
    if f == 0.0 || !f.is_finite() {
        return f;
    }
    format!("{:.*e}", digits - 1, f).parse().unwrap_or(f)
}

fn coerce_boolean(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" => Some(true),
            "false" | "f" | "no" | "n" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) | Some(-1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        _ => None,
    }
}
