//! Worksheet schema assembly.
//!
//! Walks the header row left to right, classifying each column from the
//! first data row's matching cell. Blank headers become placeholder
//! columns; two consecutive blank headers end the scan. Any classification
//! failure abandons the worksheet: the build returns `None` and the sync
//! carries on without this stream.

use serde_json::{Map, Value, json};
use sheetforge_core::{SDC_ROW, SDC_SHEET_ID, SDC_SKIP_COL_PREFIX, SDC_SPREADSHEET_ID};
use sheets_client::models::{CellData, RowData};
use tracing::warn;

use crate::classify::{SchemaBuildError, classify_column, skip_fragment};
use crate::{ColumnDescriptor, ColumnKind, WorksheetSchema, column_letter};

/// Infer one worksheet's schema from its header row and first data row.
///
/// Returns `None` when the worksheet cannot produce a stream: no data
/// rows, an empty header row, no usable columns, or a classification
/// failure. Every `None` is logged with the reason.
pub fn build_sheet_schema(
    sheet_title: &str,
    header_row: &RowData,
    first_data_row: Option<&RowData>,
) -> Option<WorksheetSchema> {
    let Some(first_data_row) = first_data_row else {
        warn!(sheet = sheet_title, "no data rows, skipping worksheet");
        return None;
    };
    if header_row.values.is_empty() {
        warn!(sheet = sheet_title, "empty header row, skipping worksheet");
        return None;
    }

    let (properties, columns) = match scan_headers(sheet_title, header_row, first_data_row)
    {
        Ok(scanned) => scanned,
        Err(reason) => {
            warn!(sheet = sheet_title, %reason, "schema build failed, skipping worksheet");
            return None;
        }
    };

    if columns.iter().all(|c| c.column_skipped) {
        warn!(sheet = sheet_title, "no usable columns, skipping worksheet");
        return None;
    }

    let mut all_properties = synthetic_properties();
    all_properties.extend(properties);

    Some(WorksheetSchema {
        schema: json!({
            "type": "object",
            "properties": Value::Object(all_properties),
        }),
        columns,
    })
}

/// Fixed fields prepended to every worksheet schema.
fn synthetic_properties() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        SDC_SPREADSHEET_ID.to_string(),
        json!({"type": ["null", "string"]}),
    );
    properties.insert(SDC_SHEET_ID.to_string(), json!({"type": ["null", "integer"]}));
    properties.insert(SDC_ROW.to_string(), json!({"type": ["null", "integer"]}));
    properties
}

fn scan_headers(
    sheet_title: &str,
    header_row: &RowData,
    first_data_row: &RowData,
) -> Result<(Map<String, Value>, Vec<ColumnDescriptor>), SchemaBuildError> {
    let mut properties = Map::new();
    let mut columns: Vec<ColumnDescriptor> = Vec::with_capacity(header_row.values.len());
    let padding = CellData::default();
    let mut skipped_run = 0u32;

    for (i, header_cell) in header_row.values.iter().enumerate() {
        let index = (i + 1) as u32;
        let letter = column_letter(index);

        let Some(header_text) = header_cell.display_text() else {
            skipped_run += 1;
            if skipped_run >= 2 {
                // Second consecutive blank header: the data region has
                // ended. Drop the previous placeholder's schema entry,
                // flag its descriptor, and stop scanning.
                if let Some(prev) = columns.last_mut() {
                    properties.remove(&prev.column_name);
                    prev.prior_column_skipped = true;
                }
                break;
            }

            let name = format!("{SDC_SKIP_COL_PREFIX}{index:02}");
            properties.insert(name.clone(), skip_fragment(&letter));
            columns.push(ColumnDescriptor {
                column_index: index,
                column_letter: letter,
                column_name: name,
                column_type: ColumnKind::Unsupported,
                column_skipped: true,
                prior_column_skipped: false,
            });
            continue;
        };
        skipped_run = 0;

        if columns
            .iter()
            .any(|c| !c.column_skipped && c.column_name == header_text)
        {
            return Err(SchemaBuildError::DuplicateHeader {
                name: header_text.to_string(),
                letter,
            });
        }

        let sample = match first_data_row.values.get(i) {
            Some(cell) => cell,
            None => {
                warn!(
                    sheet = sheet_title,
                    column = %letter,
                    "first data row shorter than header row, treating sample as empty"
                );
                &padding
            }
        };

        let (kind, fragment) = classify_column(sheet_title, &letter, sample)?;
        properties.insert(header_text.to_string(), fragment);
        columns.push(ColumnDescriptor {
            column_index: index,
            column_letter: letter,
            column_name: header_text.to_string(),
            column_type: kind,
            column_skipped: false,
            prior_column_skipped: false,
        });
    }

    Ok((properties, columns))
}
