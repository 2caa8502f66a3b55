//! The four built-in streams and their static schemas.
//!
//! Worksheet streams are discovered at runtime and get inferred schemas;
//! these four are fixed: `file_metadata` (incremental on the modification
//! timestamp), `spreadsheet_metadata`, `sheet_metadata` (the worksheet
//! catalog), and `sheets_loaded` (the load audit). Emission order is
//! fixed and not reconfigurable.

use serde_json::{Value, json};

pub const FILE_METADATA: &str = "file_metadata";
pub const SPREADSHEET_METADATA: &str = "spreadsheet_metadata";
pub const SHEET_METADATA: &str = "sheet_metadata";
pub const SHEETS_LOADED: &str = "sheets_loaded";

/// Built-in streams in emission order.
pub const BUILTIN_STREAMS: [&str; 4] = [
    FILE_METADATA,
    SPREADSHEET_METADATA,
    SHEET_METADATA,
    SHEETS_LOADED,
];

pub fn key_properties(stream: &str) -> &'static [&'static str] {
    match stream {
        FILE_METADATA => &["id"],
        SPREADSHEET_METADATA => &["spreadsheetId"],
        SHEET_METADATA => &["sheetId"],
        SHEETS_LOADED => &["spreadsheetId", "sheetId", "loadDate"],
        _ => &[],
    }
}

/// Static JSON Schema for a built-in stream; `None` for worksheet streams.
pub fn schema(stream: &str) -> Option<Value> {
    let schema = match stream {
        FILE_METADATA => json!({
            "type": "object",
            "properties": {
                "id": {"type": ["null", "string"]},
                "name": {"type": ["null", "string"]},
                "version": {"type": ["null", "string"]},
                "createdTime": {"type": ["null", "string"], "format": "date-time"},
                "modifiedTime": {"type": ["null", "string"], "format": "date-time"},
                "teamDriveId": {"type": ["null", "string"]},
                "driveId": {"type": ["null", "string"]},
                "lastModifyingUser": {
                    "type": ["null", "object"],
                    "properties": {
                        "kind": {"type": ["null", "string"]},
                        "displayName": {"type": ["null", "string"]},
                        "emailAddress": {"type": ["null", "string"]}
                    }
                }
            }
        }),
        SPREADSHEET_METADATA => json!({
            "type": "object",
            "properties": {
                "spreadsheetId": {"type": ["null", "string"]},
                "properties": {
                    "type": ["null", "object"],
                    "properties": {
                        "title": {"type": ["null", "string"]},
                        "locale": {"type": ["null", "string"]},
                        "timeZone": {"type": ["null", "string"]}
                    }
                }
            }
        }),
        SHEET_METADATA => json!({
            "type": "object",
            "properties": {
                "spreadsheetId": {"type": ["null", "string"]},
                "sheetId": {"type": ["null", "integer"]},
                "title": {"type": ["null", "string"]},
                "index": {"type": ["null", "integer"]},
                "gridProperties": {
                    "type": ["null", "object"],
                    "properties": {
                        "rowCount": {"type": ["null", "integer"]},
                        "columnCount": {"type": ["null", "integer"]}
                    }
                },
                "columns": {
                    "type": ["null", "array"],
                    "items": {
                        "type": "object",
                        "properties": {
                            "columnIndex": {"type": ["null", "integer"]},
                            "columnLetter": {"type": ["null", "string"]},
                            "columnName": {"type": ["null", "string"]},
                            "columnType": {"type": ["null", "string"]},
                            "columnSkipped": {"type": ["null", "boolean"]},
                            "priorColumnSkipped": {"type": ["null", "boolean"]}
                        }
                    }
                }
            }
        }),
        SHEETS_LOADED => json!({
            "type": "object",
            "properties": {
                "spreadsheetId": {"type": ["null", "string"]},
                "sheetId": {"type": ["null", "integer"]},
                "title": {"type": ["null", "string"]},
                "loadDate": {"type": ["null", "string"], "format": "date-time"},
                "lastRowNumber": {"type": ["null", "integer"]}
            }
        }),
        _ => return None,
    };
    Some(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_has_a_schema() {
        for stream in BUILTIN_STREAMS {
            let s = schema(stream).unwrap();
            assert_eq!(s["type"], "object");
            assert!(s["properties"].is_object());
        }
    }

    #[test]
    fn worksheet_streams_have_no_static_schema() {
        assert!(schema("Sheet1").is_none());
    }

    #[test]
    fn builtin_key_properties() {
        assert_eq!(key_properties(FILE_METADATA), ["id"]);
        assert_eq!(key_properties(SHEET_METADATA), ["sheetId"]);
        assert!(key_properties("Sheet1").is_empty());
    }
}
