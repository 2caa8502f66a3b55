//! Typed response models for the spreadsheet and file-storage APIs.
//!
//! Every field the host may omit is optional or defaulted; nothing here
//! assumes a well-formed response. The classifier and transformer consume
//! these models through small accessor methods instead of poking at raw
//! JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Spreadsheet metadata
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Spreadsheet {
    pub spreadsheet_id: String,
    pub properties: SpreadsheetProperties,
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpreadsheetProperties {
    pub title: Option<String>,
    pub locale: Option<String>,
    pub time_zone: Option<String>,
    pub default_format: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sheet {
    pub properties: SheetProperties,
    /// Grid data, present only when the request asked for it.
    pub data: Vec<GridData>,
}

impl Sheet {
    /// Header row and first data row, when grid data was requested.
    ///
    /// The API returns one `GridData` per requested range; rows inside it
    /// follow worksheet order.
    pub fn header_and_first_rows(&self) -> (Option<&RowData>, Option<&RowData>) {
        match self.data.first() {
            Some(grid) => (grid.row_data.first(), grid.row_data.get(1)),
            None => (None, None),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
    pub index: Option<i64>,
    pub sheet_type: Option<String>,
    pub grid_properties: GridProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridProperties {
    pub row_count: u64,
    pub column_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridData {
    pub row_data: Vec<RowData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RowData {
    pub values: Vec<CellData>,
}

// ============================================================================
// Cells
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CellData {
    /// The cell's display text, used for header names.
    pub formatted_value: Option<String>,
    pub effective_value: Option<ExtendedValue>,
    pub effective_format: Option<CellFormat>,
}

impl CellData {
    /// Display text, treating whitespace-only as absent.
    pub fn display_text(&self) -> Option<&str> {
        self.formatted_value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Kind of the computed value, independent of display formatting.
    pub fn effective_kind(&self) -> EffectiveValueKind<'_> {
        match &self.effective_value {
            Some(v) => v.kind(),
            None => EffectiveValueKind::Empty,
        }
    }

    /// The host-reported number-format category, if any.
    pub fn number_format_type(&self) -> Option<NumberFormatType> {
        self.effective_format
            .as_ref()
            .and_then(|f| f.number_format.as_ref())
            .and_then(|nf| nf.format_type)
    }
}

/// The computed value of a cell. At most one variant field is set; the
/// API models this as a union of optional keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtendedValue {
    pub number_value: Option<f64>,
    pub string_value: Option<String>,
    pub bool_value: Option<bool>,
    pub formula_value: Option<String>,
    pub error_value: Option<ErrorValue>,
}

impl ExtendedValue {
    pub fn kind(&self) -> EffectiveValueKind<'_> {
        if let Some(err) = &self.error_value {
            return EffectiveValueKind::Error(err);
        }
        if self.formula_value.is_some() {
            return EffectiveValueKind::Formula;
        }
        if let Some(b) = self.bool_value {
            return EffectiveValueKind::Bool(b);
        }
        if let Some(n) = self.number_value {
            return EffectiveValueKind::Number(n);
        }
        if let Some(s) = &self.string_value {
            return EffectiveValueKind::Text(s);
        }
        EffectiveValueKind::Empty
    }
}

/// Closed classification of a cell's effective value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectiveValueKind<'a> {
    Number(f64),
    Text(&'a str),
    Bool(bool),
    Formula,
    Error(&'a ErrorValue),
    Empty,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorValue {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CellFormat {
    pub number_format: Option<NumberFormat>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NumberFormat {
    #[serde(rename = "type")]
    pub format_type: Option<NumberFormatType>,
    pub pattern: Option<String>,
}

/// Host-reported display intent for a numeric cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NumberFormatType {
    Text,
    Number,
    Percent,
    Currency,
    Date,
    Time,
    DateTime,
    Scientific,
    /// Anything the host adds later decodes here instead of failing.
    #[serde(other)]
    Unspecified,
}

// ============================================================================
// Value ranges (row batches)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValueRange {
    pub range: Option<String>,
    pub major_dimension: Option<String>,
    /// One array of raw cell values per row. Trailing blank rows and
    /// trailing blank cells within a row are omitted by the host.
    pub values: Vec<Vec<Value>>,
}

// ============================================================================
// File metadata (storage API)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriveFile {
    pub id: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
    pub team_drive_id: Option<String>,
    pub drive_id: Option<String>,
    pub last_modifying_user: Option<DriveUser>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriveUser {
    pub kind: Option<String>,
    pub display_name: Option<String>,
    pub email_address: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
