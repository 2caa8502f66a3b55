//! Core message model and traits for the sheetforge tap.
//!
//! The tap emits a streaming extraction protocol of four message kinds:
//! schema declarations, data records, state checkpoints, and
//! activate-version boundaries that mark a full-table replace. The wire
//! shapes here are Singer-compatible so existing targets can consume the
//! output directly.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod errors;
pub mod state;

pub use errors::{SinkError, TapError};
pub use state::TapState;

pub type TapResult<T> = Result<T, TapError>;
pub type SinkResult<T> = std::result::Result<T, SinkError>;

// ============================================================================
// Synthetic record fields
// ============================================================================

/// Field carrying the spreadsheet identifier on every worksheet record.
pub const SDC_SPREADSHEET_ID: &str = "__sdc_spreadsheet_id";

/// Field carrying the numeric worksheet identifier.
pub const SDC_SHEET_ID: &str = "__sdc_sheet_id";

/// Field carrying the 1-based spreadsheet row number; also the worksheet
/// stream's key property.
pub const SDC_ROW: &str = "__sdc_row";

/// Prefix for placeholder column names synthesized for blank headers.
pub const SDC_SKIP_COL_PREFIX: &str = "__sdc_skip_col_";

// ============================================================================
// Messages
// ============================================================================

/// One message on the tap's output stream.
///
/// Serializes to Singer's wire format, e.g.
/// `{"type": "RECORD", "stream": "Sheet1", "record": {...}, "version": 1700000000000}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum TapMessage {
    #[serde(rename = "SCHEMA")]
    Schema {
        stream: String,
        schema: Value,
        key_properties: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        bookmark_properties: Option<Vec<String>>,
    },

    #[serde(rename = "RECORD")]
    Record {
        stream: String,
        record: Value,
        /// Ties records to an activate-version boundary during a
        /// full-table replace.
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        time_extracted: Option<String>,
    },

    #[serde(rename = "STATE")]
    State { value: Value },

    #[serde(rename = "ACTIVATE_VERSION")]
    ActivateVersion { stream: String, version: i64 },
}

impl TapMessage {
    pub fn schema(
        stream: impl Into<String>,
        schema: Value,
        key_properties: &[&str],
    ) -> Self {
        Self::Schema {
            stream: stream.into(),
            schema,
            key_properties: key_properties.iter().map(|s| s.to_string()).collect(),
            bookmark_properties: None,
        }
    }

    pub fn record(
        stream: impl Into<String>,
        record: Value,
        version: Option<i64>,
        time_extracted: Option<String>,
    ) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
            version,
            time_extracted,
        }
    }

    /// Snapshot the given state into a STATE message.
    pub fn state(state: &TapState) -> SinkResult<Self> {
        Ok(Self::State {
            value: serde_json::to_value(state)?,
        })
    }

    pub fn activate_version(stream: impl Into<String>, version: i64) -> Self {
        Self::ActivateVersion {
            stream: stream.into(),
            version,
        }
    }

    /// The stream this message belongs to, if any (STATE has none).
    pub fn stream(&self) -> Option<&str> {
        match self {
            Self::Schema { stream, .. }
            | Self::Record { stream, .. }
            | Self::ActivateVersion { stream, .. } => Some(stream),
            Self::State { .. } => None,
        }
    }
}

// ============================================================================
// Sink trait
// ============================================================================

/// Destination for tap messages. The stdout sink is the production
/// implementation; tests use an in-memory buffer.
#[async_trait]
pub trait MessageSink: Send + Sync {
    fn id(&self) -> &str;

    async fn write(&self, message: &TapMessage) -> SinkResult<()>;

    async fn write_batch(&self, messages: &[TapMessage]) -> SinkResult<()> {
        for message in messages {
            self.write(message).await?;
        }
        Ok(())
    }
}

pub type ArcDynSink = Arc<dyn MessageSink>;

// ============================================================================
// Tests
// ============================================================================
