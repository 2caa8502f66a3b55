//! Tap configuration: which spreadsheet to extract, where to start, and
//! which streams/fields are selected. Loaded from YAML (JSON parses too)
//! with `${VAR}` environment expansion.

use std::collections::HashMap;
use std::fs;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Identifier of the spreadsheet to extract.
    pub spreadsheet_id: String,

    /// Sync start date (RFC 3339). The incremental file-metadata check
    /// compares against this when no bookmark exists yet.
    pub start_date: String,

    /// Ready-to-use bearer token for the host APIs. Token acquisition and
    /// refresh happen outside the tap.
    pub access_token: String,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub selection: Selection,
}

fn default_request_timeout_secs() -> u64 {
    300
}

/// Stream and field selection flags.
///
/// Worksheet streams are addressed by worksheet title; the built-in
/// streams by their fixed names (`file_metadata`, `spreadsheet_metadata`,
/// `sheet_metadata`, `sheets_loaded`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    /// Streams selected for extraction. An empty list selects nothing;
    /// the sync then exits without doing any work.
    pub streams: Vec<String>,

    /// Fields excluded per stream. Absent streams keep every field.
    pub deselected_fields: HashMap<String, Vec<String>>,
}

impl Selection {
    pub fn is_selected(&self, stream: &str) -> bool {
        self.streams.iter().any(|s| s == stream)
    }

    pub fn any_selected(&self) -> bool {
        !self.streams.is_empty()
    }

    pub fn is_field_selected(&self, stream: &str, field: &str) -> bool {
        match self.deselected_fields.get(stream) {
            Some(fields) => !fields.iter().any(|f| f == field),
            None => true,
        }
    }
}

pub fn load_from_path(file_path: &str) -> Result<TapConfig> {
    let raw = fs::read_to_string(file_path)
        .with_context(|| format!("reading config {file_path}"))?;
    let with_env = shellexpand::env(&raw)
        .with_context(|| "expanding environment variables")?
        .to_string();
    let cfg: TapConfig =
        serde_yaml::from_str(&with_env).with_context(|| "parsing yaml")?;

    Ok(cfg)
}
