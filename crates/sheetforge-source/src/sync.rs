//! Sync orchestration.
//!
//! One run follows a fixed sequence: check the file's modification
//! timestamp against the stored bookmark (and stop early when nothing
//! changed), emit the file and spreadsheet metadata streams, build each
//! worksheet's schema and load the selected ones, then close with the
//! catalog and load-audit streams and the new file bookmark. A worksheet
//! whose schema cannot be built is skipped with a warning; an error while
//! loading a selected worksheet aborts the run.

use chrono::{DateTime, FixedOffset};
use checkpoints::{CheckpointStore, CheckpointStoreExt};
use serde_json::{Value, json};
use sheetforge_config::{Selection, TapConfig};
use sheetforge_core::{MessageSink, TapError, TapMessage, TapResult, TapState};
use sheetforge_schema::build_sheet_schema;
use sheets_client::SpreadsheetApi;
use sheets_client::models::{Sheet, Spreadsheet};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::pager::{WorksheetLoad, load_worksheet, write};
use crate::streams::{
    FILE_METADATA, SHEET_METADATA, SHEETS_LOADED, SPREADSHEET_METADATA, key_properties,
    schema as builtin_schema,
};

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSummary {
    /// The file was unchanged; nothing beyond the metadata check ran.
    pub short_circuited: bool,
    pub worksheets_loaded: u32,
    pub worksheets_skipped: u32,
    pub records_emitted: u64,
}

pub struct SyncRunner<'a> {
    api: &'a dyn SpreadsheetApi,
    sink: &'a dyn MessageSink,
    store: &'a dyn CheckpointStore,
    config: &'a TapConfig,
}

impl<'a> SyncRunner<'a> {
    pub fn new(
        api: &'a dyn SpreadsheetApi,
        sink: &'a dyn MessageSink,
        store: &'a dyn CheckpointStore,
        config: &'a TapConfig,
    ) -> Self {
        Self {
            api,
            sink,
            store,
            config,
        }
    }

    pub async fn run(
        &self,
        state: &mut TapState,
        cancel: &CancellationToken,
    ) -> TapResult<SyncSummary> {
        let selection = &self.config.selection;
        if !selection.any_selected() {
            info!("no streams selected, nothing to do");
            return Ok(SyncSummary::default());
        }

        let spreadsheet_id = self.config.spreadsheet_id.as_str();
        let file = self.api.file_metadata(spreadsheet_id, cancel).await?;
        let file_fetched_at = common::serial_time::utc_now_string();

        let modified = file.modified_time.clone();
        if let Some(modified) = &modified {
            let previous = state
                .string_bookmark(FILE_METADATA)
                .unwrap_or(&self.config.start_date);
            if !is_newer(modified, previous) {
                info!(%modified, %previous, "spreadsheet unchanged, skipping sync");
                return Ok(SyncSummary {
                    short_circuited: true,
                    ..Default::default()
                });
            }
        } else {
            warn!("file metadata carries no modification timestamp, syncing anyway");
        }

        let mut summary = SyncSummary::default();

        if selection.is_selected(FILE_METADATA) {
            state.set_currently_syncing(Some(FILE_METADATA));
            self.emit_builtin(
                FILE_METADATA,
                vec![serde_json::to_value(&file).map_err(serde_error)?],
                &file_fetched_at,
                selection,
            )
            .await?;
        }

        let spreadsheet = self.api.spreadsheet_metadata(spreadsheet_id, cancel).await?;
        let metadata_fetched_at = common::serial_time::utc_now_string();

        if selection.is_selected(SPREADSHEET_METADATA) {
            state.set_currently_syncing(Some(SPREADSHEET_METADATA));
            self.emit_builtin(
                SPREADSHEET_METADATA,
                vec![spreadsheet_record(&spreadsheet)],
                &metadata_fetched_at,
                selection,
            )
            .await?;
        }

        let mut catalog: Vec<Value> = Vec::new();
        let mut loads: Vec<WorksheetLoad> = Vec::new();

        for sheet in &spreadsheet.sheets {
            let title = sheet.properties.title.as_str();
            let grid = self
                .api
                .sheet_header_rows(spreadsheet_id, title, cancel)
                .await?;

            let Some(worksheet) = self.build_worksheet(&grid, sheet) else {
                summary.worksheets_skipped += 1;
                continue;
            };

            catalog.push(catalog_record(spreadsheet_id, sheet, &worksheet.columns));

            if !selection.is_selected(title) {
                continue;
            }

            state.set_currently_syncing(Some(title));
            let deselected = deselected_fields(selection, title);
            let mut stream_schema = worksheet.schema.clone();
            drop_deselected_properties(&mut stream_schema, deselected);
            write(
                self.sink,
                &TapMessage::schema(title, stream_schema, &[sheetforge_core::SDC_ROW]),
            )
            .await?;

            let load = load_worksheet(
                self.api,
                self.sink,
                state,
                spreadsheet_id,
                &sheet.properties,
                &worksheet,
                deselected,
                &metadata_fetched_at,
                cancel,
            )
            .await?;

            summary.worksheets_loaded += 1;
            summary.records_emitted += load.records_emitted;
            loads.push(load);
            self.persist(state).await?;
        }

        if selection.is_selected(SHEET_METADATA) {
            state.set_currently_syncing(Some(SHEET_METADATA));
            self.emit_builtin(SHEET_METADATA, catalog, &metadata_fetched_at, selection)
                .await?;
        }

        if selection.is_selected(SHEETS_LOADED) {
            state.set_currently_syncing(Some(SHEETS_LOADED));
            let records = loads
                .iter()
                .map(|load| audit_record(spreadsheet_id, load))
                .collect();
            self.emit_builtin(SHEETS_LOADED, records, &metadata_fetched_at, selection)
                .await?;
        }

        if let Some(modified) = modified {
            state.set_bookmark(FILE_METADATA, json!(modified));
        }
        state.set_currently_syncing(None);
        self.persist(state).await?;
        let snapshot = TapMessage::state(state).map_err(|e| TapError::Other(e.into()))?;
        write(self.sink, &snapshot).await?;

        info!(
            loaded = summary.worksheets_loaded,
            skipped = summary.worksheets_skipped,
            records = summary.records_emitted,
            "sync complete"
        );
        Ok(summary)
    }

    /// Build one worksheet's schema from its header grid, or `None` when
    /// the worksheet cannot produce a stream.
    fn build_worksheet(
        &self,
        grid: &Spreadsheet,
        sheet: &Sheet,
    ) -> Option<sheetforge_schema::WorksheetSchema> {
        let title = sheet.properties.title.as_str();
        let with_data = grid
            .sheets
            .iter()
            .find(|s| s.properties.sheet_id == sheet.properties.sheet_id)
            .or_else(|| grid.sheets.iter().find(|s| s.properties.title == title))?;

        let (header, first_data) = with_data.header_and_first_rows();
        let Some(header) = header else {
            warn!(sheet = title, "no header row, skipping worksheet");
            return None;
        };
        build_sheet_schema(title, header, first_data)
    }

    /// Emit a built-in stream: its static schema, then its records.
    async fn emit_builtin(
        &self,
        stream: &str,
        records: Vec<Value>,
        time_extracted: &str,
        selection: &Selection,
    ) -> TapResult<()> {
        let schema = builtin_schema(stream)
            .ok_or_else(|| TapError::Schema {
                details: format!("unknown built-in stream {stream}").into(),
            })?;
        write(
            self.sink,
            &TapMessage::schema(stream, schema, key_properties(stream)),
        )
        .await?;

        let deselected = deselected_fields(selection, stream);
        for mut record in records {
            if let Value::Object(map) = &mut record {
                for field in deselected {
                    map.remove(field);
                }
            }
            write(
                self.sink,
                &TapMessage::record(stream, record, None, Some(time_extracted.to_string())),
            )
            .await?;
        }
        Ok(())
    }

    async fn persist(&self, state: &TapState) -> TapResult<()> {
        self.store
            .put(&self.config.spreadsheet_id, state)
            .await
            .map_err(|e| TapError::Checkpoint {
                details: e.to_string().into(),
            })
    }
}

/// True when `candidate` is strictly newer than `reference`. Unparseable
/// timestamps count as newer so a malformed bookmark never wedges the tap.
fn is_newer(candidate: &str, reference: &str) -> bool {
    match (parse_ts(candidate), parse_ts(reference)) {
        (Some(c), Some(r)) => c > r,
        _ => {
            warn!(candidate, reference, "unparseable timestamp, treating file as changed");
            true
        }
    }
}

fn parse_ts(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

fn spreadsheet_record(spreadsheet: &Spreadsheet) -> Value {
    json!({
        "spreadsheetId": spreadsheet.spreadsheet_id,
        "properties": {
            "title": spreadsheet.properties.title,
            "locale": spreadsheet.properties.locale,
            "timeZone": spreadsheet.properties.time_zone,
        }
    })
}

fn catalog_record(
    spreadsheet_id: &str,
    sheet: &Sheet,
    columns: &[sheetforge_schema::ColumnDescriptor],
) -> Value {
    json!({
        "spreadsheetId": spreadsheet_id,
        "sheetId": sheet.properties.sheet_id,
        "title": sheet.properties.title,
        "index": sheet.properties.index,
        "gridProperties": {
            "rowCount": sheet.properties.grid_properties.row_count,
            "columnCount": sheet.properties.grid_properties.column_count,
        },
        "columns": columns,
    })
}

fn audit_record(spreadsheet_id: &str, load: &WorksheetLoad) -> Value {
    json!({
        "spreadsheetId": spreadsheet_id,
        "sheetId": load.sheet_id,
        "title": load.title,
        "loadDate": common::serial_time::utc_now_string(),
        "lastRowNumber": load.last_row,
    })
}

fn deselected_fields<'s>(selection: &'s Selection, stream: &str) -> &'s [String] {
    selection
        .deselected_fields
        .get(stream)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn drop_deselected_properties(schema: &mut Value, deselected: &[String]) {
    if deselected.is_empty() {
        return;
    }
    if let Some(properties) = schema
        .get_mut("properties")
        .and_then(Value::as_object_mut)
    {
        for field in deselected {
            properties.remove(field);
        }
    }
}

fn serde_error(e: serde_json::Error) -> TapError {
    TapError::Other(anyhow::Error::new(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use checkpoints::MemCheckpointStore;
    use sheets_client::models::{DriveFile, ValueRange};
    use sinks::BufferSink;

    struct FakeApi {
        modified_time: String,
        spreadsheet: Value,
        header_grids: Value,
        rows: Vec<Vec<Value>>,
        metadata_calls: AtomicU32,
        values_calls: AtomicU32,
    }

    impl FakeApi {
        fn served_rows_once(&self) -> Vec<Vec<Value>> {
            if self.values_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.rows.clone()
            } else {
                Vec::new()
            }
        }
    }

    #[async_trait]
    impl SpreadsheetApi for FakeApi {
        async fn file_metadata(
            &self,
            _: &str,
            _: &CancellationToken,
        ) -> TapResult<DriveFile> {
            Ok(serde_json::from_value(json!({
                "id": "file-1",
                "name": "Budget",
                "modifiedTime": self.modified_time,
            }))
            .unwrap())
        }

        async fn spreadsheet_metadata(
            &self,
            _: &str,
            _: &CancellationToken,
        ) -> TapResult<Spreadsheet> {
            self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(self.spreadsheet.clone()).unwrap())
        }

        async fn sheet_header_rows(
            &self,
            _: &str,
            _: &str,
            _: &CancellationToken,
        ) -> TapResult<Spreadsheet> {
            Ok(serde_json::from_value(self.header_grids.clone()).unwrap())
        }

        async fn values_range(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: u64,
            _: u64,
            _: &CancellationToken,
        ) -> TapResult<ValueRange> {
            Ok(ValueRange {
                values: self.served_rows_once(),
                ..Default::default()
            })
        }
    }

    fn fake_api() -> FakeApi {
        FakeApi {
            modified_time: "2024-05-02T10:00:00.000Z".to_string(),
            spreadsheet: json!({
                "spreadsheetId": "ss-1",
                "properties": {"title": "Budget", "locale": "en_US", "timeZone": "Etc/UTC"},
                "sheets": [{
                    "properties": {"sheetId": 11, "title": "People", "index": 0,
                                   "gridProperties": {"rowCount": 50, "columnCount": 2}}
                }]
            }),
            header_grids: json!({
                "spreadsheetId": "ss-1",
                "sheets": [{
                    "properties": {"sheetId": 11, "title": "People",
                                   "gridProperties": {"rowCount": 50, "columnCount": 2}},
                    "data": [{"rowData": [
                        {"values": [{"formattedValue": "Name"}, {"formattedValue": "Age"}]},
                        {"values": [
                            {"effectiveValue": {"stringValue": "Alice"}},
                            {"effectiveValue": {"numberValue": 30.0}}
                        ]}
                    ]}]
                }]
            }),
            rows: vec![vec![json!("Alice"), json!(30)], vec![json!("Bob"), json!(41)]],
            metadata_calls: AtomicU32::new(0),
            values_calls: AtomicU32::new(0),
        }
    }

    fn config(streams: &[&str]) -> TapConfig {
        serde_json::from_value(json!({
            "spreadsheet_id": "ss-1",
            "start_date": "2024-01-01T00:00:00Z",
            "access_token": "t",
            "selection": {"streams": streams}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn unchanged_file_short_circuits_without_worksheet_reads() {
        let api = fake_api();
        let sink = BufferSink::new();
        let store = MemCheckpointStore::new();
        let cfg = config(&["People", "file_metadata"]);
        let mut state = TapState::default();
        state.set_bookmark(FILE_METADATA, json!("2024-05-02T10:00:00.000Z"));

        let runner = SyncRunner::new(&api, &sink, &store, &cfg);
        let summary = runner.run(&mut state, &CancellationToken::new()).await.unwrap();

        assert!(summary.short_circuited);
        assert_eq!(api.metadata_calls.load(Ordering::SeqCst), 0);
        assert!(sink.take().await.is_empty());
    }

    #[tokio::test]
    async fn nothing_selected_does_no_work() {
        let api = fake_api();
        let sink = BufferSink::new();
        let store = MemCheckpointStore::new();
        let cfg = config(&[]);
        let mut state = TapState::default();

        let runner = SyncRunner::new(&api, &sink, &store, &cfg);
        let summary = runner.run(&mut state, &CancellationToken::new()).await.unwrap();

        assert_eq!(summary, SyncSummary::default());
        assert!(sink.take().await.is_empty());
    }

    #[tokio::test]
    async fn full_run_emits_streams_in_order_and_updates_bookmarks() {
        let api = fake_api();
        let sink = BufferSink::new();
        let store = MemCheckpointStore::new();
        let cfg = config(&[
            "file_metadata",
            "spreadsheet_metadata",
            "People",
            "sheet_metadata",
            "sheets_loaded",
        ]);
        let mut state = TapState::default();

        let runner = SyncRunner::new(&api, &sink, &store, &cfg);
        let summary = runner.run(&mut state, &CancellationToken::new()).await.unwrap();

        assert_eq!(summary.worksheets_loaded, 1);
        assert_eq!(summary.records_emitted, 2);

        let messages = sink.take().await;
        let streams: Vec<Option<String>> = messages
            .iter()
            .map(|m| m.stream().map(str::to_string))
            .collect();

        // Schema order: file_metadata, spreadsheet_metadata, the worksheet,
        // then the catalog and audit streams.
        let schema_streams: Vec<&str> = messages
            .iter()
            .filter_map(|m| match m {
                TapMessage::Schema { stream, .. } => Some(stream.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            schema_streams,
            ["file_metadata", "spreadsheet_metadata", "People",
             "sheet_metadata", "sheets_loaded"]
        );

        // Worksheet records sit between the two People boundaries.
        assert!(streams.contains(&Some("People".to_string())));
        let record_count = messages
            .iter()
            .filter(|m| matches!(m, TapMessage::Record { stream, .. } if stream == "People"))
            .count();
        assert_eq!(record_count, 2);

        // The final message is the closing state snapshot.
        assert!(matches!(messages.last().unwrap(), TapMessage::State { .. }));

        assert_eq!(
            state.string_bookmark(FILE_METADATA),
            Some("2024-05-02T10:00:00.000Z")
        );
        assert!(state.integer_bookmark("People") > 0);
        assert!(state.currently_syncing.is_none());

        // State was persisted to the checkpoint store.
        let stored: Option<TapState> = store.get("ss-1").await.unwrap();
        assert_eq!(stored.unwrap(), state);
    }

    #[tokio::test]
    async fn catalog_record_carries_column_descriptors() {
        let api = fake_api();
        let sink = BufferSink::new();
        let store = MemCheckpointStore::new();
        let cfg = config(&["sheet_metadata"]);
        let mut state = TapState::default();

        let runner = SyncRunner::new(&api, &sink, &store, &cfg);
        runner.run(&mut state, &CancellationToken::new()).await.unwrap();

        let messages = sink.take().await;
        let record = messages
            .iter()
            .find_map(|m| match m {
                TapMessage::Record { stream, record, .. } if stream == SHEET_METADATA => {
                    Some(record)
                }
                _ => None,
            })
            .unwrap();

        assert_eq!(record["sheetId"], 11);
        assert_eq!(record["columns"][0]["columnName"], "Name");
        assert_eq!(record["columns"][1]["columnType"], "number");
    }

    #[tokio::test]
    async fn worksheet_with_bad_schema_is_skipped_not_fatal() {
        let mut api = fake_api();
        // Duplicate headers make the build fail for this worksheet.
        api.header_grids = json!({
            "spreadsheetId": "ss-1",
            "sheets": [{
                "properties": {"sheetId": 11, "title": "People",
                               "gridProperties": {"rowCount": 50, "columnCount": 2}},
                "data": [{"rowData": [
                    {"values": [{"formattedValue": "Name"}, {"formattedValue": "Name"}]},
                    {"values": [{"effectiveValue": {"stringValue": "Alice"}}]}
                ]}]
            }]
        });
        let sink = BufferSink::new();
        let store = MemCheckpointStore::new();
        let cfg = config(&["People", "sheets_loaded"]);
        let mut state = TapState::default();

        let runner = SyncRunner::new(&api, &sink, &store, &cfg);
        let summary = runner.run(&mut state, &CancellationToken::new()).await.unwrap();

        assert_eq!(summary.worksheets_loaded, 0);
        assert_eq!(summary.worksheets_skipped, 1);

        // The audit stream still emits its schema, with no records.
        let messages = sink.take().await;
        let audit_records = messages
            .iter()
            .filter(|m| matches!(m, TapMessage::Record { stream, .. } if stream == SHEETS_LOADED))
            .count();
        assert_eq!(audit_records, 0);
    }

    #[tokio::test]
    async fn deselected_fields_are_removed_from_schema_and_records() {
        let api = fake_api();
        let sink = BufferSink::new();
        let store = MemCheckpointStore::new();
        let mut cfg = config(&["People"]);
        cfg.selection
            .deselected_fields
            .insert("People".to_string(), vec!["Age".to_string()]);
        let mut state = TapState::default();

        let runner = SyncRunner::new(&api, &sink, &store, &cfg);
        runner.run(&mut state, &CancellationToken::new()).await.unwrap();

        let messages = sink.take().await;
        for message in &messages {
            match message {
                TapMessage::Schema { stream, schema, .. } if stream == "People" => {
                    assert!(schema["properties"].get("Age").is_none());
                    assert!(schema["properties"].get("Name").is_some());
                }
                TapMessage::Record { stream, record, .. } if stream == "People" => {
                    assert!(record.get("Age").is_none());
                }
                _ => {}
            }
        }
    }
}
