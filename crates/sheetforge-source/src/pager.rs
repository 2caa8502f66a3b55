//! Batched extraction of one worksheet.
//!
//! Walks the data region in 200-row windows between activate-version
//! boundaries. The declared row count only bounds the window arithmetic;
//! the authoritative end-of-data signal is an empty batch, because the
//! host omits trailing blank rows entirely.

use serde_json::{Value, json};
use sheetforge_core::{MessageSink, TapError, TapMessage, TapResult, TapState};
use sheetforge_schema::{WorksheetSchema, column_letter};
use sheets_client::SpreadsheetApi;
use sheets_client::models::SheetProperties;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::transform::RowTransformer;

pub const BATCH_ROWS: u64 = 200;

/// Extraction summary for one completed worksheet; becomes a record on
/// the load-audit stream.
#[derive(Debug, Clone, PartialEq)]
pub struct WorksheetLoad {
    pub sheet_id: i64,
    pub title: String,
    /// Last worksheet row number actually reached.
    pub last_row: u64,
    /// Activate-version token for this load; also the stream's bookmark.
    pub version: i64,
    pub records_emitted: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    NotStarted,
    Paging,
    Complete,
}

/// Full-table load of one worksheet whose schema has already been built
/// and published.
///
/// Emits the opening boundary on a first-ever load (no bookmark yet), the
/// records, the closing boundary, and a STATE message carrying the new
/// version bookmark. Transport errors propagate; a selected worksheet is
/// never left silently partial.
pub async fn load_worksheet(
    api: &dyn SpreadsheetApi,
    sink: &dyn MessageSink,
    state: &mut TapState,
    spreadsheet_id: &str,
    sheet: &SheetProperties,
    worksheet: &WorksheetSchema,
    deselected: &[String],
    time_extracted: &str,
    cancel: &CancellationToken,
) -> TapResult<WorksheetLoad> {
    let title = sheet.title.as_str();
    let version = common::serial_time::now_ms();
    let first_load = state.integer_bookmark(title) == 0;

    let mut phase = Phase::NotStarted;
    debug!(sheet = title, version, first_load, ?phase, "starting worksheet load");

    if first_load {
        // Downstream must know a full replace is beginning before any data.
        write(sink, &TapMessage::activate_version(title, version)).await?;
    }

    let transformer =
        RowTransformer::new(spreadsheet_id, sheet.sheet_id, title, &worksheet.columns);
    let row_count = sheet.grid_properties.row_count;
    // Bound every fetch to the classified region; stray content right of
    // the last header must not keep batches non-empty.
    let last_column = column_letter(
        worksheet.columns.iter().map(|c| c.column_index).max().unwrap_or(1),
    );

    phase = Phase::Paging;
    let mut from = 2u64;
    let mut last_row = 1u64;
    let mut records_emitted = 0u64;

    while phase == Phase::Paging && from <= row_count {
        let to = (from + BATCH_ROWS - 1).min(row_count);
        let batch = api
            .values_range(spreadsheet_id, title, &last_column, from, to, cancel)
            .await?;

        if batch.values.is_empty() {
            // Trailing blank rows are omitted by the host; an empty batch
            // ends the data region regardless of the declared row count.
            debug!(sheet = title, from, to, "empty batch, worksheet exhausted");
            phase = Phase::Complete;
            break;
        }

        let (records, next_row) = transformer.transform_batch(&batch.values, from);
        for mut record in records {
            drop_deselected(&mut record, deselected);
            write(
                sink,
                &TapMessage::record(
                    title,
                    record,
                    Some(version),
                    Some(time_extracted.to_string()),
                ),
            )
            .await?;
            records_emitted += 1;
        }

        last_row = next_row - 1;
        from = to + 1;
    }
    phase = Phase::Complete;
    debug!(sheet = title, ?phase, last_row, "paging finished");

    write(sink, &TapMessage::activate_version(title, version)).await?;

    state.set_bookmark(title, json!(version));
    let snapshot = TapMessage::state(state).map_err(sink_error)?;
    write(sink, &snapshot).await?;

    info!(
        sheet = title,
        last_row, records_emitted, version, "worksheet load complete"
    );

    Ok(WorksheetLoad {
        sheet_id: sheet.sheet_id,
        title: title.to_string(),
        last_row,
        version,
        records_emitted,
    })
}

fn drop_deselected(record: &mut Value, deselected: &[String]) {
    if deselected.is_empty() {
        return;
    }
    if let Value::Object(map) = record {
        for field in deselected {
            map.remove(field);
        }
    }
}

pub(crate) async fn write(sink: &dyn MessageSink, message: &TapMessage) -> TapResult<()> {
    sink.write(message).await.map_err(sink_error)
}

fn sink_error(e: sheetforge_core::SinkError) -> TapError {
    TapError::Other(anyhow::Error::new(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use sheetforge_schema::build_sheet_schema;
    use sheets_client::models::{DriveFile, RowData, Spreadsheet, ValueRange};
    use sinks::BufferSink;
    use tokio::sync::Mutex;

    struct FakeApi {
        batches: Mutex<VecDeque<Vec<Vec<Value>>>>,
        calls: AtomicU32,
        ranges: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn new(batches: Vec<Vec<Vec<Value>>>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
                calls: AtomicU32::new(0),
                ranges: Mutex::new(Vec::new()),
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
            unimplemented!("not used by the pager")
        }

        async fn spreadsheet_metadata(
            &self,
            _: &str,
            _: &CancellationToken,
        ) -> TapResult<Spreadsheet> {
            unimplemented!("not used by the pager")
        }

        async fn sheet_header_rows(
            &self,
            _: &str,
            _: &str,
            _: &CancellationToken,
        ) -> TapResult<Spreadsheet> {
            unimplemented!("not used by the pager")
        }

        async fn values_range(
            &self,
            _: &str,
            _: &str,
            last_column: &str,
            first_row: u64,
            last_row: u64,
            _: &CancellationToken,
        ) -> TapResult<ValueRange> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.ranges
                .lock()
                .await
                .push(format!("A{first_row}:{last_column}{last_row}"));
            let values = self.batches.lock().await.pop_front().unwrap_or_default();
            Ok(ValueRange {
                values,
                ..Default::default()
            })
        }
    }

    fn sheet_props(row_count: u64) -> SheetProperties {
        serde_json::from_value(json!({
            "sheetId": 11,
            "title": "People",
            "gridProperties": {"rowCount": row_count, "columnCount": 2}
        }))
        .unwrap()
    }

    fn schema() -> WorksheetSchema {
        let header: RowData = serde_json::from_value(json!({"values": [
            {"formattedValue": "Name"}, {"formattedValue": "Age"}
        ]}))
        .unwrap();
        let sample: RowData = serde_json::from_value(json!({"values": [
            {"effectiveValue": {"stringValue": "Alice"}},
            {"effectiveValue": {"numberValue": 30.0}}
        ]}))
        .unwrap();
        build_sheet_schema("People", &header, Some(&sample)).unwrap()
    }

    fn data_rows(n: usize) -> Vec<Vec<Value>> {
        (0..n).map(|i| vec![json!(format!("p{i}")), json!(30)]).collect()
    }

    #[tokio::test]
    async fn empty_batch_ends_extraction_before_declared_row_count() {
        // Declared 1000 rows; the third window comes back empty.
        let api = FakeApi::new(vec![data_rows(200), data_rows(200), vec![]]);
        let sink = BufferSink::new();
        let mut state = TapState::default();
        let cancel = CancellationToken::new();

        let load = load_worksheet(
            &api,
            &sink,
            &mut state,
            "ss-1",
            &sheet_props(1000),
            &schema(),
            &[],
            "2024-01-01T00:00:00.000000Z",
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
        assert_eq!(load.last_row, 401);
        assert_eq!(load.records_emitted, 400);
    }

    #[tokio::test]
    async fn first_load_brackets_records_with_boundaries() {
        let api = FakeApi::new(vec![data_rows(2), vec![]]);
        let sink = BufferSink::new();
        let mut state = TapState::default();
        let cancel = CancellationToken::new();

        let load = load_worksheet(
            &api,
            &sink,
            &mut state,
            "ss-1",
            &sheet_props(500),
            &schema(),
            &[],
            "2024-01-01T00:00:00.000000Z",
            &cancel,
        )
        .await
        .unwrap();

        let messages = sink.take().await;
        assert!(matches!(&messages[0],
            TapMessage::ActivateVersion { version, .. } if *version == load.version));
        assert!(matches!(&messages[1], TapMessage::Record { .. }));
        assert!(matches!(&messages[2], TapMessage::Record { .. }));
        assert!(matches!(&messages[3],
            TapMessage::ActivateVersion { version, .. } if *version == load.version));
        assert!(matches!(&messages[4], TapMessage::State { .. }));

        assert_eq!(state.integer_bookmark("People"), load.version);
    }

    #[tokio::test]
    async fn repeat_load_skips_the_opening_boundary() {
        let api = FakeApi::new(vec![data_rows(1), vec![]]);
        let sink = BufferSink::new();
        let mut state = TapState::default();
        state.set_bookmark("People", json!(1700000000000i64));
        let cancel = CancellationToken::new();

        load_worksheet(
            &api,
            &sink,
            &mut state,
            "ss-1",
            &sheet_props(500),
            &schema(),
            &[],
            "2024-01-01T00:00:00.000000Z",
            &cancel,
        )
        .await
        .unwrap();

        let messages = sink.take().await;
        assert!(matches!(&messages[0], TapMessage::Record { .. }));
        let boundaries = messages
            .iter()
            .filter(|m| matches!(m, TapMessage::ActivateVersion { .. }))
            .count();
        assert_eq!(boundaries, 1);
    }

    #[tokio::test]
    async fn deselected_fields_are_removed_from_records() {
        let api = FakeApi::new(vec![data_rows(1), vec![]]);
        let sink = BufferSink::new();
        let mut state = TapState::default();
        let cancel = CancellationToken::new();

        load_worksheet(
            &api,
            &sink,
            &mut state,
            "ss-1",
            &sheet_props(500),
            &schema(),
            &["Age".to_string()],
            "2024-01-01T00:00:00.000000Z",
            &cancel,
        )
        .await
        .unwrap();

        let messages = sink.take().await;
        let TapMessage::Record { record, .. } = &messages[1] else {
            panic!("expected a record message");
        };
        assert!(record.get("Age").is_none());
        assert!(record.get("Name").is_some());
    }

    #[tokio::test]
    async fn declared_row_count_caps_the_window() {
        // Only 3 data rows declared; one fetch covers 2..=3, then the
        // window arithmetic stops without another call.
        let api = FakeApi::new(vec![data_rows(2)]);
        let sink = BufferSink::new();
        let mut state = TapState::default();
        let cancel = CancellationToken::new();

        let load = load_worksheet(
            &api,
            &sink,
            &mut state,
            "ss-1",
            &sheet_props(3),
            &schema(),
            &[],
            "2024-01-01T00:00:00.000000Z",
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert_eq!(load.last_row, 3);
    }

    #[tokio::test]
    async fn fetches_stop_at_the_last_classified_column() {
        // Two classified columns, so every window must be A..B. Content in
        // column D past the data region then stays out of the fetched range
        // and the empty batch still ends extraction.
        let api = FakeApi::new(vec![data_rows(1), vec![]]);
        let sink = BufferSink::new();
        let mut state = TapState::default();
        let cancel = CancellationToken::new();

        let load = load_worksheet(
            &api,
            &sink,
            &mut state,
            "ss-1",
            &sheet_props(500),
            &schema(),
            &[],
            "2024-01-01T00:00:00.000000Z",
            &cancel,
        )
        .await
        .unwrap();

        let ranges = api.ranges.lock().await.clone();
        assert_eq!(ranges, vec!["A2:B201", "A202:B401"]);
        assert_eq!(load.records_emitted, 1);
    }
}
