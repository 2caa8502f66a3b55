//! HTTP client for the spreadsheet and file-storage APIs.
//!
//! One client instance serves the whole sync. Every call goes through the
//! sliding-window [`rate_limit::RateLimiter`] and the shared retry loop,
//! so callers only ever see terminal [`TapError`]s.

pub mod errors;
pub mod models;
pub mod rate_limit;

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use common::retry::{Retryable, RetryOutcome, RetryPolicy, retry_async};
use reqwest::StatusCode;
use sheetforge_core::TapError;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::errors::ClientError;
use crate::models::{DriveFile, Spreadsheet, ValueRange};
use crate::rate_limit::RateLimiter;

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/";
const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3/";

const FILE_FIELDS: &str =
    "id,name,createdTime,modifiedTime,version,teamDriveId,driveId,lastModifyingUser";

/// The host API surface the sync consumes.
///
/// [`SheetsClient`] is the production implementation; tests drive the
/// orchestrator and pager against in-memory fakes.
#[async_trait]
pub trait SpreadsheetApi: Send + Sync {
    async fn file_metadata(
        &self,
        spreadsheet_id: &str,
        cancel: &CancellationToken,
    ) -> Result<DriveFile, TapError>;

    async fn spreadsheet_metadata(
        &self,
        spreadsheet_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Spreadsheet, TapError>;

    async fn sheet_header_rows(
        &self,
        spreadsheet_id: &str,
        sheet_title: &str,
        cancel: &CancellationToken,
    ) -> Result<Spreadsheet, TapError>;

    async fn values_range(
        &self,
        spreadsheet_id: &str,
        sheet_title: &str,
        last_column: &str,
        first_row: u64,
        last_row: u64,
        cancel: &CancellationToken,
    ) -> Result<ValueRange, TapError>;
}

/// Connection settings the client needs beyond the HTTP defaults.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub access_token: String,
    pub request_timeout: Duration,
    pub user_agent: Option<String>,
}

pub struct SheetsClient {
    http: reqwest::Client,
    sheets_base: Url,
    drive_base: Url,
    access_token: String,
    limiter: RateLimiter,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl SheetsClient {
    pub fn new(opts: ClientOptions) -> Result<Self, TapError> {
        let mut builder = reqwest::Client::builder().timeout(opts.request_timeout);
        if let Some(ua) = &opts.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        let http = builder
            .build()
            .map_err(|e| TapError::Connect { details: Cow::Owned(e.to_string()) })?;

        // The base URLs are compile-time constants; parsing cannot fail.
        let sheets_base = Url::parse(SHEETS_BASE)
            .map_err(|e| TapError::Other(anyhow::anyhow!(e)))?;
        let drive_base = Url::parse(DRIVE_BASE)
            .map_err(|e| TapError::Other(anyhow::anyhow!(e)))?;

        Ok(Self {
            http,
            sheets_base,
            drive_base,
            access_token: opts.access_token,
            limiter: RateLimiter::default(),
            policy: RetryPolicy::default(),
            attempt_timeout: opts.request_timeout,
        })
    }

    /// Point the client at a different host, for tests against a local server.
    pub fn with_base_urls(mut self, sheets: Url, drive: Url) -> Self {
        self.sheets_base = sheets;
        self.drive_base = drive;
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        cancel: &CancellationToken,
        label: &'static str,
    ) -> Result<T, TapError> {
        let result = retry_async(
            |attempt| {
                let url = url.clone();
                async move {
                    self.limiter.acquire().await;
                    debug!(label, attempt, %url, "issuing request");
                    self.fetch_once(url).await
                }
            },
            ClientError::is_retryable,
            self.attempt_timeout,
            self.policy.clone(),
            cancel,
            label,
        )
        .await;

        match result {
            Ok(value) => Ok(value),
            Err(outcome) => Err(map_outcome(outcome, label)),
        }
    }

    async fn fetch_once<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited);
        }
        if status.is_server_error() {
            return Err(ClientError::Server { status: status.as_u16() });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl SpreadsheetApi for SheetsClient {
    /// File-level metadata: name, version, and modification timestamps.
    async fn file_metadata(
        &self,
        spreadsheet_id: &str,
        cancel: &CancellationToken,
    ) -> Result<DriveFile, TapError> {
        let mut url = api_url(&self.drive_base, &["files", spreadsheet_id])?;
        url.query_pairs_mut().append_pair("fields", FILE_FIELDS);
        self.get_json(url, cancel, "file_metadata").await
    }

    /// Spreadsheet properties and the worksheet list, without cell data.
    async fn spreadsheet_metadata(
        &self,
        spreadsheet_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Spreadsheet, TapError> {
        let mut url = api_url(&self.sheets_base, &["spreadsheets", spreadsheet_id])?;
        url.query_pairs_mut().append_pair("includeGridData", "false");
        self.get_json(url, cancel, "spreadsheet_metadata").await
    }

    /// The first two rows of one worksheet, with formatting metadata.
    ///
    /// Used for schema inference: row 1 supplies headers, row 2 the sample
    /// cells whose effective values and number formats drive typing.
    async fn sheet_header_rows(
        &self,
        spreadsheet_id: &str,
        sheet_title: &str,
        cancel: &CancellationToken,
    ) -> Result<Spreadsheet, TapError> {
        let mut url = api_url(&self.sheets_base, &["spreadsheets", spreadsheet_id])?;
        url.query_pairs_mut()
            .append_pair("includeGridData", "true")
            .append_pair("ranges", &format!("'{sheet_title}'!1:2"));
        self.get_json(url, cancel, "sheet_header_rows").await
    }

    /// One batch of raw data rows from a worksheet.
    ///
    /// `first_row..=last_row` are 1-based worksheet row numbers; the range
    /// is bounded to `A..last_column` so cells right of the classified
    /// region never count as data. Values come back unformatted with
    /// date/time cells as serial numbers.
    async fn values_range(
        &self,
        spreadsheet_id: &str,
        sheet_title: &str,
        last_column: &str,
        first_row: u64,
        last_row: u64,
        cancel: &CancellationToken,
    ) -> Result<ValueRange, TapError> {
        let range = format!("'{sheet_title}'!A{first_row}:{last_column}{last_row}");
        let mut url = api_url(
            &self.sheets_base,
            &["spreadsheets", spreadsheet_id, "values", &range],
        )?;
        url.query_pairs_mut()
            .append_pair("dateTimeRenderOption", "SERIAL_NUMBER")
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
            .append_pair("majorDimension", "ROWS");
        self.get_json(url, cancel, "values_range").await
    }
}

/// Build a request URL by appending percent-encoded path segments.
fn api_url(base: &Url, segments: &[&str]) -> Result<Url, TapError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| TapError::Other(anyhow::anyhow!("base URL cannot have segments")))?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn map_outcome(outcome: RetryOutcome<ClientError>, label: &'static str) -> TapError {
    match outcome {
        RetryOutcome::Cancelled => TapError::Cancelled,
        RetryOutcome::Timeout { action } => TapError::Timeout { action },
        RetryOutcome::Failed(e) => map_client_error(e, label),
        RetryOutcome::Exhausted { attempts, last_error } => match last_error {
            ClientError::RateLimited => TapError::Api {
                status: 429,
                details: Cow::Owned(format!(
                    "{label}: still rate limited after {attempts} attempts"
                )),
            },
            ClientError::Server { status } => TapError::Api {
                status,
                details: Cow::Owned(format!(
                    "{label}: server error persisted across {attempts} attempts"
                )),
            },
            other => map_client_error(other, label),
        },
    }
}

fn map_client_error(e: ClientError, label: &'static str) -> TapError {
    match e {
        ClientError::Status { status: 401, message }
        | ClientError::Status { status: 403, message } => TapError::Auth {
            details: Cow::Owned(format!("{label}: {message}")),
        },
        ClientError::Status { status: 404, message } => TapError::NotFound {
            details: Cow::Owned(format!("{label}: {message}")),
        },
        ClientError::Status { status, message } => TapError::Api {
            status,
            details: Cow::Owned(format!("{label}: {message}")),
        },
        ClientError::RateLimited => TapError::Api {
            status: 429,
            details: Cow::Borrowed(label),
        },
        ClientError::Server { status } => TapError::Api {
            status,
            details: Cow::Borrowed(label),
        },
        ClientError::Transport(err) if err.is_connect() => TapError::Connect {
            details: Cow::Owned(err.to_string()),
        },
        ClientError::Transport(err) if err.is_timeout() => TapError::Timeout {
            action: Cow::Borrowed(label),
        },
        ClientError::Transport(err) => TapError::Api {
            status: 0,
            details: Cow::Owned(format!("{label}: {err}")),
        },
        ClientError::Decode(err) => TapError::Api {
            status: 0,
            details: Cow::Owned(format!("{label}: bad response body: {err}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_segments_are_percent_encoded() {
        let base = Url::parse(SHEETS_BASE).unwrap();
        let url = api_url(
            &base,
            &["spreadsheets", "abc123", "values", "'Q1 Revenue'!A2:D201"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/'Q1%20Revenue'!A2:D201"
        );
    }

    #[test]
    fn header_range_query_is_quoted() {
        let base = Url::parse(SHEETS_BASE).unwrap();
        let mut url = api_url(&base, &["spreadsheets", "abc123"]).unwrap();
        url.query_pairs_mut()
            .append_pair("includeGridData", "true")
            .append_pair("ranges", "'My Sheet'!1:2");
        assert!(url.query().unwrap().contains("ranges=%27My+Sheet%27%211%3A2"));
    }

    #[test]
    fn auth_failures_map_to_auth_error() {
        let err = map_client_error(
            ClientError::Status { status: 401, message: "expired".into() },
            "file_metadata",
        );
        assert!(matches!(err, TapError::Auth { .. }));

        let err = map_client_error(
            ClientError::Status { status: 404, message: "gone".into() },
            "file_metadata",
        );
        assert!(matches!(err, TapError::NotFound { .. }));
    }

    #[test]
    fn exhausted_rate_limit_maps_to_api_429() {
        let err = map_outcome(
            RetryOutcome::Exhausted {
                attempts: 5,
                last_error: ClientError::RateLimited,
            },
            "values_range",
        );
        match err {
            TapError::Api { status, .. } => assert_eq!(status, 429),
            other => panic!("expected Api, got {other:?}"),
        }
    }
}
