//! Shared utilities for the sheetforge tap.
//!
//! - **Retry logic**: bounded exponential backoff with jitter for API calls
//! - **Serial time**: spreadsheet serial-number date/time decoding
//!
//! These utilities are async-first (tokio) and carry no knowledge of the
//! spreadsheet API itself; the client and source crates compose them.

pub mod retry;
pub mod serial_time;

pub use retry::{RetryOutcome, RetryPolicy, Retryable, retry_async};

pub use serial_time::{
    now_ms, serial_to_date_string, serial_to_datetime_string,
    serial_to_duration_string,
};
