//! Spreadsheet serial-number time conversion.
//!
//! Spreadsheet systems encode dates and times as a single floating-point
//! "serial number": whole days since the 1899-12-30 epoch, with the
//! fractional part carrying the time of day. This module decodes those
//! serials into UTC timestamp strings.
//!
//! The decoder uses chrono's proleptic Gregorian calendar, so serials far
//! outside the civil range (multi-century in either direction) render
//! without panicking. Serials beyond chrono's representable year range
//! fall back to the raw serial rendered as a string.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// The spreadsheet serial epoch: 1899-12-30 (serial 0).
///
/// Day 1 is 1899-12-31; the off-by-two versus 1900-01-01 is the historical
/// Lotus 1-2-3 leap-year accommodation that every spreadsheet since has kept.
pub const SHEETS_EPOCH_YMD: (i32, u32, u32) = (1899, 12, 30);

const MS_PER_DAY: i64 = 86_400_000;

fn epoch() -> NaiveDate {
    let (y, m, d) = SHEETS_EPOCH_YMD;
    // Known-valid literal date.
    NaiveDate::from_ymd_opt(y, m, d).expect("valid serial epoch")
}

fn serial_to_naive(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let total_ms = (serial * MS_PER_DAY as f64).round();
    if total_ms.abs() >= i64::MAX as f64 {
        return None;
    }
    let total_ms = total_ms as i64;
    let days = total_ms.div_euclid(MS_PER_DAY);
    let ms_of_day = total_ms.rem_euclid(MS_PER_DAY) as u32;

    let date = epoch().checked_add_signed(Duration::days(days))?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(
        ms_of_day / 1000,
        (ms_of_day % 1000) * 1_000_000,
    )?;
    Some(NaiveDateTime::new(date, time))
}

/// Decode a date-time serial to a UTC timestamp string.
///
/// Output looks like `2020-01-01T12:00:00.000000Z`. Never panics: serials
/// outside the representable calendar range come back as the raw number's
/// string form.
pub fn serial_to_datetime_string(serial: f64) -> String {
    match serial_to_naive(serial) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
        None => serial.to_string(),
    }
}

/// Decode a date serial to its date portion only (`2020-01-01`).
pub fn serial_to_date_string(serial: f64) -> String {
    match serial_to_naive(serial) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => serial.to_string(),
    }
}

/// Render a time-of-day serial as a duration string (`6:30:00`).
///
/// Time columns store the fraction of a day; the tap emits them as an
/// elapsed-time string rather than a calendar value. Serials of a day or
/// more keep accumulating hours (`26:00:00`).
pub fn serial_to_duration_string(serial: f64) -> String {
    if !serial.is_finite() {
        return serial.to_string();
    }
    let total_secs = (serial * 86_400.0).round();
    if total_secs.abs() >= i64::MAX as f64 {
        return serial.to_string();
    }
    let total_secs = total_secs as i64;
    let (sign, secs) = if total_secs < 0 {
        ("-", -total_secs)
    } else {
        ("", total_secs)
    };
    format!("{}{}:{:02}:{:02}", sign, secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current wall-clock time as a UTC timestamp string.
pub fn utc_now_string() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}
