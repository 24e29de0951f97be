//! Decoder for the hub's last-change timestamps.
//!
//! HomeSeer serializes instants as `/Date(<millis>[<sign><offset>])/`, for
//! example `/Date(1613971427719-0500)/`. The offset is validated but not
//! applied: the decoded instant is always the raw epoch value in UTC.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::DateError;

/// Instant returned for devices that report a negative last-change time.
pub const NEVER: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

static LAST_CHANGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/Date\((-?\d+)([+-]\d+)?\)/$").unwrap());

/// Decode a raw `last_change` string into a UTC instant.
///
/// Negative millisecond values decode to [`NEVER`] instead of failing. Some
/// devices report large negative values and that must not fail a fetch.
pub fn decode_last_change(raw: &str) -> Result<DateTime<Utc>, DateError> {
    let malformed = || DateError::Malformed(raw.to_string());

    let caps = LAST_CHANGE_REGEX.captures(raw).ok_or_else(malformed)?;
    let millis: i64 = caps[1].parse().map_err(|_| malformed())?;

    if millis < 0 {
        return Ok(NEVER);
    }

    // caps[2] (the zone offset) is not applied.
    DateTime::from_timestamp_millis(millis).ok_or_else(malformed)
}
