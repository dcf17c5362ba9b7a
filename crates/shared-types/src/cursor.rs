//! # Cursors and Timestamps
//!
//! A cursor is the `timestamp` of the last event a consumer processed.
//! Queries are inclusive on the cursor, so the boundary event is delivered
//! again on resume and absorbed by consumer-side dedup.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse an ISO-8601 instant.
///
/// Accepts RFC 3339 (`2024-01-01T00:00:00Z`, offsets, fractional seconds) and
/// offset-less date-times, which are read as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Coerce a raw `since` query value into a cursor.
///
/// Empty, `undefined` and `null` (any case) mean "no cursor", as does any
/// value that is not a parseable instant.
pub fn coerce_since(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    let lowered = raw.to_ascii_lowercase();
    if lowered.is_empty() || lowered == "undefined" || lowered == "null" {
        return None;
    }
    parse_instant(raw).map(|_| raw.to_string())
}

/// Returns the later of two cursors.
///
/// Parsed instants are compared when both parse; otherwise the strings are
/// compared, which orders uniformly formatted ISO timestamps correctly.
pub fn later_cursor<'a>(current: Option<&'a str>, candidate: &'a str) -> &'a str {
    let Some(current) = current else {
        return candidate;
    };
    let newer = match (parse_instant(current), parse_instant(candidate)) {
        (Some(cur), Some(cand)) => cand > cur,
        (None, Some(_)) => true,
        (Some(_), None) => false,
        (None, None) => candidate > current,
    };
    if newer {
        candidate
    } else {
        current
    }
}
