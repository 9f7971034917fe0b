//! Tolerant decoding for snapshot documents.
//!
//! Agents emit timestamps with or without an offset, and sections vary
//! between producers. A snapshot is only rejected when `agent_thoughts` is
//! missing, so a malformed section or entry is dropped with a warning
//! instead of failing the whole document.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use tracing::warn;

use super::thought::ReasoningEntry;

/// Parse an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw)))
}

pub fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.and_then(|raw| parse_timestamp(&raw)))
}

/// Decode an optional section, dropping it if it does not match its shape
pub fn section<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match serde_json::from_value(value) {
        Ok(section) => Some(section),
        Err(e) => {
            warn!(section = std::any::type_name::<T>(), "Dropping malformed section: {}", e);
            None
        }
    }))
}

/// Decode the thought list, skipping entries that do not match their shape
pub fn entries<'de, D>(deserializer: D) -> Result<Vec<ReasoningEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping malformed reasoning entry: {}", e);
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_naive_timestamp_is_utc() {
        let ts = parse_timestamp("2026-02-18T10:30:05.123456").unwrap();
        assert_eq!(ts.hour(), 10);
        assert_eq!(ts.nanosecond(), 123_456_000);

        let ts = parse_timestamp("2026-02-18T10:30:05").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-02-18T10:30:05+00:00");
    }

    #[test]
    fn test_offset_timestamp_is_converted() {
        let ts = parse_timestamp("2026-02-18T12:30:05+02:00").unwrap();
        assert_eq!(ts.hour(), 10);
        assert_eq!(parse_timestamp("2026-02-18T10:30:05Z").unwrap().hour(), 10);
    }

    #[test]
    fn test_garbage_timestamp_is_rejected() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
