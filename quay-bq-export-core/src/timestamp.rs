//! Timestamp formats used on the wire and in exported files.
//!
//! The logs API speaks RFC 1123 with a numeric zone
//! (`Mon, 02 Jan 2006 15:04:05 -0700`); BigQuery's DATETIME column wants
//! `2006-01-02 15:04:05`. Both are normalised to UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

pub const WIRE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";
pub const EXPORT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_wire(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_str(s.trim(), WIRE_FORMAT).map(|dt| dt.with_timezone(&Utc))
}

pub fn format_wire(dt: &DateTime<Utc>) -> String {
    dt.format(WIRE_FORMAT).to_string()
}

pub fn parse_export(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s.trim(), EXPORT_FORMAT).map(|naive| naive.and_utc())
}

pub fn format_export(dt: &DateTime<Utc>) -> String {
    dt.format(EXPORT_FORMAT).to_string()
}

/// serde adapter for API timestamps.
pub mod wire {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_wire(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_wire(&raw)
            .map_err(|e| D::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
    }
}

/// serde adapter for warehouse timestamps.
pub mod export {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_export(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_export(&raw)
            .map_err(|e| D::Error::custom(format!("invalid datetime {raw:?}: {e}")))
    }
}
