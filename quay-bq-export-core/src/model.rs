//! Data model: log records as returned by the repository logs API, the
//! per-day window used for extraction and partitioning, and the object
//! store destinations derived from it.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::timestamp;

pub const DAY_FORMAT: &str = "%Y-%m-%d";
/// Date parameter format accepted by the logs API and the CLI.
pub const QUERY_DATE_FORMAT: &str = "%m/%d/%Y";
pub const EXPORT_FILE_NAME: &str = "export.json";

/// Kind of audit event. Unknown kinds are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntryKind {
    PullRepo,
    Other(String),
}

impl From<String> for EntryKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pull_repo" => EntryKind::PullRepo,
            _ => EntryKind::Other(s),
        }
    }
}

impl From<EntryKind> for String {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::PullRepo => "pull_repo".to_string(),
            EntryKind::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolvedIp {
    pub sync_token: String,
    pub region: String,
    /// Untyped on the wire; kept as raw JSON.
    pub service: serde_json::Value,
    pub provider: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntryMetadata {
    pub repo: String,
    pub tag: String,
    pub namespace: String,
    pub public: bool,
    pub resolved_ip: ResolvedIp,
}

/// A single audit log record.
///
/// Deserializes from the API's wire shape; serializes to the warehouse
/// shape (see [`LogEntry::to_export_line`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub ip: String,
    pub kind: EntryKind,
    #[serde(
        serialize_with = "timestamp::export::serialize",
        deserialize_with = "timestamp::wire::deserialize"
    )]
    pub datetime: DateTime<Utc>,
    #[serde(default)]
    pub metadata: LogEntryMetadata,
}

/// Mirror of [`LogEntry`] reading the export datetime format.
#[derive(Deserialize)]
struct ExportedEntry {
    ip: String,
    kind: EntryKind,
    #[serde(with = "timestamp::export")]
    datetime: DateTime<Utc>,
    #[serde(default)]
    metadata: LogEntryMetadata,
}

impl LogEntry {
    pub fn window(&self) -> DateWindow {
        DateWindow::containing(&self.datetime)
    }

    /// One newline-terminated NDJSON record in warehouse format.
    pub fn to_export_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }

    pub fn from_export_line(line: &str) -> Result<LogEntry, ExportError> {
        let e: ExportedEntry = serde_json::from_str(line.trim_end())?;
        Ok(LogEntry {
            ip: e.ip,
            kind: e.kind,
            datetime: e.datetime,
            metadata: e.metadata,
        })
    }
}

/// One response of the logs API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogPage {
    #[serde(with = "timestamp::wire")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "timestamp::wire")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl LogPage {
    pub fn decode(body: &str) -> Result<LogPage, ExportError> {
        serde_json::from_str(body)
            .map_err(|e| ExportError::Protocol(format!("failed to decode logs page: {e}")))
    }

    /// Token for the following page; `None` when this is the last page.
    pub fn next_token(&self) -> Option<&str> {
        self.next_page.as_deref().filter(|t| !t.is_empty())
    }
}

/// A single UTC calendar day, `[midnight, midnight + 24h)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateWindow {
    day: NaiveDate,
}

impl DateWindow {
    pub fn new(day: NaiveDate) -> Self {
        Self { day }
    }

    pub fn containing(ts: &DateTime<Utc>) -> Self {
        Self {
            day: ts.date_naive(),
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.day.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start() + chrono::Duration::days(1)
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start() && *ts < self.end()
    }

    /// `YYYY-MM-DD`
    pub fn key(&self) -> String {
        self.day.format(DAY_FORMAT).to_string()
    }

    /// `MM/DD/YYYY`, as the logs API expects it.
    pub fn query_param(&self) -> String {
        self.day.format(QUERY_DATE_FORMAT).to_string()
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Every day in `[start, end]`; empty when `end < start`.
    pub fn windows(&self) -> impl Iterator<Item = DateWindow> {
        let end = self.end;
        std::iter::successors(Some(self.start), |d| d.checked_add_days(Days::new(1)))
            .take_while(move |d| *d <= end)
            .map(DateWindow::new)
    }
}

/// Day-keyed location of one export file in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SinkDestination {
    path: String,
}

impl SinkDestination {
    pub fn for_window(prefix: Option<&str>, window: DateWindow) -> Self {
        let file = format!("{}/{}", window.key(), EXPORT_FILE_NAME);
        let path = match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{prefix}/{file}"),
            None => file,
        };
        Self { path }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Display for SinkDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Result of probing the object store for a day's export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existence {
    Present { reference: String },
    Absent,
}

impl Existence {
    pub fn exists(&self) -> bool {
        matches!(self, Existence::Present { .. })
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            Existence::Present { reference } => Some(reference),
            Existence::Absent => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_bounds_cover_one_day() {
        let w = DateWindow::new(day(2023, 6, 1));
        assert!(w.contains(&Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()));
        assert!(w.contains(&Utc.with_ymd_and_hms(2023, 6, 1, 23, 59, 59).unwrap()));
        assert!(!w.contains(&Utc.with_ymd_and_hms(2023, 6, 2, 0, 0, 0).unwrap()));
        assert_eq!(w.key(), "2023-06-01");
        assert_eq!(w.query_param(), "06/01/2023");
    }

    #[test]
    fn range_enumerates_inclusive_days() {
        let days: Vec<_> = DateRange::new(day(2023, 2, 27), day(2023, 3, 1))
            .windows()
            .map(|w| w.key())
            .collect();
        assert_eq!(days, vec!["2023-02-27", "2023-02-28", "2023-03-01"]);

        assert_eq!(DateRange::new(day(2023, 3, 2), day(2023, 3, 1)).windows().count(), 0);
    }

    #[test]
    fn destination_paths_respect_prefix() {
        let w = DateWindow::new(day(2023, 6, 1));
        assert_eq!(SinkDestination::for_window(None, w).path(), "2023-06-01/export.json");
        assert_eq!(
            SinkDestination::for_window(Some("quay/logs/"), w).path(),
            "quay/logs/2023-06-01/export.json"
        );
        assert_eq!(SinkDestination::for_window(Some(""), w).path(), "2023-06-01/export.json");
    }

    #[test]
    fn unknown_entry_kinds_survive() {
        let kind: EntryKind = serde_json::from_str("\"push_repo\"").unwrap();
        assert_eq!(kind, EntryKind::Other("push_repo".into()));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"push_repo\"");
        let pull: EntryKind = serde_json::from_str("\"pull_repo\"").unwrap();
        assert_eq!(pull, EntryKind::PullRepo);
    }

    #[test]
    fn empty_next_page_ends_pagination() {
        let body = r#"{"start_time":"Thu, 01 Jun 2023 00:00:00 -0000","end_time":"Fri, 02 Jun 2023 00:00:00 -0000","next_page":"","logs":[]}"#;
        let page = LogPage::decode(body).unwrap();
        assert_eq!(page.next_token(), None);
    }
}
