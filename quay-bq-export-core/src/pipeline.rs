//! Runs one extraction task per planned day and collects their outcomes.
//!
//! All day tasks are spawned up front and then joined; a failing day never
//! cancels its siblings. Each task streams its day's pages into the sink and
//! closes the day's destination exactly once: committed when extraction
//! succeeded, discarded when it failed.

use std::sync::Arc;

use futures::TryStreamExt;
use tracing::{error, info, warn, Instrument};

use crate::contract::{Finalize, PageSource, Sink};
use crate::error::ExportError;
use crate::extract::extract_day_pages;
use crate::model::{DateWindow, LogEntry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayStats {
    pub pages: usize,
    pub entries: usize,
    /// Entries whose timestamp fell outside the requested day.
    pub dropped: usize,
}

#[derive(Debug)]
pub struct DayOutcome {
    pub window: DateWindow,
    pub result: Result<DayStats, ExportError>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub days: Vec<DayOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (DateWindow, &DayStats)> {
        self.days
            .iter()
            .filter_map(|d| d.result.as_ref().ok().map(|stats| (d.window, stats)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (DateWindow, &ExportError)> {
        self.days
            .iter()
            .filter_map(|d| d.result.as_ref().err().map(|e| (d.window, e)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    pub fn total_entries(&self) -> usize {
        self.succeeded().map(|(_, stats)| stats.entries).sum()
    }
}

/// Extract and store every day in `days` concurrently.
pub async fn run_days<P, S>(source: Arc<P>, sink: Arc<S>, days: Vec<DateWindow>) -> RunReport
where
    P: PageSource + ?Sized + 'static,
    S: Sink + ?Sized + 'static,
{
    info!(days = days.len(), "[DAY] Launching day pipelines");

    let handles: Vec<_> = days
        .into_iter()
        .map(|window| {
            let source = Arc::clone(&source);
            let sink = Arc::clone(&sink);
            let span = tracing::info_span!("day", day = %window);
            let handle = tokio::spawn(
                async move { run_day(source.as_ref(), sink.as_ref(), window).await }
                    .instrument(span),
            );
            (window, handle)
        })
        .collect();

    let mut report = RunReport::default();
    for (window, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => {
                error!(day = %window, error = %join_err, "[DAY] Day task aborted");
                Err(ExportError::TaskAborted {
                    day: window.day(),
                    message: join_err.to_string(),
                })
            }
        };
        report.days.push(DayOutcome { window, result });
    }

    info!(
        succeeded = report.succeeded().count(),
        failed = report.failed().count(),
        entries = report.total_entries(),
        "[DAY] All day pipelines finished"
    );
    report
}

/// Extract one day into the sink, then close its destination.
///
/// The destination is committed only when the whole day was extracted; on
/// any extraction error it is discarded so no partial day is ever published.
pub async fn run_day<P, S>(source: &P, sink: &S, window: DateWindow) -> Result<DayStats, ExportError>
where
    P: PageSource + ?Sized,
    S: Sink + ?Sized,
{
    let extracted = extract_into(source, sink, window).await;
    let mode = if extracted.is_ok() {
        Finalize::Commit
    } else {
        Finalize::Discard
    };
    let closed = sink.close(window, mode).await;

    match (extracted, closed) {
        (Ok(stats), Ok(())) => {
            info!(
                day = %window,
                pages = stats.pages,
                entries = stats.entries,
                dropped = stats.dropped,
                "[DAY] Day exported"
            );
            Ok(stats)
        }
        (Ok(_), Err(close_err)) => {
            error!(day = %window, error = %close_err, "[DAY] Failed to finalize day");
            Err(close_err)
        }
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                warn!(day = %window, error = %close_err, "[DAY] Failed to discard day after extraction error");
            }
            error!(day = %window, error = %e, "[DAY] Day extraction failed, nothing published");
            Err(e)
        }
    }
}

async fn extract_into<P, S>(source: &P, sink: &S, window: DateWindow) -> Result<DayStats, ExportError>
where
    P: PageSource + ?Sized,
    S: Sink + ?Sized,
{
    let mut stats = DayStats::default();
    let mut pages = std::pin::pin!(extract_day_pages(source, window));

    while let Some(page) = pages.try_next().await? {
        stats.pages += 1;
        let (inside, outside): (Vec<LogEntry>, Vec<LogEntry>) = page
            .logs
            .into_iter()
            .partition(|entry| window.contains(&entry.datetime));
        if !outside.is_empty() {
            warn!(
                day = %window,
                page = stats.pages,
                dropped = outside.len(),
                "[DAY] Dropping entries outside the requested day"
            );
            stats.dropped += outside.len();
        }
        if inside.is_empty() {
            continue;
        }
        sink.write(&inside).await?;
        stats.entries += inside.len();
        info!(day = %window, page = stats.pages, entries = inside.len(), "[DAY] Wrote page");
    }
    Ok(stats)
}
