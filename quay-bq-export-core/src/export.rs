//! High-level pipeline: orchestrates plan → extract → load for one repository.
//!
//! This module provides the top-level orchestration for exporting a date
//! range of repository logs. It runs a coordinated pipeline that:
//!   - Probes the sink for every day in the range and plans the days that still need exporting
//!   - Extracts each planned day concurrently, streaming its pages into the day's destination
//!   - Re-probes the planned days once every day has finished and loads the written ones
//!   - Aggregates and returns a report of what succeeded and failed.
//!
//! # Major Types
//! - [`ExportReport`]: plan, per-day outcomes and load outcome for a run
//!
//! # Responsibilities
//! - Per-day isolation: one failing day is recorded in the report, other days carry on
//! - Only a failed load job fails the whole call
//! - Invokes logging throughout for traceability (see tracing spans/events)
//!
//! # Callable From
//! - Used by the CLI crate and integration tests
//! - Expects concrete [`PageSource`], [`Sink`] and [`Warehouse`] implementations
//!
//! # Navigation
//! - Main entrypoint: [`export`]

use std::sync::Arc;

use tracing::{error, info};

use crate::contract::{PageSource, Sink, Warehouse};
use crate::error::ExportError;
use crate::load::{trigger_load, LoadOutcome};
use crate::model::{DateRange, DateWindow};
use crate::pipeline::{run_days, RunReport};
use crate::plan::{plan_days, DayPlan};

#[derive(Debug)]
pub struct ExportReport {
    pub plan: DayPlan,
    pub run: RunReport,
    pub load: LoadOutcome,
}

impl ExportReport {
    pub fn failed_days(&self) -> Vec<DateWindow> {
        self.run.failed().map(|(window, _)| window).collect()
    }

    pub fn is_complete(&self) -> bool {
        !self.run.has_failures() && self.plan.probe_failures.is_empty()
    }

    /// One line per exported day that dropped entries stamped outside it.
    pub fn dropped_summary(&self) -> Vec<String> {
        self.run
            .succeeded()
            .filter(|(_, stats)| stats.dropped > 0)
            .map(|(window, stats)| {
                format!("{window}: dropped {} entries outside the day", stats.dropped)
            })
            .collect()
    }

    /// One line per failed day or probe, then any dropped-entry notices,
    /// for user-facing error output.
    pub fn failure_summary(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .run
            .failed()
            .map(|(window, e)| format!("{window}: {e}"))
            .collect();
        lines.extend(self.plan.probe_failures.iter().map(|e| e.to_string()));
        lines.extend(self.dropped_summary());
        lines
    }
}

pub async fn export<P, S, W>(
    range: DateRange,
    source: Arc<P>,
    sink: Arc<S>,
    warehouse: &W,
) -> Result<ExportReport, ExportError>
where
    P: PageSource + ?Sized + 'static,
    S: Sink + ?Sized + 'static,
    W: Warehouse + ?Sized,
{
    info!(start = %range.start, end = %range.end, "[EXPORT] Starting export pipeline");

    let plan = plan_days(range, |window| {
        let sink = Arc::clone(&sink);
        async move { sink.exists(window).await }
    })
    .await;

    let run = run_days(source, Arc::clone(&sink), plan.pending.clone()).await;
    for (window, e) in run.failed() {
        error!(day = %window, error = %e, "[EXPORT] Day failed");
    }

    let load = trigger_load(sink.as_ref(), warehouse, &plan.pending).await?;

    info!(
        planned = plan.pending.len(),
        skipped = plan.existing.len(),
        failed = run.failed().count(),
        loaded = load.references.len(),
        "[EXPORT] Export pipeline finished"
    );
    Ok(ExportReport { plan, run, load })
}
