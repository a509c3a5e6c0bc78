//! Decides which days of a range still need extracting.

use std::future::Future;

use tracing::{info, warn};

use crate::error::ExportError;
use crate::model::{DateRange, DateWindow, Existence};

#[derive(Debug, Default)]
pub struct DayPlan {
    /// Days to extract, in calendar order.
    pub pending: Vec<DateWindow>,
    /// Days that already hold exported data, with their references.
    pub existing: Vec<(DateWindow, String)>,
    /// Days whose probe failed; left out of this run.
    pub probe_failures: Vec<ExportError>,
}

/// Probe every day of `range` once and keep the ones without exported data.
///
/// A failed probe drops the day from the plan instead of failing the run,
/// so such days are silently missing from this run's output.
pub async fn plan_days<F, Fut>(range: DateRange, mut exists: F) -> DayPlan
where
    F: FnMut(DateWindow) -> Fut,
    Fut: Future<Output = Result<Existence, ExportError>>,
{
    let mut plan = DayPlan::default();
    for window in range.windows() {
        match exists(window).await {
            Ok(Existence::Present { reference }) => {
                info!(day = %window, %reference, "[PLAN] Skipping day, already exists in storage sink");
                plan.existing.push((window, reference));
            }
            Ok(Existence::Absent) => plan.pending.push(window),
            Err(e) => {
                warn!(day = %window, error = %e, "[PLAN] Error checking if data already exists, skipping day");
                plan.probe_failures.push(ExportError::DedupCheck {
                    day: window.day(),
                    message: e.to_string(),
                });
            }
        }
    }
    info!(
        pending = plan.pending.len(),
        existing = plan.existing.len(),
        probe_failures = plan.probe_failures.len(),
        "[PLAN] Planned days for extraction"
    );
    plan
}
