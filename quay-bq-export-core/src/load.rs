//! Hands the finished day extracts to the warehouse as one load job.

use tracing::{error, info, warn};

use crate::contract::{LoadJobResult, Sink, Warehouse};
use crate::error::ExportError;
use crate::model::{DateWindow, Existence};

#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// References submitted to the load job, in day order.
    pub references: Vec<String>,
    /// Planned days with nothing to load.
    pub missing: Vec<DateWindow>,
    /// `None` when there was nothing to load.
    pub job: Option<LoadJobResult>,
}

/// Re-probe every planned day and load whatever now exists.
///
/// Must only run after every day pipeline has been joined, so no partially
/// written destination is ever referenced.
pub async fn trigger_load<S, W>(
    sink: &S,
    warehouse: &W,
    planned: &[DateWindow],
) -> Result<LoadOutcome, ExportError>
where
    S: Sink + ?Sized,
    W: Warehouse + ?Sized,
{
    let mut days = planned.to_vec();
    days.sort();

    let mut outcome = LoadOutcome::default();
    for window in days {
        match sink.exists(window).await {
            Ok(Existence::Present { reference }) => outcome.references.push(reference),
            Ok(Existence::Absent) => {
                warn!(day = %window, "[LOAD] No data written for day, excluding from load");
                outcome.missing.push(window);
            }
            Err(e) => {
                warn!(day = %window, error = %e, "[LOAD] Could not confirm day was written, excluding from load");
                outcome.missing.push(window);
            }
        }
    }

    if outcome.references.is_empty() {
        info!(missing = outcome.missing.len(), "[LOAD] Nothing to load, skipping load job");
        return Ok(outcome);
    }

    info!(references = outcome.references.len(), "[LOAD] Submitting load job");
    match warehouse.load(outcome.references.clone()).await {
        Ok(job) => {
            info!(job_id = %job.job_id, output_rows = ?job.output_rows, "[LOAD] Load job completed");
            outcome.job = Some(job);
            Ok(outcome)
        }
        Err(e) => {
            error!(error = %e, "[LOAD] Load job failed");
            Err(match e {
                ExportError::Load(_) => e,
                other => ExportError::Load(other.to_string()),
            })
        }
    }
}
