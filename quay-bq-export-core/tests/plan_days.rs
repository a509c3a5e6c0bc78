use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use futures::future::ready;
use quay_bq_export_core::model::{DateRange, DateWindow, Existence};
use quay_bq_export_core::plan::plan_days;
use quay_bq_export_core::ExportError;

fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, m, d).unwrap()
}

fn present(window: DateWindow) -> Existence {
    Existence::Present {
        reference: format!("gs://bucket/{}/export.json", window.key()),
    }
}

#[tokio::test]
async fn excludes_days_that_already_exist() {
    let range = DateRange::new(day(6, 1), day(6, 3));
    let plan = plan_days(range, |w| {
        ready(Ok(if w.day() == day(6, 2) {
            present(w)
        } else {
            Existence::Absent
        }))
    })
    .await;

    let pending: Vec<String> = plan.pending.iter().map(|w| w.key()).collect();
    assert_eq!(pending, vec!["2023-06-01", "2023-06-03"]);
    assert_eq!(plan.existing.len(), 1);
    assert_eq!(plan.existing[0].1, "gs://bucket/2023-06-02/export.json");
}

#[tokio::test]
async fn probes_each_day_exactly_once() {
    let mut probed = Vec::new();
    let range = DateRange::new(day(2, 27), day(3, 2));
    plan_days(range, |w| {
        probed.push(w);
        ready(Ok(Existence::Absent))
    })
    .await;

    let keys: Vec<String> = probed.iter().map(|w| w.key()).collect();
    assert_eq!(
        keys,
        vec!["2023-02-27", "2023-02-28", "2023-03-01", "2023-03-02"]
    );
}

#[tokio::test]
async fn probe_errors_skip_the_day_without_failing() {
    let range = DateRange::new(day(6, 1), day(6, 3));
    let plan = plan_days(range, |w| {
        ready(if w.day() == day(6, 3) {
            Err(ExportError::storage(w.key(), "permission denied"))
        } else {
            Ok(Existence::Absent)
        })
    })
    .await;

    assert_eq!(plan.pending.len(), 2);
    assert!(plan.pending.iter().all(|w| w.day() != day(6, 3)));
    assert_eq!(plan.probe_failures.len(), 1);
    assert!(matches!(
        plan.probe_failures[0],
        ExportError::DedupCheck { day: d, .. } if d == day(6, 3)
    ));
}

#[tokio::test]
async fn reversed_range_plans_nothing() {
    let range = DateRange::new(day(6, 3), day(6, 1));
    let plan = plan_days(range, |_w| ready(Ok(Existence::Absent))).await;
    assert!(plan.pending.is_empty());
}

#[tokio::test]
async fn pending_is_range_minus_existing_for_many_ranges() {
    let starts = [day(1, 1), day(2, 20), day(12, 25)];
    let lengths = [0u64, 1, 6, 40];

    for start in starts {
        for len in lengths {
            let end = start + chrono::Days::new(len);
            let range = DateRange::new(start, end);
            let exists = |d: NaiveDate| d.ordinal() % 3 == 0;

            let plan = plan_days(range, |w| {
                ready(Ok(if exists(w.day()) {
                    present(w)
                } else {
                    Existence::Absent
                }))
            })
            .await;

            let expected: HashSet<NaiveDate> = range
                .windows()
                .map(|w| w.day())
                .filter(|d| !exists(*d))
                .collect();
            let pending: HashSet<NaiveDate> = plan.pending.iter().map(|w| w.day()).collect();

            assert_eq!(pending, expected, "range {start}..={end}");
            assert!(pending.iter().all(|d| *d >= start && *d <= end));
            assert_eq!(plan.pending.len() + plan.existing.len(), len as usize + 1);
        }
    }
}
