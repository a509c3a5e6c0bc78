//! Walks every page of one day through a [`PageSource`].
//!
//! Pagination is a small state machine: fetch without a token, then keep
//! following the token of the page that was just fetched until a page
//! comes back without one. Both streams are lazy: page N+1 is only
//! requested once page N has been consumed. The first error ends the stream.

use futures::stream::{self, Stream, TryStreamExt};
use tracing::{debug, info};

use crate::contract::PageSource;
use crate::error::ExportError;
use crate::model::{DateWindow, LogEntry, LogPage};

enum Cursor {
    First,
    Next(String),
    Exhausted,
}

/// Pages of `window` in API order.
pub fn extract_day_pages<P>(
    source: &P,
    window: DateWindow,
) -> impl Stream<Item = Result<LogPage, ExportError>> + Send + '_
where
    P: PageSource + ?Sized,
{
    stream::try_unfold((Cursor::First, 0usize), move |(cursor, fetched)| async move {
        let token = match cursor {
            Cursor::Exhausted => return Ok(None),
            Cursor::First => None,
            Cursor::Next(token) => Some(token),
        };
        let page = source.fetch(token, window).await?;
        let fetched = fetched + 1;
        if fetched == 1 {
            info!(
                day = %window,
                start = %page.start_time,
                end = %page.end_time,
                "[FETCH] Getting logs for window"
            );
        }
        let next = match page.next_token() {
            Some(token) => Cursor::Next(token.to_string()),
            None => {
                debug!(day = %window, pages = fetched, "[FETCH] Reached last page");
                Cursor::Exhausted
            }
        };
        Ok(Some((page, (next, fetched))))
    })
}

/// Entries of `window`, in page order and in order within each page.
pub fn extract_day<P>(
    source: &P,
    window: DateWindow,
) -> impl Stream<Item = Result<LogEntry, ExportError>> + Send + '_
where
    P: PageSource + ?Sized,
{
    extract_day_pages(source, window)
        .map_ok(|page| stream::iter(page.logs.into_iter().map(Ok::<_, ExportError>)))
        .try_flatten()
}
