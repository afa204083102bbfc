//! One polling pass shared by the network adapters.
//!
//! A pass swaps in any pending symbol list, decides whether to fetch at all,
//! fetches the next slice of the active list and pushes only the records whose
//! content changed. The cursor walks the list slice by slice and wraps around;
//! the first full walk is the "first pass" and runs on a shorter delay.

use std::time::Duration;

use stock_common::{Result, StockDataRecord};

use crate::adapter::PushCallback;
use crate::providers::book::SymbolBook;

/// Delay while there is nothing to fetch.
pub(crate) const IDLE_TICK: Duration = Duration::from_secs(1);

/// Slice size and delays of one adapter.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Schedule {
    pub batch_size: usize,
    pub first_pass: Duration,
    pub when_open: Duration,
    pub when_closed: Duration,
}

/// Position in the active list between passes.
#[derive(Debug)]
pub(crate) struct BatchCursor {
    next_index: usize,
    first_pass: bool,
}

impl Default for BatchCursor {
    fn default() -> Self {
        BatchCursor {
            next_index: 0,
            first_pass: true,
        }
    }
}

/// Runs one pass and returns the delay before the next one.
///
/// With `only_when_open` set and the market closed, nothing is fetched once the
/// first pass is over unless the symbol list just changed.
pub(crate) fn run_pass<F>(
    book: &SymbolBook,
    cursor: &mut BatchCursor,
    schedule: &Schedule,
    market_open: bool,
    only_when_open: bool,
    callback: &PushCallback,
    mut fetch: F,
) -> Result<Duration>
where
    F: FnMut(&[String]) -> Vec<StockDataRecord>,
{
    let list_changed = book.take_pending()?;
    let force = cursor.first_pass || !only_when_open || market_open;
    if !(list_changed || force) {
        return Ok(IDLE_TICK);
    }

    let symbols = book.active()?;
    if symbols.is_empty() {
        return Ok(IDLE_TICK);
    }
    if cursor.next_index >= symbols.len() {
        cursor.next_index = 0;
    }
    let end = (cursor.next_index + schedule.batch_size.max(1)).min(symbols.len());

    let mut changed = Vec::new();
    for record in fetch(&symbols[cursor.next_index..end]) {
        if book.update(record.clone())? {
            changed.push(record);
        }
    }
    for record in changed {
        let symbol = record.symbol.clone();
        callback(&symbol, Some(record));
    }

    if end >= symbols.len() {
        cursor.next_index = 0;
        cursor.first_pass = false;
    } else {
        cursor.next_index = end;
    }

    Ok(if cursor.first_pass {
        schedule.first_pass
    } else if market_open {
        schedule.when_open
    } else {
        schedule.when_closed
    })
}
