//! Usability check applied to every pushed record.
//!
//! This predicate is the only gate between "accept into the cache" and
//! "move the symbol to its next provider".

use log::debug;
use stock_common::StockDataRecord;

/// Returns `true` when `record` can be served to callers.
///
/// A record is rejected when it is absent or empty, when the provider reported
/// a non-zero `fail_count`, or when the price is missing or zero.
pub fn is_valid(record: Option<&StockDataRecord>) -> bool {
    let Some(record) = record else {
        debug!("is_valid: no record");
        return false;
    };
    if record.is_empty() {
        debug!("is_valid: {} record is empty", record.symbol);
        return false;
    }
    if record.fail_count > 0 {
        debug!("is_valid: {} failCount = {}", record.symbol, record.fail_count);
        return false;
    }
    match record.price {
        Some(price) if price != 0.0 => true,
        _ => {
            debug!("is_valid: {} price missing or zero", record.symbol);
            false
        }
    }
}
