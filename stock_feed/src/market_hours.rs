//! Trading session check for the London exchange.
//!
//! Providers use this to decide whether to keep polling and to label their
//! status. Time is evaluated in `Europe/London`, so the session follows BST/GMT.

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

/// Status label while the session is open.
pub const MARKET_OPEN: &str = "Market Open";
/// Status label outside the session.
pub const MARKET_CLOSED: &str = "Market Closed";

/// Opening hours of a single exchange.
#[derive(Debug, Clone)]
pub struct MarketHours {
    tz: Tz,
    open: NaiveTime,
    close: NaiveTime,
    trading_days: Vec<Weekday>,
}

impl Default for MarketHours {
    fn default() -> Self {
        Self::london()
    }
}

impl MarketHours {
    /// London session: 08:00 to 16:30, Monday to Friday.
    pub fn london() -> Self {
        MarketHours {
            tz: chrono_tz::Europe::London,
            open: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(16, 30, 0).unwrap_or(NaiveTime::MIN),
            trading_days: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
        }
    }

    /// Whether the session is open at `instant`. Both bounds are exclusive.
    pub fn is_open_at(&self, instant: DateTime<Utc>) -> bool {
        let local = instant.with_timezone(&self.tz);
        let time = local.time();
        self.trading_days.contains(&local.weekday()) && time > self.open && time < self.close
    }

    /// Whether the session is open now.
    pub fn is_open(&self) -> bool {
        self.is_open_at(Utc::now())
    }

    /// `Market Open` or `Market Closed` for the current time.
    pub fn status_label(&self) -> &'static str {
        if self.is_open() { MARKET_OPEN } else { MARKET_CLOSED }
    }
}
