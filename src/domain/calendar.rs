//! Trading-day arithmetic over an injected holiday table.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::HashSet;

/// A weekday-plus-holidays trading calendar. The holiday table is plain
/// injected data; no attempt is made to derive holidays from rules.
#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    holidays: HashSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(holidays: HashSet<NaiveDate>) -> Self {
        Self { holidays }
    }

    /// US market holidays for 2025.
    pub fn us_2025() -> Self {
        let holidays = [
            (1, 1),   // New Year's Day
            (1, 20),  // MLK Day
            (2, 17),  // Presidents Day
            (4, 18),  // Good Friday
            (5, 26),  // Memorial Day
            (6, 19),  // Juneteenth
            (7, 4),   // Independence Day
            (9, 1),   // Labor Day
            (11, 27), // Thanksgiving
            (12, 25), // Christmas Day
        ]
        .into_iter()
        .filter_map(|(m, d)| NaiveDate::from_ymd_opt(2025, m, d))
        .collect();
        Self { holidays }
    }

    pub fn with_holidays(mut self, extra: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(extra);
        self
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// The closest trading day strictly before `date`.
    pub fn prev_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut prev = date - Duration::days(1);
        while !self.is_trading_day(prev) {
            prev -= Duration::days(1);
        }
        prev
    }

    /// The closest trading day strictly after `date`.
    pub fn next_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut next = date + Duration::days(1);
        while !self.is_trading_day(next) {
            next += Duration::days(1);
        }
        next
    }

    /// A date the index can be composed for: a trading day on or after the
    /// index base date.
    pub fn is_valid_index_date(&self, date: NaiveDate, base_date: NaiveDate) -> bool {
        self.is_trading_day(date) && date >= base_date
    }
}
