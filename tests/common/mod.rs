#![allow(dead_code)]

use chrono::NaiveDate;
use ewindex::domain::calendar::TradingCalendar;
use ewindex::domain::error::EwindexError;
use ewindex::domain::index::{Change, IndexSnapshot};
use ewindex::domain::settings::IndexSettings;
use ewindex::domain::stock::Stock;
use ewindex::ports::history_port::HistoryPort;
use ewindex::ports::universe_port::UniversePort;
use std::cell::RefCell;
use std::collections::HashMap;

pub struct MockUniversePort {
    pub data: HashMap<NaiveDate, Vec<Stock>>,
    pub errors: HashMap<NaiveDate, String>,
}

impl MockUniversePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_stocks(mut self, date: NaiveDate, stocks: Vec<Stock>) -> Self {
        self.data.insert(date, stocks);
        self
    }

    pub fn with_error(mut self, date: NaiveDate, reason: &str) -> Self {
        self.errors.insert(date, reason.to_string());
        self
    }
}

impl UniversePort for MockUniversePort {
    fn fetch_stocks_for_date(&self, date: NaiveDate) -> Result<Vec<Stock>, EwindexError> {
        if let Some(reason) = self.errors.get(&date) {
            return Err(EwindexError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(&date).cloned().unwrap_or_default())
    }
}

/// In-memory history store with interior mutability so tests can hand the
/// same instance to the composer loop and inspect what it saved.
pub struct MockHistoryPort {
    pub indexes: RefCell<HashMap<NaiveDate, IndexSnapshot>>,
    pub changes: RefCell<HashMap<NaiveDate, Vec<Change>>>,
}

impl MockHistoryPort {
    pub fn new() -> Self {
        Self {
            indexes: RefCell::new(HashMap::new()),
            changes: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_index(self, index: IndexSnapshot) -> Self {
        self.indexes.borrow_mut().insert(index.date(), index);
        self
    }
}

impl HistoryPort for MockHistoryPort {
    fn load_index_for_dates(
        &self,
        _settings: &IndexSettings,
        dates: &[NaiveDate],
    ) -> Result<HashMap<NaiveDate, IndexSnapshot>, EwindexError> {
        let stored = self.indexes.borrow();
        Ok(dates
            .iter()
            .filter_map(|d| stored.get(d).map(|i| (*d, i.clone())))
            .collect())
    }

    fn load_changes_for_dates(
        &self,
        dates: &[NaiveDate],
    ) -> Result<HashMap<NaiveDate, Vec<Change>>, EwindexError> {
        let stored = self.changes.borrow();
        Ok(dates
            .iter()
            .filter_map(|d| stored.get(d).map(|c| (*d, c.clone())))
            .collect())
    }

    fn save_index(&self, index: &IndexSnapshot) -> Result<(), EwindexError> {
        self.indexes
            .borrow_mut()
            .insert(index.date(), index.clone());
        Ok(())
    }

    fn save_changes(&self, changes: &[Change]) -> Result<(), EwindexError> {
        for change in changes {
            self.changes
                .borrow_mut()
                .entry(change.date)
                .or_default()
                .push(change.clone());
        }
        Ok(())
    }

    fn composed_date_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, EwindexError> {
        let stored = self.indexes.borrow();
        let min = stored.keys().min().copied();
        let max = stored.keys().max().copied();
        match (min, max) {
            (Some(min), Some(max)) => Ok(Some((min, max, stored.len()))),
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn stock(ticker: &str, price: f64, shares_outstanding: f64) -> Stock {
    Stock {
        ticker: ticker.to_string(),
        price,
        shares_outstanding,
    }
}

pub fn sample_settings(size: usize) -> IndexSettings {
    IndexSettings {
        size,
        base_date: date(2025, 1, 2),
        base_value: 1000.0,
    }
}

pub fn calendar() -> TradingCalendar {
    TradingCalendar::us_2025()
}
