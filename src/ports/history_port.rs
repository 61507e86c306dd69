//! Index history store port trait.

use crate::domain::error::EwindexError;
use crate::domain::index::{Change, IndexSnapshot};
use crate::domain::settings::IndexSettings;
use chrono::NaiveDate;
use std::collections::HashMap;

pub trait HistoryPort {
    /// Stored snapshots for the requested dates. Dates with nothing stored
    /// are simply absent from the map; callers decide whether a gap is
    /// fatal (the composer treats a missing prior day as such).
    fn load_index_for_dates(
        &self,
        settings: &IndexSettings,
        dates: &[NaiveDate],
    ) -> Result<HashMap<NaiveDate, IndexSnapshot>, EwindexError>;

    /// Stored composition changes grouped by date. Dates without changes are
    /// absent from the map.
    fn load_changes_for_dates(
        &self,
        dates: &[NaiveDate],
    ) -> Result<HashMap<NaiveDate, Vec<Change>>, EwindexError>;

    /// Idempotent upsert keyed by date. Re-running composition for an
    /// already-composed date must leave identical rows behind.
    fn save_index(&self, index: &IndexSnapshot) -> Result<(), EwindexError>;

    /// Idempotent upsert keyed by (date, stock, kind).
    fn save_changes(&self, changes: &[Change]) -> Result<(), EwindexError>;

    /// (first, last, count) of composed dates, if any.
    fn composed_date_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, EwindexError>;
}
