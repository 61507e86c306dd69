//! Stock universe port trait.

use crate::domain::error::EwindexError;
use crate::domain::stock::Stock;
use chrono::NaiveDate;

pub trait UniversePort {
    /// Every stock observed for the date, with its price and shares
    /// outstanding. May return fewer stocks than the index size; the
    /// composer treats that as fatal, not this port.
    fn fetch_stocks_for_date(&self, date: NaiveDate) -> Result<Vec<Stock>, EwindexError>;
}
