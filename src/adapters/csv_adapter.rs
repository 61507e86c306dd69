//! CSV market-data adapter.
//!
//! Reads `date,stock,price,shares_outstanding` rows. Serves two purposes:
//! the source format for `ingest`, and a file-backed [`UniversePort`] for
//! runs without a database.

use crate::domain::error::EwindexError;
use crate::domain::stock::{MarketDataRow, Stock};
use crate::ports::universe_port::UniversePort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvUniverseAdapter {
    path: PathBuf,
}

impl CsvUniverseAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Every row in the file, in file order.
    pub fn read_rows(&self) -> Result<Vec<MarketDataRow>, EwindexError> {
        let content = fs::read_to_string(&self.path).map_err(|e| EwindexError::Database {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut rows = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| EwindexError::Database {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(0).ok_or_else(|| EwindexError::Database {
                reason: "missing date column".into(),
            })?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                EwindexError::Database {
                    reason: format!("invalid date format: {}", e),
                }
            })?;

            let ticker = record
                .get(1)
                .ok_or_else(|| EwindexError::Database {
                    reason: "missing stock column".into(),
                })?
                .trim()
                .to_string();
            if ticker.is_empty() {
                return Err(EwindexError::Database {
                    reason: "empty stock ticker".into(),
                });
            }

            let price: f64 = record
                .get(2)
                .ok_or_else(|| EwindexError::Database {
                    reason: "missing price column".into(),
                })?
                .parse()
                .map_err(|e| EwindexError::Database {
                    reason: format!("invalid price value: {}", e),
                })?;

            let shares_outstanding: f64 = record
                .get(3)
                .ok_or_else(|| EwindexError::Database {
                    reason: "missing shares_outstanding column".into(),
                })?
                .parse()
                .map_err(|e| EwindexError::Database {
                    reason: format!("invalid shares_outstanding value: {}", e),
                })?;

            rows.push(MarketDataRow {
                date,
                stock: Stock {
                    ticker,
                    price,
                    shares_outstanding,
                },
            });
        }

        Ok(rows)
    }
}

impl UniversePort for CsvUniverseAdapter {
    fn fetch_stocks_for_date(&self, date: NaiveDate) -> Result<Vec<Stock>, EwindexError> {
        let rows = self.read_rows()?;
        Ok(rows
            .into_iter()
            .filter(|r| r.date == date)
            .map(|r| r.stock)
            .collect())
    }
}
