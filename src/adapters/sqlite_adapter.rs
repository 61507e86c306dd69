//! SQLite store adapter: market data, index levels, members, and changes.

use crate::domain::error::EwindexError;
use crate::domain::index::{Change, ChangeKind, IndexSnapshot};
use crate::domain::settings::IndexSettings;
use crate::domain::stock::{IndexMember, MarketDataRow, Stock};
use crate::ports::config_port::ConfigPort;
use crate::ports::history_port::HistoryPort;
use crate::ports::universe_port::UniversePort;
use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::collections::HashMap;

const DATE_FMT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> EwindexError {
    EwindexError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> EwindexError {
    EwindexError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_row_date(date_str: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(date_str, DATE_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            date_str.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EwindexError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| EwindexError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, EwindexError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), EwindexError> {
        let conn = self.pool.get().map_err(pool_err)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS marketdata (
                date TEXT NOT NULL,
                stock TEXT NOT NULL,
                price REAL NOT NULL,
                shares_outstanding REAL NOT NULL,
                PRIMARY KEY (date, stock)
            );
            CREATE TABLE IF NOT EXISTS indexlevels (
                date TEXT PRIMARY KEY,
                level REAL NOT NULL,
                divisor REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS members (
                date TEXT NOT NULL,
                stock TEXT NOT NULL,
                notional_num_shares REAL NOT NULL,
                PRIMARY KEY (date, stock)
            );
            CREATE TABLE IF NOT EXISTS changes (
                date TEXT NOT NULL,
                stock TEXT NOT NULL,
                kind TEXT NOT NULL,
                PRIMARY KEY (date, stock, kind)
            );
            CREATE INDEX IF NOT EXISTS idx_members_date ON members(date);
            CREATE INDEX IF NOT EXISTS idx_changes_date ON changes(date);",
        )
        .map_err(query_err)?;

        Ok(())
    }

    /// Bulk upsert of market-data rows, keyed by (date, stock).
    pub fn insert_market_data(&self, rows: &[MarketDataRow]) -> Result<(), EwindexError> {
        let mut conn = self.pool.get().map_err(pool_err)?;
        let tx = conn.transaction().map_err(query_err)?;

        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO marketdata (date, stock, price, shares_outstanding)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    row.date.format(DATE_FMT).to_string(),
                    row.stock.ticker,
                    row.stock.price,
                    row.stock.shares_outstanding
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(())
    }
}

impl UniversePort for SqliteAdapter {
    fn fetch_stocks_for_date(&self, date: NaiveDate) -> Result<Vec<Stock>, EwindexError> {
        let conn = self.pool.get().map_err(pool_err)?;

        let mut stmt = conn
            .prepare(
                "SELECT stock, price, shares_outstanding FROM marketdata
                 WHERE date = ?1 ORDER BY stock",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![date.format(DATE_FMT).to_string()], |row| {
                Ok(Stock {
                    ticker: row.get(0)?,
                    price: row.get(1)?,
                    shares_outstanding: row.get(2)?,
                })
            })
            .map_err(query_err)?;

        let mut stocks = Vec::new();
        for row in rows {
            stocks.push(row.map_err(query_err)?);
        }
        Ok(stocks)
    }
}

impl HistoryPort for SqliteAdapter {
    fn load_index_for_dates(
        &self,
        settings: &IndexSettings,
        dates: &[NaiveDate],
    ) -> Result<HashMap<NaiveDate, IndexSnapshot>, EwindexError> {
        let conn = self.pool.get().map_err(pool_err)?;
        let mut indexes = HashMap::new();

        for &date in dates {
            let date_str = date.format(DATE_FMT).to_string();

            let divisor: Option<f64> = conn
                .query_row(
                    "SELECT divisor FROM indexlevels WHERE date = ?1",
                    params![date_str],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(query_err(other)),
                })?;
            let Some(divisor) = divisor else {
                // Nothing composed for this date; callers decide severity.
                continue;
            };

            // Member weights join the market data of the same date for
            // price and shares outstanding. A member without a market row
            // is incomplete data, not a smaller index.
            let mut stmt = conn
                .prepare(
                    "SELECT m.stock, md.price, md.shares_outstanding, m.notional_num_shares
                     FROM members m
                     LEFT JOIN marketdata md ON md.date = m.date AND md.stock = m.stock
                     WHERE m.date = ?1
                     ORDER BY m.stock",
                )
                .map_err(query_err)?;

            let rows = stmt
                .query_map(params![date_str], |row| {
                    let ticker: String = row.get(0)?;
                    let price: Option<f64> = row.get(1)?;
                    let shares: Option<f64> = row.get(2)?;
                    let notional: f64 = row.get(3)?;
                    Ok((ticker, price, shares, notional))
                })
                .map_err(query_err)?;

            let mut members = Vec::new();
            for row in rows {
                let (ticker, price, shares, notional_num_shares) = row.map_err(query_err)?;
                let (Some(price), Some(shares_outstanding)) = (price, shares) else {
                    return Err(EwindexError::MissingMemberData { ticker, date });
                };
                members.push(IndexMember {
                    stock: Stock {
                        ticker,
                        price,
                        shares_outstanding,
                    },
                    notional_num_shares,
                });
            }

            let snapshot = IndexSnapshot::with_divisor(
                date,
                settings.base_date,
                settings.base_value,
                divisor,
                members,
                settings.size,
            )?;
            indexes.insert(date, snapshot);
        }

        Ok(indexes)
    }

    fn load_changes_for_dates(
        &self,
        dates: &[NaiveDate],
    ) -> Result<HashMap<NaiveDate, Vec<Change>>, EwindexError> {
        let conn = self.pool.get().map_err(pool_err)?;
        let mut changes_by_date: HashMap<NaiveDate, Vec<Change>> = HashMap::new();

        let mut stmt = conn
            .prepare(
                "SELECT c.date, c.kind, c.stock, md.price, md.shares_outstanding
                 FROM changes c
                 JOIN marketdata md ON md.date = c.date AND md.stock = c.stock
                 WHERE c.date = ?1
                 ORDER BY c.kind, c.stock",
            )
            .map_err(query_err)?;

        for &date in dates {
            let rows = stmt
                .query_map(params![date.format(DATE_FMT).to_string()], |row| {
                    let date_str: String = row.get(0)?;
                    let date = parse_row_date(&date_str)?;
                    let kind_str: String = row.get(1)?;
                    Ok((
                        date,
                        kind_str,
                        Stock {
                            ticker: row.get(2)?,
                            price: row.get(3)?,
                            shares_outstanding: row.get(4)?,
                        },
                    ))
                })
                .map_err(query_err)?;

            for row in rows {
                let (row_date, kind_str, stock) = row.map_err(query_err)?;
                let kind =
                    ChangeKind::parse(&kind_str).ok_or_else(|| EwindexError::DatabaseQuery {
                        reason: format!("unknown change kind {kind_str} for {row_date}"),
                    })?;
                changes_by_date.entry(row_date).or_default().push(Change {
                    date: row_date,
                    kind,
                    stock,
                });
            }
        }

        Ok(changes_by_date)
    }

    fn save_index(&self, index: &IndexSnapshot) -> Result<(), EwindexError> {
        let mut conn = self.pool.get().map_err(pool_err)?;
        let tx = conn.transaction().map_err(query_err)?;
        let date_str = index.date().format(DATE_FMT).to_string();

        tx.execute(
            "INSERT OR REPLACE INTO indexlevels (date, level, divisor) VALUES (?1, ?2, ?3)",
            params![date_str, index.value(), index.divisor()],
        )
        .map_err(query_err)?;

        // Only the weights are ours; price and shares outstanding live in
        // marketdata and are managed by ingestion.
        for member in index.members() {
            tx.execute(
                "INSERT OR REPLACE INTO members (date, stock, notional_num_shares)
                 VALUES (?1, ?2, ?3)",
                params![date_str, member.stock.ticker, member.notional_num_shares],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(())
    }

    fn save_changes(&self, changes: &[Change]) -> Result<(), EwindexError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool.get().map_err(pool_err)?;
        let tx = conn.transaction().map_err(query_err)?;

        for change in changes {
            tx.execute(
                "INSERT OR REPLACE INTO changes (date, stock, kind) VALUES (?1, ?2, ?3)",
                params![
                    change.date.format(DATE_FMT).to_string(),
                    change.stock.ticker,
                    change.kind.as_str()
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(())
    }

    fn composed_date_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, EwindexError> {
        let conn = self.pool.get().map_err(pool_err)?;

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM indexlevels",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let min = NaiveDate::parse_from_str(&min_str, DATE_FMT)
                    .map_err(|e| EwindexError::Database {
                        reason: e.to_string(),
                    })?;
                let max = NaiveDate::parse_from_str(&max_str, DATE_FMT)
                    .map_err(|e| EwindexError::Database {
                        reason: e.to_string(),
                    })?;
                Ok(Some((min, max, count as usize)))
            }
            _ => Ok(None),
        }
    }
}
