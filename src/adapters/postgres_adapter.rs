//! PostgreSQL store adapter.
//!
//! Same schema shape as the SQLite adapter, with native DATE columns and
//! ON CONFLICT upserts.

use crate::domain::error::EwindexError;
use crate::domain::index::{Change, ChangeKind, IndexSnapshot};
use crate::domain::settings::IndexSettings;
use crate::domain::stock::{IndexMember, MarketDataRow, Stock};
use crate::ports::config_port::ConfigPort;
use crate::ports::history_port::HistoryPort;
use crate::ports::universe_port::UniversePort;
use chrono::NaiveDate;
use postgres::{Client, NoTls};
use std::cell::RefCell;
use std::collections::HashMap;

pub struct PostgresAdapter {
    client: RefCell<Client>,
}

fn db_err(e: postgres::Error) -> EwindexError {
    EwindexError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: postgres::Error) -> EwindexError {
    EwindexError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EwindexError> {
        // Try [postgres] connection_string first, fall back to [database] conninfo
        let connection_string = config
            .get_string("postgres", "connection_string")
            .or_else(|| config.get_string("database", "conninfo"))
            .ok_or_else(|| EwindexError::ConfigMissing {
                section: "database".into(),
                key: "conninfo".into(),
            })?;

        let client = Client::connect(&connection_string, NoTls).map_err(db_err)?;

        Ok(Self {
            client: RefCell::new(client),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), EwindexError> {
        self.client
            .borrow_mut()
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS marketdata (
                    date DATE NOT NULL,
                    stock TEXT NOT NULL,
                    price DOUBLE PRECISION NOT NULL,
                    shares_outstanding DOUBLE PRECISION NOT NULL,
                    PRIMARY KEY (date, stock)
                );
                CREATE TABLE IF NOT EXISTS indexlevels (
                    date DATE PRIMARY KEY,
                    level DOUBLE PRECISION NOT NULL,
                    divisor DOUBLE PRECISION NOT NULL
                );
                CREATE TABLE IF NOT EXISTS members (
                    date DATE NOT NULL,
                    stock TEXT NOT NULL,
                    notional_num_shares DOUBLE PRECISION NOT NULL,
                    PRIMARY KEY (date, stock)
                );
                CREATE TABLE IF NOT EXISTS changes (
                    date DATE NOT NULL,
                    stock TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    PRIMARY KEY (date, stock, kind)
                );",
            )
            .map_err(query_err)
    }

    pub fn insert_market_data(&self, rows: &[MarketDataRow]) -> Result<(), EwindexError> {
        let mut client = self.client.borrow_mut();
        let mut tx = client.transaction().map_err(query_err)?;

        for row in rows {
            tx.execute(
                "INSERT INTO marketdata (date, stock, price, shares_outstanding)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (date, stock) DO UPDATE
                 SET price = EXCLUDED.price,
                     shares_outstanding = EXCLUDED.shares_outstanding",
                &[
                    &row.date,
                    &row.stock.ticker,
                    &row.stock.price,
                    &row.stock.shares_outstanding,
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }
}

impl UniversePort for PostgresAdapter {
    fn fetch_stocks_for_date(&self, date: NaiveDate) -> Result<Vec<Stock>, EwindexError> {
        let rows = self
            .client
            .borrow_mut()
            .query(
                "SELECT stock, price, shares_outstanding FROM marketdata
                 WHERE date = $1 ORDER BY stock",
                &[&date],
            )
            .map_err(query_err)?;

        Ok(rows
            .into_iter()
            .map(|row| Stock {
                ticker: row.get(0),
                price: row.get(1),
                shares_outstanding: row.get(2),
            })
            .collect())
    }
}

impl HistoryPort for PostgresAdapter {
    fn load_index_for_dates(
        &self,
        settings: &IndexSettings,
        dates: &[NaiveDate],
    ) -> Result<HashMap<NaiveDate, IndexSnapshot>, EwindexError> {
        let mut indexes = HashMap::new();

        for &date in dates {
            let level_rows = self
                .client
                .borrow_mut()
                .query(
                    "SELECT divisor FROM indexlevels WHERE date = $1",
                    &[&date],
                )
                .map_err(query_err)?;
            let Some(level_row) = level_rows.first() else {
                continue;
            };
            let divisor: f64 = level_row.get(0);

            let member_rows = self
                .client
                .borrow_mut()
                .query(
                    "SELECT m.stock, md.price, md.shares_outstanding, m.notional_num_shares
                     FROM members m
                     LEFT JOIN marketdata md ON md.date = m.date AND md.stock = m.stock
                     WHERE m.date = $1
                     ORDER BY m.stock",
                    &[&date],
                )
                .map_err(query_err)?;

            let mut members = Vec::with_capacity(member_rows.len());
            for row in member_rows {
                let ticker: String = row.get(0);
                let price: Option<f64> = row.get(1);
                let shares: Option<f64> = row.get(2);
                let (Some(price), Some(shares_outstanding)) = (price, shares) else {
                    return Err(EwindexError::MissingMemberData { ticker, date });
                };
                members.push(IndexMember {
                    stock: Stock {
                        ticker,
                        price,
                        shares_outstanding,
                    },
                    notional_num_shares: row.get(3),
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
        let mut changes_by_date: HashMap<NaiveDate, Vec<Change>> = HashMap::new();

        for &date in dates {
            let rows = self
                .client
                .borrow_mut()
                .query(
                    "SELECT c.kind, c.stock, md.price, md.shares_outstanding
                     FROM changes c
                     JOIN marketdata md ON md.date = c.date AND md.stock = c.stock
                     WHERE c.date = $1
                     ORDER BY c.kind, c.stock",
                    &[&date],
                )
                .map_err(query_err)?;

            for row in rows {
                let kind_str: String = row.get(0);
                let kind =
                    ChangeKind::parse(&kind_str).ok_or_else(|| EwindexError::DatabaseQuery {
                        reason: format!("unknown change kind {kind_str} for {date}"),
                    })?;
                changes_by_date.entry(date).or_default().push(Change {
                    date,
                    kind,
                    stock: Stock {
                        ticker: row.get(1),
                        price: row.get(2),
                        shares_outstanding: row.get(3),
                    },
                });
            }
        }

        Ok(changes_by_date)
    }

    fn save_index(&self, index: &IndexSnapshot) -> Result<(), EwindexError> {
        let mut client = self.client.borrow_mut();
        let mut tx = client.transaction().map_err(query_err)?;
        let date = index.date();

        tx.execute(
            "INSERT INTO indexlevels (date, level, divisor) VALUES ($1, $2, $3)
             ON CONFLICT (date) DO UPDATE
             SET level = EXCLUDED.level, divisor = EXCLUDED.divisor",
            &[&date, &index.value(), &index.divisor()],
        )
        .map_err(query_err)?;

        for member in index.members() {
            tx.execute(
                "INSERT INTO members (date, stock, notional_num_shares) VALUES ($1, $2, $3)
                 ON CONFLICT (date, stock) DO UPDATE
                 SET notional_num_shares = EXCLUDED.notional_num_shares",
                &[&date, &member.stock.ticker, &member.notional_num_shares],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    fn save_changes(&self, changes: &[Change]) -> Result<(), EwindexError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut client = self.client.borrow_mut();
        let mut tx = client.transaction().map_err(query_err)?;

        for change in changes {
            tx.execute(
                "INSERT INTO changes (date, stock, kind) VALUES ($1, $2, $3)
                 ON CONFLICT (date, stock, kind) DO NOTHING",
                &[&change.date, &change.stock.ticker, &change.kind.as_str()],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    fn composed_date_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, EwindexError> {
        let rows = self
            .client
            .borrow_mut()
            .query("SELECT MIN(date), MAX(date), COUNT(*) FROM indexlevels", &[])
            .map_err(query_err)?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let min: Option<NaiveDate> = row.get(0);
        let max: Option<NaiveDate> = row.get(1);
        let count: i64 = row.get(2);

        match (min, max) {
            (Some(min), Some(max)) if count > 0 => Ok(Some((min, max, count as usize))),
            _ => Ok(None),
        }
    }
}
