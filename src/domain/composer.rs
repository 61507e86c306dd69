//! Index composition: constituent selection, continuity adjustment,
//! equal-weight rebalancing, and change tracking.
//!
//! Everything here works on in-memory domain values; persistence stays
//! behind the ports.

use chrono::NaiveDate;
use std::collections::HashMap;

use super::calendar::TradingCalendar;
use super::error::EwindexError;
use super::index::{Change, ChangeKind, IndexSnapshot};
use super::settings::IndexSettings;
use super::stock::{IndexMember, Stock};
use crate::ports::history_port::HistoryPort;
use crate::ports::universe_port::UniversePort;

/// Absolute tolerance for the "input is already balanced" precondition of
/// the continuity adjustment.
pub const BALANCE_TOLERANCE: f64 = 1e-6;

/// Drift below this is left alone when rebalancing, and ignored when
/// diffing notional share counts.
pub const REBALANCE_TOLERANCE: f64 = 1e-8;

/// The `count` stocks with the highest market cap, highest first. Stable:
/// equal market caps keep input order. May return fewer than `count`; the
/// orchestrator rejects that case.
pub fn select_constituents(stocks: &[Stock], count: usize) -> Vec<Stock> {
    let mut ranked = stocks.to_vec();
    ranked.sort_by(|a, b| b.market_cap().total_cmp(&a.market_cap()));
    ranked.truncate(count);
    ranked
}

/// Replace the members of a balanced index with `new_stocks`, keeping the
/// published level continuous.
///
/// The input must already be equal-weighted (the caller rebalances first);
/// the common per-member value becomes the target dollar value for every
/// replacement stock, and the divisor is recomputed so that
/// `new.value() == old.value()`.
pub fn adjust_for_continuity(
    old_index: &IndexSnapshot,
    new_stocks: &[Stock],
) -> Result<IndexSnapshot, EwindexError> {
    let size = old_index.members().len();
    if new_stocks.len() != size {
        return Err(EwindexError::SizeMismatch {
            members: size,
            replacement: new_stocks.len(),
        });
    }

    let target_value = match old_index.members().first() {
        Some(m) => m.market_value(),
        None => {
            return Err(EwindexError::WrongMemberCount {
                date: old_index.date(),
                expected: 1,
                actual: 0,
            });
        }
    };
    for member in old_index.members() {
        let value = member.market_value();
        if (value - target_value).abs() >= BALANCE_TOLERANCE {
            return Err(EwindexError::NotBalanced {
                date: old_index.date(),
                ticker: member.stock.ticker.clone(),
                value,
                target: target_value,
            });
        }
    }

    let new_members: Vec<IndexMember> = new_stocks
        .iter()
        .map(|stock| IndexMember {
            stock: stock.clone(),
            notional_num_shares: target_value / stock.price,
        })
        .collect();

    let market_value_new: f64 = new_members.iter().map(|m| m.market_value()).sum();
    // Dividing the new total by the old level is exactly what pins the new
    // level to the old one.
    let divisor = market_value_new / old_index.value();

    IndexSnapshot::with_divisor(
        old_index.date(),
        old_index.base_date(),
        old_index.base_value(),
        divisor,
        new_members,
        size,
    )
}

/// Redistribute notional shares so every member carries the same dollar
/// value again. Same member set, same divisor: the published level only
/// moves by floating-point noise.
pub fn rebalance_to_equal_weight(index: &IndexSnapshot) -> Result<IndexSnapshot, EwindexError> {
    let n = index.members().len();
    let target_value = index.total_market_value() / n as f64;

    let mut new_members = Vec::with_capacity(n);
    for member in index.members() {
        let current_value = member.market_value();
        if (current_value - target_value).abs() < REBALANCE_TOLERANCE {
            // Already on target; don't churn the share count.
            new_members.push(member.clone());
            continue;
        }
        new_members.push(IndexMember {
            stock: member.stock.clone(),
            notional_num_shares: target_value / member.stock.price,
        });
    }

    IndexSnapshot::with_divisor(
        index.date(),
        index.base_date(),
        index.base_value(),
        index.divisor(),
        new_members,
        n,
    )
}

/// The audit trail between two consecutive snapshots: ADD for stocks only in
/// the new one, REMOVE for stocks only in the old one, REBALANCE for common
/// stocks whose notional share count moved beyond tolerance. All rows carry
/// the new snapshot's date.
pub fn diff_composition(old_index: &IndexSnapshot, new_index: &IndexSnapshot) -> Vec<Change> {
    let old_members: HashMap<&str, &IndexMember> = old_index
        .members()
        .iter()
        .map(|m| (m.stock.ticker.as_str(), m))
        .collect();
    let new_members: HashMap<&str, &IndexMember> = new_index
        .members()
        .iter()
        .map(|m| (m.stock.ticker.as_str(), m))
        .collect();

    let mut changes = Vec::new();

    for member in new_index.members() {
        if !old_members.contains_key(member.stock.ticker.as_str()) {
            changes.push(Change {
                date: new_index.date(),
                kind: ChangeKind::Add,
                stock: member.stock.clone(),
            });
        }
    }

    for member in old_index.members() {
        if !new_members.contains_key(member.stock.ticker.as_str()) {
            changes.push(Change {
                date: new_index.date(),
                kind: ChangeKind::Remove,
                stock: member.stock.clone(),
            });
        }
    }

    for member in old_index.members() {
        if let Some(new_member) = new_members.get(member.stock.ticker.as_str()) {
            let drift = (member.notional_num_shares - new_member.notional_num_shares).abs();
            if drift > REBALANCE_TOLERANCE {
                changes.push(Change {
                    date: new_index.date(),
                    kind: ChangeKind::Rebalance,
                    stock: new_member.stock.clone(),
                });
            }
        }
    }

    changes
}

/// Compose the index for one trading day.
///
/// On the base date the top-N stocks each get an equal share of the base
/// value and the divisor is pinned at 1.0. On any later date the prior day's
/// snapshot must already exist: its members are repriced at today's market,
/// rebalanced back to equal weight, and then swapped onto today's top-N with
/// the continuity adjustment. The returned changes diff the prior snapshot
/// against the new one.
pub fn compose_index_for_date(
    target_date: NaiveDate,
    settings: &IndexSettings,
    calendar: &TradingCalendar,
    universe: &dyn UniversePort,
    history: &dyn HistoryPort,
) -> Result<(IndexSnapshot, Vec<Change>), EwindexError> {
    let stocks = universe.fetch_stocks_for_date(target_date)?;
    let top_stocks = select_constituents(&stocks, settings.size);
    if top_stocks.len() < settings.size {
        return Err(EwindexError::InsufficientUniverse {
            date: target_date,
            available: top_stocks.len(),
            required: settings.size,
        });
    }

    if target_date == settings.base_date {
        let target_weight = settings.base_value / settings.size as f64;
        let members: Vec<IndexMember> = top_stocks
            .into_iter()
            .map(|stock| {
                let notional_num_shares = target_weight / stock.price;
                IndexMember {
                    stock,
                    notional_num_shares,
                }
            })
            .collect();

        // Nothing precedes inception: the level is the base value and the
        // divisor is exactly 1.0.
        let index = IndexSnapshot::with_divisor(
            target_date,
            settings.base_date,
            settings.base_value,
            1.0,
            members,
            settings.size,
        )?;
        return Ok((index, Vec::new()));
    }

    let prev_date = calendar.prev_trading_day(target_date);
    let prior = history.load_index_for_dates(settings, &[prev_date])?;
    let old_index = prior
        .get(&prev_date)
        .ok_or(EwindexError::MissingPriorIndex {
            date: target_date,
            prior: prev_date,
        })?;

    // Shadow index: yesterday's membership and weights at today's prices.
    // A prior member absent from today's universe is a data-completeness
    // failure, never a silent drop.
    let by_ticker: HashMap<&str, &Stock> =
        stocks.iter().map(|s| (s.ticker.as_str(), s)).collect();
    let mut shadow_members = Vec::with_capacity(old_index.members().len());
    for member in old_index.members() {
        let ticker = member.stock.ticker.as_str();
        let updated = by_ticker
            .get(ticker)
            .ok_or_else(|| EwindexError::MissingMemberData {
                ticker: ticker.to_string(),
                date: target_date,
            })?;
        shadow_members.push(IndexMember {
            stock: (*updated).clone(),
            notional_num_shares: member.notional_num_shares,
        });
    }
    let shadow = IndexSnapshot::with_divisor(
        target_date,
        old_index.base_date(),
        old_index.base_value(),
        old_index.divisor(),
        shadow_members,
        settings.size,
    )?;

    // Price drift first, membership swap second; each step owns exactly one
    // adjustment.
    let balanced = rebalance_to_equal_weight(&shadow)?;
    let new_index = adjust_for_continuity(&balanced, &top_stocks)?;
    let changes = diff_composition(old_index, &new_index);

    Ok((new_index, changes))
}
