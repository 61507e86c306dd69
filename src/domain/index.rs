//! Index snapshot and composition-change records.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;

use super::error::EwindexError;
use super::stock::{IndexMember, Stock};

/// An equal-weighted index snapshot for one trading day.
///
/// Snapshots are immutable: composition changes and rebalances always build a
/// new snapshot from the old one. The published level is derived, never
/// stored.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IndexSnapshot {
    date: NaiveDate,
    base_date: NaiveDate,
    base_value: f64,
    divisor: f64,
    members: Vec<IndexMember>,
}

impl IndexSnapshot {
    /// Build the inception snapshot. The divisor is derived from the members:
    /// total market value over the base value.
    pub fn at_base_date(
        date: NaiveDate,
        base_value: f64,
        members: Vec<IndexMember>,
        size: usize,
    ) -> Result<Self, EwindexError> {
        Self::validate_members(date, &members, size)?;
        let total: f64 = members.iter().map(|m| m.market_value()).sum();
        Ok(Self {
            date,
            base_date: date,
            base_value,
            divisor: total / base_value,
            members,
        })
    }

    /// Build a snapshot for any date on or after inception. The caller
    /// supplies the divisor: either the prior day's unchanged, or a
    /// recomputed continuity divisor.
    pub fn with_divisor(
        date: NaiveDate,
        base_date: NaiveDate,
        base_value: f64,
        divisor: f64,
        members: Vec<IndexMember>,
        size: usize,
    ) -> Result<Self, EwindexError> {
        if date < base_date {
            return Err(EwindexError::DateBeforeBase { date, base_date });
        }
        Self::validate_members(date, &members, size)?;
        Ok(Self {
            date,
            base_date,
            base_value,
            divisor,
            members,
        })
    }

    fn validate_members(
        date: NaiveDate,
        members: &[IndexMember],
        size: usize,
    ) -> Result<(), EwindexError> {
        if members.len() != size {
            return Err(EwindexError::WrongMemberCount {
                date,
                expected: size,
                actual: members.len(),
            });
        }
        let distinct: HashSet<&str> = members.iter().map(|m| m.stock.ticker.as_str()).collect();
        if distinct.len() != size {
            return Err(EwindexError::WrongMemberCount {
                date,
                expected: size,
                actual: distinct.len(),
            });
        }
        Ok(())
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn base_date(&self) -> NaiveDate {
        self.base_date
    }

    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    pub fn divisor(&self) -> f64 {
        self.divisor
    }

    pub fn members(&self) -> &[IndexMember] {
        &self.members
    }

    pub fn total_market_value(&self) -> f64 {
        self.members.iter().map(|m| m.market_value()).sum()
    }

    /// The published index level.
    pub fn value(&self) -> f64 {
        self.total_market_value() / self.divisor
    }
}

/// What happened to a constituent between two consecutive snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChangeKind {
    /// Entered the top-N by market cap.
    Add,
    /// Dropped out of the top-N.
    Remove,
    /// Kept its seat but its notional share count moved.
    Rebalance,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "ADD",
            ChangeKind::Remove => "REMOVE",
            ChangeKind::Rebalance => "REBALANCE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADD" => Some(ChangeKind::Add),
            "REMOVE" => Some(ChangeKind::Remove),
            "REBALANCE" => Some(ChangeKind::Rebalance),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the composition audit trail. Derived by diffing snapshots,
/// never part of index state itself.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Change {
    pub date: NaiveDate,
    pub kind: ChangeKind,
    pub stock: Stock,
}
