//! Daily and cumulative index returns from a series of snapshots.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::error::EwindexError;
use super::index::IndexSnapshot;

/// Returns for one date. `daily_return` is against the previous snapshot in
/// the series, `cumulative_return` against the window's reference level.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Return {
    pub daily_return: Option<f64>,
    pub cumulative_return: f64,
}

/// Compute per-date returns from a snapshot series covering one trading day
/// before `start_date` through the window end.
///
/// The leading snapshot exists only to seed the first daily return and is
/// excluded from the output. `today` is the evaluation clock; a window
/// ending past it is rejected.
pub fn compute_returns(
    series: &[IndexSnapshot],
    start_date: NaiveDate,
    today: NaiveDate,
) -> Result<BTreeMap<NaiveDate, Return>, EwindexError> {
    if series.len() < 2 {
        return Err(EwindexError::InsufficientSeries {
            points: series.len(),
        });
    }

    let mut ordered: Vec<&IndexSnapshot> = series.iter().collect();
    ordered.sort_by_key(|s| s.date());

    let base_date = ordered[0].base_date();
    let t1 = ordered[1].date();
    let t2 = ordered[ordered.len() - 1].date();

    if t1 < base_date {
        return Err(EwindexError::WindowBeforeBase {
            start: t1,
            base_date,
        });
    }
    if t2 > today {
        return Err(EwindexError::WindowInFuture { end: t2, today });
    }

    let values: Vec<f64> = ordered.iter().map(|s| s.value()).collect();

    // Cumulative reference: the first element when the caller included the
    // start date itself there, otherwise the first in-window snapshot.
    let reference_idx = usize::from(ordered[0].date() != start_date);
    let reference_value = values[reference_idx];

    let mut returns = BTreeMap::new();
    for (i, snapshot) in ordered.iter().enumerate().skip(1) {
        // Every emitted date has a predecessor; only the dropped anchor
        // would not.
        let daily_return = Some((values[i] - values[i - 1]) / values[i - 1]);
        let cumulative_return = (values[i] - reference_value) / reference_value;
        returns.insert(
            snapshot.date(),
            Return {
                daily_return,
                cumulative_return,
            },
        );
    }

    Ok(returns)
}
