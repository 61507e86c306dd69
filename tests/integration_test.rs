//! End-to-end composition tests.
//!
//! Tests cover:
//! - Inception composition from a mock universe
//! - Day-over-day roll-forward with price drift (REBALANCE changes)
//! - Membership swap with level continuity (ADD/REMOVE changes)
//! - Multi-day chains through the history port
//! - Failure modes: short universe, missing prior day, missing member data
//! - Full round trip through a seeded in-memory SQLite store
//! - Property checks for continuity, rebalancing, and change diffing

mod common;

use approx::assert_relative_eq;
use common::*;
use ewindex::domain::composer::{
    adjust_for_continuity, compose_index_for_date, diff_composition, rebalance_to_equal_weight,
};
use ewindex::domain::error::EwindexError;
use ewindex::domain::index::ChangeKind;

/// Jan 2 2025 universe: A and B lead by market cap, C trails.
fn base_universe() -> Vec<ewindex::domain::stock::Stock> {
    vec![
        stock("A", 10.0, 200_000.0), // cap 2.0M
        stock("B", 20.0, 75_000.0),  // cap 1.5M
        stock("C", 5.0, 100_000.0),  // cap 0.5M
    ]
}

mod inception {
    use super::*;

    #[test]
    fn base_date_composition_splits_base_value_equally() {
        let universe = MockUniversePort::new().with_stocks(date(2025, 1, 2), base_universe());
        let history = MockHistoryPort::new();

        let (index, changes) = compose_index_for_date(
            date(2025, 1, 2),
            &sample_settings(2),
            &calendar(),
            &universe,
            &history,
        )
        .unwrap();

        assert!(changes.is_empty());
        assert_eq!(index.divisor(), 1.0);
        assert_relative_eq!(index.value(), 1000.0, max_relative = 1e-12);

        // Top two by market cap, 500 of notional value each.
        let tickers: Vec<_> = index.members().iter().map(|m| &m.stock.ticker).collect();
        assert_eq!(tickers, ["A", "B"]);
        assert_relative_eq!(index.members()[0].notional_num_shares, 50.0);
        assert_relative_eq!(index.members()[1].notional_num_shares, 25.0);
    }

    #[test]
    fn short_universe_is_rejected() {
        let universe = MockUniversePort::new()
            .with_stocks(date(2025, 1, 2), vec![stock("A", 10.0, 200_000.0)]);
        let history = MockHistoryPort::new();

        let err = compose_index_for_date(
            date(2025, 1, 2),
            &sample_settings(2),
            &calendar(),
            &universe,
            &history,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EwindexError::InsufficientUniverse {
                available: 1,
                required: 2,
                ..
            }
        ));
    }
}

mod roll_forward {
    use super::*;

    /// Compose Jan 2, then roll to Jan 3 with A up 10%.
    fn compose_two_days() -> (MockHistoryPort, Vec<ewindex::domain::index::Change>) {
        let universe = MockUniversePort::new()
            .with_stocks(date(2025, 1, 2), base_universe())
            .with_stocks(
                date(2025, 1, 3),
                vec![
                    stock("A", 11.0, 200_000.0),
                    stock("B", 20.0, 75_000.0),
                    stock("C", 5.0, 100_000.0),
                ],
            );
        let history = MockHistoryPort::new();
        let settings = sample_settings(2);
        let cal = calendar();

        let (day0, _) =
            compose_index_for_date(date(2025, 1, 2), &settings, &cal, &universe, &history).unwrap();
        history.save_index(&day0).unwrap();

        let (day1, changes) =
            compose_index_for_date(date(2025, 1, 3), &settings, &cal, &universe, &history).unwrap();
        history.save_index(&day1).unwrap();
        (history, changes)
    }

    use ewindex::ports::history_port::HistoryPort;

    #[test]
    fn price_drift_moves_level_and_rebalances() {
        let (history, changes) = compose_two_days();

        let loaded = history
            .load_index_for_dates(&sample_settings(2), &[date(2025, 1, 3)])
            .unwrap();
        let day1 = &loaded[&date(2025, 1, 3)];

        // A went from 500 to 550 of notional value: level 1000 -> 1050.
        assert_relative_eq!(day1.value(), 1050.0, max_relative = 1e-9);

        // Same membership, both weights moved: two REBALANCE rows.
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Rebalance));
        assert!(changes.iter().all(|c| c.date == date(2025, 1, 3)));

        // Equal-weighted again after the roll.
        let v0 = day1.members()[0].market_value();
        let v1 = day1.members()[1].market_value();
        assert!((v0 - v1).abs() < 1e-6);
    }

    #[test]
    fn membership_swap_keeps_level_continuous() {
        let (history, _) = compose_two_days();
        let settings = sample_settings(2);
        let cal = calendar();

        // Monday Jan 6: C rockets to a 3.0M cap and displaces B.
        let universe = MockUniversePort::new().with_stocks(
            date(2025, 1, 6),
            vec![
                stock("A", 11.0, 200_000.0),
                stock("B", 20.0, 75_000.0),
                stock("C", 30.0, 100_000.0),
            ],
        );

        let (day2, changes) =
            compose_index_for_date(date(2025, 1, 6), &settings, &cal, &universe, &history).unwrap();

        // Prices did not move since Friday, so the level must not either.
        assert_relative_eq!(day2.value(), 1050.0, max_relative = 1e-9);

        let tickers: Vec<_> = day2.members().iter().map(|m| &m.stock.ticker).collect();
        assert_eq!(tickers, ["C", "A"]);

        assert_eq!(changes.len(), 2);
        assert!(changes
            .iter()
            .any(|c| c.kind == ChangeKind::Add && c.stock.ticker == "C"));
        assert!(changes
            .iter()
            .any(|c| c.kind == ChangeKind::Remove && c.stock.ticker == "B"));
    }

    #[test]
    fn missing_prior_day_is_fatal() {
        let universe = MockUniversePort::new().with_stocks(date(2025, 1, 3), base_universe());
        let history = MockHistoryPort::new();

        let err = compose_index_for_date(
            date(2025, 1, 3),
            &sample_settings(2),
            &calendar(),
            &universe,
            &history,
        )
        .unwrap_err();
        match err {
            EwindexError::MissingPriorIndex { date: d, prior } => {
                assert_eq!(d, date(2025, 1, 3));
                assert_eq!(prior, date(2025, 1, 2));
            }
            other => panic!("expected MissingPriorIndex, got: {other}"),
        }
    }

    #[test]
    fn prior_member_missing_from_universe_is_fatal() {
        let universe = MockUniversePort::new()
            .with_stocks(date(2025, 1, 2), base_universe())
            // B vanished from the Jan 3 feed.
            .with_stocks(
                date(2025, 1, 3),
                vec![stock("A", 11.0, 200_000.0), stock("C", 5.0, 100_000.0)],
            );
        let history = MockHistoryPort::new();
        let settings = sample_settings(2);
        let cal = calendar();

        let (day0, _) =
            compose_index_for_date(date(2025, 1, 2), &settings, &cal, &universe, &history).unwrap();
        history.save_index(&day0).unwrap();

        let err = compose_index_for_date(date(2025, 1, 3), &settings, &cal, &universe, &history)
            .unwrap_err();
        assert!(matches!(
            err,
            EwindexError::MissingMemberData { ticker, .. } if ticker == "B"
        ));
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_round_trip {
    use super::*;
    use ewindex::adapters::sqlite_adapter::SqliteAdapter;
    use ewindex::domain::stock::MarketDataRow;
    use ewindex::ports::history_port::HistoryPort;

    fn seeded_store() -> SqliteAdapter {
        let store = SqliteAdapter::in_memory().unwrap();
        store.initialize_schema().unwrap();

        let mut rows = Vec::new();
        for s in base_universe() {
            rows.push(MarketDataRow {
                date: date(2025, 1, 2),
                stock: s,
            });
        }
        for s in [
            stock("A", 11.0, 200_000.0),
            stock("B", 20.0, 75_000.0),
            stock("C", 5.0, 100_000.0),
        ] {
            rows.push(MarketDataRow {
                date: date(2025, 1, 3),
                stock: s,
            });
        }
        store.insert_market_data(&rows).unwrap();
        store
    }

    #[test]
    fn compose_persist_and_reload_two_days() {
        let store = seeded_store();
        let settings = sample_settings(2);
        let cal = calendar();

        for day in [date(2025, 1, 2), date(2025, 1, 3)] {
            let (index, changes) =
                compose_index_for_date(day, &settings, &cal, &store, &store).unwrap();
            store.save_index(&index).unwrap();
            store.save_changes(&changes).unwrap();
        }

        let loaded = store
            .load_index_for_dates(&settings, &[date(2025, 1, 2), date(2025, 1, 3)])
            .unwrap();
        assert_eq!(loaded.len(), 2);
        assert_relative_eq!(loaded[&date(2025, 1, 2)].value(), 1000.0, max_relative = 1e-9);
        assert_relative_eq!(loaded[&date(2025, 1, 3)].value(), 1050.0, max_relative = 1e-9);

        let changes = store.load_changes_for_dates(&[date(2025, 1, 3)]).unwrap();
        assert_eq!(changes[&date(2025, 1, 3)].len(), 2);

        let (min, max, count) = store.composed_date_range().unwrap().unwrap();
        assert_eq!((min, max, count), (date(2025, 1, 2), date(2025, 1, 3), 2));
    }

    #[test]
    fn recomposing_a_day_leaves_identical_state() {
        let store = seeded_store();
        let settings = sample_settings(2);
        let cal = calendar();

        let (first, _) =
            compose_index_for_date(date(2025, 1, 2), &settings, &cal, &store, &store).unwrap();
        store.save_index(&first).unwrap();

        // Same inputs, second run: byte-for-byte the same snapshot.
        let (second, changes) =
            compose_index_for_date(date(2025, 1, 2), &settings, &cal, &store, &store).unwrap();
        store.save_index(&second).unwrap();
        store.save_changes(&changes).unwrap();

        assert_eq!(first, second);
        let loaded = store
            .load_index_for_dates(&settings, &[date(2025, 1, 2)])
            .unwrap();
        assert_eq!(loaded[&date(2025, 1, 2)], first);
    }
}

mod returns_over_composed_series {
    use super::*;
    use ewindex::domain::returns::compute_returns;
    use ewindex::ports::history_port::HistoryPort;

    #[test]
    fn daily_and_cumulative_returns_from_roll_forward() {
        let universe = MockUniversePort::new()
            .with_stocks(date(2025, 1, 2), base_universe())
            .with_stocks(
                date(2025, 1, 3),
                vec![
                    stock("A", 11.0, 200_000.0),
                    stock("B", 20.0, 75_000.0),
                    stock("C", 5.0, 100_000.0),
                ],
            );
        let history = MockHistoryPort::new();
        let settings = sample_settings(2);
        let cal = calendar();

        let mut series = Vec::new();
        for day in [date(2025, 1, 2), date(2025, 1, 3)] {
            let (index, _) =
                compose_index_for_date(day, &settings, &cal, &universe, &history).unwrap();
            history.save_index(&index).unwrap();
            series.push(index);
        }

        let returns = compute_returns(&series, date(2025, 1, 2), date(2025, 12, 31)).unwrap();
        assert_eq!(returns.len(), 1);
        let r = &returns[&date(2025, 1, 3)];
        assert_relative_eq!(r.daily_return.unwrap(), 0.05, max_relative = 1e-9);
        assert_relative_eq!(r.cumulative_return, 0.05, max_relative = 1e-9);
    }
}

mod properties {
    use super::*;
    use ewindex::domain::index::IndexSnapshot;
    use ewindex::domain::stock::{IndexMember, Stock};
    use proptest::prelude::*;

    fn members_from_prices(prices: &[f64], per_member_value: f64) -> Vec<IndexMember> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| IndexMember {
                stock: Stock {
                    ticker: format!("S{i}"),
                    price,
                    shares_outstanding: 1_000_000.0,
                },
                notional_num_shares: per_member_value / price,
            })
            .collect()
    }

    fn replacement_from_prices(prices: &[f64]) -> Vec<Stock> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| Stock {
                ticker: format!("R{i}"),
                price,
                shares_outstanding: 1_000_000.0,
            })
            .collect()
    }

    proptest! {
        #[test]
        fn continuity_preserves_level(
            old_prices in prop::collection::vec(1.0f64..1000.0, 2..8),
            per_member in 100.0f64..10_000.0,
        ) {
            let n = old_prices.len();
            let new_prices: Vec<f64> = old_prices.iter().map(|p| p * 1.7 + 3.0).collect();

            let old = IndexSnapshot::with_divisor(
                date(2025, 1, 3),
                date(2025, 1, 2),
                1000.0,
                1.0,
                members_from_prices(&old_prices, per_member),
                n,
            )
            .unwrap();
            let new = adjust_for_continuity(&old, &replacement_from_prices(&new_prices)).unwrap();

            prop_assert!((new.value() - old.value()).abs() <= old.value().abs() * 1e-9);
        }

        #[test]
        fn rebalance_converges_to_equal_weight(
            entries in prop::collection::vec((1.0f64..1000.0, 1.0f64..1000.0), 2..8),
        ) {
            let n = entries.len();
            let members: Vec<IndexMember> = entries
                .iter()
                .enumerate()
                .map(|(i, &(price, notional))| IndexMember {
                    stock: Stock {
                        ticker: format!("S{i}"),
                        price,
                        shares_outstanding: 1_000_000.0,
                    },
                    notional_num_shares: notional,
                })
                .collect();
            let index = IndexSnapshot::with_divisor(
                date(2025, 1, 3),
                date(2025, 1, 2),
                1000.0,
                1.0,
                members,
                n,
            )
            .unwrap();

            let rebalanced = rebalance_to_equal_weight(&index).unwrap();

            let target = index.total_market_value() / n as f64;
            for member in rebalanced.members() {
                prop_assert!((member.market_value() - target).abs() <= target.abs() * 1e-9);
            }
            // Total exposure and divisor stay put.
            prop_assert!(
                (rebalanced.total_market_value() - index.total_market_value()).abs()
                    <= index.total_market_value() * 1e-9
            );
            prop_assert_eq!(rebalanced.divisor(), index.divisor());
        }

        #[test]
        fn diff_of_a_snapshot_with_itself_is_empty(
            prices in prop::collection::vec(1.0f64..1000.0, 2..8),
        ) {
            let n = prices.len();
            let index = IndexSnapshot::with_divisor(
                date(2025, 1, 3),
                date(2025, 1, 2),
                1000.0,
                1.0,
                members_from_prices(&prices, 500.0),
                n,
            )
            .unwrap();
            prop_assert!(diff_composition(&index, &index).is_empty());
        }
    }
}
