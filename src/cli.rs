//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::calendar::TradingCalendar;
use crate::domain::error::EwindexError;
use crate::domain::settings::{holidays_from_config, IndexSettings};
use crate::ports::config_port::ConfigPort;
use crate::ports::history_port::HistoryPort;

#[derive(Parser, Debug)]
#[command(name = "ewindex", about = "Equal-weighted stock index engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compose the index for a date or date range
    Compose {
        #[arg(short, long)]
        config: PathBuf,
        /// Single date (YYYY-MM-DD); mutually exclusive with --from/--to
        #[arg(long, conflicts_with_all = ["from", "to"])]
        date: Option<NaiveDate>,
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
    },
    /// Print daily and cumulative returns over a window
    Returns {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Load market data from a CSV file into the store
    Ingest {
        #[arg(short, long)]
        config: PathBuf,
        /// CSV file with date,stock,price,shares_outstanding rows
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print composition changes over a window
    Changes {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Show the composed date range in the store
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Compose {
            config,
            date,
            from,
            to,
        } => run_compose(&config, date, from, to),
        Command::Returns { config, start, end } => run_returns(&config, start, end),
        Command::Ingest { config, file } => run_ingest(&config, &file),
        Command::Changes { config, from, to } => run_changes(&config, from, to),
        Command::Info { config } => run_info(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = EwindexError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn build_calendar(config: &dyn ConfigPort) -> Result<TradingCalendar, EwindexError> {
    let extra = holidays_from_config(config)?;
    Ok(TradingCalendar::us_2025().with_holidays(extra))
}

fn run_compose(
    config_path: &PathBuf,
    date: Option<NaiveDate>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let settings = match IndexSettings::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let calendar = match build_calendar(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let (start, end) = match (date, from, to) {
        (Some(d), _, _) => (d, d),
        (None, Some(f), Some(t)) if f <= t => (f, t),
        (None, Some(f), Some(t)) => {
            eprintln!("error: --from {f} is after --to {t}");
            return ExitCode::from(2);
        }
        _ => {
            eprintln!("error: either --date or --from/--to is required");
            return ExitCode::from(2);
        }
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::domain::composer::compose_index_for_date;

        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        if let Err(e) = store.initialize_schema() {
            eprintln!("error: {e}");
            return (&e).into();
        }

        let mut composed = 0usize;
        let mut day = start;
        while day <= end {
            if calendar.is_valid_index_date(day, settings.base_date) {
                let (index, changes) =
                    match compose_index_for_date(day, &settings, &calendar, &store, &store) {
                        Ok(result) => result,
                        Err(e) => {
                            eprintln!("error composing {day}: {e}");
                            return (&e).into();
                        }
                    };

                if let Err(e) = store.save_index(&index) {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
                if let Err(e) = store.save_changes(&changes) {
                    eprintln!("error: {e}");
                    return (&e).into();
                }

                eprintln!(
                    "Composed {}: level {:.4} ({} changes)",
                    day,
                    index.value(),
                    changes.len()
                );
                composed += 1;
            }

            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        eprintln!("Done: {composed} trading days composed");
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, settings, calendar, start, end);
        eprintln!("error: sqlite feature is required for compose");
        ExitCode::from(1)
    }
}

fn run_returns(config_path: &PathBuf, start: NaiveDate, end: NaiveDate) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let settings = match IndexSettings::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let calendar = match build_calendar(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if start > end {
        eprintln!("error: --start {start} is after --end {end}");
        return ExitCode::from(2);
    }

    // One extra trading day in front seeds the first daily return. On the
    // base date there is nothing earlier, so the window starts at inception.
    let anchor = if start > settings.base_date {
        calendar.prev_trading_day(start)
    } else {
        settings.base_date
    };

    let mut dates = Vec::new();
    let mut day = anchor;
    while day <= end {
        if calendar.is_valid_index_date(day, settings.base_date) {
            dates.push(day);
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::domain::returns::compute_returns;
        use crate::ports::history_port::HistoryPort;

        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let snapshots = match store.load_index_for_dates(&settings, &dates) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        for date in &dates {
            if !snapshots.contains_key(date) {
                eprintln!("error: no composed index for {date}; run compose first");
                return ExitCode::from(5);
            }
        }

        let series: Vec<_> = snapshots.values().cloned().collect();
        let today = chrono::Local::now().date_naive();
        let returns = match compute_returns(&series, start, today) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        println!(
            "{:<12} {:>12} {:>10} {:>12}",
            "date", "level", "daily", "cumulative"
        );
        for (date, ret) in &returns {
            let level = snapshots[date].value();
            let daily = ret
                .daily_return
                .map(|d| format!("{:>9.4}%", d * 100.0))
                .unwrap_or_else(|| format!("{:>10}", "-"));
            println!(
                "{:<12} {:>12.4} {} {:>11.4}%",
                date,
                level,
                daily,
                ret.cumulative_return * 100.0
            );
        }
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, dates, start);
        eprintln!("error: sqlite feature is required for returns");
        ExitCode::from(1)
    }
}

fn run_ingest(config_path: &PathBuf, file: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    use crate::adapters::csv_adapter::CsvUniverseAdapter;

    let rows = match CsvUniverseAdapter::new(file.clone()).read_rows() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Read {} market data rows from {}", rows.len(), file.display());

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        if let Err(e) = store.initialize_schema() {
            eprintln!("error: {e}");
            return (&e).into();
        }
        if let Err(e) = store.insert_market_data(&rows) {
            eprintln!("error: {e}");
            return (&e).into();
        }

        eprintln!("Ingested {} rows", rows.len());
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, rows);
        eprintln!("error: sqlite feature is required for ingest");
        ExitCode::from(1)
    }
}

fn run_changes(config_path: &PathBuf, from: NaiveDate, to: NaiveDate) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let settings = match IndexSettings::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let calendar = match build_calendar(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if from > to {
        eprintln!("error: --from {from} is after --to {to}");
        return ExitCode::from(2);
    }

    let mut dates = Vec::new();
    let mut day = from;
    while day <= to {
        if calendar.is_valid_index_date(day, settings.base_date) {
            dates.push(day);
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::ports::history_port::HistoryPort;

        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let changes_by_date = match store.load_changes_for_dates(&dates) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let mut total = 0usize;
        for date in &dates {
            let Some(changes) = changes_by_date.get(date) else {
                continue;
            };
            for change in changes {
                println!("{} {:<9} {}", change.date, change.kind, change.stock.ticker);
                total += 1;
            }
        }
        eprintln!("{total} changes between {from} and {to}");
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, dates);
        eprintln!("error: sqlite feature is required for changes");
        ExitCode::from(1)
    }
}

fn run_info(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::ports::history_port::HistoryPort;

        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        match store.composed_date_range() {
            Ok(Some((min, max, count))) => {
                println!("{count} composed days, {min} to {max}");
                ExitCode::SUCCESS
            }
            Ok(None) => {
                eprintln!("no composed index data");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                (&e).into()
            }
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        eprintln!("error: sqlite feature is required for info");
        ExitCode::from(1)
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let settings = match IndexSettings::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let calendar = match build_calendar(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if !calendar.is_trading_day(settings.base_date) {
        let err = EwindexError::ConfigInvalid {
            section: "index".into(),
            key: "base_date".into(),
            reason: format!("{} is not a trading day", settings.base_date),
        };
        eprintln!("error: {err}");
        return (&err).into();
    }

    eprintln!("\nIndex settings:");
    eprintln!("  size:       {}", settings.size);
    eprintln!("  base_date:  {}", settings.base_date);
    eprintln!("  base_value: {}", settings.base_value);
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
