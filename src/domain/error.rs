//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for ewindex.
#[derive(Debug, thiserror::Error)]
pub enum EwindexError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("universe for {date} has {available} stocks, index requires {required}")]
    InsufficientUniverse {
        date: NaiveDate,
        available: usize,
        required: usize,
    },

    #[error("no composed index for prior trading day {prior} (needed to compose {date})")]
    MissingPriorIndex { date: NaiveDate, prior: NaiveDate },

    #[error("member {ticker} has no market data for {date}")]
    MissingMemberData { ticker: String, date: NaiveDate },

    #[error("index for {date} is not equal-weighted: {ticker} carries {value}, expected {target}")]
    NotBalanced {
        date: NaiveDate,
        ticker: String,
        value: f64,
        target: f64,
    },

    #[error("index for {date} has {actual} distinct members, expected {expected}")]
    WrongMemberCount {
        date: NaiveDate,
        expected: usize,
        actual: usize,
    },

    #[error("index date {date} precedes base date {base_date}")]
    DateBeforeBase {
        date: NaiveDate,
        base_date: NaiveDate,
    },

    #[error("replacement list has {replacement} stocks, index has {members} members")]
    SizeMismatch { members: usize, replacement: usize },

    #[error("returns need at least 2 index snapshots, got {points}")]
    InsufficientSeries { points: usize },

    #[error("returns window start {start} precedes base date {base_date}")]
    WindowBeforeBase {
        start: NaiveDate,
        base_date: NaiveDate,
    },

    #[error("returns window end {end} is after today {today}")]
    WindowInFuture { end: NaiveDate, today: NaiveDate },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&EwindexError> for std::process::ExitCode {
    fn from(err: &EwindexError) -> Self {
        let code: u8 = match err {
            EwindexError::Io(_) => 1,
            EwindexError::ConfigParse { .. }
            | EwindexError::ConfigMissing { .. }
            | EwindexError::ConfigInvalid { .. } => 2,
            EwindexError::Database { .. } | EwindexError::DatabaseQuery { .. } => 3,
            EwindexError::NotBalanced { .. }
            | EwindexError::WrongMemberCount { .. }
            | EwindexError::DateBeforeBase { .. }
            | EwindexError::SizeMismatch { .. } => 4,
            EwindexError::InsufficientUniverse { .. }
            | EwindexError::MissingPriorIndex { .. }
            | EwindexError::MissingMemberData { .. }
            | EwindexError::InsufficientSeries { .. }
            | EwindexError::WindowBeforeBase { .. }
            | EwindexError::WindowInFuture { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
