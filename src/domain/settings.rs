//! Index settings: size, base date, base value.
//!
//! Read once per run from the `[index]` config section and treated as
//! immutable for the duration of any composition or returns computation.

use chrono::NaiveDate;

use crate::domain::error::EwindexError;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexSettings {
    /// Number of constituents (N).
    pub size: usize,
    /// Inception date.
    pub base_date: NaiveDate,
    /// Index level defined at inception.
    pub base_value: f64,
}

impl IndexSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EwindexError> {
        if config.get_string("index", "size").is_none() {
            return Err(EwindexError::ConfigMissing {
                section: "index".into(),
                key: "size".into(),
            });
        }
        let size = config.get_int("index", "size", 0);
        if size <= 0 {
            return Err(EwindexError::ConfigInvalid {
                section: "index".into(),
                key: "size".into(),
                reason: "size must be a positive integer".into(),
            });
        }

        let base_date_str =
            config
                .get_string("index", "base_date")
                .ok_or_else(|| EwindexError::ConfigMissing {
                    section: "index".into(),
                    key: "base_date".into(),
                })?;
        let base_date = NaiveDate::parse_from_str(&base_date_str, "%Y-%m-%d").map_err(|_| {
            EwindexError::ConfigInvalid {
                section: "index".into(),
                key: "base_date".into(),
                reason: "invalid date format, expected YYYY-MM-DD".into(),
            }
        })?;

        if config.get_string("index", "base_value").is_none() {
            return Err(EwindexError::ConfigMissing {
                section: "index".into(),
                key: "base_value".into(),
            });
        }
        let base_value = config.get_double("index", "base_value", 0.0);
        if base_value <= 0.0 {
            return Err(EwindexError::ConfigInvalid {
                section: "index".into(),
                key: "base_value".into(),
                reason: "base_value must be positive".into(),
            });
        }

        Ok(Self {
            size: size as usize,
            base_date,
            base_value,
        })
    }
}

/// Extra holidays from `[calendar] holidays`, a comma-separated date list.
/// An absent key means no extra holidays.
pub fn holidays_from_config(config: &dyn ConfigPort) -> Result<Vec<NaiveDate>, EwindexError> {
    let Some(raw) = config.get_string("calendar", "holidays") else {
        return Ok(Vec::new());
    };

    let mut holidays = Vec::new();
    for token in raw.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            continue;
        }
        let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
            EwindexError::ConfigInvalid {
                section: "calendar".into(),
                key: "holidays".into(),
                reason: format!("invalid date {trimmed}, expected YYYY-MM-DD"),
            }
        })?;
        holidays.push(date);
    }
    Ok(holidays)
}
