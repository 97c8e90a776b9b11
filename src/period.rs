use chrono::{Datelike, Duration, FixedOffset, NaiveDate};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeriodError {
    #[error("Unknown period '{0}' (expected today, this-week, this-month, this-quarter or YYYY-MM-DD)")]
    Unknown(String),
}

/// Time period a GitHub activity query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    ThisWeek,
    ThisMonth,
    ThisQuarter,
    /// A single explicit day
    Date(NaiveDate),
}

impl Period {
    /// Resolve the period into an inclusive date window ending on `today`.
    pub fn window(self, today: NaiveDate) -> DateWindow {
        let start = match self {
            Period::Today => today,
            Period::Date(day) => return DateWindow::single(day),
            Period::ThisWeek => {
                today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
            }
            Period::ThisMonth => today.with_day(1).unwrap_or(today),
            Period::ThisQuarter => {
                let first_month = (today.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(today.year(), first_month, 1).unwrap_or(today)
            }
        };
        DateWindow { start, end: today }
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" => Ok(Period::Today),
            "this-week" => Ok(Period::ThisWeek),
            "this-month" => Ok(Period::ThisMonth),
            "this-quarter" => Ok(Period::ThisQuarter),
            other => parse_day(other)
                .map(Period::Date)
                .ok_or_else(|| PeriodError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Today => write!(f, "today"),
            Period::ThisWeek => write!(f, "this-week"),
            Period::ThisMonth => write!(f, "this-month"),
            Period::ThisQuarter => write!(f, "this-quarter"),
            Period::Date(day) => write!(f, "{}", day.format("%Y-%m-%d")),
        }
    }
}

/// Parse a strict `YYYY-MM-DD` date. Anything with extra characters
/// (path separators, time parts, short years) is rejected.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Inclusive range of local calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Compact form for logs (`2024-01-15` or `2024-01-01..2024-01-15`).
    pub fn to_query(&self) -> String {
        if self.start == self.end {
            self.start.format("%Y-%m-%d").to_string()
        } else {
            format!(
                "{}..{}",
                self.start.format("%Y-%m-%d"),
                self.end.format("%Y-%m-%d")
            )
        }
    }

    /// Search qualifier covering the window's days in `offset`, e.g.
    /// `2024-03-14T00:00:00+02:00..2024-03-14T23:59:59+02:00`. Bare dates
    /// would be read as UTC days by GitHub.
    pub fn to_search(&self, offset: FixedOffset) -> String {
        format!(
            "{}T00:00:00{offset}..{}T23:59:59{offset}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}
