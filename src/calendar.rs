//! Calendar arithmetic for the month view.
//!
//! Everything here is a pure function of a `(year, month)` pair, plus the `Clock` that answers
//! "what is today".

use crate::Result;
use anyhow::Context;
use chrono::{Datelike, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The weekday index of the first day of `month` in `year`, where 0 is Sunday and 6 is Saturday.
/// `month` is 1-based.
pub fn first_weekday_of_month(year: i32, month: u32) -> Result<u32> {
    Ok(YearMonth::new(year, month)?.first_weekday())
}

/// The number of days in `month` of `year`. `month` is 1-based.
pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    Ok(YearMonth::new(year, month)?.days_in_month())
}

/// A displayed month. There is no day component, so moving by whole months can never overflow
/// into the month after (January 31st plus one month is February, not March).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct YearMonth {
    /// Always the 1st of the month.
    first: NaiveDate,
}

impl YearMonth {
    /// Creates a `YearMonth` from a year and a 1-based month.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .with_context(|| format!("{year}-{month:02} is not a valid month"))?;
        Ok(Self { first })
    }

    /// The month that contains `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            first: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    /// 1-based month.
    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    /// 0 is Sunday, 6 is Saturday.
    pub fn first_weekday(&self) -> u32 {
        self.first.weekday().num_days_from_sunday()
    }

    /// The day before the first of the following month.
    pub fn days_in_month(&self) -> u32 {
        self.first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .map(|last| last.day())
            // only December of the last year chrono can represent has no successor
            .unwrap_or(31)
    }

    /// The date of `day` within this month, or `None` if the month has no such day.
    pub fn day(&self, day: u32) -> Option<NaiveDate> {
        self.first.with_day(day)
    }

    /// Moves by `step` whole months, backwards when negative. Returns `None` when the result
    /// falls outside of the representable range of dates.
    pub fn shift(&self, step: i32) -> Option<Self> {
        let months = Months::new(step.unsigned_abs());
        let first = if step >= 0 {
            self.first.checked_add_months(months)
        } else {
            self.first.checked_sub_months(months)
        }?;
        Some(Self { first })
    }

    /// The `YYYY-MM` prefix shared by every date key in this month.
    pub fn prefix(&self) -> String {
        self.first.format("%Y-%m").to_string()
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.prefix())
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.prefix()
    }
}

impl TryFrom<String> for YearMonth {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        let (year, month) = value
            .split_once('-')
            .with_context(|| format!("'{value}' is not in YYYY-MM form"))?;
        let year = year
            .parse()
            .with_context(|| format!("Bad year in '{value}'"))?;
        let month = month
            .parse()
            .with_context(|| format!("Bad month in '{value}'"))?;
        YearMonth::new(year, month)
    }
}

/// Answers "what day is it today". Tests pin the date with `Clock::Fixed`.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum Clock {
    /// The local date of the machine.
    #[default]
    System,
    /// Always the given date.
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        match self {
            Clock::System => Local::now().date_naive(),
            Clock::Fixed(date) => *date,
        }
    }
}
