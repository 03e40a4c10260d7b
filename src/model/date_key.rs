use crate::calendar::YearMonth;
use anyhow::{ensure, Context};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const FORMAT: &str = "%Y-%m-%d";

/// Identifies the entry for a single calendar day. It is written as a zero-padded `YYYY-MM-DD`
/// string and can only hold a real date, so two keys are equal exactly when their strings are.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The key for `day` within `month`.
    pub fn for_day(month: YearMonth, day: u32) -> crate::Result<Self> {
        month
            .day(day)
            .map(Self)
            .with_context(|| format!("{month} has no day {day}"))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn year_month(&self) -> YearMonth {
        YearMonth::of(self.0)
    }
}

impl Display for DateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(FORMAT))
    }
}

impl FromStr for DateKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let b = s.as_bytes();
        ensure!(
            b.len() == 10 && b[4] == b'-' && b[7] == b'-',
            "'{s}' is not a YYYY-MM-DD date"
        );
        let date = NaiveDate::parse_from_str(s, FORMAT)
            .with_context(|| format!("'{s}' is not a valid date"))?;
        Ok(Self(date))
    }
}

impl From<NaiveDate> for DateKey {
    fn from(value: NaiveDate) -> Self {
        Self(value)
    }
}

impl Serialize for DateKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateKey::from_str(&s).map_err(serde::de::Error::custom)
    }
}
