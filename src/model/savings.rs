use crate::calendar::YearMonth;
use crate::model::{Amount, DateKey};
use crate::Result;
use anyhow::bail;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

/// The amount saved per day. Only positive amounts are ever held; setting a day to zero or less
/// removes it.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<DateKey, Amount>")]
pub struct Savings(BTreeMap<DateKey, Amount>);

impl Savings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the mapping from the JSON object returned by the remote store. The payload must be an
    /// object. Entries with a key that is not a date, or with a value that is not a positive
    /// number, are dropped with a warning.
    pub fn from_remote(value: Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => bail!("Expected a JSON object of date to amount, got: {other}"),
        };
        let mut savings = Savings::new();
        for (key, value) in map {
            let date = match DateKey::from_str(&key) {
                Ok(date) => date,
                Err(e) => {
                    warn!("Skipping remote entry '{key}': {e}");
                    continue;
                }
            };
            match serde_json::from_value::<Amount>(value.clone()) {
                Ok(amount) if amount.is_positive() => {
                    savings.0.insert(date, amount);
                }
                Ok(_) => warn!("Skipping remote entry '{key}': {value} is not a positive amount"),
                Err(e) => warn!("Skipping remote entry '{key}': {e}"),
            }
        }
        Ok(savings)
    }

    pub fn get(&self, key: &DateKey) -> Option<Amount> {
        self.0.get(key).copied()
    }

    pub fn contains(&self, key: &DateKey) -> bool {
        self.0.contains_key(key)
    }

    /// Stores `amount` for `key`, or removes the entry when `amount` is not positive. Returns the
    /// previous amount.
    pub fn set(&mut self, key: DateKey, amount: Amount) -> Option<Amount> {
        if amount.is_positive() {
            self.0.insert(key, amount)
        } else {
            self.0.remove(&key)
        }
    }

    pub fn remove(&mut self, key: &DateKey) -> Option<Amount> {
        self.0.remove(key)
    }

    /// The sum of every stored amount, across all months. Saturates instead of overflowing.
    pub fn total(&self) -> Amount {
        self.0.values().copied().sum()
    }

    /// The number of entries whose key falls within `month`.
    pub fn count_in_month(&self, month: YearMonth) -> usize {
        self.0.keys().filter(|k| k.year_month() == month).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateKey, &Amount)> {
        self.0.iter()
    }
}

impl From<BTreeMap<DateKey, Amount>> for Savings {
    fn from(mut value: BTreeMap<DateKey, Amount>) -> Self {
        value.retain(|_, amount| amount.is_positive());
        Self(value)
    }
}

impl FromIterator<(DateKey, Amount)> for Savings {
    fn from_iter<T: IntoIterator<Item = (DateKey, Amount)>>(iter: T) -> Self {
        iter.into_iter().collect::<BTreeMap<_, _>>().into()
    }
}
