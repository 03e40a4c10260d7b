//! Types that represent the core data model: the `DateKey` of a day, the `Amount` saved on it and
//! the `Savings` mapping between the two.
mod amount;
mod date_key;
mod savings;

pub use amount::{Amount, AmountError};
pub use date_key::DateKey;
pub use savings::Savings;
