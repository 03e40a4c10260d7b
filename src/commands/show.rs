//! Read-only commands: `show`, `total` and `pull`.

use crate::api::Mode;
use crate::calendar::{Clock, YearMonth};
use crate::commands::{open_store, Out};
use crate::model::{Amount, DateKey};
use crate::render;
use crate::store::CalendarStore;
use crate::{Config, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Structured output describing one month.
#[derive(Debug, Clone, Serialize)]
pub struct MonthReport {
    pub month: YearMonth,
    /// The total across every month, not just this one.
    pub total: Amount,
    pub days_saved: usize,
    pub entries: BTreeMap<DateKey, Amount>,
}

impl MonthReport {
    fn new(store: &CalendarStore) -> Self {
        let month = store.view();
        Self {
            month,
            total: store.total_for_all_entries(),
            days_saved: store.entry_count_for_view_month(),
            entries: store
                .savings()
                .iter()
                .filter(|(key, _)| key.year_month() == month)
                .map(|(key, amount)| (*key, *amount))
                .collect(),
        }
    }
}

/// Hydrates, then draws `month` (or the current month) with the totals underneath.
pub async fn show(
    config: Config,
    mode: Mode,
    clock: Clock,
    month: Option<YearMonth>,
) -> Result<Out<MonthReport>> {
    let mut store = open_store(&config, mode, clock)?;
    store.hydrate_from_remote().await;
    if let Some(month) = month {
        store.set_view(month);
    }
    Ok(Out::new(render::month_view(&store), MonthReport::new(&store)))
}

/// Hydrates, then prints the totals for the current month.
pub async fn total(config: Config, mode: Mode, clock: Clock) -> Result<Out<MonthReport>> {
    let mut store = open_store(&config, mode, clock)?;
    store.hydrate_from_remote().await;
    Ok(Out::new(render::summary(&store), MonthReport::new(&store)))
}

/// Hydrates only. Reports how many entries are stored locally afterwards.
pub async fn pull(config: Config, mode: Mode, clock: Clock) -> Result<Out<usize>> {
    let mut store = open_store(&config, mode, clock)?;
    let count = store.savings().len();
    if store.hydrate_from_remote().await {
        let fetched = store.savings().len();
        Ok(Out::new(
            format!("Loaded {fetched} entries from the remote store"),
            fetched,
        ))
    } else {
        Ok(Out::new(
            format!("The remote store could not be read, keeping {count} local entries"),
            count,
        ))
    }
}
