//! Edit commands: `save` and `delete`.

use crate::api::Mode;
use crate::calendar::Clock;
use crate::commands::{open_store, Out};
use crate::model::DateKey;
use crate::store::SaveOutcome;
use crate::{Config, Result};
use chrono::Datelike;

/// Hydrates, then records `amount` for `date` through the editor. An empty, zero or negative
/// amount removes the entry instead.
pub async fn save(
    config: Config,
    mode: Mode,
    clock: Clock,
    date: DateKey,
    amount: &str,
) -> Result<Out<SaveOutcome>> {
    let mut store = open_store(&config, mode, clock)?;
    store.hydrate_from_remote().await;

    store.set_view(date.year_month());
    store.open_editor(date.date().day())?;
    store.set_candidate(amount);
    let outcome = store.save().await?;

    let message = match outcome {
        SaveOutcome::Saved { date, amount } => format!("Saved {amount} for {date}"),
        SaveOutcome::Deleted { date } => format!("Removed the entry for {date}"),
    };
    Ok(Out::new(message, outcome))
}

/// Removes the entry for `date`. Nothing is sent to the remote store.
pub async fn delete(
    config: Config,
    mode: Mode,
    clock: Clock,
    date: DateKey,
) -> Result<Out<SaveOutcome>> {
    save(config, mode, clock, date, "").await
}
