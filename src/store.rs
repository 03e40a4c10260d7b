//! The calendar state store.
//!
//! `CalendarStore` owns the displayed month, the savings mapping and the editor state. Everything
//! shown by a month view is derived from those on demand. Every successful edit is written to
//! local storage first and then, best-effort, to the remote store.
//!
//! Remote calls are isolated: a failed fetch or write is logged and otherwise ignored. It never
//! undoes a local write, never reaches the caller and is never retried.

use crate::api::{Remote, RemoteEntry};
use crate::calendar::{Clock, YearMonth};
use crate::model::{Amount, DateKey, Savings};
use crate::storage::{load_savings, persist_savings, LocalStorage};
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Decides what a hydration result does with edits made while the fetch was in flight.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum HydrationPolicy {
    /// The remote mapping replaces the local one wholesale. Edits made during the fetch are lost
    /// locally (they still reached the remote store if their write succeeded).
    #[default]
    Replace,
    /// Edits made during the fetch are applied again on top of the remote mapping.
    KeepLocalEdits,
}

serde_plain::derive_display_from_serialize!(HydrationPolicy);
serde_plain::derive_fromstr_from_deserialize!(HydrationPolicy);

/// The day being edited and the amount typed so far.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Editor {
    key: DateKey,
    candidate: String,
}

impl Editor {
    pub fn key(&self) -> DateKey {
        self.key
    }

    pub fn candidate(&self) -> &str {
        &self.candidate
    }
}

/// What `save` did to the mapping.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SaveOutcome {
    Saved { date: DateKey, amount: Amount },
    Deleted { date: DateKey },
}

/// Returned by `begin_hydration` and handed back to `finish_hydration` with the fetch result.
#[derive(Debug)]
#[must_use]
pub struct HydrationTicket {
    version: u64,
}

/// A local edit, remembered while a hydration is in flight.
#[derive(Debug, Clone, Copy)]
struct Edit {
    version: u64,
    key: DateKey,
    amount: Option<Amount>,
}

pub struct CalendarStore {
    view: YearMonth,
    savings: Savings,
    /// Incremented on every local edit.
    version: u64,
    editor: Option<Editor>,
    focus_requested: bool,
    hydrations_in_flight: usize,
    edits_during_hydration: Vec<Edit>,
    storage: Box<dyn LocalStorage>,
    slot: String,
    remote: Arc<dyn Remote>,
    clock: Clock,
    policy: HydrationPolicy,
}

impl CalendarStore {
    /// Creates the store, reading the savings mapping from `slot` in `storage`. The view starts on
    /// the current month.
    ///
    /// # Errors
    /// Returns an error if the storage slot cannot be read or does not hold a savings mapping.
    pub fn open(
        storage: Box<dyn LocalStorage>,
        slot: impl Into<String>,
        remote: Arc<dyn Remote>,
        clock: Clock,
        policy: HydrationPolicy,
    ) -> Result<Self> {
        let slot = slot.into();
        let savings = load_savings(storage.as_ref(), &slot)
            .context("Unable to read the saved entries from local storage")?;
        debug!("Loaded {} entries from local storage", savings.len());
        Ok(Self {
            view: YearMonth::of(clock.today()),
            savings,
            version: 0,
            editor: None,
            focus_requested: false,
            hydrations_in_flight: 0,
            edits_during_hydration: Vec::new(),
            storage,
            slot,
            remote,
            clock,
            policy,
        })
    }

    pub fn view(&self) -> YearMonth {
        self.view
    }

    pub fn savings(&self) -> &Savings {
        &self.savings
    }

    pub fn editor(&self) -> Option<&Editor> {
        self.editor.as_ref()
    }

    pub fn policy(&self) -> HydrationPolicy {
        self.policy
    }

    /// A counter that changes whenever the mapping is edited locally.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// A handle to the remote store, for running a fetch outside of the store.
    pub fn remote(&self) -> Arc<dyn Remote> {
        Arc::clone(&self.remote)
    }

    pub fn today(&self) -> DateKey {
        DateKey::new(self.clock.today())
    }

    // Derived facts

    /// Weekday of the 1st of the displayed month, 0 is Sunday.
    pub fn first_weekday_of_month(&self) -> u32 {
        self.view.first_weekday()
    }

    pub fn days_in_month(&self) -> u32 {
        self.view.days_in_month()
    }

    pub fn is_current_view_month(&self) -> bool {
        self.view == YearMonth::of(self.clock.today())
    }

    pub fn total_for_all_entries(&self) -> Amount {
        self.savings.total()
    }

    pub fn entry_count_for_view_month(&self) -> usize {
        self.savings.count_in_month(self.view)
    }

    /// The key of `day` in the displayed month.
    pub fn date_key(&self, day: u32) -> Result<DateKey> {
        DateKey::for_day(self.view, day)
    }

    pub fn is_today(&self, day: u32) -> bool {
        self.date_key(day).is_ok_and(|key| key == self.today())
    }

    pub fn has_entry(&self, day: u32) -> bool {
        self.date_key(day)
            .is_ok_and(|key| self.savings.contains(&key))
    }

    // Navigation

    /// Moves the view by `step` months. A step that leaves the representable range of dates is
    /// ignored.
    pub fn change_month(&mut self, step: i32) {
        match self.view.shift(step) {
            Some(view) => self.view = view,
            None => warn!("Cannot move {step} months from {}", self.view),
        }
    }

    pub fn go_to_today(&mut self) {
        self.view = YearMonth::of(self.clock.today());
    }

    /// Shows `month`.
    pub fn set_view(&mut self, month: YearMonth) {
        self.view = month;
    }

    // Editing

    /// Opens the editor on `day` of the displayed month with any existing amount preloaded. The
    /// input should get focus once the editor has been drawn; see `take_focus_request`.
    pub fn open_editor(&mut self, day: u32) -> Result<()> {
        let key = self.date_key(day)?;
        let candidate = self
            .savings
            .get(&key)
            .map(|amount| amount.value().normalize().to_string())
            .unwrap_or_default();
        self.editor = Some(Editor { key, candidate });
        self.focus_requested = true;
        Ok(())
    }

    /// Called by the UI after it has drawn the editor. Returns the key whose input should receive
    /// focus, once per `open_editor`.
    pub fn take_focus_request(&mut self) -> Option<DateKey> {
        if !std::mem::take(&mut self.focus_requested) {
            return None;
        }
        self.editor.as_ref().map(Editor::key)
    }

    /// Replaces the amount typed into the open editor. Does nothing if no editor is open.
    pub fn set_candidate(&mut self, text: impl Into<String>) {
        if let Some(editor) = self.editor.as_mut() {
            editor.candidate = text.into();
        }
    }

    /// Closes the editor without saving.
    pub fn cancel_editor(&mut self) {
        self.editor = None;
        self.focus_requested = false;
    }

    /// Saves the open editor.
    ///
    /// An empty, zero, negative or unreadable amount deletes the day's entry; that is persisted
    /// locally and nothing is sent to the remote store. A positive amount is persisted locally and
    /// then sent to the remote store. A failed remote write is logged and ignored. The editor is
    /// closed either way.
    ///
    /// # Errors
    /// Returns an error if no editor is open or if local storage cannot be written. In the latter
    /// case the editor stays open.
    pub async fn save(&mut self) -> Result<SaveOutcome> {
        let editor = self
            .editor
            .clone()
            .context("There is no open entry to save")?;
        let key = editor.key;

        let amount = match parse_candidate(&editor.candidate) {
            Some(amount) => amount,
            None => {
                self.apply_edit(key, None);
                self.persist()?;
                self.cancel_editor();
                debug!("Deleted the entry for {key}");
                return Ok(SaveOutcome::Deleted { date: key });
            }
        };

        self.apply_edit(key, Some(amount));
        self.persist()?;

        let entry = RemoteEntry { date: key, amount };
        match self.remote.put(&entry).await {
            Ok(()) => debug!("Sent {key} to the remote store"),
            Err(e) => error!("Unable to write {key} to the remote store: {e:#}"),
        }

        self.cancel_editor();
        Ok(SaveOutcome::Saved { date: key, amount })
    }

    // Hydration

    /// Fetches the full mapping from the remote store and, if that works, replaces the local one.
    /// Returns whether the remote mapping was applied. Failures are logged, never returned.
    pub async fn hydrate_from_remote(&mut self) -> bool {
        let ticket = self.begin_hydration();
        let result = self.remote.fetch_all().await;
        self.finish_hydration(ticket, result)
    }

    /// Marks the start of a fetch that runs outside of the store. Edits made from now on are
    /// remembered so the hydration policy can apply them.
    pub fn begin_hydration(&mut self) -> HydrationTicket {
        self.hydrations_in_flight += 1;
        HydrationTicket {
            version: self.version,
        }
    }

    /// Applies the result of the fetch started with `ticket`. Returns whether the remote mapping
    /// was applied.
    pub fn finish_hydration(&mut self, ticket: HydrationTicket, result: Result<Savings>) -> bool {
        self.hydrations_in_flight = self.hydrations_in_flight.saturating_sub(1);
        let applied = match result {
            Ok(remote) => {
                self.apply_remote(ticket.version, remote);
                true
            }
            Err(e) => {
                error!("Unable to read the remote store, keeping local data: {e:#}");
                false
            }
        };
        if self.hydrations_in_flight == 0 {
            self.edits_during_hydration.clear();
        }
        applied
    }

    fn apply_remote(&mut self, since: u64, mut remote: Savings) {
        let later_edits = self
            .edits_during_hydration
            .iter()
            .filter(|edit| edit.version > since);
        match self.policy {
            HydrationPolicy::Replace => {
                let lost = later_edits.count();
                if lost > 0 {
                    warn!("The remote data replaced {lost} local edit(s) made while it loaded");
                }
            }
            HydrationPolicy::KeepLocalEdits => {
                for edit in later_edits {
                    match edit.amount {
                        Some(amount) => remote.set(edit.key, amount),
                        None => remote.remove(&edit.key),
                    };
                }
            }
        }
        info!("Loaded {} entries from the remote store", remote.len());
        self.savings = remote;
        if let Err(e) = self.persist() {
            error!("Unable to store the remote data locally: {e:#}");
        }
    }

    fn apply_edit(&mut self, key: DateKey, amount: Option<Amount>) {
        match amount {
            Some(amount) => self.savings.set(key, amount),
            None => self.savings.remove(&key),
        };
        self.version += 1;
        if self.hydrations_in_flight > 0 {
            self.edits_during_hydration.push(Edit {
                version: self.version,
                key,
                amount,
            });
        }
    }

    fn persist(&mut self) -> Result<()> {
        persist_savings(self.storage.as_mut(), &self.slot, &self.savings)
    }
}

/// A positive amount, or `None` for anything that should delete the entry.
fn parse_candidate(text: &str) -> Option<Amount> {
    match Amount::from_str(text) {
        Ok(amount) if amount.is_positive() => Some(amount),
        Ok(_) => None,
        Err(e) => {
            warn!("'{text}' is not an amount ({e}), treating it as empty");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{TestRemote, TestRemoteState};
    use crate::storage::MemoryStorage;
    use chrono::NaiveDate;
    use serde_json::json;

    struct Fixture {
        remote: Arc<TestRemote>,
    }

    impl Fixture {
        fn new() -> Self {
            let endpoint = format!("test://store/{}", uuid::Uuid::new_v4());
            Self {
                remote: Arc::new(TestRemote::new(endpoint)),
            }
        }

        fn with_remote_data(self, data: serde_json::Value) -> Self {
            let serde_json::Value::Object(data) = data else {
                panic!("not an object");
            };
            self.remote.set_state(TestRemoteState {
                data,
                ..Default::default()
            });
            self
        }

        fn unreachable(self) -> Self {
            self.remote.set_state(TestRemoteState {
                unreachable: true,
                ..Default::default()
            });
            self
        }

        fn store(&self, local: serde_json::Value, policy: HydrationPolicy) -> CalendarStore {
            let mut storage = MemoryStorage::new();
            storage.set_item("slot", &local.to_string()).unwrap();
            CalendarStore::open(
                Box::new(storage),
                "slot",
                self.remote.clone(),
                Clock::Fixed(NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()),
                policy,
            )
            .unwrap()
        }

        fn state(&self) -> TestRemoteState {
            self.remote.get_state()
        }
    }

    fn key(s: &str) -> DateKey {
        DateKey::from_str(s).unwrap()
    }

    fn scenario() -> serde_json::Value {
        json!({"2024-03-05": 100, "2024-03-12": 50, "2024-04-01": 20})
    }

    fn stored(store: &CalendarStore) -> Savings {
        load_savings(store.storage.as_ref(), "slot").unwrap()
    }

    #[test]
    fn test_scenario_totals() {
        let fx = Fixture::new();
        let store = fx.store(scenario(), HydrationPolicy::Replace);
        assert_eq!(store.view(), YearMonth::new(2024, 3).unwrap());
        assert_eq!(store.total_for_all_entries(), Amount::from(170));
        assert_eq!(store.entry_count_for_view_month(), 2);
    }

    #[test]
    fn test_derived_facts() {
        let fx = Fixture::new();
        let mut store = fx.store(scenario(), HydrationPolicy::Replace);
        assert_eq!(store.first_weekday_of_month(), 5);
        assert_eq!(store.days_in_month(), 31);
        assert!(store.is_current_view_month());
        assert!(store.is_today(12));
        assert!(!store.is_today(13));
        assert!(store.has_entry(5));
        assert!(!store.has_entry(6));
        assert!(!store.has_entry(40));
        assert_eq!(store.date_key(5).unwrap(), key("2024-03-05"));
        assert!(store.date_key(32).is_err());

        store.change_month(1);
        assert!(!store.is_current_view_month());
        assert!(!store.is_today(12));
        assert_eq!(store.entry_count_for_view_month(), 1);
        assert_eq!(store.total_for_all_entries(), Amount::from(170));
    }

    #[test]
    fn test_change_month_and_today() {
        let fx = Fixture::new();
        let mut store = fx.store(json!({}), HydrationPolicy::Replace);
        store.set_view(YearMonth::new(2024, 1).unwrap());
        store.change_month(1);
        assert_eq!(store.view(), YearMonth::new(2024, 2).unwrap());
        assert_eq!(store.days_in_month(), 29);
        store.change_month(-1);
        assert_eq!(store.view(), YearMonth::new(2024, 1).unwrap());
        store.change_month(-1);
        assert_eq!(store.view(), YearMonth::new(2023, 12).unwrap());
        store.go_to_today();
        assert_eq!(store.view(), YearMonth::new(2024, 3).unwrap());
    }

    #[test]
    fn test_open_editor_preloads_and_requests_focus() {
        let fx = Fixture::new();
        let mut store = fx.store(scenario(), HydrationPolicy::Replace);
        store.open_editor(5).unwrap();
        let editor = store.editor().unwrap();
        assert_eq!(editor.key(), key("2024-03-05"));
        assert_eq!(editor.candidate(), "100");
        assert_eq!(store.take_focus_request(), Some(key("2024-03-05")));
        assert_eq!(store.take_focus_request(), None);

        store.open_editor(6).unwrap();
        assert_eq!(store.editor().unwrap().candidate(), "");
        store.cancel_editor();
        assert!(store.editor().is_none());
        assert_eq!(store.take_focus_request(), None);
    }

    #[test]
    fn test_open_editor_bad_day() {
        let fx = Fixture::new();
        let mut store = fx.store(json!({}), HydrationPolicy::Replace);
        assert!(store.open_editor(0).is_err());
        assert!(store.open_editor(32).is_err());
        assert!(store.editor().is_none());
    }

    #[tokio::test]
    async fn test_save_creates_entry_and_writes_remote_once() {
        let fx = Fixture::new();
        let mut store = fx.store(json!({}), HydrationPolicy::Replace);
        store.open_editor(20).unwrap();
        store.set_candidate("50");
        let outcome = store.save().await.unwrap();

        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                date: key("2024-03-20"),
                amount: Amount::from(50)
            }
        );
        assert!(store.editor().is_none());
        assert_eq!(store.total_for_all_entries(), Amount::from(50));
        assert!(stored(&store).contains(&key("2024-03-20")));
        let writes = fx.state().writes;
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].date, key("2024-03-20"));
        assert_eq!(writes[0].amount, Amount::from(50));
    }

    #[tokio::test]
    async fn test_save_non_positive_deletes_without_remote_write() {
        for candidate in ["0", "", "-5", "abc"] {
            let fx = Fixture::new();
            let mut store = fx.store(scenario(), HydrationPolicy::Replace);
            store.open_editor(5).unwrap();
            store.set_candidate(candidate);
            let outcome = store.save().await.unwrap();
            assert_eq!(
                outcome,
                SaveOutcome::Deleted {
                    date: key("2024-03-05")
                }
            );
            assert!(!store.has_entry(5), "{candidate}");
            assert!(!stored(&store).contains(&key("2024-03-05")));
            assert!(store.editor().is_none());
            assert!(fx.state().writes.is_empty(), "{candidate}");
        }
    }

    #[tokio::test]
    async fn test_save_keeps_local_write_when_remote_fails() {
        let fx = Fixture::new().unreachable();
        let mut store = fx.store(json!({}), HydrationPolicy::Replace);
        store.open_editor(1).unwrap();
        store.set_candidate("12.5");
        let outcome = store.save().await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved { .. }));
        assert!(store.has_entry(1));
        assert!(stored(&store).contains(&key("2024-03-01")));
        assert!(store.editor().is_none());
        assert_eq!(fx.state().writes.len(), 1);
    }

    #[tokio::test]
    async fn test_save_without_editor() {
        let fx = Fixture::new();
        let mut store = fx.store(json!({}), HydrationPolicy::Replace);
        assert!(store.save().await.is_err());
    }

    #[tokio::test]
    async fn test_hydration_replaces_local() {
        let fx = Fixture::new().with_remote_data(json!({"2024-03-01": 7, "bad": 1}));
        let mut store = fx.store(scenario(), HydrationPolicy::Replace);
        assert!(store.hydrate_from_remote().await);
        assert_eq!(store.total_for_all_entries(), Amount::from(7));
        assert_eq!(stored(&store), store.savings().clone());
        assert_eq!(fx.state().fetches, 1);
    }

    #[tokio::test]
    async fn test_hydration_failure_keeps_local() {
        let fx = Fixture::new().unreachable();
        let mut store = fx.store(scenario(), HydrationPolicy::Replace);
        assert!(!store.hydrate_from_remote().await);
        assert_eq!(store.total_for_all_entries(), Amount::from(170));
        assert_eq!(store.savings().len(), 3);
    }

    #[tokio::test]
    async fn test_hydration_replace_policy_drops_edits_in_flight() {
        let fx = Fixture::new();
        let mut store = fx.store(json!({}), HydrationPolicy::Replace);
        let ticket = store.begin_hydration();
        let remote = store.remote().fetch_all().await;

        store.open_editor(3).unwrap();
        store.set_candidate("30");
        store.save().await.unwrap();

        assert!(store.finish_hydration(ticket, remote));
        // The fetch resolved before the edit reached the remote store.
        assert!(!store.has_entry(3));
        assert!(stored(&store).is_empty());
    }

    #[tokio::test]
    async fn test_hydration_keep_local_edits_policy() {
        let fx = Fixture::new().with_remote_data(json!({"2024-03-01": 10, "2024-03-02": 20}));
        let mut store = fx.store(json!({}), HydrationPolicy::KeepLocalEdits);
        let ticket = store.begin_hydration();
        let remote = store.remote().fetch_all().await;

        store.open_editor(3).unwrap();
        store.set_candidate("30");
        store.save().await.unwrap();
        // delete a day the remote store still has
        store.open_editor(2).unwrap();
        store.set_candidate("");
        store.save().await.unwrap();

        assert!(store.finish_hydration(ticket, remote));
        assert!(store.has_entry(1));
        assert!(!store.has_entry(2));
        assert!(store.has_entry(3));
        assert_eq!(store.total_for_all_entries(), Amount::from(40));
        assert_eq!(stored(&store), store.savings().clone());
        assert!(store.edits_during_hydration.is_empty());
    }

    #[tokio::test]
    async fn test_edits_before_hydration_are_not_replayed() {
        let fx = Fixture::new().with_remote_data(json!({"2024-03-01": 10}));
        let mut store = fx.store(json!({}), HydrationPolicy::KeepLocalEdits);
        store.open_editor(9).unwrap();
        store.set_candidate("9");
        store.save().await.unwrap();

        // The write above reached the remote store, so it comes back in the fetch.
        assert!(store.hydrate_from_remote().await);
        assert!(store.has_entry(1));
        assert!(store.has_entry(9));
        assert!(store.edits_during_hydration.is_empty());
    }

    #[test]
    fn test_open_with_corrupt_storage() {
        let fx = Fixture::new();
        let mut storage = MemoryStorage::new();
        storage.set_item("slot", "[1,2]").unwrap();
        let result = CalendarStore::open(
            Box::new(storage),
            "slot",
            fx.remote.clone(),
            Clock::System,
            HydrationPolicy::Replace,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_hydration_policy_strings() {
        assert_eq!(HydrationPolicy::KeepLocalEdits.to_string(), "keep-local-edits");
        assert_eq!(
            HydrationPolicy::from_str("replace").unwrap(),
            HydrationPolicy::Replace
        );
    }
}
