//! Implements the `Remote` trait with in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without an HTTP endpoint.

use crate::api::{Remote, RemoteEntry};
use crate::model::Savings;
use crate::Result;
use anyhow::bail;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard};

/// Remote data for every endpoint used in this process, keyed by endpoint URL.
static STATES: LazyLock<Mutex<HashMap<String, TestRemoteState>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn states() -> MutexGuard<'static, HashMap<String, TestRemoteState>> {
    STATES.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What the in-memory remote store holds for one endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestRemoteState {
    /// The raw JSON object served to `fetch_all`. It may hold entries that the program would
    /// reject, just like a real spreadsheet can.
    pub data: Map<String, Value>,
    /// Every write received, in arrival order.
    pub writes: Vec<RemoteEntry>,
    /// Number of fetches received.
    pub fetches: usize,
    /// When true every call fails, as if the endpoint were unreachable.
    pub unreachable: bool,
}

/// An implementation of the `Remote` trait that keeps its data in a process-wide map.
pub(crate) struct TestRemote {
    endpoint: String,
}

impl TestRemote {
    pub(crate) fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// A copy of the current state for this endpoint.
    #[cfg(test)]
    pub(crate) fn get_state(&self) -> TestRemoteState {
        states().get(&self.endpoint).cloned().unwrap_or_default()
    }

    /// Replaces the state for this endpoint.
    #[cfg(test)]
    pub(crate) fn set_state(&self, state: TestRemoteState) {
        states().insert(self.endpoint.clone(), state);
    }
}

#[async_trait::async_trait]
impl Remote for TestRemote {
    async fn fetch_all(&self) -> Result<Savings> {
        let data = {
            let mut states = states();
            let state = states.entry(self.endpoint.clone()).or_default();
            state.fetches += 1;
            if state.unreachable {
                bail!("Test remote {} is unreachable", self.endpoint);
            }
            state.data.clone()
        };
        Savings::from_remote(Value::Object(data))
    }

    async fn put(&self, entry: &RemoteEntry) -> Result<()> {
        let mut states = states();
        let state = states.entry(self.endpoint.clone()).or_default();
        state.writes.push(*entry);
        if state.unreachable {
            bail!("Test remote {} is unreachable", self.endpoint);
        }
        state
            .data
            .insert(entry.date.to_string(), serde_json::to_value(entry.amount)?);
        Ok(())
    }
}
