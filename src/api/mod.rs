//! The remote store: a spreadsheet-backed HTTP endpoint that keeps a second copy of the savings.
//!
//! One URL serves both directions. A `GET` returns the whole mapping as a JSON object and a `POST`
//! of `{"date": ..., "amount": ...}` records a single day.

mod http_remote;
mod test_remote;

use crate::model::{Amount, DateKey, Savings};
use crate::{Config, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use test_remote::TestRemoteState;
pub(crate) use test_remote::TestRemote;

/// When this environment variable is set to a non-empty value, the in-memory remote store is used
/// instead of the HTTP endpoint.
pub const TEST_MODE_ENV: &str = "BEANS_IN_TEST_MODE";

/// Access to the remote copy of the savings mapping.
#[async_trait::async_trait]
pub trait Remote: Send + Sync {
    /// Fetches the complete mapping.
    async fn fetch_all(&self) -> Result<Savings>;

    /// Records one day. The response carries nothing of interest.
    async fn put(&self, entry: &RemoteEntry) -> Result<()>;
}

/// The body of a write to the remote store.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub date: DateKey,
    pub amount: Amount,
}

/// Selects which `Remote` implementation is used.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum Mode {
    /// Talk to the configured HTTP endpoint.
    #[default]
    Http,
    /// Keep the remote mapping in memory, keyed by the configured endpoint URL.
    Test,
}

impl Mode {
    /// `Mode::Test` when `BEANS_IN_TEST_MODE` is set and non-empty, otherwise `Mode::Http`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(v) if !v.is_empty() => Mode::Test,
            _ => Mode::Http,
        }
    }
}

/// Creates the `Remote` for `config` in the given `mode`.
pub(crate) fn remote(config: &Config, mode: Mode) -> Arc<dyn Remote> {
    match mode {
        Mode::Http => Arc::new(http_remote::HttpRemote::new(config.endpoint().clone())),
        Mode::Test => Arc::new(TestRemote::new(config.endpoint().as_str())),
    }
}
