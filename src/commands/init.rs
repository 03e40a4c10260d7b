use crate::commands::Out;
use crate::store::HydrationPolicy;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its storage subdirectory and an initial `config.json`.
///
/// # Arguments
/// - `beans_home` - The directory that will be the root of the data directory, e.g. `$HOME/beans`
/// - `endpoint_url` - The spreadsheet endpoint that mirrors the savings.
/// - `hydration_policy` - What a startup fetch does to edits made while it was in flight.
///
/// # Errors
/// - Returns an error if the URL is invalid or any file operation fails.
pub async fn init(
    beans_home: &Path,
    endpoint_url: &str,
    hydration_policy: HydrationPolicy,
) -> Result<Out<()>> {
    let config = Config::create(beans_home, endpoint_url, hydration_policy)
        .await
        .context("Unable to create the data directory and config")?;
    Ok(format!(
        "Successfully created the beans directory at {}",
        config.root().display()
    )
    .into())
}
