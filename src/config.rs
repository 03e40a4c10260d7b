//! Configuration file handling.
//!
//! The configuration file is stored at `$BEANS_HOME/config.json` and holds the remote endpoint URL,
//! the hydration policy and the name of the local storage slot.

use crate::storage::{is_valid_slot_name, FileStorage};
use crate::store::HydrationPolicy;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const APP_NAME: &str = "beans";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const STORAGE: &str = "storage";
const DEFAULT_STORAGE_SLOT: &str = "beanSavings";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$BEANS_HOME` and from there it loads `$BEANS_HOME/config.json`. It provides the
/// paths to the other items that are expected in a certain location within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    storage_dir: PathBuf,
    config_file: ConfigFile,
    endpoint: Url,
}

impl Config {
    /// Creates the home directory, its storage subdirectory and an initial `config.json`.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of the data directory, e.g. `$HOME/beans`
    /// - `endpoint_url` - The URL of the spreadsheet endpoint that mirrors the savings.
    /// - `hydration_policy` - What a startup fetch does to edits made while it was in flight.
    ///
    /// # Errors
    /// - Returns an error if the URL is not valid or any file operation fails.
    pub async fn create(
        dir: impl Into<PathBuf>,
        endpoint_url: &str,
        hydration_policy: HydrationPolicy,
    ) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint_url)?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the beans home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let storage_dir = root.join(STORAGE);
        utils::make_dir(&storage_dir).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            endpoint_url: endpoint.to_string(),
            hydration_policy,
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            config_path,
            storage_dir,
            config_file,
            endpoint,
        })
    }

    /// This will
    /// - validate that `beans_home` and its config file exist
    /// - load and validate the config file
    /// - validate that the storage directory exists
    pub async fn load(beans_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = beans_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The beans home directory is missing, run 'beans init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let endpoint = parse_endpoint(&config_file.endpoint_url)?;

        let storage_dir = root.join(STORAGE);
        if !storage_dir.is_dir() {
            bail!(
                "The storage directory is missing '{}'",
                storage_dir.display()
            )
        }

        Ok(Self {
            root,
            config_path,
            storage_dir,
            config_file,
            endpoint,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn hydration_policy(&self) -> HydrationPolicy {
        self.config_file.hydration_policy
    }

    pub fn storage_slot(&self) -> &str {
        &self.config_file.storage_slot
    }

    /// Overrides the configured hydration policy for this run only; nothing is saved.
    pub fn with_hydration_policy(mut self, policy: Option<HydrationPolicy>) -> Self {
        if let Some(policy) = policy {
            self.config_file.hydration_policy = policy;
        }
        self
    }

    /// The local storage backing this home directory.
    pub fn storage(&self) -> FileStorage {
        FileStorage::new(&self.storage_dir)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "beans",
///   "config_version": 1,
///   "endpoint_url": "https://script.google.com/macros/s/AKfycbx9Lq2mTn4R/exec",
///   "hydration_policy": "replace",
///   "storage_slot": "beanSavings"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "beans"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// URL of the spreadsheet endpoint
    endpoint_url: String,

    #[serde(default)]
    hydration_policy: HydrationPolicy,

    /// Name of the local storage slot holding the savings
    #[serde(default = "default_storage_slot")]
    storage_slot: String,
}

fn default_storage_slot() -> String {
    DEFAULT_STORAGE_SLOT.to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            endpoint_url: String::new(),
            hydration_policy: HydrationPolicy::default(),
            storage_slot: default_storage_slot(),
        }
    }
}

impl ConfigFile {
    /// Loads and validates a ConfigFile from `path`.
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .context("Unable to load the config file")?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.config_version == CONFIG_VERSION,
            "Unsupported config_version {} in {}. Is a newer version of beans available?",
            config.config_version,
            path.display()
        );
        anyhow::ensure!(
            is_valid_slot_name(&config.storage_slot),
            "Invalid storage_slot '{}': use letters, digits, '-' and '_' only",
            config.storage_slot
        );

        Ok(config)
    }

    /// Saves the ConfigFile to `path`.
    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }
}

/// The endpoint must be an absolute http or https URL.
fn parse_endpoint(s: &str) -> Result<Url> {
    let url = Url::parse(s).with_context(|| format!("Invalid endpoint URL '{s}'"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("Unsupported endpoint URL scheme '{other}' in '{s}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const URL: &str = "https://script.google.com/macros/s/AKfycbx9Lq2mTn4R/exec";

    #[tokio::test]
    async fn test_config_create_and_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("beans_home");

        let created = Config::create(&home, URL, HydrationPolicy::KeepLocalEdits)
            .await
            .unwrap();
        assert_eq!(created.endpoint().as_str(), URL);
        assert!(created.storage_dir().is_dir());
        assert!(created.config_path().is_file());

        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(loaded.endpoint(), created.endpoint());
        assert_eq!(loaded.hydration_policy(), HydrationPolicy::KeepLocalEdits);
        assert_eq!(loaded.storage_slot(), DEFAULT_STORAGE_SLOT);
        assert_eq!(loaded.root(), created.root());
    }

    #[tokio::test]
    async fn test_config_create_rejects_bad_url() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("x");
        assert!(Config::create(&home, "not a url", HydrationPolicy::Replace)
            .await
            .is_err());
        assert!(Config::create(&home, "ftp://example.com/x", HydrationPolicy::Replace)
            .await
            .is_err());
        assert!(!home.exists());
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path().join("nope")).await.unwrap_err();
        assert!(err.to_string().contains("beans init"));
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let json = r#"{
            "app_name": "beans",
            "config_version": 1,
            "endpoint_url": "https://example.com/exec"
        }"#;
        utils::write(&path, json).await.unwrap();

        let config = ConfigFile::load(&path).await.unwrap();
        assert_eq!(config.hydration_policy, HydrationPolicy::Replace);
        assert_eq!(config.storage_slot, DEFAULT_STORAGE_SLOT);
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let json = r#"{
            "app_name": "wrong_app",
            "config_version": 1,
            "endpoint_url": "https://example.com/exec"
        }"#;
        utils::write(&path, json).await.unwrap();

        let result = ConfigFile::load(&path).await;
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_slot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let json = r#"{
            "app_name": "beans",
            "config_version": 1,
            "endpoint_url": "https://example.com/exec",
            "storage_slot": "../../etc"
        }"#;
        utils::write(&path, json).await.unwrap();
        assert!(ConfigFile::load(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let original = ConfigFile {
            endpoint_url: URL.to_string(),
            hydration_policy: HydrationPolicy::KeepLocalEdits,
            storage_slot: "other".to_string(),
            ..ConfigFile::default()
        };
        original.save(&path).await.unwrap();
        let loaded = ConfigFile::load(&path).await.unwrap();
        assert_eq!(original, loaded);

        let raw = utils::read(&path).await.unwrap();
        assert!(raw.contains(r#""hydration_policy": "keep-local-edits""#));
    }

    #[tokio::test]
    async fn test_with_hydration_policy_override() {
        let dir = TempDir::new().unwrap();
        let config = Config::create(dir.path(), URL, HydrationPolicy::Replace)
            .await
            .unwrap();
        let config = config.with_hydration_policy(Some(HydrationPolicy::KeepLocalEdits));
        assert_eq!(config.hydration_policy(), HydrationPolicy::KeepLocalEdits);
        let config = config.with_hydration_policy(None);
        assert_eq!(config.hydration_policy(), HydrationPolicy::KeepLocalEdits);
    }
}
