//! These structs provide the CLI interface for the beans CLI.

use crate::calendar::YearMonth;
use crate::model::DateKey;
use crate::store::HydrationPolicy;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// beans: a calendar of the money you put aside each day.
///
/// Each day can hold one amount. Amounts are kept in a local storage slot and mirrored to a
/// spreadsheet endpoint: every save is written locally first and then sent to the endpoint, and
/// each run starts by loading the endpoint's copy.
#[derive(Debug, Parser, Clone)]
#[command(version)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and the configuration file.
    ///
    /// This is the first command you should run. The endpoint URL is the web app that stores your
    /// savings in a spreadsheet; it must answer a GET with the whole mapping as JSON and accept a
    /// POST of {"date": "YYYY-MM-DD", "amount": N}.
    Init(InitArgs),
    /// Draw a month with the days you saved on, the total and the count for that month.
    Show(ShowArgs),
    /// Record an amount for a day. Zero, a negative amount or an empty string removes the day.
    Save(SaveArgs),
    /// Remove the amount for a day.
    Delete(DeleteArgs),
    /// Print the total across all days and the count for the current month.
    Total,
    /// Load the spreadsheet's copy into local storage.
    Pull,
    /// Browse and edit months interactively.
    Interactive,
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where beans data and configuration is held. Defaults to ~/beans
    #[arg(long, env = "BEANS_HOME", default_value_t = default_beans_home())]
    beans_home: DisplayPath,

    /// What the startup fetch does to edits made while it was loading. With `init` this is stored
    /// in the config file (default: replace), otherwise it overrides the config file for this run.
    #[arg(long, value_enum)]
    hydration_policy: Option<HydrationPolicy>,
}

impl Common {
    pub fn new(log_level: LevelFilter, beans_home: PathBuf) -> Self {
        Self {
            log_level,
            beans_home: beans_home.into(),
            hydration_policy: None,
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn beans_home(&self) -> &DisplayPath {
        &self.beans_home
    }

    pub fn hydration_policy(&self) -> Option<HydrationPolicy> {
        self.hydration_policy
    }
}

/// Args for the `beans init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL of the spreadsheet endpoint, e.g.
    /// https://script.google.com/macros/s/AKfycbx9Lq2mTn4R/exec
    #[arg(long)]
    endpoint_url: String,
}

impl InitArgs {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
        }
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

/// Args for the `beans show` command.
#[derive(Debug, Parser, Clone)]
pub struct ShowArgs {
    /// The month to show as YYYY-MM. Defaults to the current month.
    #[arg(long, value_parser = parse_month)]
    month: Option<YearMonth>,
}

impl ShowArgs {
    pub fn new(month: Option<YearMonth>) -> Self {
        Self { month }
    }

    pub fn month(&self) -> Option<YearMonth> {
        self.month
    }
}

fn parse_month(s: &str) -> Result<YearMonth, String> {
    YearMonth::try_from(s.to_string()).map_err(|e| e.to_string())
}

/// Args for the `beans save` command.
#[derive(Debug, Parser, Clone)]
pub struct SaveArgs {
    /// The day, as YYYY-MM-DD.
    date: DateKey,

    /// The amount saved on that day.
    #[arg(allow_hyphen_values = true)]
    amount: String,
}

impl SaveArgs {
    pub fn new(date: DateKey, amount: impl Into<String>) -> Self {
        Self {
            date,
            amount: amount.into(),
        }
    }

    pub fn date(&self) -> DateKey {
        self.date
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }
}

/// Args for the `beans delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    /// The day, as YYYY-MM-DD.
    date: DateKey,
}

impl DeleteArgs {
    pub fn new(date: DateKey) -> Self {
        Self { date }
    }

    pub fn date(&self) -> DateKey {
        self.date
    }
}

fn default_beans_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("beans"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --beans-home or BEANS_HOME instead of relying on the default \
                beans home directory.",
            );
            PathBuf::from("beans")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
