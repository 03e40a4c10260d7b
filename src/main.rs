use bean_savings::args::{Args, Command};
use bean_savings::calendar::Clock;
use bean_savings::store::HydrationPolicy;
use bean_savings::{commands, Config, Mode, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().beans_home().path();

    // When BEANS_IN_TEST_MODE is set and non-empty the remote store is an in-memory fake,
    // otherwise it is the configured HTTP endpoint.
    let mode = Mode::from_env();
    let clock = Clock::System;
    let policy = args.common().hydration_policy();

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init(init_args) => {
            let policy = policy.unwrap_or_default();
            commands::init(home, init_args.endpoint_url(), policy)
                .await?
                .print()
        }

        Command::Show(show_args) => {
            let config = load_config(home, policy).await?;
            commands::show(config, mode, clock, show_args.month())
                .await?
                .print()
        }

        Command::Save(save_args) => {
            let config = load_config(home, policy).await?;
            commands::save(config, mode, clock, save_args.date(), save_args.amount())
                .await?
                .print()
        }

        Command::Delete(delete_args) => {
            let config = load_config(home, policy).await?;
            commands::delete(config, mode, clock, delete_args.date())
                .await?
                .print()
        }

        Command::Total => commands::total(load_config(home, policy).await?, mode, clock)
            .await?
            .print(),

        Command::Pull => commands::pull(load_config(home, policy).await?, mode, clock)
            .await?
            .print(),

        Command::Interactive => {
            commands::interactive(load_config(home, policy).await?, mode, clock)
                .await?
                .print()
        }
    };
    Ok(())
}

/// Loads the config, letting `--hydration-policy` override the configured policy for this run.
async fn load_config(home: &Path, policy: Option<HydrationPolicy>) -> Result<Config> {
    Ok(Config::load(home).await?.with_hydration_policy(policy))
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use the given level for this crate only.
            EnvFilter::new(format!(
                "bean_savings={},{}={}",
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
