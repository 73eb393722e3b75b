mod cli;
mod commands;
mod config;
mod storage;

use std::io;

use crate::cli::ConfigCommand;
use cask_storage::{AddOptions, CredentialStore, Persist};
use clap::Parser;
use color_eyre::Result;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Scratch section written and removed by `cask health`.
const HEALTH_SECTION: &str = "__cask_health_check__";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command.unwrap_or(cli::Command::List) {
        cli::Command::Version => print_version(),
        cli::Command::Health => run_health_check(&config).await?,
        cli::Command::Config(ConfigCommand::Init) => init_config(&config)?,
        command => {
            let store = storage::store_from_config(&config).await?;
            let mut stdout = io::stdout().lock();
            commands::handle(command, &store, &config, &mut stdout)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info; stdout is reserved for command output.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("cask {}", env!("CARGO_PKG_VERSION"));
}

/// Runs a quick health check of the encrypted storage path.
async fn run_health_check(config: &config::Config) -> Result<()> {
    let store = storage::store_from_config(config).await?;
    run_store_health(&store, config)?;
    println!(
        "Storage: ok ({} sections at {})",
        store.list_sections().len(),
        store.path().display()
    );
    Ok(())
}

/// Add, read back and delete a scratch section. A section already using the
/// scratch name is left untouched and fails the check.
fn run_store_health(store: &CredentialStore, config: &config::Config) -> Result<()> {
    let payload = json!({ "check": "ok" });
    let options = AddOptions {
        overwrite: false,
        persist: Persist::Immediately,
    };

    let added = store.add(HEALTH_SECTION, &payload, options);
    if !added.is_ok() {
        store
            .reporter()
            .print_error(&added, storage::render_options(config));
        color_eyre::eyre::bail!("storage write failed for section {HEALTH_SECTION}");
    }

    let fetched = store.get(HEALTH_SECTION);
    let deleted = store.delete(HEALTH_SECTION, Persist::Immediately);
    if !deleted.is_ok() {
        store
            .reporter()
            .print_error(&deleted, storage::render_options(config));
        color_eyre::eyre::bail!("storage delete failed for section {HEALTH_SECTION}");
    }
    if fetched.contents.as_ref().and_then(|fields| fields.get("check")) != Some(&payload["check"]) {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
