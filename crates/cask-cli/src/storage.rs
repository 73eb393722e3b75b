use std::path::PathBuf;

use crate::config::{Config, KeySource};
use cask_core::{result::RenderOptions, Reporter};
use cask_storage::{
    key_provider::{EnvKeyProvider, KeyProvider, KeyringProvider, DEFAULT_KEY_ENV_VAR},
    paths::{self, SystemFolders},
    CredentialStore, KeyMaterial,
};
use color_eyre::Result;
use tracing::debug;

/// Build the store described by the config, fetching the key from its provider.
pub async fn store_from_config(config: &Config) -> Result<CredentialStore> {
    let key = resolve_key(config).await?;
    open_with_key(config, &key)
}

async fn resolve_key(config: &Config) -> Result<KeyMaterial> {
    let key = match config.key_source {
        KeySource::Keyring => {
            KeyringProvider::new(&config.keyring.service, &config.keyring.account)
                .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?
                .get_or_create()
                .await
        }
        KeySource::Env => {
            let var = config.key_env_var.as_deref().unwrap_or(DEFAULT_KEY_ENV_VAR);
            EnvKeyProvider::new(var).get_or_create().await
        }
    };
    key.map_err(|e| color_eyre::eyre::eyre!(e.to_string()))
}

pub fn reporter(config: &Config) -> Reporter {
    let reporter = Reporter::named("cask");
    match config.raise_threshold {
        Some(threshold) => reporter.with_raise_threshold(threshold),
        None => reporter,
    }
}

pub fn render_options(config: &Config) -> RenderOptions {
    RenderOptions {
        show_location: config.show_error_location,
    }
}

/// Open the store, refusing to continue when the existing file cannot be read
/// so it is never overwritten by a later save.
pub fn open_with_key(config: &Config, key: &KeyMaterial) -> Result<CredentialStore> {
    let reporter = reporter(config);
    let record = match override_path(config) {
        Some(path) => {
            debug!(?path, "initializing credential store (config override)");
            CredentialStore::open(path, key, reporter.clone())
        }
        None => {
            debug!("initializing credential store in home folder");
            CredentialStore::open_default(&SystemFolders, key, reporter.clone())
        }
    };

    if !record.is_ok() {
        reporter.print_error(&record, render_options(config));
        color_eyre::eyre::bail!("could not open the credential store");
    }
    record
        .into_contents()
        .ok_or_else(|| color_eyre::eyre::eyre!("credential store unavailable"))
}

fn override_path(config: &Config) -> Option<PathBuf> {
    let dir = config.data_dir.as_ref()?;
    let name = config.file_name.as_deref().unwrap_or(paths::FILE_NAME);
    Some(dir.join(name))
}

/// Helper for tests to construct a store rooted at a temp dir with a fixed key.
#[cfg(test)]
pub fn test_store(root: impl Into<PathBuf>) -> CredentialStore {
    let config = Config {
        data_dir: Some(root.into()),
        ..Config::default()
    };
    open_with_key(&config, &KeyMaterial::new("test", [0x5A; 32])).expect("test store")
}
