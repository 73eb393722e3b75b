use std::{
    fmt,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// Environment variable read by [`EnvKeyProvider::default`].
pub const DEFAULT_KEY_ENV_VAR: &str = "CASK_KEY";

/// Key material for the credential file.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Identifier for logging (never log key bytes).
    pub id: String,
    /// 256-bit symmetric key.
    pub bytes: [u8; 32],
}

impl KeyMaterial {
    pub fn new(id: impl Into<String>, bytes: [u8; 32]) -> Self {
        Self {
            id: id.into(),
            bytes,
        }
    }

    /// Decode a standard base64 encoded 32-byte key.
    pub fn from_base64(id: impl Into<String>, encoded: &str) -> Result<Self, KeyError> {
        let bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| KeyError::Decode(e.to_string()))?;

        let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            KeyError::Decode(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::new(id, bytes))
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.bytes)
    }

    /// Fresh random key from the OS RNG.
    pub fn generate(id: impl Into<String>) -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self::new(id, bytes)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("id", &self.id)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("environment variable {0} is not set")]
    MissingEnv(String),
    #[error("generation error: {0}")]
    Generation(String),
}

/// Supplies the store key (OS keychain or environment in production; memory in tests).
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError>;
}

/// OS keyring-backed provider. Generates and stores a key only when the
/// keychain has no entry yet; any other keychain failure is returned as-is so
/// an existing key is never replaced.
pub struct KeyringProvider {
    account: String,
    entry: keyring::Entry,
}

impl KeyringProvider {
    pub fn new(service: &str, account: &str) -> Result<Self, KeyError> {
        let entry =
            keyring::Entry::new(service, account).map_err(|e| KeyError::Keyring(e.to_string()))?;
        Ok(Self::from_entry(account, entry))
    }

    /// Wrap an already built entry (custom targets or mock credentials).
    pub fn from_entry(account: impl Into<String>, entry: keyring::Entry) -> Self {
        Self {
            account: account.into(),
            entry,
        }
    }
}

#[async_trait]
impl KeyProvider for KeyringProvider {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        // keyring is synchronous; the trait is async so callers can swap in remote sources.
        match self.entry.get_password() {
            Ok(secret) => KeyMaterial::from_base64(&self.account, &secret),
            Err(keyring::Error::NoEntry) => {
                let material = KeyMaterial::generate(&self.account);
                self.entry
                    .set_password(&material.to_base64())
                    .map_err(|e| KeyError::Keyring(e.to_string()))?;
                Ok(material)
            }
            Err(err) => Err(KeyError::Keyring(err.to_string())),
        }
    }
}

/// Reads a base64 key from an environment variable. Never generates one.
#[derive(Debug, Clone)]
pub struct EnvKeyProvider {
    var: String,
}

impl EnvKeyProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvKeyProvider {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_ENV_VAR)
    }
}

#[async_trait]
impl KeyProvider for EnvKeyProvider {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        let encoded =
            std::env::var(&self.var).map_err(|_| KeyError::MissingEnv(self.var.clone()))?;
        KeyMaterial::from_base64(format!("env:{}", self.var), &encoded)
    }
}

/// In-memory key provider for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<KeyMaterial>>>,
}

impl InMemoryKeyProvider {
    /// Provider pre-seeded with a known key.
    pub fn with_key(material: KeyMaterial) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(material))),
        }
    }
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))?;

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let material = KeyMaterial::generate("memory");
        *guard = Some(material.clone());
        Ok(material)
    }
}
