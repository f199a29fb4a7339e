//! API key resolution.
//!
//! The key is looked up through an ordered chain of providers. Providers are tried
//! left to right and the first non-blank value wins.

use std::{fmt, path::PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// A source that may hold an API key.
pub trait CredentialProvider: fmt::Debug + Send + Sync {
    /// Returns the key, or `None` when this source has nothing to offer.
    fn api_key(&self) -> Option<String>;
}

/// A key passed in directly.
#[derive(Clone)]
pub struct Explicit(pub Option<String>);

impl fmt::Debug for Explicit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Explicit")
            .field(&self.0.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl CredentialProvider for Explicit {
    fn api_key(&self) -> Option<String> {
        self.0.clone()
    }
}

/// The `<PREFIX>_API_KEY` environment variable.
#[derive(Clone, Debug)]
pub struct EnvVar {
    name: String,
}

impl EnvVar {
    /// Reads `<prefix>_API_KEY`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            name: format!("{prefix}_API_KEY"),
        }
    }

    /// Name of the variable consulted.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CredentialProvider for EnvVar {
    fn api_key(&self) -> Option<String> {
        std::env::var(&self.name).ok()
    }
}

/// A file whose whole content is the key. A missing file yields `None`.
#[derive(Clone, Debug)]
pub struct KeyFile(pub PathBuf);

impl CredentialProvider for KeyFile {
    fn api_key(&self) -> Option<String> {
        std::fs::read_to_string(&self.0).ok()
    }
}

/// Ordered list of credential providers.
#[derive(Debug, Default)]
pub struct CredentialChain {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl CredentialChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit value, then `<env_prefix>_API_KEY`, then `key_file`.
    pub fn standard(explicit: Option<String>, env_prefix: &str, key_file: PathBuf) -> Self {
        Self::new()
            .with(Explicit(explicit))
            .with(EnvVar::with_prefix(env_prefix))
            .with(KeyFile(key_file))
    }

    /// Appends a provider, consulted after the existing ones.
    pub fn with(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Returns the first non-blank key, trimmed.
    pub fn resolve(&self) -> Result<String> {
        for provider in &self.providers {
            if let Some(key) = provider.api_key() {
                let key = key.trim();
                if !key.is_empty() {
                    debug!(provider = ?provider, "Resolved API key");
                    return Ok(key.to_string());
                }
            }
        }
        Err(Error::Auth(
            "no API key found (explicit value, environment variable or key file)".to_string(),
        ))
    }
}
