//! Client configuration and TOML/YAML parsing.
//!
//! Everything here is plain data; [`crate::SindriClient::new`] resolves credentials
//! and normalizes the base URL when the client is built.

use std::{path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Default base URL of the Sindri API, without the version segment.
pub const DEFAULT_API_URL: &str = "https://sindri.app/api/";

/// API version segment appended to the base URL.
pub const API_VERSION: &str = "v1";

/// Default prefix of the `<PREFIX>_API_KEY` environment variable.
pub const DEFAULT_ENV_PREFIX: &str = "SINDRI";

/// Default location of the API key file.
pub const DEFAULT_KEY_FILE: &str = "API_KEY";

/// Client configuration loaded from a TOML/YAML file or built in code.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Explicit API key. Takes precedence over the environment and the key file.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL of the service. `v1/` is appended if missing.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Prefix of the `<PREFIX>_API_KEY` environment variable.
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
    /// File holding the API key, consulted last.
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
    /// Which events reach the event sink.
    #[serde(default)]
    pub verbosity: Verbosity,
    /// Polling policy while a circuit compiles.
    #[serde(default = "PollPolicy::compile", deserialize_with = "compile_poll")]
    pub compile_poll: PollPolicy,
    /// Polling policy while a proof is generated.
    #[serde(default = "PollPolicy::prove", deserialize_with = "prove_poll")]
    pub prove_poll: PollPolicy,
    /// How circuit sources reach the service.
    #[serde(default)]
    pub upload_flow: UploadFlow,
    /// Ask the service to verify proofs while proving.
    #[serde(default)]
    pub perform_verify: bool,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_env_prefix() -> String {
    DEFAULT_ENV_PREFIX.to_string()
}

fn default_key_file() -> PathBuf {
    PathBuf::from(DEFAULT_KEY_FILE)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            env_prefix: default_env_prefix(),
            key_file: default_key_file(),
            verbosity: Verbosity::default(),
            compile_poll: PollPolicy::compile(),
            prove_poll: PollPolicy::prove(),
            upload_flow: UploadFlow::default(),
            perform_verify: false,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_url", &self.api_url)
            .field("env_prefix", &self.env_prefix)
            .field("key_file", &self.key_file)
            .field("verbosity", &self.verbosity)
            .field("compile_poll", &self.compile_poll)
            .field("prove_poll", &self.prove_poll)
            .field("upload_flow", &self.upload_flow)
            .field("perform_verify", &self.perform_verify)
            .finish()
    }
}

impl ClientConfig {
    /// Load config from file (auto-detects format from extension).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let string = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config at {path:?}: {e}")))?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Self::from_toml_str(&string),
            Some("yaml" | "yml") => Self::from_yaml_str(&string),
            Some(ext) => Err(Error::Config(format!("Unsupported config format: .{ext}"))),
            None => Err(Error::Config(
                "Config file must have an extension (e.g., .toml)".to_string(),
            )),
        }
    }

    /// Parse config from TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml_edit::de::from_str(s)
            .map_err(|e| Error::Config(format!("Failed to deserialize TOML config: {e}")))
    }

    /// Parse config from YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s)
            .map_err(|e| Error::Config(format!("Failed to deserialize YAML config: {e}")))
    }

    /// The base URL with the version segment appended exactly once.
    pub fn versioned_api_url(&self) -> Result<Url> {
        versioned_api_url(&self.api_url)
    }
}

/// Appends the `v1/` version segment to `api_url` unless it is already there.
///
/// The result always ends with a slash so relative endpoint paths join below it.
/// Applying this to its own output returns the same URL.
pub fn versioned_api_url(api_url: &str) -> Result<Url> {
    let trimmed = api_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Config("API URL is empty".to_string()));
    }

    let mut url = Url::parse(&format!("{trimmed}/"))?;
    let already_versioned = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .is_some_and(|last| last == API_VERSION);
    if !already_versioned {
        url = url.join(&format!("{API_VERSION}/"))?;
    }
    Ok(url)
}

/// How much the client reports to its event sink.
///
/// Verbosity never changes which requests are made or what is returned.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Verbosity {
    /// Report nothing.
    Silent,
    /// Report progress and slim resource summaries.
    #[default]
    Summary,
    /// Report progress, every poll, and full resource details.
    Full,
}

/// Bounded polling schedule for a long-running job.
///
/// The worst-case wait is `interval * max_attempts`, further capped by `timeout_ms`
/// when set. The deadline is measured from the start of polling.
///
/// In a config file every field is optional; unset fields keep the defaults of the
/// job ([`PollPolicy::compile`] or [`PollPolicy::prove`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Pause between status reads, in milliseconds.
    pub interval_ms: u64,
    /// Maximum number of status reads.
    pub max_attempts: u32,
    /// Absolute deadline for polling, in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl PollPolicy {
    /// Default for circuit compilation: 1s interval, about 10 minutes.
    pub fn compile() -> Self {
        Self {
            interval_ms: 1000,
            max_attempts: 600,
            timeout_ms: None,
        }
    }

    /// Default for proof generation: 1s interval, about 20 minutes.
    pub fn prove() -> Self {
        Self {
            interval_ms: 1000,
            max_attempts: 1200,
            timeout_ms: None,
        }
    }

    /// Builds a policy from an interval and attempt budget, without deadline.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval_ms: millis(interval),
            max_attempts,
            timeout_ms: None,
        }
    }

    /// Adds an absolute deadline, kept to millisecond precision.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(millis(timeout));
        self
    }

    /// Pause between status reads.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Absolute deadline, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Poll settings as written in a config file.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PollOverrides {
    interval_ms: Option<u64>,
    max_attempts: Option<u32>,
    timeout_ms: Option<u64>,
}

impl PollOverrides {
    fn apply(self, base: PollPolicy) -> PollPolicy {
        PollPolicy {
            interval_ms: self.interval_ms.unwrap_or(base.interval_ms),
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            timeout_ms: self.timeout_ms.or(base.timeout_ms),
        }
    }
}

fn compile_poll<'de, D>(deserializer: D) -> std::result::Result<PollPolicy, D::Error>
where
    D: Deserializer<'de>,
{
    PollOverrides::deserialize(deserializer).map(|overrides| overrides.apply(PollPolicy::compile()))
}

fn prove_poll<'de, D>(deserializer: D) -> std::result::Result<PollPolicy, D::Error>
where
    D: Deserializer<'de>,
{
    PollOverrides::deserialize(deserializer).map(|overrides| overrides.apply(PollPolicy::prove()))
}

/// How circuit sources are sent to the service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UploadFlow {
    /// One multipart `circuit/create` carrying the bundle; compilation starts on upload.
    #[default]
    Single,
    /// Legacy flow: `circuit/create`, then `uploadfiles`, then `compile`.
    Staged {
        /// Service label for the proof system, e.g. `"Circom C Groth16 bn254"`.
        circuit_type: String,
    },
}
