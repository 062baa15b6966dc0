//! Runtime configuration for the chat relay.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 5000;
/// Default upstream API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
/// Default upstream model identifier.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
/// Output token budget per completion.
pub const DEFAULT_MAX_TOKENS: u32 = 500;
/// Sampling temperature per completion.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Upstream request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the upstream credential.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
/// Environment variable for the listening port.
pub const PORT_ENV: &str = "PORT";
/// Environment variable for the static asset directory.
pub const STATIC_DIR_ENV: &str = "CHAT_RELAY_STATIC_DIR";
/// Environment variable for the system prompt file.
pub const SYSTEM_PROMPT_ENV: &str = "CHAT_RELAY_SYSTEM_PROMPT";
/// Environment variable overriding the upstream base URL.
pub const UPSTREAM_URL_ENV: &str = "CHAT_RELAY_UPSTREAM_URL";
/// Environment variable overriding the upstream model.
pub const MODEL_ENV: &str = "CHAT_RELAY_MODEL";
/// Environment variable overriding the upstream timeout, in whole seconds.
pub const TIMEOUT_ENV: &str = "CHAT_RELAY_TIMEOUT_SECS";

/// Configuration errors raised at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// A URL could not be parsed.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    /// The system prompt file could not be read.
    #[error("failed to read system prompt {path}: {source}")]
    SystemPrompt {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result alias for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level relay configuration.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Port the HTTP server binds on all interfaces.
    pub port: u16,
    /// Directory holding `index.html`, `style.css` and `script.js`.
    pub static_dir: PathBuf,
    /// File containing the system prompt.
    pub system_prompt_path: PathBuf,
    /// Upstream completion API settings.
    pub upstream: UpstreamConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("static"),
            system_prompt_path: PathBuf::from("system_prompt.txt"),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Create a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from process environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable is set to an unparsable value.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    /// Returns an error if a variable is set to an unparsable value.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();
        let mut upstream = UpstreamConfig::default();

        if let Some(port) = get(PORT_ENV) {
            let port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{PORT_ENV} is not a valid port: {port}")))?;
            config = config.with_port(port);
        }
        if let Some(dir) = get(STATIC_DIR_ENV) {
            config = config.with_static_dir(dir);
        }
        if let Some(path) = get(SYSTEM_PROMPT_ENV) {
            config = config.with_system_prompt_path(path);
        }
        if let Some(url) = get(UPSTREAM_URL_ENV) {
            upstream = upstream.with_base_url(url);
        }
        if let Some(model) = get(MODEL_ENV) {
            upstream = upstream.with_model(model);
        }
        if let Some(secs) = get(TIMEOUT_ENV) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{TIMEOUT_ENV} is not a number of seconds: {secs}"))
            })?;
            upstream = upstream.with_timeout(Duration::from_secs(secs));
        }
        if let Some(key) = get(API_KEY_ENV) {
            upstream = upstream.with_api_key(key);
        }

        Ok(config.with_upstream(upstream))
    }

    /// Set the listening port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the static asset directory.
    #[must_use]
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }

    /// Set the system prompt file.
    #[must_use]
    pub fn with_system_prompt_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.system_prompt_path = path.into();
        self
    }

    /// Replace the upstream settings.
    #[must_use]
    pub fn with_upstream(mut self, upstream: UpstreamConfig) -> Self {
        self.upstream = upstream;
        self
    }

    /// Validate configuration invariants.
    ///
    /// A missing API key is not an error here: it fails each chat request
    /// instead.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        self.upstream.validate()
    }

    /// Read the system prompt file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn load_system_prompt(&self) -> ConfigResult<String> {
        read_system_prompt(&self.system_prompt_path)
    }
}

/// Read a system prompt from disk.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_system_prompt(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::SystemPrompt {
        path: path.to_path_buf(),
        source,
    })
}

/// Upstream completion API settings.
#[derive(Clone)]
pub struct UpstreamConfig {
    /// Secret credential; redacted from `Debug` output.
    pub api_key: Option<String>,
    /// API base URL, without the `/v1/messages` suffix.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Output token budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl UpstreamConfig {
    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether an API key is configured.
    #[must_use]
    pub const fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Full URL of the messages endpoint.
    #[must_use]
    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    /// Validate upstream settings.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        Url::parse(&self.base_url)?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("upstream.model must not be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("upstream.max_tokens must be > 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(
                "upstream.temperature must be within 0.0..=1.0".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("upstream.timeout must be > 0".to_string()));
        }

        Ok(())
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}
