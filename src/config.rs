//! Configuration loading and validation.
//!
//! Loads `supportdesk.toml` (or `$SUPPORTDESK_CONFIG_PATH`). Environment
//! variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Config file path used when `$SUPPORTDESK_CONFIG_PATH` is unset.
const DEFAULT_CONFIG_FILE: &str = "supportdesk.toml";

// ── Top-level config ────────────────────────────────────────────

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Filesystem paths for persistent state.
    pub paths: PathsConfig,
    /// Priority queue tuning.
    pub queue: QueueConfig,
    /// Response-generation model settings.
    pub llm: LlmConfig,
    /// Outbound SMTP relay. Absent means replies are recorded but not transmitted.
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// If the file does not exist, defaults are used.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let path = config_path_with(env);
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(env);
        Ok(config)
    }

    /// Load from a TOML file only, no env overrides.
    fn load_from(path: &std::path::Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("failed to parse config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            )),
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or has the wrong shape.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_str).context("failed to parse config TOML")?;
        config.queue.enforce_minimums();
        Ok(config)
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Variables are looked up through `env`.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("SUPPORTDESK_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = env("SUPPORTDESK_DATABASE") {
            self.paths.database = PathBuf::from(v);
        }
        if let Some(v) = env("SUPPORTDESK_LOGS_DIR") {
            self.paths.logs_dir = PathBuf::from(v);
        }

        override_parsed(
            &env,
            "SUPPORTDESK_QUEUE_INTERVAL_MS",
            &mut self.queue.interval_ms,
        );
        override_parsed(
            &env,
            "SUPPORTDESK_QUEUE_CONCURRENCY",
            &mut self.queue.max_concurrent_processing,
        );
        self.queue.enforce_minimums();

        if let Some(v) = env("OPENAI_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = env("SUPPORTDESK_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = env("SUPPORTDESK_LLM_BASE_URL") {
            self.llm.base_url = v;
        }

        // SMTP_HOST creates the section when the file has none.
        if let Some(host) = env("SMTP_HOST") {
            let smtp = self.smtp.get_or_insert_with(|| SmtpConfig {
                host: host.clone(),
                ..SmtpConfig::default()
            });
            smtp.host = host;
        }
        if let Some(smtp) = self.smtp.as_mut() {
            override_parsed(&env, "SMTP_PORT", &mut smtp.port);
            if let Some(v) = env("SMTP_USERNAME") {
                smtp.username = Some(v);
            }
            if let Some(v) = env("SMTP_PASSWORD") {
                smtp.password = Some(v);
            }
            if let Some(v) = env("SMTP_FROM") {
                smtp.from_address = v;
            }
        }
    }
}

/// Resolve config path using a custom env resolver.
///
/// Checks `$SUPPORTDESK_CONFIG_PATH` first, then `./supportdesk.toml`.
pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    env("SUPPORTDESK_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn override_parsed<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    target: &mut T,
) {
    if let Some(v) = env(key) {
        match v.parse() {
            Ok(n) => *target = n,
            Err(_) => tracing::warn!(var = key, value = %v, "ignoring invalid env override"),
        }
    }
}

// ── Sections ────────────────────────────────────────────────────

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the REST API binds to.
    pub bind: String,
    /// Browser origins allowed by CORS.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_owned(),
            cors_origins: vec![
                "http://localhost:3000".to_owned(),
                "http://localhost:5173".to_owned(),
            ],
        }
    }
}

/// Filesystem paths for persistent state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// SQLite database holding email records.
    pub database: PathBuf,
    /// Directory for rotated JSON logs.
    pub logs_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("supportdesk.db"),
            logs_dir: PathBuf::from("logs"),
        }
    }
}

/// Priority queue tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum items processed concurrently by one sweep.
    pub max_concurrent_processing: usize,
    /// Milliseconds between automatic sweeps.
    pub interval_ms: u64,
    /// Attempts granted to each enqueued item.
    pub max_attempts: u32,
    /// Upper bound on a single generator or sender call.
    pub call_timeout_secs: u64,
}

impl QueueConfig {
    /// Sweep interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Collaborator call timeout as a [`Duration`].
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Raise a zero `max_concurrent_processing` or `max_attempts` to 1.
    ///
    /// A sweep with no slots never drains the queue, and an item with no
    /// attempts would exceed its cap on the first try.
    pub fn enforce_minimums(&mut self) {
        if self.max_concurrent_processing == 0 {
            tracing::warn!(
                field = "max_concurrent_processing",
                "queue setting must be at least 1, using 1"
            );
            self.max_concurrent_processing = 1;
        }
        if self.max_attempts == 0 {
            tracing::warn!(field = "max_attempts", "queue setting must be at least 1, using 1");
            self.max_attempts = 1;
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_processing: 5,
            interval_ms: 30_000,
            max_attempts: 3,
            call_timeout_secs: 60,
        }
    }
}

/// Response-generation model settings (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// API key. `None` disables the provider and enables template replies.
    pub api_key: Option<String>,
    /// Maximum tokens per generated reply.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            api_key: None,
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

/// Outbound SMTP relay settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// Relay host name.
    pub host: String,
    /// Relay port (STARTTLS).
    pub port: u16,
    /// Optional login user.
    pub username: Option<String>,
    /// Optional login password.
    pub password: Option<String>,
    /// Address replies are sent from.
    pub from_address: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            username: None,
            password: None,
            from_address: "support@example.com".to_owned(),
        }
    }
}
