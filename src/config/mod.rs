use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for a single request, store calls included
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLx connection string, e.g. `sqlite:./data/pvz.db?mode=rwc`
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_lifetime_secs: default_max_lifetime(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:./data/pvz.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    5
}

fn default_idle_timeout() -> u64 {
    30 * 60
}

fn default_max_lifetime() -> u64 {
    15 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC key used to sign access tokens
    #[serde(default = "generate_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: i64,
    /// Process-wide secret mixed into every password hash
    #[serde(default = "generate_secret")]
    pub password_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: generate_secret(),
            token_ttl_minutes: default_token_ttl(),
            password_secret: generate_secret(),
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.token_ttl_minutes)
    }
}

/// Longest accepted token lifetime (one year)
const MAX_TOKEN_TTL_MINUTES: i64 = 366 * 24 * 60;

fn default_token_ttl() -> i64 {
    24 * 60
}

/// Random hex secret used when none is configured.
///
/// Tokens and password hashes produced with it do not survive a restart.
fn generate_secret() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Expose `/metrics` in Prometheus text format
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// Values supplied on the command line or through the environment.
///
/// They take precedence over the file so secrets never have to live in it.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub password_secret: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(secret) = overrides.jwt_secret {
            self.auth.jwt_secret = secret;
        }
        if let Some(secret) = overrides.password_secret {
            self.auth.password_secret = secret;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        self
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.request_timeout_secs == 0 {
            anyhow::bail!("server.request_timeout_secs must be at least 1");
        }
        if self.auth.token_ttl_minutes <= 0 {
            anyhow::bail!("auth.token_ttl_minutes must be positive");
        }
        if self.auth.token_ttl_minutes > MAX_TOKEN_TTL_MINUTES {
            anyhow::bail!(
                "auth.token_ttl_minutes must not exceed {}",
                MAX_TOKEN_TTL_MINUTES
            );
        }
        if self.auth.jwt_secret.len() < 32 {
            warn!("auth.jwt_secret is shorter than 32 characters");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }
        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!("database.min_connections exceeds database.max_connections");
        }
        Ok(())
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
