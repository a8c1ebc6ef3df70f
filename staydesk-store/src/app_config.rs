use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub links: LinksConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub wizard: WizardConfig,
}

/// Where state lives. `Memory` keeps everything in-process.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_rate_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Signs the session cookie.
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    /// Verifies ID tokens minted by the identity provider.
    pub identity_secret: String,
    #[serde(default = "default_true")]
    pub cookie_secure: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinksConfig {
    /// Base of the guest-facing URLs, e.g. `https://book.example.com`.
    pub public_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub public_base_url: String,
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: u64,
}

fn default_max_upload() -> u64 {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct WizardConfig {
    pub draft_ttl_seconds: u64,
    pub arrival_horizon_days: i64,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            draft_ttl_seconds: 14 * 24 * 3600,
            arrival_horizon_days: 7,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `STAYDESK__AUTH__JWT_SECRET=...`
            .add_source(config::Environment::with_prefix("STAYDESK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
