use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_pool_size: u32,
}

#[derive(Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_true")]
    pub api_key_enabled: bool,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    #[serde(default)]
    pub api_key: String,
    /// Passphrase the stored account credentials are encrypted under.
    #[serde(default)]
    pub encryption_password: String,
    #[serde(default)]
    pub encryption_salt: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api_key_enabled: true,
            api_key_header: default_api_key_header(),
            api_key: String::new(),
            encryption_password: String::new(),
            encryption_salt: String::new(),
        }
    }
}

// Secrets stay out of logs even when the whole config is printed.
impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("api_key_enabled", &self.api_key_enabled)
            .field("api_key_header", &self.api_key_header)
            .field("api_key", &"<redacted>")
            .field("encryption_password", &"<redacted>")
            .field("encryption_salt", &"<redacted>")
            .finish()
    }
}

fn default_true() -> bool {
    true
}

fn default_api_key_header() -> String {
    "X-API-Key".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Run-wide cap on in-flight gateway calls.
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
    /// Items of one family evaluated at the same time.
    #[serde(default = "default_item_concurrency")]
    pub item_concurrency: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_concurrent_queries: default_max_concurrent_queries(),
            item_concurrency: default_item_concurrency(),
        }
    }
}

fn default_max_concurrent_queries() -> usize {
    8
}

fn default_item_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// JSON dataset served by the offline gateway.
    #[serde(default)]
    pub fixture_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Cron expression (seconds field first). Takes precedence over `interval_secs`.
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cron: None,
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    86_400
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            !self.security.api_key_header.is_empty(),
            "security.api_key_header must be non-empty"
        );
        anyhow::ensure!(
            !self.security.api_key_enabled || !self.security.api_key.is_empty(),
            "security.api_key must be set when security.api_key_enabled is true"
        );
        anyhow::ensure!(
            !self.security.encryption_password.is_empty(),
            "security.encryption_password must be non-empty"
        );
        anyhow::ensure!(
            !self.security.encryption_salt.is_empty(),
            "security.encryption_salt must be non-empty"
        );
        anyhow::ensure!(
            self.analysis.max_concurrent_queries > 0,
            "analysis.max_concurrent_queries must be > 0, got {}",
            self.analysis.max_concurrent_queries
        );
        anyhow::ensure!(
            self.analysis.item_concurrency > 0,
            "analysis.item_concurrency must be > 0, got {}",
            self.analysis.item_concurrency
        );
        if self.schedule.enabled {
            match &self.schedule.cron {
                Some(expr) => {
                    if let Err(e) = cron::Schedule::from_str(expr) {
                        anyhow::bail!("schedule.cron is not a valid cron expression: {}", e);
                    }
                }
                None => anyhow::ensure!(
                    self.schedule.interval_secs > 0,
                    "schedule.interval_secs must be > 0, got {}",
                    self.schedule.interval_secs
                ),
            }
        }
        Ok(())
    }
}
