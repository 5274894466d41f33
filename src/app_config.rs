//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with POLLS_, nested keys split by `__`)
//! 2. Config file (config.toml)
//! 3. Default values
//!
//! The session signing key is read from SECRET_KEY and never lives in the
//! config file.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Global application configuration
pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL. `DATABASE_URL` takes precedence when set.
    pub url: String,
    pub max_connections: u32,
    /// Create the questions and choices tables on startup if missing
    pub create_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://polls.db?mode=rwc".to_string(),
            max_connections: 5,
            create_schema: true,
        }
    }
}

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Polls".to_string(),
        }
    }
}

/// Public poll pages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollsConfig {
    /// Number of questions shown on the index page
    pub latest_limit: u64,
    /// Window used by the "published recently" flag
    pub recent_window_hours: i64,
}

impl Default for PollsConfig {
    fn default() -> Self {
        Self {
            latest_limit: 5,
            recent_window_hours: 24,
        }
    }
}

/// Administrative interface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the /admin/ routes
    pub enabled: bool,
    /// Render inline choice vote counts as read-only
    pub choice_votes_readonly: bool,
    /// Blank inline choice rows offered on the question form
    pub extra_choices: usize,
    /// Rows per admin list page
    pub per_page: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            choice_votes_readonly: false,
            extra_choices: 3,
            per_page: 100,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub site: SiteConfig,
    pub polls: PollsConfig,
    pub admin: AdminConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        use config::FileFormat;

        let config = Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // e.g. POLLS_DATABASE__URL, POLLS_ADMIN__CHOICE_VOTES_READONLY
            .add_source(
                Environment::with_prefix("POLLS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Database URL, preferring the conventional DATABASE_URL variable
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.database.url.clone())
    }
}

/// Initialize application configuration
///
/// Triggers the lazy load of the config file and logs the result.
pub fn init() {
    let config = get_config();
    log::info!(
        "Configuration loaded: site.name = {}, server.bind = {}",
        config.site.name,
        config.server.bind
    );
}

/// Get the current application configuration
pub fn get_config() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

/// Get site configuration
pub fn site() -> SiteConfig {
    get_config().site
}

/// Get public poll configuration
pub fn polls() -> PollsConfig {
    get_config().polls
}

/// Get admin configuration
pub fn admin() -> AdminConfig {
    get_config().admin
}
