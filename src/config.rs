use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, error};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated. Any origin when unset.
    pub cors_origins: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Directory holding the editor page served for unknown routes
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Push the current document to a peer right after it joins
    #[serde(default = "default_replay_on_join")]
    pub replay_on_join: bool,

    /// Create unknown sessions on /live/{id} instead of rejecting the upgrade
    #[serde(default)]
    pub auto_create_sessions: bool,

    /// How long a session may sit without peers before it is evicted
    #[serde(default = "default_session_grace_secs")]
    pub session_grace_secs: u64,

    /// Reaper tick. 0 disables eviction.
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,

    /// Upper bound for a single frame write to a peer
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Content of a freshly bootstrapped session
    #[serde(default)]
    pub initial_document: String,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("✅ Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("❌ Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Build a configuration from explicit key/value pairs, using the same
    /// names as the environment variables.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter::<_, Config>(pairs).map_err(ConfigError::EnvError)
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    pub fn session_grace(&self) -> Duration {
        Duration::from_secs(self.session_grace_secs)
    }

    pub fn reaper_interval(&self) -> Option<Duration> {
        if self.reaper_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.reaper_interval_secs))
        }
    }

    /// The subset of settings the realtime path needs.
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            replay_on_join: self.replay_on_join,
            auto_create_sessions: self.auto_create_sessions,
            send_timeout: Duration::from_millis(self.send_timeout_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
            service_name: default_service_name(),
            static_dir: default_static_dir(),
            replay_on_join: default_replay_on_join(),
            auto_create_sessions: false,
            session_grace_secs: default_session_grace_secs(),
            reaper_interval_secs: default_reaper_interval_secs(),
            send_timeout_ms: default_send_timeout_ms(),
            initial_document: String::new(),
        }
    }
}

/// Settings consulted on every connection
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub replay_on_join: bool,
    pub auto_create_sessions: bool,
    pub send_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Config::default().sync_settings()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "sharecode".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_static_dir() -> String {
    "www".to_string()
}

fn default_replay_on_join() -> bool {
    true
}

fn default_session_grace_secs() -> u64 {
    300
}

fn default_reaper_interval_secs() -> u64 {
    30
}

fn default_send_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = Config::from_pairs(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert!(config.replay_on_join);
        assert!(!config.auto_create_sessions);
        assert_eq!(config.session_grace(), Duration::from_secs(300));
        assert_eq!(config.static_dir, "www");
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = Config::from_pairs(pairs(&[
            ("PORT", "9001"),
            ("REPLAY_ON_JOIN", "false"),
            ("AUTO_CREATE_SESSIONS", "true"),
            ("REAPER_INTERVAL_SECS", "0"),
            ("SEND_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.server_address(), "0.0.0.0:9001");
        assert!(config.reaper_interval().is_none());

        let settings = config.sync_settings();
        assert!(!settings.replay_on_join);
        assert!(settings.auto_create_sessions);
        assert_eq!(settings.send_timeout, Duration::from_millis(250));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = Config::from_pairs(pairs(&[("PORT", "not-a-port")])).unwrap_err();
        assert!(err.to_string().starts_with("Environment variable error"));
    }
}
