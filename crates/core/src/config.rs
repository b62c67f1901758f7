use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub settlement: SettlementConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
    /// When set, GET endpoints degrade to deterministic demo records on
    /// store failure instead of returning errors. Never affects writes.
    pub demo_fallback: bool,
}

/// External settlement provider. Calls are fire-and-forget; when disabled
/// (or no endpoint is configured) the client logs and skips.
#[derive(Clone, Debug)]
pub struct SettlementConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub port: Option<u16>,
    pub demo_fallback: Option<bool>,
    pub settlement_enabled: Option<bool>,
    pub settlement_endpoint: Option<String>,
    pub settlement_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://tradehub.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8484,
                health_check_port: 8485,
                graceful_shutdown_secs: 15,
                demo_fallback: false,
            },
            settlement: SettlementConfig {
                enabled: false,
                endpoint: None,
                api_key: None,
                timeout_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    settlement: Option<SettlementPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    demo_fallback: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct SettlementPatch {
    enabled: Option<bool>,
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tradehub.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(demo_fallback) = server.demo_fallback {
                self.server.demo_fallback = demo_fallback;
            }
        }

        if let Some(settlement) = patch.settlement {
            if let Some(enabled) = settlement.enabled {
                self.settlement.enabled = enabled;
            }
            if let Some(endpoint) = settlement.endpoint {
                self.settlement.endpoint = Some(endpoint);
            }
            if let Some(api_key_value) = settlement.api_key {
                self.settlement.api_key = Some(api_key_value.into());
            }
            if let Some(timeout_secs) = settlement.timeout_secs {
                self.settlement.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("TRADEHUB_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(value) = env::var("TRADEHUB_DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("TRADEHUB_DB_MAX_CONNECTIONS", &value)?;
        }
        if let Ok(value) = env::var("TRADEHUB_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Ok(value) = env::var("TRADEHUB_PORT") {
            self.server.port = parse_env("TRADEHUB_PORT", &value)?;
        }
        if let Ok(value) = env::var("TRADEHUB_HEALTH_PORT") {
            self.server.health_check_port = parse_env("TRADEHUB_HEALTH_PORT", &value)?;
        }
        if let Ok(value) = env::var("TRADEHUB_DEMO_FALLBACK") {
            self.server.demo_fallback = parse_env_bool("TRADEHUB_DEMO_FALLBACK", &value)?;
        }
        if let Ok(value) = env::var("TRADEHUB_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Ok(value) = env::var("TRADEHUB_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }
        if let Ok(value) = env::var("TRADEHUB_SETTLEMENT_ENABLED") {
            self.settlement.enabled = parse_env_bool("TRADEHUB_SETTLEMENT_ENABLED", &value)?;
        }
        if let Ok(value) = env::var("TRADEHUB_SETTLEMENT_ENDPOINT") {
            self.settlement.endpoint = Some(value);
        }
        if let Ok(value) = env::var("TRADEHUB_SETTLEMENT_API_KEY") {
            self.settlement.api_key = Some(value.into());
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(demo_fallback) = overrides.demo_fallback {
            self.server.demo_fallback = demo_fallback;
        }
        if let Some(enabled) = overrides.settlement_enabled {
            self.settlement.enabled = enabled;
        }
        if let Some(endpoint) = overrides.settlement_endpoint {
            self.settlement.endpoint = Some(endpoint);
        }
        if let Some(api_key_value) = overrides.settlement_api_key {
            self.settlement.api_key = Some(api_key_value.into());
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.server.port == self.server.health_check_port {
            return Err(ConfigError::Validation(format!(
                "server.port and server.health_check_port must differ (both {})",
                self.server.port
            )));
        }
        match self.logging.level.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "unsupported logging.level `{other}` (expected trace|debug|info|warn|error)"
                )));
            }
        }
        if self.settlement.enabled {
            match self.settlement.endpoint.as_deref() {
                Some(endpoint)
                    if endpoint.starts_with("http://") || endpoint.starts_with("https://") => {}
                Some(endpoint) => {
                    return Err(ConfigError::Validation(format!(
                        "settlement.endpoint must be an http(s) URL, got `{endpoint}`"
                    )));
                }
                None => {
                    return Err(ConfigError::Validation(
                        "settlement.enabled requires settlement.endpoint".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Effective configuration with secrets redacted, for operator tooling.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "database": {
                "url": self.database.url,
                "max_connections": self.database.max_connections,
                "timeout_secs": self.database.timeout_secs,
            },
            "server": {
                "bind_address": self.server.bind_address,
                "port": self.server.port,
                "health_check_port": self.server.health_check_port,
                "graceful_shutdown_secs": self.server.graceful_shutdown_secs,
                "demo_fallback": self.server.demo_fallback,
            },
            "settlement": {
                "enabled": self.settlement.enabled,
                "endpoint": self.settlement.endpoint,
                "api_key": self.settlement.api_key.as_ref().map(|_| "[redacted]"),
                "timeout_secs": self.settlement.timeout_secs,
            },
            "logging": {
                "level": self.logging.level,
                "format": self.logging.format,
            },
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_env_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    if let Ok(path) = env::var("TRADEHUB_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }
    let default = PathBuf::from("tradehub.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    #[test]
    fn defaults_validate() {
        let config = AppConfig::load(LoadOptions::default()).expect("defaults should load");
        assert_eq!(config.server.port, 8484);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(!config.server.demo_fallback);
        assert!(!config.settlement.enabled);
    }

    #[test]
    fn file_patch_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
[database]
url = "sqlite::memory:"

[server]
port = 9000
demo_fallback = true

[logging]
level = "debug"
format = "json"
"#
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect("file config should load");

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.server.port, 9000);
        assert!(config.server.demo_fallback);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn programmatic_overrides_win() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                demo_fallback: Some(true),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("overrides should load");

        assert_eq!(config.database.url, "sqlite::memory:");
        assert!(config.server.demo_fallback);
    }

    #[test]
    fn enabled_settlement_requires_http_endpoint() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                settlement_enabled: Some(true),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                settlement_enabled: Some(true),
                settlement_endpoint: Some("ftp://provider.example".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                settlement_enabled: Some(true),
                settlement_endpoint: Some("https://provider.example/api".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("https endpoint should validate");
    }

    #[test]
    fn summary_redacts_the_api_key() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                settlement_enabled: Some(true),
                settlement_endpoint: Some("https://provider.example/api".to_string()),
                settlement_api_key: Some("sk-very-secret".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("config should load");

        let summary = config.summary();
        assert_eq!(summary["settlement"]["api_key"], "[redacted]");
        assert!(!summary.to_string().contains("sk-very-secret"));
    }

    #[test]
    fn mismatched_ports_are_rejected() {
        let mut config = AppConfig::default();
        config.server.health_check_port = config.server.port;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }
}
