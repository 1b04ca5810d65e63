use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub primary: PrimaryProviderConfig,
    pub free: FreeProviderConfig,
    pub server: ServerConfig,
    pub integrations: IntegrationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// The paid provider hosting the top, mid, and small models.
#[derive(Clone, Debug)]
pub struct PrimaryProviderConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub top_model: String,
    pub mid_model: String,
    pub small_model: String,
    pub timeout_secs: u64,
}

/// The free-tier provider used for cheap chat and classification.
#[derive(Clone, Debug)]
pub struct FreeProviderConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Optional third-party tool integrations. A missing key disables the
/// corresponding tool with a typed error instead of a crash.
#[derive(Clone, Debug)]
pub struct IntegrationsConfig {
    pub places_api_key: Option<SecretString>,
    pub calendar_api_key: Option<SecretString>,
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
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
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
                url: "sqlite://chief.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            primary: PrimaryProviderConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                top_model: "gpt-4o".to_string(),
                mid_model: "gpt-4o-mini".to_string(),
                small_model: "gpt-4o-mini".to_string(),
                timeout_secs: 60,
            },
            free: FreeProviderConfig {
                base_url: "https://api.groq.com/openai/v1".to_string(),
                api_key: None,
                model: "llama-3.1-8b-instant".to_string(),
                timeout_secs: 60,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8090,
                health_check_port: 8091,
                graceful_shutdown_secs: 15,
            },
            integrations: IntegrationsConfig { places_api_key: None, calendar_api_key: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("chief.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
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

        if let Some(primary) = patch.primary {
            if let Some(base_url) = primary.base_url {
                self.primary.base_url = base_url;
            }
            if let Some(api_key_value) = primary.api_key {
                self.primary.api_key = Some(secret_value(api_key_value));
            }
            if let Some(top_model) = primary.top_model {
                self.primary.top_model = top_model;
            }
            if let Some(mid_model) = primary.mid_model {
                self.primary.mid_model = mid_model;
            }
            if let Some(small_model) = primary.small_model {
                self.primary.small_model = small_model;
            }
            if let Some(timeout_secs) = primary.timeout_secs {
                self.primary.timeout_secs = timeout_secs;
            }
        }

        if let Some(free) = patch.free {
            if let Some(base_url) = free.base_url {
                self.free.base_url = base_url;
            }
            if let Some(api_key_value) = free.api_key {
                self.free.api_key = Some(secret_value(api_key_value));
            }
            if let Some(model) = free.model {
                self.free.model = model;
            }
            if let Some(timeout_secs) = free.timeout_secs {
                self.free.timeout_secs = timeout_secs;
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
        }

        if let Some(integrations) = patch.integrations {
            if let Some(places_api_key) = integrations.places_api_key {
                self.integrations.places_api_key = Some(secret_value(places_api_key));
            }
            if let Some(calendar_api_key) = integrations.calendar_api_key {
                self.integrations.calendar_api_key = Some(secret_value(calendar_api_key));
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
        if let Some(value) = read_env("CHIEF_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CHIEF_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("CHIEF_DATABASE_MAX_CONNECTIONS", &value)?;
        }

        if let Some(value) = read_env("CHIEF_PRIMARY_BASE_URL") {
            self.primary.base_url = value;
        }
        if let Some(value) = read_env("CHIEF_PRIMARY_API_KEY") {
            self.primary.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CHIEF_PRIMARY_TOP_MODEL") {
            self.primary.top_model = value;
        }
        if let Some(value) = read_env("CHIEF_PRIMARY_MID_MODEL") {
            self.primary.mid_model = value;
        }
        if let Some(value) = read_env("CHIEF_PRIMARY_SMALL_MODEL") {
            self.primary.small_model = value;
        }

        if let Some(value) = read_env("CHIEF_FREE_BASE_URL") {
            self.free.base_url = value;
        }
        if let Some(value) = read_env("CHIEF_FREE_API_KEY") {
            self.free.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CHIEF_FREE_MODEL") {
            self.free.model = value;
        }

        if let Some(value) = read_env("CHIEF_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CHIEF_SERVER_PORT") {
            self.server.port = parse_u16("CHIEF_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CHIEF_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("CHIEF_HEALTH_CHECK_PORT", &value)?;
        }

        if let Some(value) = read_env("CHIEF_PLACES_API_KEY") {
            self.integrations.places_api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CHIEF_CALENDAR_API_KEY") {
            self.integrations.calendar_api_key = Some(secret_value(value));
        }

        if let Some(value) = read_env("CHIEF_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("CHIEF_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.primary.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("primary.base_url must not be empty".to_string()));
        }
        if self.free.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("free.base_url must not be empty".to_string()));
        }
        if self.primary.mid_model.trim().is_empty() {
            return Err(ConfigError::Validation("primary.mid_model must not be empty".to_string()));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    if let Some(from_env) = read_env("CHIEF_CONFIG") {
        let path = PathBuf::from(from_env);
        return path.exists().then_some(path);
    }
    let default = PathBuf::from("chief.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    primary: Option<PrimaryPatch>,
    free: Option<FreePatch>,
    server: Option<ServerPatch>,
    integrations: Option<IntegrationsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PrimaryPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    top_model: Option<String>,
    mid_model: Option<String>,
    small_model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FreePatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct IntegrationsPatch {
    places_api_key: Option<String>,
    calendar_api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
