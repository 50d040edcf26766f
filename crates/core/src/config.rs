use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["slotbook.toml", "config/slotbook.toml"];

pub const DEFAULT_SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub telegram: TelegramConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub spreadsheet_id: String,
    pub users_sheet: String,
    pub booking_sheet: String,
    pub api_base_url: String,
    pub timeout_secs: u64,
    /// Service-account JSON document, inline.
    pub credentials: SecretString,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
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

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub spreadsheet_id: Option<String>,
    pub store_credentials: Option<String>,
    pub store_api_base_url: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_api_base_url: Option<String>,
    pub health_check_port: Option<u16>,
    pub log_level: Option<String>,
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
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                spreadsheet_id: String::new(),
                users_sheet: "Users".to_string(),
                booking_sheet: "Booking".to_string(),
                api_base_url: DEFAULT_SHEETS_API_BASE_URL.to_string(),
                timeout_secs: 30,
                credentials: String::new().into(),
            },
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: DEFAULT_TELEGRAM_API_BASE_URL.to_string(),
                poll_timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATHS[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(store) = patch.store {
            if let Some(spreadsheet_id) = store.spreadsheet_id {
                self.store.spreadsheet_id = spreadsheet_id;
            }
            if let Some(users_sheet) = store.users_sheet {
                self.store.users_sheet = users_sheet;
            }
            if let Some(booking_sheet) = store.booking_sheet {
                self.store.booking_sheet = booking_sheet;
            }
            if let Some(api_base_url) = store.api_base_url {
                self.store.api_base_url = api_base_url;
            }
            if let Some(timeout_secs) = store.timeout_secs {
                self.store.timeout_secs = timeout_secs;
            }
            if let Some(credentials) = store.credentials {
                self.store.credentials = secret_value(credentials);
            }
        }

        if let Some(telegram) = patch.telegram {
            if let Some(bot_token) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
        if let Some(value) = read_env("SLOTBOOK_STORE_SPREADSHEET_ID") {
            self.store.spreadsheet_id = value;
        }
        if let Some(value) = read_env("SLOTBOOK_STORE_USERS_SHEET") {
            self.store.users_sheet = value;
        }
        if let Some(value) = read_env("SLOTBOOK_STORE_BOOKING_SHEET") {
            self.store.booking_sheet = value;
        }
        if let Some(value) = read_env("SLOTBOOK_STORE_API_BASE_URL") {
            self.store.api_base_url = value;
        }
        if let Some(value) = read_env("SLOTBOOK_STORE_TIMEOUT_SECS") {
            self.store.timeout_secs = parse_u64("SLOTBOOK_STORE_TIMEOUT_SECS", &value)?;
        }
        let credentials =
            read_env("SLOTBOOK_STORE_CREDENTIALS").or_else(|| read_env("GOOGLE_CREDENTIALS"));
        if let Some(value) = credentials {
            self.store.credentials = secret_value(value);
        }

        let bot_token =
            read_env("SLOTBOOK_TELEGRAM_BOT_TOKEN").or_else(|| read_env("API_TOKEN"));
        if let Some(value) = bot_token {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("SLOTBOOK_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("SLOTBOOK_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("SLOTBOOK_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SLOTBOOK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SLOTBOOK_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("SLOTBOOK_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("SLOTBOOK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SLOTBOOK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("SLOTBOOK_LOGGING_LEVEL").or_else(|| read_env("SLOTBOOK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SLOTBOOK_LOGGING_FORMAT").or_else(|| read_env("SLOTBOOK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(spreadsheet_id) = overrides.spreadsheet_id {
            self.store.spreadsheet_id = spreadsheet_id;
        }
        if let Some(credentials) = overrides.store_credentials {
            self.store.credentials = secret_value(credentials);
        }
        if let Some(api_base_url) = overrides.store_api_base_url {
            self.store.api_base_url = api_base_url;
        }
        if let Some(bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(api_base_url) = overrides.telegram_api_base_url {
            self.telegram.api_base_url = api_base_url;
        }
        if let Some(health_check_port) = overrides.health_check_port {
            self.server.health_check_port = health_check_port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_store(&self.store)?;
        validate_telegram(&self.telegram)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The explicit path if it exists, otherwise the first default location present.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_PATHS.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

#[derive(Deserialize)]
struct ServiceAccountShape {
    client_email: Option<String>,
    private_key: Option<String>,
}

/// Checks that a credential blob is a service-account JSON document with the fields the
/// token exchange needs. Returns an operator-facing reason on failure.
pub fn check_service_account_shape(raw: &str) -> Result<(), String> {
    let shape: ServiceAccountShape = serde_json::from_str(raw)
        .map_err(|error| format!("credentials are not a JSON document ({error})"))?;

    let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
    if !present(&shape.client_email) {
        return Err("credentials are missing `client_email`".to_string());
    }
    if !present(&shape.private_key) {
        return Err("credentials are missing `private_key`".to_string());
    }
    Ok(())
}

/// Bot API tokens look like `<numeric bot id>:<secret>`.
pub fn check_bot_token_shape(token: &str) -> Result<(), String> {
    let Some((bot_id, secret)) = token.trim().split_once(':') else {
        return Err("bot token must look like `<bot id>:<secret>`".to_string());
    };
    if bot_id.is_empty() || !bot_id.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err("bot token must start with a numeric bot id".to_string());
    }
    if secret.is_empty() {
        return Err("bot token is missing the secret part after `:`".to_string());
    }
    Ok(())
}

fn validate_store(store: &StoreConfig) -> Result<(), ConfigError> {
    if store.spreadsheet_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "store.spreadsheet_id is required (the id segment of the spreadsheet URL)".to_string(),
        ));
    }

    if store.users_sheet.trim().is_empty() || store.booking_sheet.trim().is_empty() {
        return Err(ConfigError::Validation(
            "store.users_sheet and store.booking_sheet must not be empty".to_string(),
        ));
    }

    if !store.api_base_url.starts_with("http://") && !store.api_base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "store.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if store.timeout_secs == 0 || store.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "store.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let credentials = store.credentials.expose_secret();
    if credentials.trim().is_empty() {
        return Err(ConfigError::Validation(
            "store.credentials is required. Set GOOGLE_CREDENTIALS to the service-account JSON key"
                .to_string(),
        ));
    }
    check_service_account_shape(credentials)
        .map_err(|reason| ConfigError::Validation(format!("store.credentials: {reason}")))?;

    Ok(())
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Set API_TOKEN to the token issued by @BotFather"
                .to_string(),
        ));
    }
    check_bot_token_shape(bot_token)
        .map_err(|reason| ConfigError::Validation(format!("telegram.bot_token: {reason}")))?;

    if !telegram.api_base_url.starts_with("http://")
        && !telegram.api_base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "telegram.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if telegram.poll_timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 0..=60".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    store: Option<StorePatch>,
    telegram: Option<TelegramPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    spreadsheet_id: Option<String>,
    users_sheet: Option<String>,
    booking_sheet: Option<String>,
    api_base_url: Option<String>,
    timeout_secs: Option<u64>,
    credentials: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
