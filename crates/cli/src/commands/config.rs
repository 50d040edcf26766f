use std::env;
use std::fs;
use std::path::Path;

use secrecy::ExposeSecret;
use slotbook_core::config::{resolve_config_path, AppConfig, LoadOptions};
use slotbook_sheets::ServiceAccountKey;
use toml::Value;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    CommandResult::report(render(&config), true)
}

/// One line per effective setting, secrets redacted, each tagged with where it came from.
pub fn render(config: &AppConfig) -> String {
    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "store.spreadsheet_id",
        &config.store.spreadsheet_id,
        source("store.spreadsheet_id", &["SLOTBOOK_STORE_SPREADSHEET_ID"]),
    ));
    lines.push(render_line(
        "store.users_sheet",
        &config.store.users_sheet,
        source("store.users_sheet", &["SLOTBOOK_STORE_USERS_SHEET"]),
    ));
    lines.push(render_line(
        "store.booking_sheet",
        &config.store.booking_sheet,
        source("store.booking_sheet", &["SLOTBOOK_STORE_BOOKING_SHEET"]),
    ));
    lines.push(render_line(
        "store.api_base_url",
        &config.store.api_base_url,
        source("store.api_base_url", &["SLOTBOOK_STORE_API_BASE_URL"]),
    ));
    lines.push(render_line(
        "store.timeout_secs",
        &config.store.timeout_secs.to_string(),
        source("store.timeout_secs", &["SLOTBOOK_STORE_TIMEOUT_SECS"]),
    ));
    lines.push(render_line(
        "store.credentials",
        &redact_credentials(config.store.credentials.expose_secret()),
        source("store.credentials", &["SLOTBOOK_STORE_CREDENTIALS", "GOOGLE_CREDENTIALS"]),
    ));

    lines.push(render_line(
        "telegram.bot_token",
        &redact_token(config.telegram.bot_token.expose_secret()),
        source("telegram.bot_token", &["SLOTBOOK_TELEGRAM_BOT_TOKEN", "API_TOKEN"]),
    ));
    lines.push(render_line(
        "telegram.api_base_url",
        &config.telegram.api_base_url,
        source("telegram.api_base_url", &["SLOTBOOK_TELEGRAM_API_BASE_URL"]),
    ));
    lines.push(render_line(
        "telegram.poll_timeout_secs",
        &config.telegram.poll_timeout_secs.to_string(),
        source("telegram.poll_timeout_secs", &["SLOTBOOK_TELEGRAM_POLL_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", &["SLOTBOOK_SERVER_BIND_ADDRESS"]),
    ));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        source("server.health_check_port", &["SLOTBOOK_SERVER_HEALTH_CHECK_PORT"]),
    ));
    lines.push(render_line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        source("server.graceful_shutdown_secs", &["SLOTBOOK_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["SLOTBOOK_LOGGING_LEVEL", "SLOTBOOK_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["SLOTBOOK_LOGGING_FORMAT", "SLOTBOOK_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the numeric bot id, hides the secret after `:`.
pub fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}

/// Shows which service account the key belongs to, never the key itself.
pub fn redact_credentials(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "<empty>".to_string();
    }

    match ServiceAccountKey::from_json(raw) {
        Ok(key) => format!("<service account {}>", key.client_email()),
        Err(_) => "<redacted>".to_string(),
    }
}
