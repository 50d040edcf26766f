use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use slotbook_assistant::BookingAssistant;
use slotbook_core::config::{AppConfig, ConfigError, LoadOptions};
use slotbook_core::session::InMemorySessionStore;
use slotbook_sheets::{
    BookingGrid, GoogleSheetsStore, ServiceAccountKey, ServiceAccountTokenSource, SheetsSettings,
    StoreError, TabularStore,
};
use slotbook_telegram::{
    dispatcher_for, PollingRunner, ReconnectPolicy, TelegramBotApi, TransportError,
};
use thiserror::Error;
use tracing::info;

use crate::health::HealthState;

pub struct Application {
    pub config: AppConfig,
    pub health: HealthState,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("store setup failed: {0}")]
    Store(#[source] StoreError),
    #[error("chat transport setup failed: {0}")]
    Transport(#[source] TransportError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let store = connect_store(&config)?;
    info!(
        event_name = "system.bootstrap.store_configured",
        correlation_id = "bootstrap",
        users_sheet = %config.store.users_sheet,
        booking_sheet = %config.store.booking_sheet,
        "tabular store configured"
    );

    let assistant = BookingAssistant::over_store(
        Arc::clone(&store),
        Arc::new(InMemorySessionStore::default()),
        &config.store.users_sheet,
        &config.store.booking_sheet,
    );
    let health =
        HealthState::new(Arc::new(BookingGrid::new(store, config.store.booking_sheet.as_str())));

    let bot_api =
        Arc::new(TelegramBotApi::new(&config.telegram).map_err(BootstrapError::Transport)?);
    let runner = PollingRunner::new(
        bot_api.clone(),
        bot_api,
        dispatcher_for(Arc::new(assistant)),
        ReconnectPolicy::default(),
    );
    info!(
        event_name = "system.bootstrap.transport_configured",
        correlation_id = "bootstrap",
        poll_timeout_secs = config.telegram.poll_timeout_secs,
        "telegram long polling configured"
    );

    Ok(Application { config, health, runner })
}

fn connect_store(config: &AppConfig) -> Result<Arc<dyn TabularStore>, BootstrapError> {
    let key = ServiceAccountKey::from_json(config.store.credentials.expose_secret())
        .map_err(BootstrapError::Store)?;
    let token_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.store.timeout_secs))
        .build()
        .map_err(|error| {
            BootstrapError::Store(StoreError::Request(format!(
                "could not build token client: {error}"
            )))
        })?;
    let tokens = Arc::new(ServiceAccountTokenSource::new(key, token_client));

    let store = GoogleSheetsStore::new(SheetsSettings::from(&config.store), tokens)
        .map_err(BootstrapError::Store)?;
    Ok(Arc::new(store))
}
