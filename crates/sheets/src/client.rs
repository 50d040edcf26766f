use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use slotbook_core::config::StoreConfig;
use slotbook_core::grid::{CellAddress, CellRange};

use crate::auth::AccessTokenProvider;
use crate::gateway::{qualified_range, CellValue, StoreError, TabularStore, ValueRange};

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetsSettings {
    pub spreadsheet_id: String,
    pub api_base_url: String,
    pub timeout: Duration,
}

impl From<&StoreConfig> for SheetsSettings {
    fn from(config: &StoreConfig) -> Self {
        Self {
            spreadsheet_id: config.spreadsheet_id.clone(),
            api_base_url: config.api_base_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// [`TabularStore`] over the Google Sheets v4 values API.
pub struct GoogleSheetsStore {
    client: Client,
    settings: SheetsSettings,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl GoogleSheetsStore {
    pub fn new(
        settings: SheetsSettings,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|error| StoreError::Request(format!("could not build http client: {error}")))?;
        Ok(Self::with_client(client, settings, tokens))
    }

    pub fn with_client(
        client: Client,
        settings: SheetsSettings,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self { client, settings, tokens }
    }

    /// `{base}/spreadsheets/{id}/values/{range}{suffix}`
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, StoreError> {
        values_url(&self.settings, range, suffix)
    }

    async fn send(&self, request: RequestBuilder, range: &str) -> Result<Response, StoreError> {
        let token = self.tokens.access_token().await?;
        let response =
            request.bearer_auth(token.expose_secret()).send().await.map_err(|error| {
                let error = error.without_url();
                warn!(
                    event_name = "store.request_failed",
                    range = %range,
                    error = %error,
                    "store request failed"
                );
                StoreError::Request(error.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        warn!(
            event_name = "store.request_rejected",
            range = %range,
            status = status.as_u16(),
            "store rejected request"
        );
        Err(StoreError::Status { status: status.as_u16(), body })
    }
}

#[async_trait]
impl TabularStore for GoogleSheetsStore {
    async fn read_range(&self, sheet: &str, range: &CellRange) -> Result<ValueRange, StoreError> {
        let qualified = qualified_range(sheet, range);
        let url = self.values_url(&qualified, "")?;
        let request = self
            .client
            .get(url)
            .query(&[("majorDimension", "ROWS"), ("valueRenderOption", "FORMATTED_VALUE")]);

        let response = self.send(request, &qualified).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|error| StoreError::Decode(error.without_url().to_string()))?;
        let values = decode_value_range(&body)?;

        debug!(
            event_name = "store.range_read",
            range = %qualified,
            rows = values.rows().len(),
            "read store range"
        );
        Ok(values)
    }

    async fn append_row(&self, sheet: &str, values: Vec<String>) -> Result<(), StoreError> {
        let anchor = CellRange::cell(CellAddress::new(1, 1)?);
        let qualified = qualified_range(sheet, &anchor);
        let url = self.values_url(&qualified, ":append")?;
        let request = self
            .client
            .post(url)
            .query(&[("valueInputOption", "USER_ENTERED"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "majorDimension": "ROWS", "values": [values] }));

        self.send(request, &qualified).await?;
        debug!(event_name = "store.row_appended", range = %qualified, "appended store row");
        Ok(())
    }

    async fn update_cell(
        &self,
        sheet: &str,
        cell: CellAddress,
        value: &str,
    ) -> Result<(), StoreError> {
        let qualified = qualified_range(sheet, &CellRange::cell(cell));
        let url = self.values_url(&qualified, "")?;
        let request = self
            .client
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "range": qualified, "majorDimension": "ROWS", "values": [[value]] }));

        self.send(request, &qualified).await?;
        debug!(event_name = "store.cell_updated", range = %qualified, "updated store cell");
        Ok(())
    }
}

fn values_url(settings: &SheetsSettings, range: &str, suffix: &str) -> Result<Url, StoreError> {
    let mut url = Url::parse(&settings.api_base_url).map_err(|error| {
        StoreError::Request(format!("invalid store base url `{}`: {error}", settings.api_base_url))
    })?;

    url.path_segments_mut()
        .map_err(|_| StoreError::Request("store base url cannot carry a path".to_string()))?
        .pop_if_empty()
        .extend(["spreadsheets", settings.spreadsheet_id.as_str(), "values"])
        .push(&format!("{range}{suffix}"));

    Ok(url)
}

#[derive(Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Decodes a `ValueRange` body. A missing `values` member means the block was entirely empty.
pub(crate) fn decode_value_range(body: &Value) -> Result<ValueRange, StoreError> {
    let response = ValuesResponse::deserialize(body)
        .map_err(|error| StoreError::Decode(format!("unexpected values payload: {error}")))?;

    Ok(ValueRange::new(
        response
            .values
            .iter()
            .map(|row| row.iter().map(CellValue::from_json).collect())
            .collect(),
    ))
}
