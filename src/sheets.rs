//! Client for the Google Apps Script webhook that fronts the user spreadsheet.
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | read | `GET ?sheet=<name>[&k=v...]` | `{status, data: [row...]}` |
//! | append | `POST ?sheet=<name>` `{sheet, data}` | `{status, message?}` |
//! | update | `POST ?sheet=<name>&mode=update` `{keyColumn, key, updateValues}` | `{status}` |
//!
//! Anything other than a 2xx response whose JSON body has `status ==
//! "success"` is a [`SheetError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub type SheetRow = Map<String, Value>;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("spreadsheet webhook unreachable: {0}")]
    Request(#[from] reqwest::Error),
    #[error("spreadsheet webhook returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("spreadsheet webhook sent an unreadable response: {0}")]
    Malformed(String),
    #[error("spreadsheet webhook reported an error: {0}")]
    Status(String),
}

#[async_trait]
pub trait SheetStore: Send + Sync {
    async fn rows(&self, sheet: &str, params: &[(&str, &str)]) -> Result<Vec<SheetRow>, SheetError>;

    async fn append(&self, sheet: &str, data: SheetRow) -> Result<(), SheetError>;

    async fn update(
        &self,
        sheet: &str,
        key_column: &str,
        key: &str,
        values: SheetRow,
    ) -> Result<(), SheetError>;
}

#[derive(Debug, Deserialize)]
struct WebhookResponse {
    status: String,
    #[serde(default)]
    data: Vec<SheetRow>,
    message: Option<String>,
}

pub struct WebhookSheets {
    client: Client,
    url: String,
}

impl WebhookSheets {
    pub fn new(url: String, timeout: Duration) -> Result<Self, SheetError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    async fn read_response(response: reqwest::Response) -> Result<WebhookResponse, SheetError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SheetError::Http { status: status.as_u16(), body });
        }

        let parsed: WebhookResponse =
            serde_json::from_str(&body).map_err(|e| SheetError::Malformed(format!("{}: {}", e, body)))?;
        if parsed.status != "success" {
            return Err(SheetError::Status(
                parsed.message.clone().unwrap_or_else(|| format!("status {}", parsed.status)),
            ));
        }
        Ok(parsed)
    }
}

/// Nulls become empty cells.
fn clean_row(data: SheetRow) -> SheetRow {
    data.into_iter()
        .map(|(k, v)| (k, if v.is_null() { Value::String(String::new()) } else { v }))
        .collect()
}

#[async_trait]
impl SheetStore for WebhookSheets {
    async fn rows(&self, sheet: &str, params: &[(&str, &str)]) -> Result<Vec<SheetRow>, SheetError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("sheet", sheet)])
            .query(params)
            .send()
            .await?;

        let parsed = Self::read_response(response).await.inspect_err(|e| {
            tracing::error!("Error fetching {}: {}", sheet, e);
        })?;
        Ok(parsed.data)
    }

    async fn append(&self, sheet: &str, data: SheetRow) -> Result<(), SheetError> {
        tracing::info!("Appending row to sheet {}", sheet);
        let response = self
            .client
            .post(&self.url)
            .query(&[("sheet", sheet)])
            .json(&serde_json::json!({ "sheet": sheet, "data": clean_row(data) }))
            .send()
            .await?;

        Self::read_response(response).await.inspect_err(|e| {
            tracing::error!("Error appending to {}: {}", sheet, e);
        })?;
        tracing::info!("Successfully appended data to {}", sheet);
        Ok(())
    }

    async fn update(
        &self,
        sheet: &str,
        key_column: &str,
        key: &str,
        values: SheetRow,
    ) -> Result<(), SheetError> {
        tracing::info!("Updating row {}={} in sheet {}", key_column, key, sheet);
        let response = self
            .client
            .post(&self.url)
            .query(&[("sheet", sheet), ("mode", "update")])
            .json(&serde_json::json!({
                "keyColumn": key_column,
                "key": key,
                "updateValues": clean_row(values),
            }))
            .send()
            .await?;

        Self::read_response(response).await.inspect_err(|e| {
            tracing::error!("Error updating {}: {}", sheet, e);
        })?;
        Ok(())
    }
}
