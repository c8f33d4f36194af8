//! Supabase (PostgREST) backed store
//!
//! Reads with `GET /rest/v1/<table>?id=eq.<id>&select=<column>` and writes
//! with `PATCH` on the same filter. The service-role key goes in both the
//! `apikey` header and the bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{InfoStore, StoreError, info_column};
use crate::StoreConfig;
use crate::info::Mode;

pub struct PostgrestInfoStore {
    client: Client,
    base_url: String,
    table: String,
    api_key: String,
}

impl PostgrestInfoStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            table: table.into(),
            api_key: api_key.into(),
        })
    }

    /// Build from the environment variables named in `config`
    pub fn from_env(config: &StoreConfig) -> Result<Self, StoreError> {
        let base_url = std::env::var(&config.url_env)
            .map_err(|_| StoreError::MissingConfig(config.url_env.clone()))?;
        let api_key = std::env::var(&config.key_env)
            .map_err(|_| StoreError::MissingConfig(config.key_env.clone()))?;
        info!("Using PostgREST store at {} (table {})", base_url, config.table);
        Self::new(base_url, api_key, config.table.clone())
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl InfoStore for PostgrestInfoStore {
    async fn get_info(&self, record_id: &str, mode: Mode) -> Result<Option<Value>, StoreError> {
        let column = info_column(mode);
        debug!(record_id = %record_id, column, "Reading info column");

        let filter = format!("eq.{record_id}");
        let resp = self
            .authorized(self.client.get(self.table_url()))
            .query(&[("id", filter.as_str()), ("select", column)])
            .send()
            .await?;

        let rows: Vec<Map<String, Value>> = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove(column))
            .filter(|value| !value.is_null()))
    }

    async fn set_info(&self, record_id: &str, mode: Mode, info: &Value) -> Result<(), StoreError> {
        let column = info_column(mode);
        debug!(record_id = %record_id, column, "Writing info column");

        let mut body = Map::new();
        body.insert(column.to_string(), info.clone());

        let filter = format!("eq.{record_id}");
        let resp = self
            .authorized(self.client.patch(self.table_url()))
            .query(&[("id", filter.as_str()), ("select", "id")])
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;

        let updated: Vec<Value> = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        if updated.is_empty() {
            return Err(StoreError::NotFound(record_id.to_string()));
        }
        Ok(())
    }
}
