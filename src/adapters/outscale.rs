// Copyright (c) 2025 - Cowboy AI, Inc.

//! Outscale API record source
//!
//! Fetches VM records through the Outscale `ReadVms` call, pushing the
//! filter set down via its `Filters` object and following
//! `NextPageToken` pagination until the listing is exhausted.
//!
//! Authentication uses the API's basic-auth scheme with the configured
//! access/secret key pair; signed-request schemes are out of scope here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::InventoryConfig;
use crate::errors::{InventoryError, InventoryResult};
use crate::filters::FilterSet;
use crate::record::RawRecord;
use crate::source::RecordSource;

const DEFAULT_REGION: &str = "eu-west-2";

fn default_timeout() -> u64 {
    30
}

/// Configuration for the Outscale API connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutscaleConfig {
    /// Outscale region, e.g. "eu-west-2"
    pub region: String,

    /// API access key
    pub access_key: String,

    /// API secret key
    pub secret_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl OutscaleConfig {
    /// Build from the inventory configuration, falling back to the
    /// `OSC_ACCESS_KEY` / `OSC_SECRET_KEY` / `OSC_REGION` environment
    /// variables the way the provider tooling does
    pub fn from_inventory_config(config: &InventoryConfig) -> InventoryResult<Self> {
        let access_key = config
            .access_key
            .clone()
            .or_else(|| std::env::var("OSC_ACCESS_KEY").ok())
            .ok_or_else(|| {
                InventoryError::Configuration(
                    "access_key must be set in the config or OSC_ACCESS_KEY".to_string(),
                )
            })?;
        let secret_key = config
            .secret_key
            .clone()
            .or_else(|| std::env::var("OSC_SECRET_KEY").ok())
            .ok_or_else(|| {
                InventoryError::Configuration(
                    "secret_key must be set in the config or OSC_SECRET_KEY".to_string(),
                )
            })?;
        let region = config
            .region
            .clone()
            .or_else(|| std::env::var("OSC_REGION").ok())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        Ok(Self {
            region,
            access_key,
            secret_key,
            timeout_secs: default_timeout(),
        })
    }

    fn endpoint(&self) -> String {
        format!("https://api.{}.outscale.com/api/v1/ReadVms", self.region)
    }
}

/// Outscale `ReadVms` client implementing [`RecordSource`]
pub struct OutscaleClient {
    config: OutscaleConfig,
    client: Client,
}

impl OutscaleClient {
    /// Create a client with a configured timeout
    pub fn new(config: OutscaleConfig) -> InventoryResult<Self> {
        info!(region = %config.region, "creating Outscale API client");
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                InventoryError::Transport(format!("failed to create HTTP client: {e}"))
            })?;
        Ok(Self { config, client })
    }

    async fn read_vms_page(
        &self,
        filters: &FilterSet,
        next_page_token: Option<&str>,
    ) -> InventoryResult<(Vec<RawRecord>, Option<String>)> {
        let mut body = json!({ "Filters": Value::Object(filters.to_api_filters()) });
        if let Some(token) = next_page_token {
            body["NextPageToken"] = json!(token);
        }

        let response = self
            .client
            .post(self.config.endpoint())
            .basic_auth(&self.config.access_key, Some(&self.config.secret_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| InventoryError::Transport(format!("ReadVms request failed: {e}")))?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(InventoryError::Transport(format!(
                "ReadVms returned {status}: {body}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| InventoryError::Transport(format!("invalid ReadVms response: {e}")))?;

        let vms = payload
            .get("Vms")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let token = payload
            .get("NextPageToken")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok((vms, token))
    }
}

#[async_trait]
impl RecordSource for OutscaleClient {
    async fn fetch_records(&self, filters: &FilterSet) -> InventoryResult<Vec<RawRecord>> {
        let mut records = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let (mut page, next) = self.read_vms_page(filters, token.as_deref()).await?;
            debug!(page_size = page.len(), "fetched ReadVms page");
            records.append(&mut page);
            match next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        info!(count = records.len(), "fetched Outscale VM records");
        Ok(records)
    }
}
