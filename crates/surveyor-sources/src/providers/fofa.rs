//! FOFA source adapter.

use crate::error::{Result, SourceError};
use crate::normalize::{
    build_url, clean_title, decode_or_default, effective_protocol, extract_host_and_port,
    lenient_bool, lenient_list, lenient_string, lenient_uint, query_expression, resolve_domain,
    resolve_host, resolve_protocol,
};
use crate::providers::common::{
    build_http_client, read_json, transport_error, DEFAULT_TIMEOUT, MAX_PAGES,
};
use crate::source::AssetSource;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use surveyor_core::{AssetRecord, SourceKind, Target, TrustLevel};

const SOURCE_ID: &str = "fofa";
const DEFAULT_BASE_URL: &str = "https://fofa.info";
const PAGE_SIZE: usize = 1000;

/// Fields requested from FOFA, in the order positional rows use.
const FIELDS: [&str; 7] = ["host", "ip", "port", "protocol", "title", "server", "domain"];

/// Error code FOFA returns for an invalid or disabled account.
const ACCOUNT_INVALID_CODE: &str = "-700";

/// Markers of an exhausted F-point balance or query quota.
const QUOTA_EXHAUSTED_MARKERS: [&str; 3] = ["820031", "余额不足", "insufficient balance"];

/// FOFA API adapter.
pub struct FofaProvider {
    api_key: String,
    client: Client,
    base_url: String,
    page_size: usize,
}

impl FofaProvider {
    /// Create a new FOFA adapter with the default timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    /// Create a new FOFA adapter with a specific request timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            client: build_http_client(SOURCE_ID, timeout)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: PAGE_SIZE,
        })
    }

    /// Point the adapter at a different API host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl AssetSource for FofaProvider {
    async fn query(&self, target: &Target) -> Result<Vec<AssetRecord>> {
        let query = query_expression(&target.host, '=');
        let qbase64 = STANDARD.encode(query.as_bytes());
        let endpoint = format!("{}/api/v1/search/all", self.base_url);
        let fields = FIELDS.join(",");
        let size = self.page_size.to_string();
        tracing::info!(source = SOURCE_ID, target = %target.host, %query, "Starting query");

        let mut records = Vec::new();

        for page in 1..=MAX_PAGES {
            let page_param = page.to_string();
            let response = self
                .client
                .get(&endpoint)
                .query(&[
                    ("qbase64", qbase64.as_str()),
                    ("fields", fields.as_str()),
                    ("page", page_param.as_str()),
                    ("size", size.as_str()),
                    ("full", "false"),
                    ("r_type", "json"),
                    ("key", self.api_key.as_str()),
                ])
                .send()
                .await
                .map_err(|e| transport_error(SOURCE_ID, &e))?;

            let envelope: FofaResponse = serde_json::from_value(read_json(SOURCE_ID, response).await?)
                .map_err(|e| SourceError::transient(SOURCE_ID, format!("unexpected response shape: {e}")))?;

            if envelope.error {
                return Err(classify_api_error(&envelope.errmsg));
            }

            let count = envelope.results.len();
            records.extend(
                envelope
                    .results
                    .into_iter()
                    .filter_map(|row| map_item(&decode_row(row))),
            );
            tracing::debug!(source = SOURCE_ID, target = %target.host, page, items = count, "Fetched page");

            if count < self.page_size {
                break;
            }
            if page == MAX_PAGES {
                tracing::warn!(source = SOURCE_ID, target = %target.host, "Page ceiling reached, stopping");
            }
        }

        tracing::info!(source = SOURCE_ID, target = %target.host, records = records.len(), "Query finished");
        Ok(records)
    }

    fn source_id(&self) -> &'static str {
        SourceKind::Fofa.as_str()
    }
}

fn classify_api_error(errmsg: &str) -> SourceError {
    let message = format!("API error: {errmsg}");
    let lowered = errmsg.to_lowercase();
    if errmsg.contains(ACCOUNT_INVALID_CODE)
        || QUOTA_EXHAUSTED_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
    {
        SourceError::permanent(SOURCE_ID, message)
    } else {
        SourceError::transient(SOURCE_ID, message)
    }
}

/// Decode a result row that is either an object or a positional array in
/// [`FIELDS`] order.
fn decode_row(row: Value) -> FofaItem {
    match row {
        Value::Array(values) => {
            let object: Map<String, Value> = FIELDS
                .iter()
                .map(|field| (*field).to_string())
                .zip(values)
                .collect();
            decode_or_default(Value::Object(object))
        }
        other => decode_or_default(other),
    }
}

/// Map one decoded FOFA row to a canonical record.
///
/// A port embedded in `host` wins for URL construction; the record keeps the
/// port reported by the API.
fn map_item(item: &FofaItem) -> Option<AssetRecord> {
    let (bare_host, host_port) = extract_host_and_port(&item.host);
    let host = resolve_host(&bare_host, &item.domain, &item.ip);
    if host.is_empty() {
        return None;
    }

    let url_port = if host_port > 0 { host_port } else { item.port };
    let protocol = resolve_protocol(&item.protocol, url_port);

    Some(AssetRecord {
        domain: resolve_domain(&item.domain, &host),
        url: build_url(&protocol, &host, url_port, "", false),
        protocol: effective_protocol(&protocol, url_port, false),
        host,
        ip: item.ip.trim().to_string(),
        port: item.port,
        title: clean_title(&item.title),
        source: SOURCE_ID.to_string(),
        trust_level: TrustLevel::Direct,
        ..AssetRecord::default()
    })
}

// FOFA API types

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FofaResponse {
    #[serde(deserialize_with = "lenient_bool")]
    error: bool,
    #[serde(deserialize_with = "lenient_string")]
    errmsg: String,
    #[serde(deserialize_with = "lenient_list")]
    results: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FofaItem {
    #[serde(deserialize_with = "lenient_string")]
    host: String,
    #[serde(deserialize_with = "lenient_string")]
    ip: String,
    #[serde(deserialize_with = "lenient_uint")]
    port: u16,
    #[serde(deserialize_with = "lenient_string")]
    protocol: String,
    #[serde(deserialize_with = "lenient_string")]
    title: String,
    #[serde(deserialize_with = "lenient_string")]
    domain: String,
}
