//! 360 Quake source adapter.
//!
//! Uses the scroll endpoint: the first request starts at offset 0 and every
//! following request carries the `pagination_id` cursor from the previous
//! page.

use crate::error::{Result, SourceError};
use crate::normalize::{
    body_length, build_url, clean_title, decode_or_default, effective_protocol, is_web_protocol,
    lenient, lenient_list, lenient_string, lenient_uint, query_expression, resolve_domain,
    resolve_host, resolve_protocol, service_url,
};
use crate::providers::common::{
    build_http_client, read_json, transport_error, DEFAULT_TIMEOUT, MAX_PAGES,
};
use crate::source::AssetSource;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use surveyor_core::{AssetRecord, SourceKind, Target, TrustLevel};

const SOURCE_ID: &str = "quake";
const DEFAULT_BASE_URL: &str = "https://quake.360.net";
const PAGE_SIZE: usize = 1000;

/// 360 Quake API adapter.
pub struct QuakeProvider {
    api_key: String,
    client: Client,
    base_url: String,
    page_size: usize,
}

impl QuakeProvider {
    /// Create a new Quake adapter with the default timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    /// Create a new Quake adapter with a specific request timeout.
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

    fn payload(&self, query: &str, pagination_id: Option<&str>) -> Value {
        match pagination_id {
            None => json!({
                "query": query,
                "start": 0,
                "size": self.page_size,
                "ignore_cache": true,
                "latest": true,
            }),
            Some(cursor) => json!({
                "query": query,
                "pagination_id": cursor,
                "size": self.page_size,
                "ignore_cache": true,
                "latest": true,
            }),
        }
    }
}

#[async_trait]
impl AssetSource for QuakeProvider {
    async fn query(&self, target: &Target) -> Result<Vec<AssetRecord>> {
        let query = query_expression(&target.host, ':');
        let endpoint = format!("{}/api/v3/scroll/quake_service", self.base_url);
        tracing::info!(source = SOURCE_ID, target = %target.host, %query, "Starting query");

        let mut records = Vec::new();
        let mut pagination_id: Option<String> = None;

        for page in 1..=MAX_PAGES {
            let response = self
                .client
                .post(&endpoint)
                .header("X-QuakeToken", &self.api_key)
                .header("Content-Type", "application/json")
                .json(&self.payload(&query, pagination_id.as_deref()))
                .send()
                .await
                .map_err(|e| transport_error(SOURCE_ID, &e))?;

            let envelope: QuakeResponse = serde_json::from_value(read_json(SOURCE_ID, response).await?)
                .map_err(|e| SourceError::transient(SOURCE_ID, format!("unexpected response shape: {e}")))?;

            if !code_is_success(&envelope.code) {
                return Err(SourceError::transient(
                    SOURCE_ID,
                    format!("API error (code {}): {}", envelope.code, envelope.message),
                ));
            }

            let count = envelope.data.len();
            records.extend(
                envelope
                    .data
                    .into_iter()
                    .filter_map(|item| map_item(&decode_or_default(item))),
            );
            tracing::debug!(source = SOURCE_ID, target = %target.host, page, items = count, "Fetched page");

            if count < self.page_size || envelope.meta.pagination_id.is_empty() {
                break;
            }
            if page == MAX_PAGES {
                tracing::warn!(source = SOURCE_ID, target = %target.host, "Page ceiling reached, stopping");
            }
            pagination_id = Some(envelope.meta.pagination_id);
        }

        tracing::info!(source = SOURCE_ID, target = %target.host, records = records.len(), "Query finished");
        Ok(records)
    }

    fn source_id(&self) -> &'static str {
        SourceKind::Quake.as_str()
    }
}

fn code_is_success(code: &Value) -> bool {
    match code {
        Value::Null => true,
        Value::Number(n) => n.as_i64() == Some(0),
        Value::String(s) => s.is_empty() || s == "0",
        _ => false,
    }
}

/// Map a Quake service name to a protocol.
fn service_protocol(name: &str) -> &str {
    match name {
        "http/ssl" | "https" => "https",
        other => other,
    }
}

/// Map one decoded Quake item to a canonical record.
///
/// Returns `None` when the item carries neither a host, domain nor IP.
fn map_item(item: &QuakeItem) -> Option<AssetRecord> {
    let protocol = resolve_protocol(service_protocol(&item.service.name), item.port);
    let http = &item.service.http;

    let record = if is_web_protocol(&protocol) {
        let host = resolve_host(&http.host, &item.domain, &item.ip);
        if host.is_empty() {
            return None;
        }
        AssetRecord {
            domain: resolve_domain(&item.domain, &host),
            url: build_url(&protocol, &host, item.port, &http.path, true),
            protocol: effective_protocol(&protocol, item.port, true),
            host,
            status_code: http.status_code,
            length: body_length(&http.body),
            title: clean_title(&http.title),
            ..base_record(item)
        }
    } else {
        let host = resolve_host(&item.hostname, &item.domain, &item.ip);
        if host.is_empty() {
            return None;
        }
        AssetRecord {
            domain: resolve_domain(&item.domain, &host),
            url: service_url(&protocol, &host, item.port),
            protocol,
            host,
            ..base_record(item)
        }
    };
    Some(record)
}

fn base_record(item: &QuakeItem) -> AssetRecord {
    AssetRecord {
        ip: item.ip.trim().to_string(),
        port: item.port,
        source: SOURCE_ID.to_string(),
        trust_level: TrustLevel::Direct,
        ..AssetRecord::default()
    }
}

// Quake API types

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuakeResponse {
    code: Value,
    #[serde(deserialize_with = "lenient_string")]
    message: String,
    #[serde(deserialize_with = "lenient_list")]
    data: Vec<Value>,
    #[serde(deserialize_with = "lenient")]
    meta: QuakeMeta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuakeMeta {
    #[serde(deserialize_with = "lenient_string")]
    pagination_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuakeItem {
    #[serde(deserialize_with = "lenient_string")]
    ip: String,
    #[serde(deserialize_with = "lenient_uint")]
    port: u16,
    #[serde(deserialize_with = "lenient_string")]
    hostname: String,
    #[serde(deserialize_with = "lenient_string")]
    domain: String,
    #[serde(deserialize_with = "lenient")]
    service: QuakeService,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuakeService {
    #[serde(deserialize_with = "lenient_string")]
    name: String,
    #[serde(deserialize_with = "lenient")]
    http: QuakeHttp,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuakeHttp {
    #[serde(deserialize_with = "lenient_string")]
    host: String,
    #[serde(deserialize_with = "lenient_string")]
    title: String,
    #[serde(deserialize_with = "lenient_uint")]
    status_code: u16,
    #[serde(deserialize_with = "lenient_string")]
    body: String,
    #[serde(deserialize_with = "lenient_string")]
    path: String,
}
