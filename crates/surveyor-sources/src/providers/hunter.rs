//! Qianxin Hunter source adapter.

use crate::error::{Result, SourceError};
use crate::normalize::{
    build_url, clean_title, decode_or_default, effective_protocol, lenient, lenient_list,
    lenient_string, lenient_uint, query_expression, resolve_domain, resolve_host,
    resolve_protocol,
};
use crate::providers::common::{
    build_http_client, read_json, transport_error, DEFAULT_TIMEOUT, MAX_PAGES,
};
use crate::source::AssetSource;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use surveyor_core::{AssetRecord, SourceKind, Target, TrustLevel};

const SOURCE_ID: &str = "hunter";
const DEFAULT_BASE_URL: &str = "https://hunter.qianxin.com";
const PAGE_SIZE: usize = 100;

/// Payload code for a successful request.
const CODE_OK: i64 = 200;

/// `is_web` filter value selecting every asset type.
const ALL_ASSET_TYPES: &str = "3";

/// Hunter API adapter.
pub struct HunterProvider {
    api_key: String,
    client: Client,
    base_url: String,
    page_size: usize,
}

impl HunterProvider {
    /// Create a new Hunter adapter with the default timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    /// Create a new Hunter adapter with a specific request timeout.
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
impl AssetSource for HunterProvider {
    async fn query(&self, target: &Target) -> Result<Vec<AssetRecord>> {
        let query = query_expression(&target.host, '=');
        let search = URL_SAFE.encode(query.as_bytes());
        let endpoint = format!("{}/openApi/search", self.base_url);
        let page_size = self.page_size.to_string();
        tracing::info!(source = SOURCE_ID, target = %target.host, %query, "Starting query");

        let mut records = Vec::new();

        for page in 1..=MAX_PAGES {
            let page_param = page.to_string();
            let response = self
                .client
                .get(&endpoint)
                .query(&[
                    ("api-key", self.api_key.as_str()),
                    ("search", search.as_str()),
                    ("page", page_param.as_str()),
                    ("page_size", page_size.as_str()),
                    ("is_web", ALL_ASSET_TYPES),
                ])
                .send()
                .await
                .map_err(|e| transport_error(SOURCE_ID, &e))?;

            let envelope: HunterResponse = serde_json::from_value(read_json(SOURCE_ID, response).await?)
                .map_err(|e| SourceError::transient(SOURCE_ID, format!("unexpected response shape: {e}")))?;

            if envelope.code != CODE_OK {
                return Err(classify_api_error(envelope.code, &envelope.message));
            }

            let count = envelope.data.arr.len();
            records.extend(
                envelope
                    .data
                    .arr
                    .into_iter()
                    .filter_map(|item| map_item(&decode_or_default(item))),
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
        SourceKind::Hunter.as_str()
    }
}

fn classify_api_error(code: i64, message: &str) -> SourceError {
    let message = format!("API error (code {code}): {message}");
    match code {
        401 | 403 => SourceError::permanent(SOURCE_ID, message),
        _ => SourceError::transient(SOURCE_ID, message),
    }
}

/// Map one decoded Hunter item to a canonical record.
fn map_item(item: &HunterItem) -> Option<AssetRecord> {
    let host = resolve_host("", &item.domain, &item.ip);
    if host.is_empty() {
        return None;
    }
    let protocol = resolve_protocol(&item.protocol, item.port);

    Some(AssetRecord {
        domain: resolve_domain(&item.domain, &host),
        url: build_url(&protocol, &host, item.port, "", false),
        protocol: effective_protocol(&protocol, item.port, false),
        host,
        ip: item.ip.trim().to_string(),
        port: item.port,
        status_code: item.status_code,
        title: clean_title(&item.web_title),
        source: SOURCE_ID.to_string(),
        trust_level: TrustLevel::Direct,
        ..AssetRecord::default()
    })
}

// Hunter API types

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HunterResponse {
    #[serde(default = "missing_code", deserialize_with = "lenient_code")]
    code: i64,
    #[serde(deserialize_with = "lenient_string")]
    message: String,
    #[serde(deserialize_with = "lenient")]
    data: HunterData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HunterData {
    #[serde(deserialize_with = "lenient_list")]
    arr: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HunterItem {
    #[serde(deserialize_with = "lenient_string")]
    ip: String,
    #[serde(deserialize_with = "lenient_uint")]
    port: u16,
    #[serde(deserialize_with = "lenient_string")]
    protocol: String,
    #[serde(deserialize_with = "lenient_string")]
    web_title: String,
    #[serde(deserialize_with = "lenient_string")]
    domain: String,
    #[serde(deserialize_with = "lenient_uint")]
    status_code: u16,
}

fn missing_code() -> i64 {
    -1
}

/// Hunter codes are integers; a missing or unreadable code counts as failure.
fn lenient_code<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().unwrap_or(-1),
        Value::String(s) => s.trim().parse().unwrap_or(-1),
        _ => -1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> HunterItem {
        decode_or_default(value)
    }

    #[test]
    fn test_map_web_item() {
        let record = map_item(&item(json!({
            "ip": "1.2.3.4",
            "port": 443,
            "protocol": "http",
            "web_title": " Dashboard\n",
            "domain": "app.example.com",
            "status_code": 200
        })))
        .expect("mapped");

        assert_eq!(record.url, "https://app.example.com");
        assert_eq!(record.protocol, "https");
        assert_eq!(record.host, "app.example.com");
        assert_eq!(record.domain, "app.example.com");
        assert_eq!(record.title, "Dashboard");
        assert_eq!(record.status_code, 200);
        assert_eq!(record.source, "hunter");
    }

    #[test]
    fn test_map_ip_only_item() {
        let record = map_item(&item(json!({"ip": "1.2.3.4", "port": 8080, "protocol": ""})))
            .expect("mapped");
        assert_eq!(record.url, "http://1.2.3.4:8080");
        assert_eq!(record.host, "1.2.3.4");
        assert_eq!(record.domain, "");
    }

    #[test]
    fn test_missing_code_is_failure() {
        let envelope: HunterResponse = decode_or_default(json!({"message": "?"}));
        assert_eq!(envelope.code, -1);

        let envelope: HunterResponse = decode_or_default(json!({"code": 200, "data": null}));
        assert_eq!(envelope.code, CODE_OK);
        assert!(envelope.data.arr.is_empty());
    }

    #[test]
    fn test_classify_api_error() {
        assert!(classify_api_error(401, "令牌无效").is_permanent());
        assert!(classify_api_error(403, "forbidden").is_permanent());
        assert!(!classify_api_error(429, "请求太多啦，稍后再试试").is_permanent());
    }
}
