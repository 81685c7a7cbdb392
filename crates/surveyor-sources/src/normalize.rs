//! Shared decoding and mapping helpers for source adapters.
//!
//! Raw items are decoded into per-source structs whose fields all default,
//! using the lenient deserializers here so that a mistyped field becomes
//! empty or zero instead of failing the page. The fallback chains that turn
//! those structs into canonical records live here as small named functions.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use surveyor_core::is_ip_or_cidr;

/// Deserialize a string field, yielding `""` for any non-string value.
pub fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

/// Deserialize an unsigned integer field.
///
/// Accepts JSON numbers (integral or float) and numeric strings; anything
/// else, or a value out of range for `T`, yields zero.
pub fn lenient_uint<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + Default,
{
    Ok(uint_from_value(&Value::deserialize(deserializer)?))
}

/// Deserialize a boolean field, yielding `false` for non-boolean values.
pub fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

/// Deserialize a nested struct, yielding its default when it does not decode.
pub fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(decode_or_default(Value::deserialize(deserializer)?))
}

/// Decode a raw item, falling back to the all-default struct.
#[must_use]
pub fn decode_or_default<T: DeserializeOwned + Default>(value: Value) -> T {
    serde_json::from_value(value).unwrap_or_default()
}

/// Decode a list field leniently: a non-array becomes an empty list.
pub fn lenient_list<'de, D>(deserializer: D) -> std::result::Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn uint_from_value<T: TryFrom<u64> + Default>(value: &Value) -> T {
    let raw = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    raw.and_then(|v| T::try_from(v).ok()).unwrap_or_default()
}

/// Build a source search expression for a target host.
///
/// IP and CIDR hosts use an `ip` match, everything else a `domain` match;
/// `operator` is the source's field operator (`:` or `=`).
#[must_use]
pub fn query_expression(host: &str, operator: char) -> String {
    let field = if is_ip_or_cidr(host) { "ip" } else { "domain" };
    format!("{field}{operator}\"{host}\"")
}

/// First non-empty candidate, in order: explicit host, domain, IP.
#[must_use]
pub fn resolve_host(explicit: &str, domain: &str, ip: &str) -> String {
    [explicit, domain, ip]
        .into_iter()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Registered domain for a record.
///
/// A non-address domain supplied by the source wins; otherwise the host is
/// used when it is a name. Bare addresses yield an empty domain.
#[must_use]
pub fn resolve_domain(explicit: &str, host: &str) -> String {
    [explicit.trim(), host.trim()]
        .into_iter()
        .find(|candidate| !candidate.is_empty() && !is_ip_or_cidr(candidate))
        .unwrap_or_default()
        .to_string()
}

/// Split a host field that may carry a scheme, port and path.
///
/// Returns the bare host and the embedded port, or 0 when there is no valid
/// port.
#[must_use]
pub fn extract_host_and_port(raw: &str) -> (String, u16) {
    let raw = raw.trim();
    let without_scheme = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .unwrap_or(raw);
    let authority = without_scheme
        .split_once('/')
        .map_or(without_scheme, |(authority, _)| authority);

    if let Some((host, port)) = authority.split_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            if port > 0 {
                return (host.to_string(), port);
            }
        }
    }
    (authority.to_string(), 0)
}

/// Fill in a missing protocol from the port: 443 is `https`, anything else
/// `http`.
#[must_use]
pub fn resolve_protocol(protocol: &str, port: u16) -> String {
    let protocol = protocol.trim();
    if !protocol.is_empty() {
        return protocol.to_string();
    }
    if port == 443 { "https" } else { "http" }.to_string()
}

/// Whether a protocol is served as a web URL.
#[must_use]
pub fn is_web_protocol(protocol: &str) -> bool {
    matches!(protocol, "http" | "https")
}

/// Protocol after the port-based scheme correction.
///
/// `http` on 443 becomes `https`. When `allow_downgrade` is set, `https` on
/// 80 becomes `http`.
#[must_use]
pub fn effective_protocol(protocol: &str, port: u16, allow_downgrade: bool) -> String {
    match (protocol, port) {
        ("http", 443) => "https".to_string(),
        ("https", 80) if allow_downgrade => "http".to_string(),
        _ => protocol.to_string(),
    }
}

/// Build a web URL.
///
/// The port is omitted when it is zero or the default for the (corrected)
/// protocol. A non-root `path` is appended with a leading slash.
#[must_use]
pub fn build_url(protocol: &str, host: &str, port: u16, path: &str, allow_downgrade: bool) -> String {
    let protocol = effective_protocol(protocol, port, allow_downgrade);
    let default_port = match protocol.as_str() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };

    let mut url = if port == 0 || default_port == Some(port) {
        format!("{protocol}://{host}")
    } else {
        format!("{protocol}://{host}:{port}")
    };

    let path = path.trim();
    if !path.is_empty() && path != "/" {
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
    }
    url
}

/// URL for a non-web service: `proto://host:port`, so distinct services on
/// one host keep distinct identities. An unknown (zero) port is omitted.
#[must_use]
pub fn service_url(protocol: &str, host: &str, port: u16) -> String {
    if port == 0 {
        format!("{protocol}://{host}")
    } else {
        format!("{protocol}://{host}:{port}")
    }
}

/// Strip surrounding whitespace and newlines from a page title.
#[must_use]
pub fn clean_title(raw: &str) -> String {
    raw.trim().to_string()
}

/// Body size in bytes, saturating at `u32::MAX`.
#[must_use]
pub fn body_length(body: &str) -> u32 {
    u32::try_from(body.len()).unwrap_or(u32::MAX)
}
