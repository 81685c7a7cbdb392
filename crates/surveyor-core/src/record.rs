//! Canonical asset record and the rules used to merge observations of the
//! same URL.
//!
//! Every source converges on [`AssetRecord`]. The store keys records by
//! [`normalize_url`] and reconciles duplicates with
//! [`AssetRecord::merged_with`], which is the only place conflicting
//! observations are resolved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Separator used for accumulated multi-value fields (`title`, `source`).
pub const VALUE_SEPARATOR: char = ';';

/// Reputation of an observation. Lower is more trusted.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// Observed directly from a user-supplied target
    #[default]
    Direct = 0,
    /// Observed while expanding a dense block, at an IP seen in round one
    KnownIp = 1,
    /// Observed while expanding a dense block, at a previously unseen IP
    NewIp = 2,
}

impl TrustLevel {
    /// Combine two observations of the same asset.
    ///
    /// `Direct` is a floor: once either side is `Direct` the result is
    /// `Direct`. Otherwise the more trusted (lower) level wins.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        if self == Self::Direct || other == Self::Direct {
            Self::Direct
        } else {
            self.min(other)
        }
    }

    /// Numeric level as stored.
    #[must_use]
    pub fn level(self) -> i64 {
        self as i64
    }

    /// Parse a stored numeric level.
    #[must_use]
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Self::Direct),
            1 => Some(Self::KnownIp),
            2 => Some(Self::NewIp),
            _ => None,
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// Normalized asset observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Organization label of the target that produced this record
    pub organization: String,
    /// Registered domain; empty when the host is a bare address
    pub domain: String,
    /// Host name or address the service answers on
    pub host: String,
    /// Service protocol (`http`, `https`, `ssh`, ...)
    pub protocol: String,
    /// Identity key
    pub url: String,
    /// IPv4 address
    pub ip: String,
    /// Service port, 0 when unknown
    pub port: u16,
    /// HTTP status code, 0 when unknown
    pub status_code: u16,
    /// Response body length, 0 when unknown
    pub length: u32,
    /// Page title(s), `;`-joined once accumulated
    pub title: String,
    /// Source tag(s), `;`-joined once accumulated
    pub source: String,
    /// Reputation of the observation
    pub trust_level: TrustLevel,
}

impl AssetRecord {
    /// Put the record in stored form: normalized URL and canonical
    /// accumulator fields.
    #[must_use]
    pub fn canonicalized(mut self) -> Self {
        self.url = normalize_url(&self.url);
        self.title = merge_values(&self.title, "");
        self.source = merge_values(&self.source, "");
        self
    }

    /// Merge an incoming observation into this (stored) record.
    ///
    /// Identity (`url`) is kept, `title` and `source` become the union of both
    /// sides, `trust_level` follows [`TrustLevel::merge`], and every other
    /// field is taken from `incoming`.
    #[must_use]
    pub fn merged_with(&self, incoming: &AssetRecord) -> AssetRecord {
        AssetRecord {
            organization: incoming.organization.clone(),
            domain: incoming.domain.clone(),
            host: incoming.host.clone(),
            protocol: incoming.protocol.clone(),
            url: self.url.clone(),
            ip: incoming.ip.clone(),
            port: incoming.port,
            status_code: incoming.status_code,
            length: incoming.length,
            title: merge_values(&self.title, &incoming.title),
            source: merge_values(&self.source, &incoming.source),
            trust_level: self.trust_level.merge(incoming.trust_level),
        }
    }
}

/// Normalize a URL into its identity key.
///
/// Trims whitespace, strips one trailing slash and drops an explicit default
/// port (`:80` for `http://`, `:443` for `https://`).
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let url = raw.trim();
    let url = url.strip_suffix('/').unwrap_or(url);

    let default_port = if url.starts_with("http://") {
        ":80"
    } else if url.starts_with("https://") {
        ":443"
    } else {
        return url.to_string();
    };

    let authority_start = url.find("://").map_or(0, |i| i + 3);
    let authority_end = url[authority_start..]
        .find(['/', '?', '#'])
        .map_or(url.len(), |i| authority_start + i);

    match url[authority_start..authority_end].strip_suffix(default_port) {
        Some(host) => format!(
            "{}{}{}",
            &url[..authority_start],
            host,
            &url[authority_end..]
        ),
        None => url.to_string(),
    }
}

/// Union of two `;`-joined value sets.
///
/// Values are trimmed, empties dropped, duplicates removed and the result is
/// sorted so the outcome does not depend on merge order.
#[must_use]
pub fn merge_values(a: &str, b: &str) -> String {
    let values: BTreeSet<&str> = a
        .split(VALUE_SEPARATOR)
        .chain(b.split(VALUE_SEPARATOR))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    let mut joined = String::new();
    for value in values {
        if !joined.is_empty() {
            joined.push(VALUE_SEPARATOR);
        }
        joined.push_str(value);
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, source: &str, trust: TrustLevel) -> AssetRecord {
        AssetRecord {
            organization: "X".to_string(),
            url: url.to_string(),
            ip: "1.2.3.4".to_string(),
            port: 80,
            protocol: "http".to_string(),
            source: source.to_string(),
            trust_level: trust,
            ..AssetRecord::default()
        }
    }

    #[test]
    fn test_normalize_trailing_slash_and_default_port() {
        assert_eq!(normalize_url("http://example.com/"), "http://example.com");
        assert_eq!(normalize_url("http://example.com:80"), "http://example.com");
        assert_eq!(normalize_url("http://example.com:80/"), "http://example.com");
        assert_eq!(normalize_url("https://example.com:443"), "https://example.com");
        assert_eq!(
            normalize_url("https://example.com:443/admin"),
            "https://example.com/admin"
        );
        assert_eq!(normalize_url("  http://example.com  "), "http://example.com");
    }

    #[test]
    fn test_normalize_keeps_non_default_ports() {
        assert_eq!(normalize_url("http://example.com:443"), "http://example.com:443");
        assert_eq!(normalize_url("https://example.com:80"), "https://example.com:80");
        assert_eq!(normalize_url("http://example.com:8080"), "http://example.com:8080");
        assert_eq!(normalize_url("ssh://1.2.3.4:22"), "ssh://1.2.3.4:22");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn test_merge_values_union_is_order_independent() {
        assert_eq!(merge_values("fofa", "quake"), "fofa;quake");
        assert_eq!(merge_values("quake", "fofa"), "fofa;quake");
        assert_eq!(merge_values("fofa;quake", "quake"), "fofa;quake");
        assert_eq!(merge_values(" a ;; b", ""), "a;b");
        assert_eq!(merge_values("", ""), "");
    }

    #[test]
    fn test_trust_merge_table() {
        use TrustLevel::{Direct, KnownIp, NewIp};
        let all = [Direct, KnownIp, NewIp];
        for t1 in all {
            for t2 in all {
                let merged = t1.merge(t2);
                if t1 == Direct || t2 == Direct {
                    assert_eq!(merged, Direct);
                } else {
                    assert_eq!(merged, t1.min(t2));
                }
                assert_eq!(merged, t2.merge(t1));
            }
        }
        assert_eq!(KnownIp.merge(NewIp), KnownIp);
        assert_eq!(NewIp.merge(NewIp), NewIp);
    }

    #[test]
    fn test_trust_level_roundtrip_from_storage() {
        assert_eq!(TrustLevel::from_level(0), Some(TrustLevel::Direct));
        assert_eq!(TrustLevel::from_level(2), Some(TrustLevel::NewIp));
        assert_eq!(TrustLevel::from_level(3), None);
        assert_eq!(TrustLevel::KnownIp.level(), 1);
    }

    #[test]
    fn test_merged_with_overwrites_scalars_and_unions_accumulators() {
        let mut stored = record("http://example.com", "quake", TrustLevel::Direct);
        stored.title = "Home".to_string();

        let mut incoming = record("http://example.com", "fofa", TrustLevel::NewIp);
        incoming.title = "Login".to_string();
        incoming.ip = "5.6.7.8".to_string();
        incoming.status_code = 302;
        incoming.organization = "Y".to_string();

        let merged = stored.merged_with(&incoming);
        assert_eq!(merged.url, "http://example.com");
        assert_eq!(merged.title, "Home;Login");
        assert_eq!(merged.source, "fofa;quake");
        assert_eq!(merged.trust_level, TrustLevel::Direct);
        assert_eq!(merged.ip, "5.6.7.8");
        assert_eq!(merged.status_code, 302);
        assert_eq!(merged.organization, "Y");
    }

    #[test]
    fn test_canonicalized() {
        let mut raw = record("http://example.com:80/", "hunter", TrustLevel::KnownIp);
        raw.title = " b ; a ".to_string();
        let stored = raw.canonicalized();
        assert_eq!(stored.url, "http://example.com");
        assert_eq!(stored.title, "a;b");
        assert_eq!(stored.source, "hunter");
    }
}
